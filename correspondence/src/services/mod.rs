//! Services module
//!
//! Business logic services that coordinate between callers and the
//! repositories.

pub mod attachments;
pub mod drafting;
pub mod letters;
pub mod settings;

pub use attachments::admit_attachment;
pub use drafting::{HttpDrafter, LetterDrafter};
pub use letters::{ComposeRequest, LettersService, RecipientSelection};
pub use settings::{SettingsService, SystemSettings};
