//! Repositories over the key-value store
//!
//! Each repository owns one collection key and serialises its own
//! read-modify-write cycles.

pub mod activity_log;
pub mod letters;
pub mod users;

pub use activity_log::ActivityLog;
pub use letters::LetterRepository;
pub use users::UserRepository;
