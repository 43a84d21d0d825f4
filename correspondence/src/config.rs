//! Application configuration
//!
//! Central location for store keys, resource limits, seed data and
//! validation boundaries, plus the runtime configuration read from the
//! environment.

use crate::models::Role;
use std::path::PathBuf;

// ===== Store Keys =====

/// Collection holding every user record (with credential hash)
pub const USERS_KEY: &str = "db_users";
/// Collection holding every letter
pub const LETTERS_KEY: &str = "db_letters";
/// Bounded activity history, newest first
pub const LOGS_KEY: &str = "db_logs";
/// System settings singleton
pub const SETTINGS_KEY: &str = "db_settings";

// ===== Activity Log =====

/// Maximum number of activity entries retained. Oldest entries are evicted.
pub const LOG_CAPACITY: usize = 100;

// ===== Attachment Limits =====

/// Maximum size of an image attachment (5 MiB, before compression upstream)
pub const MAX_IMAGE_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Maximum size of any non-image attachment (500 KiB)
pub const MAX_FILE_ATTACHMENT_BYTES: usize = 500 * 1024;

/// Maximum length for an attachment file name
pub const MAX_FILENAME_LENGTH: usize = 255;

// ===== Seed Data =====

/// Password given to every seed account at bootstrap
pub const SEED_PASSWORD: &str = "123";

/// Seed accounts: (username, full name, role tier, position)
pub const SEED_USERS: &[(&str, &str, Role, &str)] = &[
    ("admin", "System Administrator", Role::Admin, "General Management"),
    ("manager", "Reza Alavi", Role::Manager, "Technical Manager"),
    ("employee", "Sara Mohammadi", Role::Employee, "Sales Specialist"),
];

// ===== Settings Defaults =====

pub const DEFAULT_SITE_NAME: &str = "Novin Automation";
pub const DEFAULT_THEME_COLOR: &str = "#0ea5e9";

// ===== Drafting =====

/// Text generation endpoint; the prompt is appended as a path segment
pub const DEFAULT_DRAFT_URL: &str = "https://text.pollinations.ai";

/// Upper bound for a single drafting request in seconds
pub const DRAFT_TIMEOUT_SECS: u64 = 60;

// ===== Runtime Configuration =====

const DATA_DIR_ENV: &str = "CORRESPONDENCE_DATA_DIR";
const STORE_QUOTA_ENV: &str = "CORRESPONDENCE_STORE_QUOTA";
const DRAFT_URL_ENV: &str = "CORRESPONDENCE_DRAFT_URL";

/// Runtime configuration for the binary
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the SQLite store
    pub data_dir: PathBuf,
    /// Optional byte quota for the store; `None` means unbounded
    pub store_quota: Option<usize>,
    pub draft_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            store_quota: None,
            draft_url: DEFAULT_DRAFT_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults.
    /// An unparsable quota is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(quota) = std::env::var(STORE_QUOTA_ENV) {
            match quota.trim().parse::<usize>() {
                Ok(bytes) => config.store_quota = Some(bytes),
                Err(e) => {
                    tracing::warn!("Ignoring invalid {}={:?}: {}", STORE_QUOTA_ENV, quota, e)
                }
            }
        }

        if let Ok(url) = std::env::var(DRAFT_URL_ENV) {
            config.draft_url = url;
        }

        config
    }

    /// Path of the SQLite database file inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("correspondence.db")
    }
}
