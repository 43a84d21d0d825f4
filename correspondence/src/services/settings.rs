//! Settings service
//!
//! Manages the system-wide branding settings stored under one key.

use crate::config::{DEFAULT_SITE_NAME, DEFAULT_THEME_COLOR, SETTINGS_KEY};
use crate::error::{AppError, Result};
use crate::models::{LogAction, User};
use crate::repository::ActivityLog;
use crate::storage::{load_json, save_json, SharedStore};
use serde::{Deserialize, Serialize};

/// System settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSettings {
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Primary colour as `#rrggbb`
    #[serde(default = "default_theme_color")]
    pub theme_color: String,
    /// Logo as a data URL, if one was uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

fn default_site_name() -> String {
    DEFAULT_SITE_NAME.to_string()
}

fn default_theme_color() -> String {
    DEFAULT_THEME_COLOR.to_string()
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            theme_color: default_theme_color(),
            logo_url: None,
        }
    }
}

impl SystemSettings {
    fn validate(&self) -> Result<()> {
        if self.site_name.trim().is_empty() {
            return Err(AppError::validation("site name must not be empty"));
        }

        if !is_hex_color(&self.theme_color) {
            return Err(AppError::validation(format!(
                "theme colour must look like #rrggbb, got {:?}",
                self.theme_color
            )));
        }

        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Service for managing system settings
#[derive(Clone)]
pub struct SettingsService {
    store: SharedStore,
    activity: ActivityLog,
}

impl SettingsService {
    pub fn new(store: SharedStore, activity: ActivityLog) -> Self {
        Self { store, activity }
    }

    /// Load settings, falling back to defaults when none are stored
    pub async fn load(&self) -> Result<SystemSettings> {
        let settings = load_json(self.store.as_ref(), SETTINGS_KEY).await?;
        Ok(settings.unwrap_or_default())
    }

    /// Write the default settings when none are stored yet.
    pub async fn seed_if_absent(&self) -> Result<bool> {
        if self.store.get(SETTINGS_KEY).await?.is_some() {
            return Ok(false);
        }

        save_json(self.store.as_ref(), SETTINGS_KEY, &SystemSettings::default()).await?;
        tracing::info!("Seeded default system settings");
        Ok(true)
    }

    /// Validate and persist new settings. Administrators only.
    pub async fn save(&self, actor: &User, settings: &SystemSettings) -> Result<()> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "only administrators can change settings".to_string(),
            ));
        }

        settings.validate()?;
        save_json(self.store.as_ref(), SETTINGS_KEY, settings).await?;

        self.activity
            .append(
                &actor.id,
                &actor.full_name,
                LogAction::UpdateSettings,
                format!("Updated system settings: {}", settings.site_name),
            )
            .await;

        tracing::info!("System settings saved");
        Ok(())
    }
}
