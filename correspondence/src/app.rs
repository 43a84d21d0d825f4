//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All repositories and services share one store and are made available
//! through AppState.

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::User;
use crate::repository::{ActivityLog, LetterRepository, UserRepository};
use crate::services::{HttpDrafter, LetterDrafter, LettersService, SettingsService};
use crate::storage::{MemoryStore, SharedStore, SqliteStore};
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub activity: ActivityLog,
    pub users: UserRepository,
    pub letter_repo: LetterRepository,
    pub letters: LettersService,
    pub settings: SettingsService,
    drafter: Option<Arc<dyn LetterDrafter>>,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        let activity = ActivityLog::new(store.clone());
        let users = UserRepository::new(store.clone(), activity.clone());
        let letter_repo = LetterRepository::new(store.clone(), activity.clone());
        let letters = LettersService::new(letter_repo.clone(), users.clone());
        let settings = SettingsService::new(store.clone(), activity.clone());

        Self {
            store,
            activity,
            users,
            letter_repo,
            letters,
            settings,
            drafter: None,
        }
    }

    pub fn with_drafter(mut self, drafter: Arc<dyn LetterDrafter>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    /// Seed users and settings on first start
    pub async fn bootstrap(&self) -> Result<()> {
        if self.users.seed_if_absent().await? {
            tracing::info!("First start: seed accounts created");
        }
        self.settings.seed_if_absent().await?;
        Ok(())
    }

    /// Bootstrapped state on a volatile store, optionally bounded
    pub async fn in_memory(quota: Option<usize>) -> Result<Self> {
        let store = match quota {
            Some(quota) => MemoryStore::with_quota(quota),
            None => MemoryStore::new(),
        };

        let state = Self::new(Arc::new(store));
        state.bootstrap().await?;
        Ok(state)
    }

    /// Open the durable store described by `config` and bootstrap it
    pub async fn open(config: &AppConfig) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", config.data_dir);

        std::fs::create_dir_all(&config.data_dir)?;

        let store = SqliteStore::open(&config.database_path(), config.store_quota).await?;
        let mut state = Self::new(Arc::new(store));

        match HttpDrafter::new(&config.draft_url) {
            Ok(drafter) => state = state.with_drafter(Arc::new(drafter)),
            Err(e) => tracing::warn!("Letter drafting disabled: {}", e),
        }

        state.bootstrap().await?;

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    pub fn has_drafter(&self) -> bool {
        self.drafter.is_some()
    }

    /// Suggested letter body, when a drafter is configured and answers
    pub async fn draft(
        &self,
        sender: &User,
        topic: &str,
        recipient_names: &[String],
    ) -> Option<String> {
        let drafter = self.drafter.as_deref()?;
        LettersService::draft_content(drafter, sender, topic, recipient_names).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SEED_PASSWORD, USERS_KEY};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let state = AppState::in_memory(None).await.unwrap();
        let before = state.store.get(USERS_KEY).await.unwrap();

        state.bootstrap().await.unwrap();

        assert_eq!(state.store.get(USERS_KEY).await.unwrap(), before);
        assert_eq!(state.users.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_open_persists_between_runs() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: temp_dir.path().join("data"),
            ..AppConfig::default()
        };

        {
            let state = AppState::open(&config).await.unwrap();
            let admin = state.users.login("admin", SEED_PASSWORD).await.unwrap();
            state.users.change_password(&admin, &admin.id, "changed").await.unwrap();
        }

        let state = AppState::open(&config).await.unwrap();
        assert!(state.users.login("admin", SEED_PASSWORD).await.is_err());
        assert!(state.users.login("admin", "changed").await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_draft_url_disables_drafting() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: temp_dir.path().join("data"),
            draft_url: "not a url".to_string(),
            ..AppConfig::default()
        };

        let state = AppState::open(&config).await.unwrap();
        assert!(!state.has_drafter());

        let admin = state.users.login("admin", SEED_PASSWORD).await.unwrap();
        assert_eq!(state.draft(&admin, "Budget", &[]).await, None);
    }

    #[tokio::test]
    async fn test_open_configures_drafter() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig {
            data_dir: temp_dir.path().join("data"),
            ..AppConfig::default()
        };

        let state = AppState::open(&config).await.unwrap();
        assert!(state.has_drafter());
    }

    #[tokio::test]
    async fn test_draft_without_drafter() {
        let state = AppState::in_memory(None).await.unwrap();
        let admin = state.users.login("admin", SEED_PASSWORD).await.unwrap();

        assert_eq!(state.draft(&admin, "Budget", &[]).await, None);
    }
}
