//! User and session repository
//!
//! Users are stored together with an Argon2 hash of their password. The
//! hash stays inside this module: every method hands out plain [`User`]
//! values.

use super::ActivityLog;
use crate::config::{SEED_PASSWORD, SEED_USERS, USERS_KEY};
use crate::crypto::{hash_password, verify_password};
use crate::error::{AppError, Result};
use crate::models::{LogAction, User};
use crate::storage::{load_json, save_json, SharedStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Stored form of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    #[serde(flatten)]
    user: User,
    password_hash: String,
}

impl UserRecord {
    fn new(user: User, password: &str) -> Result<Self> {
        if password.is_empty() {
            return Err(AppError::validation("password must not be empty"));
        }

        Ok(Self {
            user,
            password_hash: hash_password(password)?,
        })
    }
}

/// Repository for user accounts and authentication
#[derive(Clone)]
pub struct UserRepository {
    store: SharedStore,
    activity: ActivityLog,
    lock: Arc<Mutex<()>>,
}

impl UserRepository {
    pub fn new(store: SharedStore, activity: ActivityLog) -> Self {
        Self {
            store,
            activity,
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self) -> Result<Vec<UserRecord>> {
        Ok(load_json(self.store.as_ref(), USERS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, records: &[UserRecord]) -> Result<()> {
        save_json(self.store.as_ref(), USERS_KEY, records).await
    }

    /// Write the seed accounts when no user collection exists yet.
    ///
    /// Returns whether seeding happened.
    pub async fn seed_if_absent(&self) -> Result<bool> {
        let _guard = self.lock.lock().await;

        if self.store.get(USERS_KEY).await?.is_some() {
            return Ok(false);
        }

        let records = SEED_USERS
            .iter()
            .map(|(username, full_name, role, position)| {
                UserRecord::new(User::new(*username, *full_name, *role, *position), SEED_PASSWORD)
            })
            .collect::<Result<Vec<_>>>()?;

        self.save(&records).await?;

        tracing::info!("Seeded {} user accounts", records.len());
        Ok(true)
    }

    /// Authenticate by exact username and password.
    ///
    /// Every failure, including an unreadable stored hash, is reported as
    /// [`AppError::AuthenticationFailure`].
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let records = self.load().await?;

        let Some(record) = records.into_iter().find(|r| r.user.username == username) else {
            tracing::debug!("Login failed: unknown username");
            return Err(AppError::AuthenticationFailure);
        };

        match verify_password(password, &record.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Login failed: wrong password for {}", record.user.id);
                return Err(AppError::AuthenticationFailure);
            }
            Err(e) => {
                tracing::warn!("Stored credential for {} unusable: {}", record.user.id, e);
                return Err(AppError::AuthenticationFailure);
            }
        }

        let user = record.user;
        self.activity
            .append(
                &user.id,
                &user.full_name,
                LogAction::Login,
                "User logged in successfully",
            )
            .await;

        tracing::info!("User logged in: {}", user.id);
        Ok(user)
    }

    /// All users, without credentials
    pub async fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.load().await?.into_iter().map(|r| r.user).collect())
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        self.load()
            .await?
            .into_iter()
            .find(|r| r.user.id == id)
            .map(|r| r.user)
            .ok_or_else(|| AppError::not_found("User", id))
    }

    /// Create an account. Administrators only.
    pub async fn add(&self, actor: &User, user: User, password: &str) -> Result<User> {
        require_admin(actor, "create users")?;

        if user.username.trim().is_empty() {
            return Err(AppError::validation("username must not be empty"));
        }

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        if records.iter().any(|r| r.user.id == user.id) {
            return Err(AppError::already_exists("User", &user.id));
        }
        if records.iter().any(|r| r.user.username == user.username) {
            return Err(AppError::already_exists("Username", &user.username));
        }

        records.push(UserRecord::new(user.clone(), password)?);
        self.save(&records).await?;

        self.activity
            .append(
                &actor.id,
                &actor.full_name,
                LogAction::CreateUser,
                format!("Created user {} ({})", user.username, user.role),
            )
            .await;

        tracing::info!("Created user: {}", user.id);
        Ok(user)
    }

    /// Replace a user's profile, keeping the stored password.
    ///
    /// Users may edit their own profile but not their role; administrators
    /// may edit anyone.
    pub async fn update(&self, actor: &User, user: User) -> Result<User> {
        if !actor.is_admin() && actor.id != user.id {
            return Err(AppError::Forbidden(
                "only administrators can edit other users".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        let index = records
            .iter()
            .position(|r| r.user.id == user.id)
            .ok_or_else(|| AppError::not_found("User", &user.id))?;

        if !actor.is_admin() && records[index].user.role != user.role {
            return Err(AppError::Forbidden(
                "only administrators can change roles".to_string(),
            ));
        }
        if records
            .iter()
            .any(|r| r.user.id != user.id && r.user.username == user.username)
        {
            return Err(AppError::already_exists("Username", &user.username));
        }

        records[index].user = user.clone();
        self.save(&records).await?;

        self.activity
            .append(
                &actor.id,
                &actor.full_name,
                LogAction::UpdateProfile,
                format!("Updated profile of {}", user.username),
            )
            .await;

        tracing::debug!("Updated user: {}", user.id);
        Ok(user)
    }

    /// Set a new password for `user_id`. Administrators or the user themself.
    pub async fn change_password(
        &self,
        actor: &User,
        user_id: &str,
        new_password: &str,
    ) -> Result<()> {
        if !actor.is_admin() && actor.id != user_id {
            return Err(AppError::Forbidden(
                "only administrators can change other users' passwords".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        let record = records
            .iter_mut()
            .find(|r| r.user.id == user_id)
            .ok_or_else(|| AppError::not_found("User", user_id))?;

        *record = UserRecord::new(record.user.clone(), new_password)?;
        self.save(&records).await?;

        self.activity
            .append(
                &actor.id,
                &actor.full_name,
                LogAction::ChangePassword,
                format!("Changed password of user {}", user_id),
            )
            .await;

        Ok(())
    }

    /// Remove an account. Letters referencing it are left untouched.
    pub async fn delete(&self, actor: &User, user_id: &str) -> Result<()> {
        require_admin(actor, "delete users")?;

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;

        let index = records
            .iter()
            .position(|r| r.user.id == user_id)
            .ok_or_else(|| AppError::not_found("User", user_id))?;

        let removed = records.remove(index);
        self.save(&records).await?;

        self.activity
            .append(
                &actor.id,
                &actor.full_name,
                LogAction::DeleteUser,
                format!("Deleted user {}", removed.user.username),
            )
            .await;

        tracing::info!("Deleted user: {}", user_id);
        Ok(())
    }
}

fn require_admin(actor: &User, what: &str) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("only administrators can {}", what)))
    }
}
