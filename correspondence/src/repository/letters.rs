//! Letter repository
//!
//! Persists the whole letters collection under one key. Every
//! read-modify-write holds the repository lock, so concurrent recipient
//! actions are applied one after another instead of overwriting each other.

use super::ActivityLog;
use crate::config::LETTERS_KEY;
use crate::error::{AppError, Result};
use crate::models::{Letter, LogAction, RecipientDecision, User};
use crate::storage::{load_json, save_json, SharedStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Repository for letters and their routing state
#[derive(Clone)]
pub struct LetterRepository {
    store: SharedStore,
    activity: ActivityLog,
    lock: Arc<Mutex<()>>,
}

impl LetterRepository {
    pub fn new(store: SharedStore, activity: ActivityLog) -> Self {
        Self {
            store,
            activity,
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self) -> Result<Vec<Letter>> {
        Ok(load_json(self.store.as_ref(), LETTERS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, letters: &[Letter]) -> Result<()> {
        save_json(self.store.as_ref(), LETTERS_KEY, letters).await
    }

    /// Persist a new letter as given.
    pub async fn create(&self, letter: Letter) -> Result<Letter> {
        if letter.recipients().is_empty() {
            return Err(AppError::validation("a letter needs at least one recipient"));
        }

        {
            let _guard = self.lock.lock().await;
            let mut letters = self.load().await?;

            if letters.iter().any(|l| l.id == letter.id) {
                return Err(AppError::already_exists("Letter", &letter.id));
            }

            letters.push(letter.clone());
            self.save(&letters).await?;
        }

        let names = letter
            .recipients()
            .iter()
            .map(|r| r.user_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        self.activity
            .append(
                &letter.sender_id,
                &letter.sender_name,
                LogAction::CreateLetter,
                format!("Created letter: {} for {}", letter.subject, names),
            )
            .await;

        tracing::info!(
            "Created letter {} with {} recipients",
            letter.id,
            letter.recipients().len()
        );
        Ok(letter)
    }

    pub async fn get(&self, id: &str) -> Result<Letter> {
        self.load()
            .await?
            .into_iter()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::not_found("Letter", id))
    }

    /// Letters sent by or routed to `user_id`, newest first
    pub async fn list_for_participant(&self, user_id: &str) -> Result<Vec<Letter>> {
        let mut letters: Vec<Letter> = self
            .load()
            .await?
            .into_iter()
            .filter(|l| l.is_participant(user_id))
            .collect();

        newest_first(&mut letters);
        Ok(letters)
    }

    /// Every letter, newest first
    pub async fn list_all(&self) -> Result<Vec<Letter>> {
        let mut letters = self.load().await?;
        newest_first(&mut letters);
        Ok(letters)
    }

    /// Replace a stored letter wholesale.
    ///
    /// `letter` must carry the revision it was read at; a letter changed
    /// in the meantime is refused with [`AppError::Conflict`].
    pub async fn update(&self, actor: &User, mut letter: Letter) -> Result<Letter> {
        {
            let _guard = self.lock.lock().await;
            let mut letters = self.load().await?;

            let index = letters
                .iter()
                .position(|l| l.id == letter.id)
                .ok_or_else(|| AppError::not_found("Letter", &letter.id))?;

            let found = letters[index].revision();
            if found != letter.revision() {
                tracing::warn!(
                    "Stale update of letter {}: revision {} is now {}",
                    letter.id,
                    letter.revision(),
                    found
                );
                return Err(AppError::Conflict {
                    id: letter.id.clone(),
                    expected: letter.revision(),
                    found,
                });
            }

            letter.bump_revision();
            letters[index] = letter.clone();
            self.save(&letters).await?;
        }

        self.activity
            .append(
                &actor.id,
                &actor.full_name,
                LogAction::UpdateLetter,
                format!("Admin updated letter: {}", letter.subject),
            )
            .await;

        tracing::info!("Updated letter {} (revision {})", letter.id, letter.revision());
        Ok(letter)
    }

    /// Record one recipient's decision on a letter.
    ///
    /// The signature image is kept only on approval. Fails with
    /// [`AppError::NotFound`] when either the letter or the recipient is
    /// missing; nothing is written in that case.
    pub async fn apply_recipient_action(
        &self,
        letter_id: &str,
        acting_user_id: &str,
        acting_user_name: &str,
        decision: RecipientDecision,
        comment: Option<String>,
        signature_image: Option<String>,
    ) -> Result<Letter> {
        let letter = {
            let _guard = self.lock.lock().await;
            let mut letters = self.load().await?;

            let index = letters
                .iter()
                .position(|l| l.id == letter_id)
                .ok_or_else(|| AppError::not_found("Letter", letter_id))?;

            let mut letter = letters[index].clone();
            letter.record_decision(
                acting_user_id,
                decision,
                comment,
                signature_image,
                Utc::now(),
            )?;
            letter.bump_revision();

            letters[index] = letter.clone();
            self.save(&letters).await?;
            letter
        };

        self.activity
            .append(
                acting_user_id,
                acting_user_name,
                LogAction::SignLetter,
                format!("Letter {}: {}", decision.status(), letter.subject),
            )
            .await;

        tracing::info!(
            "Recipient {} recorded {} on letter {}; letter is {}",
            acting_user_id,
            decision.status(),
            letter.id,
            letter.status()
        );
        Ok(letter)
    }
}

fn newest_first(letters: &mut [Letter]) {
    letters.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
