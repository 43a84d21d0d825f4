//! Letters service
//!
//! Business rules around composing, signing and administering letters.
//! Coordinates the letter and user repositories.

use super::attachments::admit_attachment;
use super::drafting::LetterDrafter;
use crate::aggregation::StatusSummary;
use crate::error::{AppError, Result};
use crate::models::{Attachment, Letter, LetterRecipient, RecipientDecision, RecipientRole, User};
use crate::repository::{LetterRepository, UserRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One selected recipient on the compose form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSelection {
    pub user_id: String,
    pub role: RecipientRole,
}

impl RecipientSelection {
    pub fn signer(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: RecipientRole::Signer,
        }
    }

    pub fn viewer(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: RecipientRole::Viewer,
        }
    }
}

/// Request to compose and route a new letter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub subject: String,
    pub content: String,
    pub recipients: Vec<RecipientSelection>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// Service for letter workflows
#[derive(Clone)]
pub struct LettersService {
    letters: LetterRepository,
    users: UserRepository,
}

impl LettersService {
    pub fn new(letters: LetterRepository, users: UserRepository) -> Self {
        Self { letters, users }
    }

    /// Compose a letter and route it to the selected recipients.
    ///
    /// Selections naming unknown users are skipped. Every recipient starts
    /// PENDING.
    pub async fn compose(&self, sender: &User, request: ComposeRequest) -> Result<Letter> {
        if request.subject.trim().is_empty() {
            return Err(AppError::validation("subject must not be empty"));
        }

        let mut seen = HashSet::new();
        for selection in &request.recipients {
            if !seen.insert(selection.user_id.as_str()) {
                return Err(AppError::validation(format!(
                    "recipient {} selected more than once",
                    selection.user_id
                )));
            }
            if selection.user_id == sender.id {
                return Err(AppError::validation("the sender cannot be a recipient"));
            }
        }

        let users = self.users.list_all().await?;
        let recipients: Vec<LetterRecipient> = request
            .recipients
            .iter()
            .filter_map(|selection| {
                let user = users.iter().find(|u| u.id == selection.user_id);
                if user.is_none() {
                    tracing::warn!("Skipping unknown recipient {}", selection.user_id);
                }
                user.map(|u| LetterRecipient::for_user(u, selection.role))
            })
            .collect();

        if recipients.is_empty() {
            return Err(AppError::validation("select at least one recipient"));
        }

        let mut letter = Letter::new(request.subject, request.content, sender, recipients)?;

        if let Some(attachment) = request.attachment {
            letter = letter.with_attachment(admit_attachment(
                &attachment.name,
                &attachment.mime_type,
                attachment.size,
                attachment.data,
            )?);
        }

        self.letters.create(letter).await
    }

    /// Letters routed to `user`
    pub async fn inbox(&self, user: &User) -> Result<Vec<Letter>> {
        let letters = self.letters.list_for_participant(&user.id).await?;
        Ok(letters
            .into_iter()
            .filter(|l| l.is_recipient(&user.id))
            .collect())
    }

    /// Letters sent by `user`
    pub async fn sent(&self, user: &User) -> Result<Vec<Letter>> {
        let letters = self.letters.list_for_participant(&user.id).await?;
        Ok(letters
            .into_iter()
            .filter(|l| l.is_sender(&user.id))
            .collect())
    }

    /// Whether `user` is a signer on `letter` who still has to decide
    pub fn can_sign(letter: &Letter, user: &User) -> bool {
        letter.awaits_signature_from(&user.id)
    }

    /// Approve or reject a letter as one of its signers.
    ///
    /// A rejection needs a comment. An approval carries the user's current
    /// signature image.
    pub async fn sign(
        &self,
        user: &User,
        letter_id: &str,
        decision: RecipientDecision,
        comment: Option<String>,
    ) -> Result<Letter> {
        let letter = self.letters.get(letter_id).await?;

        if !Self::can_sign(&letter, user) {
            return Err(AppError::Forbidden(format!(
                "user {} cannot sign letter {}",
                user.id, letter_id
            )));
        }

        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if decision == RecipientDecision::Reject && comment.is_none() {
            return Err(AppError::validation("a rejection needs a comment"));
        }

        let signature_image = match decision {
            RecipientDecision::Approve => self.users.get(&user.id).await?.signature_image,
            RecipientDecision::Reject => None,
        };

        self.letters
            .apply_recipient_action(
                letter_id,
                &user.id,
                &user.full_name,
                decision,
                comment,
                signature_image,
            )
            .await
    }

    /// Route an existing letter to one more user. Administrators only.
    pub async fn admin_add_recipient(
        &self,
        admin: &User,
        letter_id: &str,
        user_id: &str,
        role: RecipientRole,
    ) -> Result<Letter> {
        require_admin(admin)?;

        let mut letter = self.letters.get(letter_id).await?;
        if letter.is_sender(user_id) {
            return Err(AppError::validation("the sender cannot be a recipient"));
        }

        let user = self.users.get(user_id).await?;
        letter.add_recipient(LetterRecipient::for_user(&user, role))?;

        self.letters.update(admin, letter).await
    }

    /// Take a recipient off a letter. Administrators only.
    pub async fn admin_remove_recipient(
        &self,
        admin: &User,
        letter_id: &str,
        user_id: &str,
    ) -> Result<Letter> {
        require_admin(admin)?;

        let mut letter = self.letters.get(letter_id).await?;
        letter.remove_recipient(user_id)?;

        self.letters.update(admin, letter).await
    }

    /// Save an administrator's edit of a letter read earlier.
    ///
    /// Only the subject, content and attachment change. The recipients in
    /// `edit` must match the stored ones exactly; routing changes go
    /// through [`Self::admin_add_recipient`] and
    /// [`Self::admin_remove_recipient`], and recorded decisions are never
    /// rewritten.
    pub async fn admin_edit(&self, admin: &User, edit: Letter) -> Result<Letter> {
        require_admin(admin)?;

        if edit.subject.trim().is_empty() {
            return Err(AppError::validation("subject must not be empty"));
        }

        let mut letter = self.letters.get(&edit.id).await?;
        if letter.revision() != edit.revision() {
            return Err(AppError::Conflict {
                id: edit.id.clone(),
                expected: edit.revision(),
                found: letter.revision(),
            });
        }

        if edit.recipients() != letter.recipients() {
            return Err(AppError::Forbidden(
                "recipients and their decisions cannot be edited directly".to_string(),
            ));
        }
        if edit.sender_id != letter.sender_id || edit.created_at != letter.created_at {
            return Err(AppError::Forbidden(
                "the sender and creation time of a letter are fixed".to_string(),
            ));
        }

        if edit.attachment != letter.attachment {
            letter.attachment = match edit.attachment {
                Some(a) => Some(admit_attachment(&a.name, &a.mime_type, a.size, a.data)?),
                None => None,
            };
        }
        letter.subject = edit.subject;
        letter.content = edit.content;

        self.letters.update(admin, letter).await
    }

    /// Status counts over the letters `user` takes part in
    pub async fn dashboard(&self, user: &User) -> Result<StatusSummary> {
        let letters = self.letters.list_for_participant(&user.id).await?;
        Ok(StatusSummary::from_letters(&letters))
    }

    /// Ask `drafter` for a suggested body. Never fails: any drafting error
    /// is logged and yields `None`.
    pub async fn draft_content(
        drafter: &dyn LetterDrafter,
        sender: &User,
        topic: &str,
        recipient_names: &[String],
    ) -> Option<String> {
        if topic.trim().is_empty() {
            return None;
        }

        let recipients = recipient_names.join(", ");
        match drafter.draft(topic, &sender.full_name, &recipients).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Drafting failed: {}", e);
                None
            }
        }
    }
}

fn require_admin(user: &User) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "only administrators can edit letters".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SEED_PASSWORD;
    use crate::models::LetterStatus;
    use crate::repository::ActivityLog;
    use crate::storage::{MemoryStore, SharedStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Fixture {
        service: LettersService,
        users: UserRepository,
        admin: User,
        manager: User,
        employee: User,
    }

    async fn fixture() -> Fixture {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let activity = ActivityLog::new(store.clone());
        let users = UserRepository::new(store.clone(), activity.clone());
        users.seed_if_absent().await.unwrap();
        let letters = LetterRepository::new(store, activity);

        Fixture {
            service: LettersService::new(letters, users.clone()),
            admin: users.login("admin", SEED_PASSWORD).await.unwrap(),
            manager: users.login("manager", SEED_PASSWORD).await.unwrap(),
            employee: users.login("employee", SEED_PASSWORD).await.unwrap(),
            users,
        }
    }

    fn request(recipients: Vec<RecipientSelection>) -> ComposeRequest {
        ComposeRequest {
            subject: "Budget".to_string(),
            content: "Please review".to_string(),
            recipients,
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_compose_routes_to_selected_users() {
        let f = fixture().await;

        let letter = f
            .service
            .compose(
                &f.admin,
                request(vec![
                    RecipientSelection::signer(&f.manager.id),
                    RecipientSelection::viewer(&f.employee.id),
                    RecipientSelection::signer("ghost"),
                ]),
            )
            .await
            .unwrap();

        assert_eq!(letter.recipients().len(), 2);
        assert_eq!(letter.recipient(&f.manager.id).unwrap().user_name, "Reza Alavi");
        assert_eq!(letter.status(), LetterStatus::Pending);

        assert_eq!(f.service.inbox(&f.manager).await.unwrap().len(), 1);
        assert_eq!(f.service.sent(&f.admin).await.unwrap().len(), 1);
        assert!(f.service.inbox(&f.admin).await.unwrap().is_empty());
        assert!(f.service.sent(&f.manager).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compose_validation() {
        let f = fixture().await;

        let mut blank = request(vec![RecipientSelection::signer(&f.manager.id)]);
        blank.subject = "  ".to_string();
        assert!(matches!(
            f.service.compose(&f.admin, blank).await,
            Err(AppError::Validation(_))
        ));

        let only_unknown = request(vec![RecipientSelection::signer("ghost")]);
        assert!(matches!(
            f.service.compose(&f.admin, only_unknown).await,
            Err(AppError::Validation(_))
        ));

        let duplicate = request(vec![
            RecipientSelection::signer(&f.manager.id),
            RecipientSelection::viewer(&f.manager.id),
        ]);
        assert!(matches!(
            f.service.compose(&f.admin, duplicate).await,
            Err(AppError::Validation(_))
        ));

        let to_self = request(vec![RecipientSelection::signer(&f.admin.id)]);
        assert!(matches!(
            f.service.compose(&f.admin, to_self).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_compose_with_oversized_attachment() {
        let f = fixture().await;

        let mut req = request(vec![RecipientSelection::signer(&f.manager.id)]);
        req.attachment = Some(Attachment {
            name: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: 2 * 1024 * 1024,
            data: "data:application/pdf;base64,AAAA".to_string(),
        });

        assert!(matches!(
            f.service.compose(&f.admin, req).await,
            Err(AppError::Validation(_))
        ));
        assert!(f.service.sent(&f.admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sign_uses_stored_signature() {
        let f = fixture().await;

        let manager = f
            .manager
            .clone()
            .with_signature_image("data:image/png;base64,SIG");
        f.users.update(&f.manager, manager).await.unwrap();

        let letter = f
            .service
            .compose(&f.admin, request(vec![RecipientSelection::signer(&f.manager.id)]))
            .await
            .unwrap();

        // The session copy has no signature; the stored profile does
        let signed = f
            .service
            .sign(&f.manager, &letter.id, RecipientDecision::Approve, None)
            .await
            .unwrap();

        assert_eq!(signed.status(), LetterStatus::Approved);
        assert_eq!(
            signed.recipient(&f.manager.id).unwrap().signature_image(),
            Some("data:image/png;base64,SIG")
        );
        assert!(!LettersService::can_sign(&signed, &f.manager));
    }

    #[tokio::test]
    async fn test_sign_rules() {
        let f = fixture().await;
        let letter = f
            .service
            .compose(
                &f.admin,
                request(vec![
                    RecipientSelection::signer(&f.manager.id),
                    RecipientSelection::viewer(&f.employee.id),
                ]),
            )
            .await
            .unwrap();

        assert!(LettersService::can_sign(&letter, &f.manager));
        assert!(!LettersService::can_sign(&letter, &f.employee));
        assert!(!LettersService::can_sign(&letter, &f.admin));

        // Viewers and outsiders cannot act
        assert!(matches!(
            f.service
                .sign(&f.employee, &letter.id, RecipientDecision::Approve, None)
                .await,
            Err(AppError::Forbidden(_))
        ));

        // Rejection needs a real comment
        assert!(matches!(
            f.service
                .sign(
                    &f.manager,
                    &letter.id,
                    RecipientDecision::Reject,
                    Some("   ".to_string())
                )
                .await,
            Err(AppError::Validation(_))
        ));

        let rejected = f
            .service
            .sign(
                &f.manager,
                &letter.id,
                RecipientDecision::Reject,
                Some("Over budget".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(rejected.status(), LetterStatus::Rejected);

        // Already decided
        assert!(matches!(
            f.service
                .sign(&f.manager, &letter.id, RecipientDecision::Approve, None)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_recipient_management() {
        let f = fixture().await;
        let letter = f
            .service
            .compose(&f.admin, request(vec![RecipientSelection::viewer(&f.employee.id)]))
            .await
            .unwrap();
        assert_eq!(letter.status(), LetterStatus::Approved);

        let updated = f
            .service
            .admin_add_recipient(&f.admin, &letter.id, &f.manager.id, RecipientRole::Signer)
            .await
            .unwrap();
        assert_eq!(updated.status(), LetterStatus::Pending);
        assert_eq!(updated.recipients().len(), 2);

        assert!(matches!(
            f.service
                .admin_add_recipient(&f.admin, &letter.id, &f.admin.id, RecipientRole::Viewer)
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.service
                .admin_add_recipient(&f.admin, &letter.id, &f.manager.id, RecipientRole::Viewer)
                .await,
            Err(AppError::Validation(_))
        ));

        let updated = f
            .service
            .admin_remove_recipient(&f.admin, &letter.id, &f.manager.id)
            .await
            .unwrap();
        assert_eq!(updated.status(), LetterStatus::Approved);
    }

    #[tokio::test]
    async fn test_admin_operations_require_admin() {
        let f = fixture().await;
        let letter = f
            .service
            .compose(&f.admin, request(vec![RecipientSelection::signer(&f.manager.id)]))
            .await
            .unwrap();

        assert!(matches!(
            f.service
                .admin_add_recipient(&f.manager, &letter.id, &f.employee.id, RecipientRole::Viewer)
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.service
                .admin_remove_recipient(&f.employee, &letter.id, &f.manager.id)
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.admin_edit(&f.manager, letter).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_edit_conflict() {
        let f = fixture().await;
        let letter = f
            .service
            .compose(&f.admin, request(vec![RecipientSelection::signer(&f.manager.id)]))
            .await
            .unwrap();

        // Admin opens the letter, the manager signs meanwhile
        let mut edit = letter.clone();
        edit.content = "Revised".to_string();
        f.service
            .sign(&f.manager, &letter.id, RecipientDecision::Approve, None)
            .await
            .unwrap();

        assert!(matches!(
            f.service.admin_edit(&f.admin, edit).await,
            Err(AppError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_admin_edit_cannot_forge_decisions() {
        let f = fixture().await;
        let letter = f
            .service
            .compose(&f.admin, request(vec![RecipientSelection::signer(&f.manager.id)]))
            .await
            .unwrap();

        let mut payload = serde_json::to_value(&letter).unwrap();
        payload["recipients"][0]["status"] = "APPROVED".into();
        payload["status"] = "REJECTED".into();
        let forged: Letter = serde_json::from_value(payload).unwrap();
        assert_eq!(forged.status(), LetterStatus::Approved);

        assert!(matches!(
            f.service.admin_edit(&f.admin, forged).await,
            Err(AppError::Forbidden(_))
        ));

        let stored = f.service.letters.get(&letter.id).await.unwrap();
        assert_eq!(stored, letter);
        assert_eq!(stored.status(), LetterStatus::Pending);
        assert!(LettersService::can_sign(&stored, &f.manager));
    }

    #[tokio::test]
    async fn test_admin_edit_changes_text_only() {
        let f = fixture().await;
        let letter = f
            .service
            .compose(
                &f.admin,
                request(vec![
                    RecipientSelection::signer(&f.manager.id),
                    RecipientSelection::signer(&f.employee.id),
                ]),
            )
            .await
            .unwrap();
        let signed = f
            .service
            .sign(&f.manager, &letter.id, RecipientDecision::Approve, None)
            .await
            .unwrap();

        let mut edit = signed.clone();
        edit.subject = "Budget (revised)".to_string();
        edit.content = "Updated figures".to_string();
        let edited = f.service.admin_edit(&f.admin, edit).await.unwrap();

        assert_eq!(edited.subject, "Budget (revised)");
        assert_eq!(edited.content, "Updated figures");
        assert_eq!(edited.recipients(), signed.recipients());
        assert_eq!(edited.status(), LetterStatus::Pending);
        assert_eq!(edited.revision(), signed.revision() + 1);

        let mut moved = edited.clone();
        moved.sender_id = f.manager.id.clone();
        assert!(matches!(
            f.service.admin_edit(&f.admin, moved).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_dashboard() {
        let f = fixture().await;
        let first = f
            .service
            .compose(&f.admin, request(vec![RecipientSelection::signer(&f.manager.id)]))
            .await
            .unwrap();
        f.service
            .compose(&f.admin, request(vec![RecipientSelection::signer(&f.manager.id)]))
            .await
            .unwrap();
        f.service
            .sign(&f.manager, &first.id, RecipientDecision::Approve, None)
            .await
            .unwrap();

        let summary = f.service.dashboard(&f.manager).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.rejected, 0);

        let outsider = f.service.dashboard(&f.employee).await.unwrap();
        assert_eq!(outsider, StatusSummary::default());
    }

    struct FixedDrafter(&'static str);

    #[async_trait]
    impl LetterDrafter for FixedDrafter {
        async fn draft(&self, topic: &str, sender: &str, recipients: &str) -> Result<String> {
            Ok(format!("{}: {} -> {} ({})", self.0, sender, recipients, topic))
        }
    }

    struct FailingDrafter;

    #[async_trait]
    impl LetterDrafter for FailingDrafter {
        async fn draft(&self, _: &str, _: &str, _: &str) -> Result<String> {
            Err(AppError::Generic("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_draft_content() {
        let f = fixture().await;
        let names = vec!["Reza Alavi".to_string(), "Sara Mohammadi".to_string()];

        let draft =
            LettersService::draft_content(&FixedDrafter("Draft"), &f.admin, "Budget", &names)
                .await;
        assert_eq!(
            draft.as_deref(),
            Some("Draft: System Administrator -> Reza Alavi, Sara Mohammadi (Budget)")
        );

        assert_eq!(
            LettersService::draft_content(&FailingDrafter, &f.admin, "Budget", &names).await,
            None
        );
        assert_eq!(
            LettersService::draft_content(&FixedDrafter("Draft"), &f.admin, " ", &names).await,
            None
        );
    }
}
