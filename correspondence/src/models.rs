//! Entity model
//!
//! Records persisted in the store. All models use serde so they can be
//! written to the key-value store and handed to a frontend unchanged.
//!
//! A letter's overall status is a cached projection of its recipients.
//! Neither the recipient list nor the status is publicly writable: every
//! mutator on [`Letter`] re-derives the status through
//! [`crate::aggregation::aggregate_status`], and so does decoding: a status
//! read from storage or from a caller is never trusted.

use crate::aggregation::aggregate_status;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ===== Users =====

/// Authorization tier of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Employee => "EMPLOYEE",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account. Credentials never appear on this type; the user
/// repository keeps the password hash alongside it in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Unique login name
    pub username: String,
    pub full_name: String,
    pub role: Role,
    /// Free-text job title
    pub position: String,
    /// Encoded image used as the approval mark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        full_name: impl Into<String>,
        role: Role,
        position: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            username: username.into(),
            full_name: full_name.into(),
            role,
            position: position.into(),
            signature_image: None,
            avatar_url: None,
        }
    }

    pub fn with_signature_image(mut self, image: impl Into<String>) -> Self {
        self.signature_image = Some(image.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ===== Letters =====

/// Part a recipient plays in a letter's approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientRole {
    /// Must approve or reject before the letter can finalize
    Signer,
    /// Receives a copy for information; never blocks aggregation
    Viewer,
}

impl FromStr for RecipientRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SIGNER" => Ok(RecipientRole::Signer),
            "VIEWER" => Ok(RecipientRole::Viewer),
            other => Err(AppError::validation(format!(
                "unknown recipient role: {}",
                other
            ))),
        }
    }
}

/// Status of a single recipient, and the overall status of a letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LetterStatus {
    Pending,
    Approved,
    Rejected,
}

impl LetterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterStatus::Pending => "PENDING",
            LetterStatus::Approved => "APPROVED",
            LetterStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for LetterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a recipient decided when acting on a letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientDecision {
    Approve,
    Reject,
}

impl RecipientDecision {
    /// Recipient status recorded for this decision
    pub fn status(&self) -> LetterStatus {
        match self {
            RecipientDecision::Approve => LetterStatus::Approved,
            RecipientDecision::Reject => LetterStatus::Rejected,
        }
    }
}

/// One participant of a letter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterRecipient {
    pub user_id: String,
    /// Snapshot of the user's full name when routed
    pub user_name: String,
    pub role: RecipientRole,
    status: LetterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature_image: Option<String>,
}

impl LetterRecipient {
    /// A fresh participant, always PENDING
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        role: RecipientRole,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            role,
            status: LetterStatus::Pending,
            action_date: None,
            comment: None,
            signature_image: None,
        }
    }

    pub fn for_user(user: &User, role: RecipientRole) -> Self {
        Self::new(user.id.clone(), user.full_name.clone(), role)
    }

    pub fn status(&self) -> LetterStatus {
        self.status
    }

    pub fn action_date(&self) -> Option<DateTime<Utc>> {
        self.action_date
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn signature_image(&self) -> Option<&str> {
        self.signature_image.as_deref()
    }

    pub fn is_signer(&self) -> bool {
        self.role == RecipientRole::Signer
    }

    fn record(
        &mut self,
        decision: RecipientDecision,
        comment: Option<String>,
        signature_image: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.status = decision.status();
        self.action_date = Some(at);
        self.comment = comment;
        // A signature is only ever kept on an approval
        self.signature_image = match decision {
            RecipientDecision::Approve => signature_image,
            RecipientDecision::Reject => None,
        };
    }
}

/// Opaque attachment carried inline with a letter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    /// Size of the original file in bytes
    pub size: u64,
    /// Encoded payload, never interpreted here
    pub data: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// A routed letter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LetterRecord")]
pub struct Letter {
    pub id: String,
    pub subject: String,
    pub content: String,
    pub sender_id: String,
    /// Snapshot of the sender's full name at creation
    pub sender_name: String,
    recipients: Vec<LetterRecipient>,
    status: LetterStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    revision: u64,
}

impl Letter {
    /// Build a new letter from `sender` to `recipients`.
    ///
    /// Fails when the recipient list is empty or names the same user twice.
    /// The initial status is the aggregation of the (all PENDING) list: PENDING
    /// when any signer is present, APPROVED for a viewers-only letter.
    pub fn new(
        subject: impl Into<String>,
        content: impl Into<String>,
        sender: &User,
        recipients: Vec<LetterRecipient>,
    ) -> Result<Self> {
        check_recipients(&recipients)?;
        let status = aggregate_status(&recipients);

        Ok(Self {
            id: new_id(),
            subject: subject.into(),
            content: content.into(),
            sender_id: sender.id.clone(),
            sender_name: sender.full_name.clone(),
            recipients,
            status,
            created_at: Utc::now(),
            attachment: None,
            revision: 0,
        })
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Overall status, always the aggregation of [`Letter::recipients`]
    pub fn status(&self) -> LetterStatus {
        self.status
    }

    pub fn recipients(&self) -> &[LetterRecipient] {
        &self.recipients
    }

    pub fn recipient(&self, user_id: &str) -> Option<&LetterRecipient> {
        self.recipients.iter().find(|r| r.user_id == user_id)
    }

    /// Number of persisted mutations; used to detect stale edits
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_sender(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }

    pub fn is_recipient(&self, user_id: &str) -> bool {
        self.recipient(user_id).is_some()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.is_sender(user_id) || self.is_recipient(user_id)
    }

    /// Whether `user_id` is a signer who has not acted yet
    pub fn awaits_signature_from(&self, user_id: &str) -> bool {
        self.recipient(user_id)
            .map(|r| r.is_signer() && r.status == LetterStatus::Pending)
            .unwrap_or(false)
    }

    /// Route the letter to one more participant.
    ///
    /// The recipient joins as PENDING regardless of how it was built.
    pub fn add_recipient(&mut self, recipient: LetterRecipient) -> Result<()> {
        if self.is_recipient(&recipient.user_id) {
            return Err(AppError::validation(format!(
                "recipient {} listed more than once",
                recipient.user_id
            )));
        }

        self.recipients.push(LetterRecipient::new(
            recipient.user_id,
            recipient.user_name,
            recipient.role,
        ));
        self.refresh_status();
        Ok(())
    }

    /// Take a participant off the letter. The last recipient cannot be removed.
    pub fn remove_recipient(&mut self, user_id: &str) -> Result<LetterRecipient> {
        let index = self
            .recipients
            .iter()
            .position(|r| r.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Recipient", user_id))?;

        if self.recipients.len() == 1 {
            return Err(AppError::validation(
                "cannot remove the only recipient of a letter",
            ));
        }

        let removed = self.recipients.remove(index);
        self.refresh_status();
        Ok(removed)
    }

    /// Record a recipient's decision and re-derive the overall status.
    pub fn record_decision(
        &mut self,
        user_id: &str,
        decision: RecipientDecision,
        comment: Option<String>,
        signature_image: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let recipient = self
            .recipients
            .iter_mut()
            .find(|r| r.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Recipient", user_id))?;

        recipient.record(decision, comment, signature_image, at);
        self.refresh_status();
        Ok(())
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    fn refresh_status(&mut self) {
        self.status = aggregate_status(&self.recipients);
    }
}

fn check_recipients(recipients: &[LetterRecipient]) -> Result<()> {
    if recipients.is_empty() {
        return Err(AppError::validation("a letter needs at least one recipient"));
    }

    for (i, recipient) in recipients.iter().enumerate() {
        if recipients[..i].iter().any(|r| r.user_id == recipient.user_id) {
            return Err(AppError::validation(format!(
                "recipient {} listed more than once",
                recipient.user_id
            )));
        }
    }

    Ok(())
}

/// Wire form of [`Letter`]. The stored status is ignored and re-derived.
#[derive(Deserialize)]
struct LetterRecord {
    id: String,
    subject: String,
    content: String,
    sender_id: String,
    sender_name: String,
    recipients: Vec<LetterRecipient>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    attachment: Option<Attachment>,
    #[serde(default)]
    revision: u64,
}

impl TryFrom<LetterRecord> for Letter {
    type Error = AppError;

    fn try_from(record: LetterRecord) -> Result<Self> {
        let mut recipients = record.recipients;
        check_recipients(&recipients)?;

        for recipient in &mut recipients {
            if recipient.status != LetterStatus::Approved {
                recipient.signature_image = None;
            }
        }

        let status = aggregate_status(&recipients);

        Ok(Self {
            id: record.id,
            subject: record.subject,
            content: record.content,
            sender_id: record.sender_id,
            sender_name: record.sender_name,
            recipients,
            status,
            created_at: record.created_at,
            attachment: record.attachment,
            revision: record.revision,
        })
    }
}

// ===== Activity Log =====

/// Tag naming the operation an activity entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Login,
    CreateLetter,
    UpdateLetter,
    SignLetter,
    UpdateProfile,
    CreateUser,
    DeleteUser,
    ChangePassword,
    UpdateSettings,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Login => "LOGIN",
            LogAction::CreateLetter => "CREATE_LETTER",
            LogAction::UpdateLetter => "UPDATE_LETTER",
            LogAction::SignLetter => "SIGN_LETTER",
            LogAction::UpdateProfile => "UPDATE_PROFILE",
            LogAction::CreateUser => "CREATE_USER",
            LogAction::DeleteUser => "DELETE_USER",
            LogAction::ChangePassword => "CHANGE_PASSWORD",
            LogAction::UpdateSettings => "UPDATE_SETTINGS",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the activity history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub action: LogAction,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl Log {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        action: LogAction,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            action,
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}
