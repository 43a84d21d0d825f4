//! Overall letter status
//!
//! The overall status is a pure projection of the recipient list. It keeps
//! no memory between evaluations, so replaying or reordering the same
//! recipients always yields the same answer.

use crate::models::{Letter, LetterRecipient, LetterStatus};
use serde::Serialize;

/// Derive a letter's overall status from its recipients.
///
/// Viewers never count. With no signers the letter is APPROVED. A single
/// rejecting signer makes it REJECTED; otherwise it is APPROVED once every
/// signer approved and PENDING until then.
pub fn aggregate_status(recipients: &[LetterRecipient]) -> LetterStatus {
    let mut signers = recipients.iter().filter(|r| r.is_signer()).peekable();

    if signers.peek().is_none() {
        return LetterStatus::Approved;
    }

    let mut all_approved = true;
    for signer in signers {
        match signer.status() {
            LetterStatus::Rejected => return LetterStatus::Rejected,
            LetterStatus::Pending => all_approved = false,
            LetterStatus::Approved => {}
        }
    }

    if all_approved {
        LetterStatus::Approved
    } else {
        LetterStatus::Pending
    }
}

/// Letter counts per overall status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusSummary {
    pub fn from_letters<'a>(letters: impl IntoIterator<Item = &'a Letter>) -> Self {
        letters
            .into_iter()
            .fold(Self::default(), |mut summary, letter| {
                summary.total += 1;
                match letter.status() {
                    LetterStatus::Pending => summary.pending += 1,
                    LetterStatus::Approved => summary.approved += 1,
                    LetterStatus::Rejected => summary.rejected += 1,
                }
                summary
            })
    }
}
