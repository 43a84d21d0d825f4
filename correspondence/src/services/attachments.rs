//! Attachment admission
//!
//! Attachments travel inline with a letter as opaque encoded strings. This
//! module only decides whether one may be attached.

use crate::config::{MAX_FILENAME_LENGTH, MAX_FILE_ATTACHMENT_BYTES, MAX_IMAGE_ATTACHMENT_BYTES};
use crate::error::{AppError, Result};
use crate::models::Attachment;

/// Size limit for an attachment of the given MIME type
pub fn size_limit(mime_type: &str) -> usize {
    if mime_type.starts_with("image/") {
        MAX_IMAGE_ATTACHMENT_BYTES
    } else {
        MAX_FILE_ATTACHMENT_BYTES
    }
}

/// Check an upload against the size limits and build the attachment.
///
/// `size` is the size of the original file, `data` its encoded payload.
pub fn admit_attachment(
    filename: &str,
    mime_type: &str,
    size: u64,
    data: impl Into<String>,
) -> Result<Attachment> {
    let name = sanitize_filename(filename);
    if name.trim().is_empty() {
        return Err(AppError::validation("attachment needs a file name"));
    }

    let limit = size_limit(mime_type);
    if size > limit as u64 {
        tracing::debug!(
            "Refusing attachment {} ({} bytes, limit {})",
            name,
            size,
            limit
        );
        return Err(AppError::validation(format!(
            "attachment {} is {} bytes; the limit for {} is {} bytes",
            name, size, mime_type, limit
        )));
    }

    Ok(Attachment {
        name,
        mime_type: mime_type.to_string(),
        size,
        data: data.into(),
    })
}

/// Sanitize filename to prevent path traversal
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(MAX_FILENAME_LENGTH)
        .collect()
}
