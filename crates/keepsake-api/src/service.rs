//! Capsule lifecycle: `Persisted` (row + media on disk) → `Deleted` (both gone).
//!
//! Create stages every attachment before the row is written and rolls the
//! staged files back if anything fails. Delete removes media best-effort and
//! reports success once the row is gone.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{error, info, warn};

use keepsake_db::models::{CapsuleFilter, CapsuleRow, NewCapsuleRow, NewMediaRow};
use keepsake_types::models::{Capsule, MediaKind, StoredMedia};

use crate::error::ApiError;
use crate::media::MediaStore;
use crate::state::{AppState, blocking};

/// An uploaded file, as received from the client.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct NewCapsule {
    pub title: String,
    pub text: String,
    pub date: String,
    pub tags: String,
    pub unlock_at: Option<String>,
    pub attachments: Vec<Attachment>,
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Accepts an ISO-8601 date or date-time. The string itself is stored as given.
pub fn validate_date(date: &str) -> Result<(), ApiError> {
    let valid = NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
        || NAIVE_DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(date, fmt).is_ok())
        || DateTime::parse_from_rfc3339(date).is_ok();

    if valid {
        Ok(())
    } else {
        Err(ApiError::validation("invalid date format"))
    }
}

/// Split on commas, trim, drop empties, rejoin.
pub fn normalize_tags(tags: &str) -> String {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub async fn create(state: &AppState, user_id: i64, new: NewCapsule) -> Result<Capsule, ApiError> {
    validate_date(&new.date)?;

    let tags = normalize_tags(&new.tags);
    let unlock_at = new.unlock_at.filter(|u| !u.trim().is_empty());

    let mut saved: Vec<StoredMedia> = Vec::with_capacity(new.attachments.len());
    for attachment in &new.attachments {
        match state
            .media
            .save(&attachment.filename, &attachment.bytes, &attachment.content_type)
            .await
        {
            Ok(media) => saved.push(media),
            Err(e) => {
                error!("Saving attachment '{}' failed: {:#}", attachment.filename, e);
                discard(&state.media, &saved).await;
                return Err(ApiError::Internal(e));
            }
        }
    }

    let row = NewCapsuleRow {
        user_id,
        title: new.title.clone(),
        body: new.text.clone(),
        date: new.date.clone(),
        tags: tags.clone(),
        unlock_at: unlock_at.clone(),
        media: saved
            .iter()
            .map(|m| NewMediaRow {
                reference: m.reference.clone(),
                content_type: m.content_type.clone(),
                kind: m.kind,
                size: m.size as i64,
                sha256: m.sha256.clone(),
            })
            .collect(),
    };

    let db = state.clone();
    let inserted = blocking(move || Ok(db.db.insert_capsule(&row)?)).await;
    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            discard(&state.media, &saved).await;
            return Err(e);
        }
    };

    info!(
        "Capsule {} created by user {} with {} attachment(s)",
        id,
        user_id,
        saved.len()
    );

    Ok(Capsule {
        id,
        user_id,
        title: new.title,
        text: new.text,
        date: new.date,
        tags,
        media: saved,
        unlock_at,
    })
}

pub async fn list(state: &AppState, user_id: i64, filter: CapsuleFilter) -> Result<Vec<Capsule>, ApiError> {
    let db = state.clone();
    let rows = blocking(move || Ok(db.db.list_capsules(user_id, &filter)?)).await?;
    Ok(rows.into_iter().map(into_capsule).collect())
}

pub async fn delete(state: &AppState, user_id: i64, capsule_id: i64) -> Result<(), ApiError> {
    let db = state.clone();
    let capsule = blocking(move || Ok(db.db.get_capsule(capsule_id, user_id)?))
        .await?
        .ok_or(ApiError::NotFound)?;

    for media in &capsule.media {
        if let Err(e) = state.media.delete(&media.reference).await {
            warn!(
                "Media cleanup for capsule {} failed on {}: {:#}",
                capsule_id, media.reference, e
            );
        }
    }

    let db = state.clone();
    let removed = blocking(move || Ok(db.db.delete_capsule(capsule_id, user_id)?)).await?;
    if !removed {
        // A concurrent delete won the race.
        return Err(ApiError::NotFound);
    }

    info!("Capsule {} deleted by user {}", capsule_id, user_id);
    Ok(())
}

/// Best-effort removal of files staged for a capsule that was never written.
async fn discard(store: &MediaStore, staged: &[StoredMedia]) {
    for media in staged {
        if let Err(e) = store.delete(&media.reference).await {
            warn!("Rollback could not remove {}: {:#}", media.reference, e);
        }
    }
}

fn into_capsule(row: CapsuleRow) -> Capsule {
    let media = row
        .media
        .into_iter()
        .map(|m| StoredMedia {
            kind: m.kind.parse().unwrap_or_else(|e| {
                warn!("Corrupt media kind on capsule {}: {}", m.capsule_id, e);
                MediaKind::classify(&m.reference, &m.content_type)
            }),
            reference: m.reference,
            content_type: m.content_type,
            size: m.size.max(0) as u64,
            sha256: m.sha256,
        })
        .collect();

    Capsule {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        text: row.body,
        date: row.date,
        tags: row.tags,
        media,
        unlock_at: row.unlock_at,
    }
}
