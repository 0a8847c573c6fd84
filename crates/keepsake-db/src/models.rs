//! Database row types, mapped directly from SQLite rows.
//! Distinct from keepsake-types models to keep the DB layer independent.

use keepsake_types::models::MediaKind;

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct CapsuleRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub date: String,
    pub tags: String,
    pub unlock_at: Option<String>,
    pub created_at: String,
    /// Ordered by `position`.
    pub media: Vec<MediaRow>,
}

pub struct MediaRow {
    pub capsule_id: i64,
    pub position: i64,
    pub reference: String,
    pub content_type: String,
    pub kind: String,
    pub size: i64,
    pub sha256: String,
}

/// Insert payload for a capsule and its attachments, written in one transaction.
pub struct NewCapsuleRow {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub date: String,
    pub tags: String,
    pub unlock_at: Option<String>,
    pub media: Vec<NewMediaRow>,
}

pub struct NewMediaRow {
    pub reference: String,
    pub content_type: String,
    pub kind: MediaKind,
    pub size: i64,
    pub sha256: String,
}

/// Timeline filters, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct CapsuleFilter {
    /// Substring of the stored comma-joined tag string (case-sensitive).
    pub tag: Option<String>,
    /// At least one attachment of this kind.
    pub media_kind: Option<MediaKind>,
    /// Inclusive lower bound, compared against the stored date string.
    pub after: Option<String>,
    /// Inclusive upper bound, compared against the stored date string.
    pub before: Option<String>,
}
