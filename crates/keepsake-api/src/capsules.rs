use axum::{
    Extension, Json,
    extract::multipart::MultipartRejection,
    extract::rejection::{PathRejection, QueryRejection},
    extract::{Multipart, Path, Query, State},
};
use tracing::warn;

use keepsake_db::models::CapsuleFilter;
use keepsake_types::api::{CapsuleQuery, CapsuleResponse, CreateCapsuleResponse, MessageResponse};
use keepsake_types::models::MediaKind;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::service::{self, Attachment, NewCapsule};
use crate::state::AppState;

/// POST /capsules: multipart form:
/// `title`, `text`, `date` (required), `tags`, `time_capsule`, repeated `files`.
pub async fn create_capsule(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CreateCapsuleResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut title = None;
    let mut text = None;
    let mut date = None;
    let mut tags = None;
    let mut unlock_at = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Failed to read multipart field: {}", e);
        ApiError::validation("malformed multipart body")
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "files" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(|e| {
                warn!("Failed to read file data: {}", e);
                ApiError::validation("malformed multipart body")
            })?;

            // Browsers submit an empty, nameless part when no file was picked.
            if filename.is_empty() && bytes.is_empty() {
                continue;
            }
            attachments.push(Attachment {
                filename,
                content_type,
                bytes,
            });
            continue;
        }

        let value = field.text().await.map_err(|e| {
            warn!("Failed to read form field '{}': {}", name, e);
            ApiError::validation("malformed multipart body")
        })?;

        match name.as_str() {
            "title" => title = Some(value),
            "text" => text = Some(value),
            "date" => date = Some(value),
            "tags" => tags = Some(value),
            "time_capsule" => unlock_at = Some(value),
            _ => {}
        }
    }

    let new = NewCapsule {
        title: title.ok_or_else(|| ApiError::validation("field 'title' is required"))?,
        text: text.ok_or_else(|| ApiError::validation("field 'text' is required"))?,
        date: date.ok_or_else(|| ApiError::validation("field 'date' is required"))?,
        tags: tags.unwrap_or_default(),
        unlock_at,
        attachments,
    };

    let capsule = service::create(&state, user.id, new).await?;

    Ok(Json(CreateCapsuleResponse {
        msg: "Capsule uploaded".to_string(),
        id: capsule.id,
    }))
}

/// GET /capsules: the caller's capsules, newest first.
pub async fn list_capsules(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<CapsuleQuery>, QueryRejection>,
) -> Result<Json<Vec<CapsuleResponse>>, ApiError> {
    let Query(query) = query?;
    let filter = to_filter(query)?;
    let capsules = service::list(&state, user.id, filter).await?;
    Ok(Json(capsules.into_iter().map(CapsuleResponse::from).collect()))
}

/// DELETE /capsules/{id}
pub async fn delete_capsule(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    capsule_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(capsule_id) = capsule_id?;
    service::delete(&state, user.id, capsule_id).await?;
    Ok(Json(MessageResponse {
        msg: "Capsule deleted successfully".to_string(),
    }))
}

fn to_filter(query: CapsuleQuery) -> Result<CapsuleFilter, ApiError> {
    let present = |v: Option<String>| v.filter(|s| !s.is_empty());

    let media_kind = present(query.capsule_type)
        .map(|t| t.parse::<MediaKind>())
        .transpose()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    Ok(CapsuleFilter {
        tag: present(query.tag),
        media_kind,
        after: present(query.after),
        before: present(query.before),
    })
}
