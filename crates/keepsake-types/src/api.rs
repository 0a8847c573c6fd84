use serde::{Deserialize, Serialize};

use crate::models::Capsule;

// -- JWT Claims --

/// Bearer token claims. `sub` carries the numeric user id as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Login is an OAuth2-style password form: the email travels as `username`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

// -- Capsules --

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCapsuleResponse {
    pub msg: String,
    pub id: i64,
}

/// Timeline filters. Empty strings behave as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapsuleQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capsule_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

/// Capsule as returned by `GET /capsules`. `media` is a JSON-encoded array
/// of media references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsuleResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub text: String,
    pub date: String,
    pub tags: String,
    pub media: String,
    pub time_capsule: Option<String>,
}

impl From<Capsule> for CapsuleResponse {
    fn from(capsule: Capsule) -> Self {
        let media = serde_json::to_string(&capsule.media_references())
            .unwrap_or_else(|_| "[]".to_string());

        Self {
            id: capsule.id,
            user_id: capsule.user_id,
            title: capsule.title,
            text: capsule.text,
            date: capsule.date,
            tags: capsule.tags,
            media,
            time_capsule: capsule.unlock_at,
        }
    }
}

// -- Speech --

#[derive(Debug, Serialize, Deserialize)]
pub struct TextToAudioRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AudioUrlResponse {
    pub audio_url: String,
}
