use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use keepsake_types::api::{
    AudioUrlResponse, CapsuleQuery, CapsuleResponse, CreateCapsuleResponse, ErrorResponse,
    LoginForm, MessageResponse, SignupRequest, TextToAudioRequest, TokenResponse,
    TranscriptResponse,
};

use crate::error::ClientError;

/// Unauthenticated entry point.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

/// An authenticated session. Holds the bearer token for its lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    token: String,
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct NewCapsuleForm {
    pub title: String,
    pub text: String,
    /// ISO-8601 date, e.g. `2024-06-01`.
    pub date: String,
    /// Comma-separated.
    pub tags: String,
    pub time_capsule: Option<String>,
    pub files: Vec<UploadFile>,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a media reference; absolute references pass through.
    pub fn media_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}{}", self.base_url, reference)
        }
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.url("/signup"))
            .json(&SignupRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let body: MessageResponse = decode(resp).await?;
        Ok(body.msg)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let resp = self
            .http
            .post(self.url("/login"))
            .form(&LoginForm {
                username: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let body: TokenResponse = decode(resp).await?;
        info!("Logged in to {}", self.base_url);

        Ok(Session {
            client: self.clone(),
            token: body.access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Session {
    /// Resume a session from a previously issued token.
    pub fn from_token(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the new capsule id.
    pub async fn upload_capsule(&self, capsule: NewCapsuleForm) -> Result<i64, ClientError> {
        let mut form = Form::new()
            .text("title", capsule.title)
            .text("text", capsule.text)
            .text("date", capsule.date)
            .text("tags", capsule.tags);
        if let Some(unlock) = capsule.time_capsule.filter(|t| !t.is_empty()) {
            form = form.text("time_capsule", unlock);
        }
        for file in capsule.files {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.filename)
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }

        let resp = self
            .client
            .http
            .post(self.client.url("/capsules"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        let body: CreateCapsuleResponse = decode(resp).await?;
        debug!("Uploaded capsule {}", body.id);
        Ok(body.id)
    }

    /// Newest first.
    pub async fn capsules(&self, query: &CapsuleQuery) -> Result<Vec<CapsuleResponse>, ClientError> {
        let resp = self
            .client
            .http
            .get(self.client.url("/capsules"))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn delete_capsule(&self, id: i64) -> Result<(), ClientError> {
        let resp = self
            .client
            .http
            .delete(self.client.url(&format!("/capsules/{}", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let _: MessageResponse = decode(resp).await?;
        Ok(())
    }

    pub async fn audio_to_text(&self, filename: &str, audio: Bytes) -> Result<String, ClientError> {
        let part = Part::bytes(audio.to_vec()).file_name(filename.to_string());
        let resp = self
            .client
            .http
            .post(self.client.url("/audio-to-text"))
            .bearer_auth(&self.token)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        let body: TranscriptResponse = decode(resp).await?;
        Ok(body.text)
    }

    /// Returns the absolute URL of the synthesized narration.
    pub async fn text_to_audio(&self, text: &str) -> Result<String, ClientError> {
        let resp = self
            .client
            .http
            .post(self.client.url("/text-to-audio"))
            .bearer_auth(&self.token)
            .json(&TextToAudioRequest {
                text: text.to_string(),
            })
            .send()
            .await?;
        let body: AudioUrlResponse = decode(resp).await?;
        Ok(self.client.media_url(&body.audio_url))
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.detail)
        .unwrap_or(text);
    Err(ClientError::Status {
        status: status.as_u16(),
        detail,
    })
}
