use axum::{
    Extension, Json,
    extract::multipart::MultipartRejection,
    extract::rejection::JsonRejection,
    extract::{Multipart, State},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use keepsake_types::api::{AudioUrlResponse, TextToAudioRequest, TranscriptResponse};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

pub const DEFAULT_SPEECH_BASE_URL: &str = "https://api.openai.com";

/// External speech-to-text / text-to-speech engine.
pub enum SpeechEngine {
    Disabled,
    OpenAi(OpenAiSpeech),
}

/// Client for OpenAI-compatible `/v1/audio/*` endpoints.
pub struct OpenAiSpeech {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub voice: String,
}

#[derive(Deserialize)]
struct TranscriptionBody {
    text: String,
}

impl OpenAiSpeech {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            transcription_model: "whisper-1".to_string(),
            speech_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
        }
    }

    pub async fn transcribe(&self, filename: &str, audio: Bytes) -> anyhow::Result<String> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", part);

        let body: TranscriptionBody = self
            .http
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body.text)
    }

    /// Returns MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> anyhow::Result<Bytes> {
        let audio = self
            .http
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.speech_model,
                "voice": self.voice,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(audio)
    }
}

impl SpeechEngine {
    /// OpenAI engine when an API key is configured, otherwise disabled.
    pub fn from_api_key(base_url: &str, api_key: Option<String>) -> Self {
        match api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => SpeechEngine::OpenAi(OpenAiSpeech::new(base_url, &key)),
            None => SpeechEngine::Disabled,
        }
    }

    pub async fn transcribe(&self, filename: &str, audio: Bytes) -> Result<String, ApiError> {
        let SpeechEngine::OpenAi(engine) = self else {
            return Err(ApiError::SpeechUnavailable);
        };
        engine.transcribe(filename, audio).await.map_err(|e| {
            warn!("Transcription failed: {:#}", e);
            ApiError::Upstream("transcription failed".to_string())
        })
    }

    pub async fn synthesize(&self, text: &str) -> Result<Bytes, ApiError> {
        let SpeechEngine::OpenAi(engine) = self else {
            return Err(ApiError::SpeechUnavailable);
        };
        engine.synthesize(text).await.map_err(|e| {
            warn!("Speech synthesis failed: {:#}", e);
            ApiError::Upstream("speech synthesis failed".to_string())
        })
    }
}

/// POST /audio-to-text: multipart field `file`.
pub async fn audio_to_text(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut audio = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("malformed multipart body"))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("audio.mp3").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::validation("malformed multipart body"))?;
            audio = Some((filename, bytes));
        }
    }

    let (filename, bytes) = audio
        .filter(|(_, b)| !b.is_empty())
        .ok_or_else(|| ApiError::validation("field 'file' is required"))?;

    let text = state.speech.transcribe(&filename, bytes).await?;
    info!("Transcribed {} for user {}", filename, user.id);

    Ok(Json(TranscriptResponse { text }))
}

/// POST /text-to-audio: `{text}`; the narration is stored and its URL returned.
pub async fn text_to_audio(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<TextToAudioRequest>, JsonRejection>,
) -> Result<Json<AudioUrlResponse>, ApiError> {
    let Json(req) = payload?;
    if req.text.trim().is_empty() {
        return Err(ApiError::validation("field 'text' must not be empty"));
    }

    let audio = state.speech.synthesize(&req.text).await?;
    let stored = state
        .narrations
        .save(&format!("{}_narration.mp3", user.id), &audio, "audio/mpeg")
        .await?;
    info!("Narration {} created for user {}", stored.reference, user.id);

    Ok(Json(AudioUrlResponse {
        audio_url: stored.reference,
    }))
}
