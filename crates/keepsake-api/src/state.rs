use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use keepsake_db::Database;

use crate::error::ApiError;
use crate::media::MediaStore;
use crate::speech::SpeechEngine;
use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    /// Capsule attachments, served under `/static/uploads`.
    pub media: MediaStore,
    /// Synthesized narrations, served under `/static/audio`.
    pub narrations: MediaStore,
    pub speech: SpeechEngine,
    /// Root of everything served under `/static`.
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    /// Lay out `static_dir` (`uploads/`, `audio/`) and assemble the state.
    pub async fn build(
        db: Database,
        tokens: TokenService,
        speech: SpeechEngine,
        static_dir: PathBuf,
        max_upload_bytes: usize,
    ) -> anyhow::Result<AppState> {
        let media = MediaStore::new(static_dir.join("uploads"), "/static/uploads").await?;
        let narrations = MediaStore::new(static_dir.join("audio"), "/static/audio").await?;

        Ok(Arc::new(Self {
            db,
            tokens,
            media,
            narrations,
            speech,
            static_dir,
            max_upload_bytes,
        }))
    }
}

/// Run blocking work (SQLite, password hashing) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow!("blocking task failed: {}", e))
    })?
}
