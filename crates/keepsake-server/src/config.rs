use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use jsonwebtoken::Algorithm;

use keepsake_api::speech::DEFAULT_SPEECH_BASE_URL;
use keepsake_api::tokens::DEFAULT_TOKEN_TTL_MINUTES;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

pub struct Config {
    pub secret_key: String,
    pub jwt_algorithm: Algorithm,
    pub token_ttl_minutes: i64,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub openai_api_key: Option<String>,
    pub speech_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("KEEPSAKE_SECRET_KEY").unwrap_or_default();
        if secret_key.is_empty() || PLACEHOLDER_SECRETS.contains(&secret_key.as_str()) {
            bail!("KEEPSAKE_SECRET_KEY is unset or still a placeholder; set it in .env");
        }

        let jwt_algorithm = var_or("KEEPSAKE_JWT_ALGORITHM", "HS256");
        let jwt_algorithm = Algorithm::from_str(&jwt_algorithm)
            .with_context(|| format!("unknown KEEPSAKE_JWT_ALGORITHM '{}'", jwt_algorithm))?;
        if !matches!(jwt_algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            bail!("KEEPSAKE_JWT_ALGORITHM must be HS256, HS384 or HS512");
        }

        let token_ttl_minutes: i64 = var_or("KEEPSAKE_TOKEN_TTL_MINUTES", &DEFAULT_TOKEN_TTL_MINUTES.to_string())
            .parse()
            .context("KEEPSAKE_TOKEN_TTL_MINUTES must be an integer")?;
        let port: u16 = var_or("KEEPSAKE_PORT", "8000")
            .parse()
            .context("KEEPSAKE_PORT must be a port number")?;
        let max_upload_mb: usize = var_or("KEEPSAKE_MAX_UPLOAD_MB", "100")
            .parse()
            .context("KEEPSAKE_MAX_UPLOAD_MB must be an integer")?;

        Ok(Self {
            secret_key,
            jwt_algorithm,
            token_ttl_minutes,
            db_path: var_or("KEEPSAKE_DB_PATH", "keepsake.db").into(),
            host: var_or("KEEPSAKE_HOST", "0.0.0.0"),
            port,
            static_dir: var_or("KEEPSAKE_STATIC_DIR", "static").into(),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            speech_base_url: var_or("KEEPSAKE_SPEECH_BASE_URL", DEFAULT_SPEECH_BASE_URL),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
