//! Application configuration loaded from environment variables.
//!
//! Supabase keys and the preview secret are injected as environment variables
//! by the deployment; for local development they come from a `.env` file.

use std::env;

/// Which record store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Google Firestore (production, or the emulator when
    /// `FIRESTORE_EMULATOR_HOST` is set).
    Firestore,
    /// In-process store, for local development without Firestore.
    Memory,
}

/// Object storage bucket holding uploaded media.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StorageConfig {
    /// Public URL of an object stored under `storage_path`.
    pub fn public_url(&self, storage_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            storage_path.trim_start_matches('/')
        )
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Supabase project URL (e.g. https://xyz.supabase.co)
    pub supabase_url: String,
    /// Supabase anon key (public, used for user-facing auth calls)
    pub supabase_anon_key: String,
    /// Frontend URL for redirects and CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Record store backend
    pub store_backend: StoreBackend,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Supabase service role key (admin API)
    pub supabase_service_role_key: String,
    /// Secret used by Supabase to sign access tokens (HS256)
    pub supabase_jwt_secret: Vec<u8>,
    /// Secret that unlocks draft-mode previews
    pub preview_secret: String,
    /// Media bucket credentials (optional outside production)
    pub storage: Option<StorageConfig>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            store_backend: StoreBackend::Memory,
            port: 8080,
            supabase_service_role_key: "test_service_role_key".to_string(),
            supabase_jwt_secret: b"test_jwt_secret_32_bytes_minimum!".to_vec(),
            preview_secret: "test_preview_secret".to_string(),
            storage: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store_backend,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("SUPABASE_JWT_SECRET"))?
                .trim()
                .as_bytes()
                .to_vec(),
            preview_secret: env::var("PREVIEW_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("PREVIEW_SECRET"))?,
            storage: storage_from_env()?,
        })
    }
}

/// The bucket settings are all-or-nothing: a bucket name without credentials
/// is a misconfiguration.
fn storage_from_env() -> Result<Option<StorageConfig>, ConfigError> {
    let Ok(bucket) = env::var("S3_BUCKET") else {
        return Ok(None);
    };

    Ok(Some(StorageConfig {
        bucket,
        endpoint: env::var("S3_ENDPOINT").map_err(|_| ConfigError::Missing("S3_ENDPOINT"))?,
        region: env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        access_key_id: env::var("S3_ACCESS_KEY_ID")
            .map_err(|_| ConfigError::Missing("S3_ACCESS_KEY_ID"))?,
        secret_access_key: env::var("S3_SECRET_ACCESS_KEY")
            .map_err(|_| ConfigError::Missing("S3_SECRET_ACCESS_KEY"))?,
    }))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
