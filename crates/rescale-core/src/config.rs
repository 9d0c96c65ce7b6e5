//! Configuration module
//!
//! Configuration is read from the environment (optionally seeded from a `.env`
//! file). Every pipeline knob has a default matching the production behavior, so
//! only backend credentials and locations normally need to be set.

use chrono::{DateTime, Utc};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants;
use crate::storage_types::{DocumentBackend, StorageBackend};

const SERVER_PORT: u16 = 8080;
const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const FIRESTORE_DATABASE: &str = "(default)";
const CONVERT_PATH: &str = "convert";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Which resize implementation the transformer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeBackend {
    /// In-process resize with the `image` crate.
    #[default]
    Native,
    /// Spawn ImageMagick `convert`.
    Convert,
}

impl FromStr for ResizeBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(ResizeBackend::Native),
            "convert" | "imagemagick" => Ok(ResizeBackend::Convert),
            _ => Err(anyhow::anyhow!("Invalid resize backend: {}", s)),
        }
    }
}

/// Settings shared by every entry point
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub environment: String,
    pub server_port: u16,
    pub log_format: LogFormat,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    // Blob storage
    pub storage_backend: StorageBackend,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub gcs_service_account_path: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Document store
    pub document_backend: DocumentBackend,
    pub firestore_project_id: Option<String>,
    pub firestore_database: String,
    pub firestore_base_url: String,
    pub firestore_access_token: Option<String>, // Emulator only
    pub local_documents_path: Option<String>,
    // Pipeline
    pub scratch_dir: PathBuf,
    pub max_image_width: u32,
    pub target_height: u32,
    pub staging_dir: String,
    pub output_dir: String,
    pub signed_url_expires_at: DateTime<Utc>,
    pub resize_backend: ResizeBackend,
    pub convert_path: String,
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port = match var("SERVER_PORT").or_else(|| var("PORT")) {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid port: {}", port))?,
            None => SERVER_PORT,
        };

        let log_format = var("LOG_FORMAT")
            .map(|s| s.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        let storage_backend = var("STORAGE_BACKEND")
            .map(|s| s.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Gcs);

        let document_backend = var("DOCUMENT_BACKEND")
            .map(|s| s.parse::<DocumentBackend>())
            .transpose()?
            .unwrap_or(DocumentBackend::Firestore);

        let resize_backend = var("RESIZE_BACKEND")
            .map(|s| s.parse::<ResizeBackend>())
            .transpose()?
            .unwrap_or_default();

        let max_image_width = parse_pixels(var("MAX_IMAGE_WIDTH"), constants::MAX_IMAGE_WIDTH)
            .map_err(|e| anyhow::anyhow!("MAX_IMAGE_WIDTH {}", e))?;
        let target_height = parse_pixels(var("TARGET_HEIGHT"), constants::TARGET_HEIGHT)
            .map_err(|e| anyhow::anyhow!("TARGET_HEIGHT {}", e))?;

        let expires_at_str =
            var("SIGNED_URL_EXPIRES_AT").unwrap_or_else(|| constants::SIGNED_URL_EXPIRES_AT.to_string());
        let signed_url_expires_at = DateTime::parse_from_rfc3339(&expires_at_str)
            .map_err(|e| {
                anyhow::anyhow!(
                    "SIGNED_URL_EXPIRES_AT must be an RFC 3339 timestamp ({}): {}",
                    expires_at_str,
                    e
                )
            })?
            .with_timezone(&Utc);

        Ok(Config {
            base: BaseConfig {
                environment,
                server_port,
                log_format,
            },
            storage_backend,
            s3_region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            s3_endpoint: var("S3_ENDPOINT"),
            gcs_service_account_path: var("GCS_SERVICE_ACCOUNT_PATH")
                .or_else(|| var("GOOGLE_APPLICATION_CREDENTIALS")),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            document_backend,
            firestore_project_id: var("FIRESTORE_PROJECT_ID")
                .or_else(|| var("GOOGLE_CLOUD_PROJECT")),
            firestore_database: var("FIRESTORE_DATABASE")
                .unwrap_or_else(|| FIRESTORE_DATABASE.to_string()),
            firestore_base_url: var("FIRESTORE_BASE_URL")
                .unwrap_or_else(|| FIRESTORE_BASE_URL.to_string()),
            firestore_access_token: var("FIRESTORE_ACCESS_TOKEN"),
            local_documents_path: var("LOCAL_DOCUMENTS_PATH"),
            scratch_dir: var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            max_image_width,
            target_height,
            staging_dir: var("STAGING_DIR").unwrap_or_else(|| constants::STAGING_DIR.to_string()),
            output_dir: var("OUTPUT_DIR").unwrap_or_else(|| constants::OUTPUT_DIR.to_string()),
            signed_url_expires_at,
            resize_backend,
            convert_path: var("CONVERT_PATH").unwrap_or_else(|| CONVERT_PATH.to_string()),
        })
    }

    /// Whether Firestore requests go to something other than the Google endpoint.
    pub fn uses_firestore_emulator(&self) -> bool {
        self.firestore_base_url.trim_end_matches('/') != FIRESTORE_BASE_URL
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Gcs => {}
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        match self.document_backend {
            DocumentBackend::Firestore => {
                if self.firestore_project_id.is_none() {
                    return Err(anyhow::anyhow!(
                        "FIRESTORE_PROJECT_ID must be set when using the Firestore document backend"
                    ));
                }
                if self.firestore_access_token.is_some() && !self.uses_firestore_emulator() {
                    return Err(anyhow::anyhow!(
                        "FIRESTORE_ACCESS_TOKEN is only accepted with an emulator FIRESTORE_BASE_URL; \
                         use service account or application default credentials"
                    ));
                }
            }
            DocumentBackend::Local => {
                if self.local_documents_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_DOCUMENTS_PATH must be set when using the local document backend"
                    ));
                }
            }
        }

        if self.staging_dir.contains('/') || self.output_dir.contains('/') {
            return Err(anyhow::anyhow!(
                "STAGING_DIR and OUTPUT_DIR must be single path segments"
            ));
        }
        if self.staging_dir == self.output_dir {
            return Err(anyhow::anyhow!(
                "STAGING_DIR and OUTPUT_DIR must differ, otherwise output re-triggers processing"
            ));
        }

        if self.signed_url_expires_at <= Utc::now() {
            return Err(anyhow::anyhow!("SIGNED_URL_EXPIRES_AT must be in the future"));
        }

        Ok(())
    }
}

fn parse_pixels(value: Option<String>, default: u32) -> Result<u32, String> {
    match value {
        None => Ok(default),
        Some(v) => match v.parse::<u32>() {
            Ok(0) | Err(_) => Err(format!("must be a positive integer, got {}", v)),
            Ok(n) => Ok(n),
        },
    }
}
