//! Firestore document store over the REST API.

use crate::traits::{validate_document_path, DocumentError, DocumentResult, DocumentStore, Fields};
use crate::DocumentBackend;
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Value};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Characters left as-is in path segments and query values.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// OAuth scope for Firestore data access.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// How requests are authenticated
pub enum FirestoreAuth {
    /// No credentials, for the emulator.
    Anonymous,
    /// A fixed bearer token. Access tokens expire, so this is for the emulator and
    /// local tooling only.
    Static(String),
    /// Tokens from a provider that caches and refreshes them.
    Provider(Arc<dyn TokenProvider>),
    /// Application default credentials, discovered on the first request.
    ApplicationDefault,
}

impl Debug for FirestoreAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FirestoreAuth::Anonymous => f.write_str("Anonymous"),
            FirestoreAuth::Static(_) => f.write_str("Static(..)"),
            FirestoreAuth::Provider(_) => f.write_str("Provider(..)"),
            FirestoreAuth::ApplicationDefault => f.write_str("ApplicationDefault"),
        }
    }
}

/// Firestore REST backend
///
/// Updates are sent as `PATCH` with an update mask limited to the written fields and
/// a `currentDocument.exists=true` precondition, so a missing document is reported
/// instead of silently created.
pub struct FirestoreDocumentStore {
    http_client: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    auth: FirestoreAuth,
    default_provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl Debug for FirestoreDocumentStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FirestoreDocumentStore")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("auth", &self.auth)
            .finish()
    }
}

impl FirestoreDocumentStore {
    /// # Arguments
    /// * `base_url` - API root, `https://firestore.googleapis.com/v1` or an emulator
    ///   such as `http://localhost:8080/v1`
    /// * `auth` - how each request obtains its bearer token
    pub fn new(
        base_url: String,
        project_id: String,
        database: String,
        auth: FirestoreAuth,
    ) -> DocumentResult<Self> {
        if project_id.trim().is_empty() {
            return Err(DocumentError::ConfigError(
                "Firestore project id is empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                DocumentError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            base_url,
            project_id,
            database,
            auth,
            default_provider: OnceCell::new(),
        })
    }

    /// Bearer token for the next request, if any. Provider tokens are cached by the
    /// provider and refreshed before they expire.
    async fn bearer_token(&self) -> DocumentResult<Option<String>> {
        let provider = match &self.auth {
            FirestoreAuth::Anonymous => return Ok(None),
            FirestoreAuth::Static(token) => return Ok(Some(token.clone())),
            FirestoreAuth::Provider(provider) => Arc::clone(provider),
            FirestoreAuth::ApplicationDefault => Arc::clone(
                self.default_provider
                    .get_or_try_init(gcp_auth::provider)
                    .await
                    .map_err(|e| {
                        DocumentError::Auth(format!("No application default credentials: {}", e))
                    })?,
            ),
        };

        let token = provider
            .token(&[DATASTORE_SCOPE])
            .await
            .map_err(|e| DocumentError::Auth(e.to_string()))?;
        Ok(Some(token.as_str().to_string()))
    }

    /// Full PATCH URL for updating `fields` of `document_path`.
    fn update_url(&self, document_path: &str, fields: &Fields) -> String {
        let encoded_path = document_path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, COMPONENT).to_string())
            .collect::<Vec<_>>()
            .join("/");

        let mut url = format!(
            "{}/projects/{}/databases/{}/documents/{}?currentDocument.exists=true",
            self.base_url.trim_end_matches('/'),
            utf8_percent_encode(&self.project_id, COMPONENT),
            utf8_percent_encode(&self.database, COMPONENT),
            encoded_path
        );
        for name in fields.keys() {
            url.push_str("&updateMask.fieldPaths=");
            url.push_str(&utf8_percent_encode(&field_path(name), COMPONENT).to_string());
        }
        url
    }
}

/// Quote a field name with backticks unless it is a simple identifier.
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Convert a JSON value into Firestore's typed value representation.
fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore encodes int64 as a JSON string
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": to_firestore_fields(map) } }),
    }
}

fn to_firestore_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), to_firestore_value(v)))
            .collect(),
    )
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    #[tracing::instrument(skip(self, fields), fields(firestore.project = %self.project_id))]
    async fn update(&self, document_path: &str, fields: Fields) -> DocumentResult<()> {
        let path = validate_document_path(document_path)?;
        if fields.is_empty() {
            return Ok(());
        }

        let url = self.update_url(&path, &fields);
        let body = json!({ "fields": to_firestore_fields(&fields) });
        let start = std::time::Instant::now();

        let mut request = self.http_client.patch(&url).json(&body);
        if let Some(token) = self.bearer_token().await.inspect_err(|e| {
            tracing::error!(error = %e, document = %path, "Firestore credentials unavailable");
        })? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, document = %path, "Firestore request failed");
            DocumentError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DocumentError::NotFound(path));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                status = %status,
                document = %path,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Firestore update rejected"
            );
            return Err(DocumentError::UpdateFailed(format!(
                "{} - {}",
                status, error_text
            )));
        }

        tracing::info!(
            document = %path,
            fields = fields.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Firestore update successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> DocumentBackend {
        DocumentBackend::Firestore
    }
}
