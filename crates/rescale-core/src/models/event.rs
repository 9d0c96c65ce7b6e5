use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::constants::MESSAGE_ORIGIN_KEY;

/// Descriptor of one finalized storage object.
///
/// Mirrors the object-finalize payload delivered by the storage service. Unknown
/// fields (size, generation, timestamps...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    /// Full object key, e.g. `files/<uid>/assets/upload/<filename>`.
    pub name: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: HashMap<String, String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl UploadEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
            content_type: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Directory part of the object key, without trailing slash. Empty at bucket root.
    pub fn directory(&self) -> &str {
        match self.name.rfind('/') {
            Some(idx) => &self.name[..idx],
            None => "",
        }
    }

    /// Last segment of the object key.
    pub fn file_name(&self) -> &str {
        match self.name.rfind('/') {
            Some(idx) => &self.name[idx + 1..],
            None => &self.name,
        }
    }

    /// Document path of the record that initiated the upload, if any.
    pub fn message_origin(&self) -> Option<&str> {
        self.metadata
            .get(MESSAGE_ORIGIN_KEY)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}
