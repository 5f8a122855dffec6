//! Stub mapping definitions and engine error types.
//!
//! Mappings use the WireMock JSON layout so stubs generated for JVM consumers can be
//! served unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Priority assumed for mappings that do not declare one
pub const DEFAULT_PRIORITY: u32 = 5;

// ============================================================================
// Mapping Types
// ============================================================================

/// A single request/response pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Lower values are matched first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub request: RequestPattern,
    #[serde(default)]
    pub response: ResponseDefinition,
}

impl StubMapping {
    pub fn effective_priority(&self) -> u32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }
}

/// Request side of a mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    /// HTTP method, `ANY` or absent for any method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Exact path and query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Exact path, query ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    /// Regex over path and query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    /// Regex over the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, ValuePattern>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query_parameters: HashMap<String, ValuePattern>,
}

/// Matcher applied to a header or query parameter value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValuePattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absent: Option<bool>,
}

/// Response side of a mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDefinition {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_body: Option<serde_json::Value>,
    /// File under the stub's `__files` directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_delay_milliseconds: Option<u64>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: default_status(),
            body: None,
            json_body: None,
            body_file_name: None,
            headers: HashMap::new(),
            fixed_delay_milliseconds: None,
        }
    }
}

/// On-disk mapping file: either one mapping or a `{"mappings": [...]}` bundle
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MappingFile {
    Bundle { mappings: Vec<StubMapping> },
    Single(Box<StubMapping>),
}

impl MappingFile {
    pub(crate) fn into_mappings(self) -> Vec<StubMapping> {
        match self {
            MappingFile::Bundle { mappings } => mappings,
            MappingFile::Single(mapping) => vec![*mapping],
        }
    }
}

/// Admin listing of loaded mappings
#[derive(Debug, Serialize)]
pub struct ListMappingsResponse<'a> {
    pub mappings: Vec<&'a StubMapping>,
    pub meta: ListMeta,
}

#[derive(Debug, Serialize)]
pub struct ListMeta {
    pub total: usize,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error types for the mock server engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to bind {host}:{port}: {reason}")]
    Bind {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Invalid stub definitions in {path}: {reason}")]
    InvalidStubs { path: PathBuf, reason: String },
    #[error("Failed to stop server on port {port}: {reason}")]
    Stop { port: u16, reason: String },
}
