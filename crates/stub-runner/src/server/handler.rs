//! Request handling for stub servers.

use super::matching::{parse_query_string, CompiledMapping, IncomingRequest};
use super::types::{ListMappingsResponse, ListMeta, ResponseDefinition};
use crate::metrics;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const ADMIN_MAPPINGS_PATH: &str = "/__admin/mappings";

/// Runtime state of one stub server
pub struct StubServer {
    /// Coordinates of the stub this server replays, used in logs and metrics
    pub name: String,
    pub mappings: Vec<CompiledMapping>,
    pub request_count: AtomicU64,
}

impl StubServer {
    pub fn new(name: String, mappings: Vec<CompiledMapping>) -> Self {
        Self {
            name,
            mappings,
            request_count: AtomicU64::new(0),
        }
    }

    pub fn find_mapping(&self, request: &IncomingRequest) -> Option<&CompiledMapping> {
        self.mappings.iter().find(|m| m.matches(request))
    }
}

/// Handle a request to a stub server
pub async fn handle_stub_request(
    req: Request<Incoming>,
    server: Arc<StubServer>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    server.request_count.fetch_add(1, Ordering::Relaxed);

    let uri = req.uri().clone();
    if req.method() == Method::GET && uri.path() == ADMIN_MAPPINGS_PATH {
        let listing = ListMappingsResponse {
            mappings: server.mappings.iter().map(|m| &m.mapping).collect(),
            meta: ListMeta {
                total: server.mappings.len(),
            },
        };
        return Ok(json_response(StatusCode::OK, &listing));
    }

    let query = uri.query().map(str::to_string);
    let request = IncomingRequest {
        method: req.method().to_string(),
        path: uri.path().to_string(),
        query_params: query.as_deref().map(parse_query_string).unwrap_or_default(),
        query,
        headers: req
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    v.to_str().unwrap_or("").to_string(),
                )
            })
            .collect(),
    };

    let Some(mapping) = server.find_mapping(&request) else {
        debug!(
            "No mapping in {} matches {} {}",
            server.name, request.method, uri
        );
        metrics::record_stub_request(&server.name, false);
        let message = format!(
            "No stub mapping matches {} {}",
            request.method,
            uri.path_and_query().map(|p| p.as_str()).unwrap_or("/")
        );
        return Ok(json_response(
            StatusCode::NOT_FOUND,
            &serde_json::json!({ "error": message }),
        ));
    };

    metrics::record_stub_request(&server.name, true);
    Ok(execute_response(&mapping.mapping.response, mapping).await)
}

async fn execute_response(
    response: &ResponseDefinition,
    mapping: &CompiledMapping,
) -> Response<Full<Bytes>> {
    if let Some(delay) = response.fixed_delay_milliseconds {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let mut headers: HashMap<String, String> = response.headers.clone();
    let body: Bytes = if let Some(body) = &response.body {
        Bytes::from(body.clone())
    } else if let Some(json) = &response.json_body {
        if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        Bytes::from(json.to_string())
    } else if let Some(file_name) = &response.body_file_name {
        let path = mapping.files_root.join(file_name);
        match tokio::fs::read(&path).await {
            Ok(contents) => Bytes::from(contents),
            Err(e) => {
                warn!("Cannot read body file {}: {}", path.display(), e);
                return build_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Cannot read body file {file_name}"),
                );
            }
        }
    } else {
        Bytes::new()
    };

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    build_response_with_headers(status, &headers, body)
}

/// Build a response with custom headers
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    build_response_with_headers(status, std::iter::empty::<(&str, &str)>(), body)
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => build_response_with_headers(
            status,
            [("Content-Type", "application/json")],
            body,
        ),
        Err(e) => build_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Serialization error: {e}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::types::{RequestPattern, StubMapping};
    use std::path::PathBuf;

    fn compiled(response: ResponseDefinition, files_root: PathBuf) -> CompiledMapping {
        CompiledMapping::compile(
            StubMapping {
                id: None,
                name: None,
                priority: None,
                request: RequestPattern::default(),
                response,
            },
            files_root,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_json_body_sets_content_type() {
        let mapping = compiled(
            ResponseDefinition {
                status: 201,
                json_body: Some(serde_json::json!({"loanId": 1})),
                ..Default::default()
            },
            PathBuf::new(),
        );
        let resp = execute_response(&mapping.mapping.response, &mapping).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_body_file_read_from_files_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("body.txt"), "from file").unwrap();
        let mapping = compiled(
            ResponseDefinition {
                body_file_name: Some("body.txt".to_string()),
                headers: HashMap::from([("X-Stub".to_string(), "yes".to_string())]),
                ..Default::default()
            },
            dir.path().to_path_buf(),
        );
        let resp = execute_response(&mapping.mapping.response, &mapping).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("X-Stub").unwrap(), "yes");
    }

    #[tokio::test]
    async fn test_missing_body_file_is_server_error() {
        let mapping = compiled(
            ResponseDefinition {
                body_file_name: Some("missing.txt".to_string()),
                ..Default::default()
            },
            PathBuf::from("/nowhere"),
        );
        let resp = execute_response(&mapping.mapping.response, &mapping).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_find_mapping_uses_order() {
        let first = compiled(
            ResponseDefinition {
                body: Some("first".to_string()),
                ..Default::default()
            },
            PathBuf::new(),
        );
        let second = compiled(
            ResponseDefinition {
                body: Some("second".to_string()),
                ..Default::default()
            },
            PathBuf::new(),
        );
        let server = StubServer::new("g:a:stubs".to_string(), vec![first, second]);
        let found = server.find_mapping(&IncomingRequest::default()).unwrap();
        assert_eq!(found.mapping.response.body.as_deref(), Some("first"));
    }
}
