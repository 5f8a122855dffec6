//! Hyper-backed mock server engine.
//!
//! Each started server owns a listener task; stopping it sends a broadcast signal that
//! breaks the accept loop and releases the port.

use super::handler::{handle_stub_request, StubServer};
use super::loader::load_mappings;
use super::types::EngineError;
use super::{MockServerEngine, ServerHandle, StubServerSpec};
use async_trait::async_trait;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Default engine: replays WireMock-style mappings over HTTP/1
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperEngine;

impl HyperEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MockServerEngine for HyperEngine {
    async fn start(&self, spec: StubServerSpec) -> Result<Box<dyn ServerHandle>, EngineError> {
        let mappings = load_mappings(&spec.stub_dir)?;
        let mapping_count = mappings.len();

        // Port 0 lets the OS pick a free ephemeral port; the bind itself is the check
        let listener = TcpListener::bind((spec.host.as_str(), spec.port))
            .await
            .map_err(|e| EngineError::Bind {
                host: spec.host.clone(),
                port: spec.port,
                reason: e.to_string(),
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| EngineError::Bind {
                host: spec.host.clone(),
                port: spec.port,
                reason: e.to_string(),
            })?
            .port();

        info!(
            "Stub server for {} bound to {}:{} ({} mappings)",
            spec.name, spec.host, port, mapping_count
        );

        let server = Arc::new(StubServer::new(spec.name.clone(), mappings));
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut shutdown_rx = shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _addr)) => {
                                let server = Arc::clone(&server);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let server = Arc::clone(&server);
                                        async move { handle_stub_request(req, server).await }
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error on port {}: {}", port, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on port {}: {}", port, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Stub server on port {} shutting down", port);
                        break;
                    }
                }
            }
        });

        Ok(Box::new(HyperServerHandle {
            port,
            base_url: format!("http://{}:{}", url_host(&spec.host), port),
            shutdown_tx,
            stopped: AtomicBool::new(false),
        }))
    }
}

/// Handle to a running hyper stub server
#[derive(Debug)]
pub struct HyperServerHandle {
    port: u16,
    base_url: String,
    shutdown_tx: broadcast::Sender<()>,
    stopped: AtomicBool,
}

impl ServerHandle for HyperServerHandle {
    fn port(&self) -> u16 {
        self.port
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stop(&self) -> Result<(), EngineError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown_tx.send(()).map(|_| ()).map_err(|_| EngineError::Stop {
            port: self.port,
            reason: "listener task already exited".to_string(),
        })
    }
}

impl Drop for HyperServerHandle {
    fn drop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(());
        }
    }
}

/// Host to put in base URLs; wildcard binds are reached over loopback
fn url_host(bind_host: &str) -> &str {
    match bind_host {
        "0.0.0.0" | "::" | "[::]" => "localhost",
        host => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn stub_dir(body: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("mappings")).unwrap();
        fs::write(
            dir.path().join("mappings/name.json"),
            format!(
                r#"{{"request":{{"method":"GET","url":"/name"}},"response":{{"status":200,"body":"{body}"}}}}"#
            ),
        )
        .unwrap();
        dir
    }

    fn spec(dir: &std::path::Path, port: u16) -> StubServerSpec {
        StubServerSpec {
            name: "g:loanIssuance:stubs".to_string(),
            host: "127.0.0.1".to_string(),
            port,
            stub_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_start_serves_mappings_and_stop_releases_port() {
        let dir = stub_dir("loanIssuance");
        let handle = HyperEngine::new().start(spec(dir.path(), 0)).await.unwrap();
        assert_ne!(handle.port(), 0);
        assert_eq!(
            handle.base_url(),
            format!("http://127.0.0.1:{}", handle.port())
        );

        let body = reqwest::get(format!("{}/name", handle.base_url()))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "loanIssuance");

        let missing = reqwest::get(format!("{}/nothing", handle.base_url()))
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        handle.stop().unwrap();
        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_admin_mappings_listing() {
        let dir = stub_dir("fraudDetectionServer");
        let handle = HyperEngine::new().start(spec(dir.path(), 0)).await.unwrap();

        let listing: serde_json::Value = reqwest::get(format!("{}/__admin/mappings", handle.base_url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listing["meta"]["total"], 1);
        assert_eq!(listing["mappings"][0]["request"]["url"], "/name");
        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_on_occupied_port() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();
        let dir = stub_dir("x");

        let err = HyperEngine::new()
            .start(spec(dir.path(), port))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_invalid_stub_dir_fails_start() {
        let err = HyperEngine::new()
            .start(spec(&PathBuf::from("/no/such/stubs"), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStubs { .. }));
    }
}
