//! Mock server engine used to serve stubs.
//!
//! The pool only manages lifecycle through `MockServerEngine` and `ServerHandle`;
//! request/response replay is entirely the engine's business.
//!
//! ## Module Structure
//!
//! - `types`: mapping definitions and `EngineError`
//! - `loader`: reads mapping files from a stub directory
//! - `matching`: compiled request matchers
//! - `handler`: HTTP request handling
//! - `engine`: `HyperEngine`, the default engine

mod engine;
mod handler;
mod loader;
mod matching;
mod types;

pub use engine::{HyperEngine, HyperServerHandle};
pub use loader::load_mappings;
pub use matching::{parse_query_string, CompiledMapping, IncomingRequest};
pub use types::{
    EngineError, RequestPattern, ResponseDefinition, StubMapping, ValuePattern, DEFAULT_PRIORITY,
};

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

/// What the engine needs to start one stub server
#[derive(Debug, Clone)]
pub struct StubServerSpec {
    /// Display name, normally the stub coordinates
    pub name: String,
    pub host: String,
    /// 0 asks the OS for a free ephemeral port
    pub port: u16,
    pub stub_dir: PathBuf,
}

/// Starts mock servers loaded with stub definitions
#[async_trait]
pub trait MockServerEngine: Send + Sync {
    async fn start(&self, spec: StubServerSpec) -> Result<Box<dyn ServerHandle>, EngineError>;
}

/// A running mock server
pub trait ServerHandle: Send + Sync + Debug {
    fn port(&self) -> u16;
    fn base_url(&self) -> &str;
    /// Stop the server. Calling it again is a no-op.
    fn stop(&self) -> Result<(), EngineError>;
}
