//! Secret material resolution.
//!
//! The gateway needs exactly one opaque document at startup: the YAML route
//! table. Deployments mount it either directly in the environment or as a
//! file, so resolution goes through a small [`Source`] capability with one
//! implementation per backing store and a first-match chain on top.

use async_trait::async_trait;
use base64::Engine;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret {0:?} not found")]
    NotFound(String),

    #[error("failed to read secret {name:?}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A named-secret lookup capability.
#[async_trait]
pub trait Source: Send + Sync {
    async fn get(&self, name: &str) -> Result<Vec<u8>, SecretError>;
}

/// Reads secrets from process environment variables.
///
/// Values that decode as standard base64 are returned decoded; anything
/// else is returned verbatim, so plain-text values keep working.
pub struct EnvSource;

#[async_trait]
impl Source for EnvSource {
    async fn get(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        match std::env::var(name) {
            Ok(v) if !v.is_empty() => {
                match base64::engine::general_purpose::STANDARD.decode(v.as_bytes()) {
                    Ok(decoded) => Ok(decoded),
                    Err(_) => Ok(v.into_bytes()),
                }
            }
            _ => Err(SecretError::NotFound(name.to_string())),
        }
    }
}

/// Reads secrets from files under a base directory, one file per name.
pub struct FileSource {
    base: PathBuf,
}

impl FileSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl Source for FileSource {
    async fn get(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        let path = self.base.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SecretError::NotFound(name.to_string()))
            }
            Err(e) => Err(SecretError::Io {
                name: name.to_string(),
                source: e,
            }),
        }
    }
}

/// First-match chain over multiple sources.
pub struct Chain {
    sources: Vec<Box<dyn Source>>,
}

impl Chain {
    pub fn new(sources: Vec<Box<dyn Source>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Source for Chain {
    async fn get(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        for source in &self.sources {
            match source.get(name).await {
                Ok(v) => return Ok(v),
                Err(SecretError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(SecretError::NotFound(name.to_string()))
    }
}
