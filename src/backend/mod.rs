//! Backend abstraction.
//!
//! # Responsibilities
//! - Name the two routable targets (primary, spare)
//! - Resolve each target to its base address
//! - Talk HTTP to backends with a bounded timeout (client.rs)
//! - Provide a simulated backend for demos and tests (simulated.rs)

pub mod client;
pub mod simulated;

use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;
use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BackendsConfig;

/// Identifies one of the two routable targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Primary,
    Spare,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::Primary, BackendId::Spare];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Primary => "primary",
            BackendId::Spare => "spare",
        }
    }

    /// The other target.
    pub fn alternate(self) -> BackendId {
        match self {
            BackendId::Primary => BackendId::Spare,
            BackendId::Spare => BackendId::Primary,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend {0:?} (expected \"primary\" or \"spare\")")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendId {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(BackendId::Primary),
            "spare" => Ok(BackendId::Spare),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

/// A single backend server.
#[derive(Debug, Clone)]
pub struct Backend {
    pub id: BackendId,
    pub addr: SocketAddr,
}

impl Backend {
    pub fn new(id: BackendId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    /// Absolute URI for `path_and_query` on this backend.
    pub fn uri(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        let authority = Authority::from_str(&self.addr.to_string())?;
        let path_and_query = PathAndQuery::from_str(path_and_query)?;
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(authority)
            .path_and_query(path_and_query)
            .build()
    }
}

/// The primary/spare pair.
#[derive(Debug, Clone)]
pub struct Backends {
    pub primary: Backend,
    pub spare: Backend,
}

impl Backends {
    pub fn new(primary: SocketAddr, spare: SocketAddr) -> Self {
        Self {
            primary: Backend::new(BackendId::Primary, primary),
            spare: Backend::new(BackendId::Spare, spare),
        }
    }

    pub fn from_config(config: &BackendsConfig) -> Result<Self, AddrParseError> {
        Ok(Self::new(config.primary.parse()?, config.spare.parse()?))
    }

    pub fn get(&self, id: BackendId) -> &Backend {
        match id {
            BackendId::Primary => &self.primary,
            BackendId::Spare => &self.spare,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        [&self.primary, &self.spare].into_iter()
    }
}
