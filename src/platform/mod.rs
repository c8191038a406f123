//! Interface to the remote platform
//!
//! The engine never talks HTTP itself. Everything it needs from the platform
//! goes through the [`Platform`] trait, and a [`Connector`] turns an API key
//! into a `Platform` client. Implementations report failures as
//! [`anyhow::Error`]; the engine attaches the attempted action and the
//! application name before surfacing them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dyno::DynoType;
use crate::options::{ApiKey, Region, Stack};
use crate::settings::ConfigSettings;

mod memory;

pub use memory::{Call, CallKind, MemoryApp, MemoryPlatform, MemoryState};

/// An application as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Identifier assigned by the platform on creation
    pub id: String,
    pub name: String,
    pub region: Region,
    pub stack: Stack,
    pub web_url: Option<String>,
}

/// One process of the application formation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    /// Process name from the Procfile, e.g. `web` or `worker`
    pub process_type: String,
    pub size: DynoType,
    pub quantity: u32,
}

/// Change to the size and quantity of one process
pub type FormationUpdate = ProcessEntry;

/// Client for the remote platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// All applications visible to the client, by name
    async fn list_applications(&self) -> anyhow::Result<BTreeMap<String, Application>>;

    async fn create_application(
        &self,
        name: &str,
        region: Region,
        stack: Stack,
    ) -> anyhow::Result<Application>;

    async fn delete_application(&self, app: &Application) -> anyhow::Result<()>;

    async fn config(&self, app: &Application) -> anyhow::Result<ConfigSettings>;

    /// Overwrite the given variables, leaving any other variable untouched
    async fn update_config(&self, app: &Application, settings: &ConfigSettings)
        -> anyhow::Result<()>;

    async fn process_formation(&self, app: &Application) -> anyhow::Result<Vec<ProcessEntry>>;

    /// Whether [`Platform::update_formation`] may be used
    fn supports_batch_updates(&self) -> bool {
        true
    }

    /// Apply several process updates as one call
    async fn update_formation(
        &self,
        app: &Application,
        updates: &[FormationUpdate],
    ) -> anyhow::Result<()>;

    /// Apply a single process update
    async fn update_process(&self, app: &Application, update: &FormationUpdate)
        -> anyhow::Result<()>;

    async fn restart(&self, app: &Application) -> anyhow::Result<()>;
}

/// Authenticates against the platform
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: Platform;

    async fn authenticate(&self, key: &ApiKey) -> anyhow::Result<Self::Client>;
}
