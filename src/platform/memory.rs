use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Application, Connector, FormationUpdate, Platform, ProcessEntry};
use crate::dyno::DynoType;
use crate::options::{ApiKey, Region, Stack};
use crate::settings::ConfigSettings;

/// Kind of platform call, used to inject failures
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallKind {
    Authenticate,
    List,
    Create,
    Delete,
    ReadConfig,
    UpdateConfig,
    ReadFormation,
    UpdateFormation,
    Restart,
}

/// A mutating call that reached the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create {
        name: String,
        region: Region,
        stack: Stack,
    },
    Delete(String),
    UpdateConfig {
        app: String,
        settings: ConfigSettings,
    },
    UpdateFormation {
        app: String,
        updates: Vec<FormationUpdate>,
    },
    UpdateProcess {
        app: String,
        update: FormationUpdate,
    },
    Restart(String),
}

/// An application stored by [`MemoryPlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryApp {
    pub app: Application,
    pub config: ConfigSettings,
    pub processes: Vec<ProcessEntry>,
    pub restarts: u32,
}

impl MemoryApp {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            app: Application {
                id: format!("{name}-id"),
                web_url: Some(format!("https://{name}.example.com/")),
                name,
                region: Region::default(),
                stack: Stack::default(),
            },
            config: ConfigSettings::new(),
            processes: Vec::new(),
            restarts: 0,
        }
    }

    pub fn process(self, process_type: impl Into<String>, size: DynoType, quantity: u32) -> Self {
        let mut app = self;
        app.processes.push(ProcessEntry {
            process_type: process_type.into(),
            size,
            quantity,
        });
        app
    }

    pub fn setting(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut app = self;
        app.config.insert(name.into(), value.into());
        app
    }

    fn apply(&mut self, update: &FormationUpdate) {
        match self
            .processes
            .iter_mut()
            .find(|p| p.process_type == update.process_type)
        {
            Some(process) => {
                process.size = update.size;
                process.quantity = update.quantity;
            }
            None => self.processes.push(update.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    // successful calls of the kind allowed before failing
    after: usize,
    seen: usize,
}

/// State of a [`MemoryPlatform`]
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub apps: BTreeMap<String, MemoryApp>,
    pub calls: Vec<Call>,
    api_key: Option<String>,
    no_batch: bool,
    failures: BTreeMap<CallKind, Failure>,
    created: u64,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(self, app: MemoryApp) -> Self {
        let mut state = self;
        state.apps.insert(app.app.name.clone(), app);
        state
    }

    /// Only accept this API key
    pub fn with_api_key(self, key: impl Into<String>) -> Self {
        let mut state = self;
        state.api_key = Some(key.into());
        state
    }

    /// Report that batched formation updates are not supported
    pub fn without_batch_updates(self) -> Self {
        let mut state = self;
        state.no_batch = true;
        state
    }

    /// Fail every call of the given kind
    pub fn fail_on(self, kind: CallKind) -> Self {
        self.fail_after(kind, 0)
    }

    /// Fail calls of the given kind once `after` of them have succeeded
    pub fn fail_after(self, kind: CallKind, after: usize) -> Self {
        let mut state = self;
        state.failures.insert(kind, Failure { after, seen: 0 });
        state
    }

    fn check(&mut self, kind: CallKind) -> anyhow::Result<()> {
        if let Some(failure) = self.failures.get_mut(&kind) {
            if failure.seen >= failure.after {
                bail!("injected {kind:?} failure");
            }
            failure.seen += 1;
        }
        Ok(())
    }

    fn app_mut(&mut self, app: &Application) -> anyhow::Result<&mut MemoryApp> {
        self.apps
            .get_mut(&app.name)
            .filter(|stored| stored.app.id == app.id)
            .ok_or_else(|| anyhow!("404 not found: {}", app.name))
    }
}

/// In-memory platform
///
/// Keeps applications in memory and records every mutating call, so tests can
/// assert exactly what reached the platform. Clones share the same state.
#[derive(Debug, Clone)]
pub struct MemoryPlatform {
    state: Arc<RwLock<MemoryState>>,
    batch: bool,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        MemoryPlatform::from(MemoryState::default())
    }
}

impl From<MemoryState> for MemoryPlatform {
    fn from(state: MemoryState) -> Self {
        Self {
            batch: !state.no_batch,
            state: Arc::new(RwLock::new(state)),
        }
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current state
    pub async fn state(&self) -> MemoryState {
        self.state.read().await.clone()
    }

    /// Mutating calls recorded so far
    pub async fn calls(&self) -> Vec<Call> {
        self.state.read().await.calls.clone()
    }

    pub async fn app(&self, name: &str) -> Option<MemoryApp> {
        self.state.read().await.apps.get(name).cloned()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn list_applications(&self) -> anyhow::Result<BTreeMap<String, Application>> {
        let mut state = self.state.write().await;
        state.check(CallKind::List)?;
        Ok(state
            .apps
            .iter()
            .map(|(name, stored)| (name.clone(), stored.app.clone()))
            .collect())
    }

    async fn create_application(
        &self,
        name: &str,
        region: Region,
        stack: Stack,
    ) -> anyhow::Result<Application> {
        let mut state = self.state.write().await;
        state.check(CallKind::Create)?;
        if state.apps.contains_key(name) {
            bail!("422 name {name} is already taken");
        }

        state.created += 1;
        let mut stored = MemoryApp::new(name);
        stored.app.id = format!("{:08x}-{name}", state.created);
        stored.app.region = region;
        stored.app.stack = stack;

        let app = stored.app.clone();
        state.apps.insert(name.to_string(), stored);
        state.calls.push(Call::Create {
            name: name.to_string(),
            region,
            stack,
        });
        Ok(app)
    }

    async fn delete_application(&self, app: &Application) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state.check(CallKind::Delete)?;
        state.app_mut(app)?;
        state.apps.remove(&app.name);
        state.calls.push(Call::Delete(app.name.clone()));
        Ok(())
    }

    async fn config(&self, app: &Application) -> anyhow::Result<ConfigSettings> {
        let mut state = self.state.write().await;
        state.check(CallKind::ReadConfig)?;
        Ok(state.app_mut(app)?.config.clone())
    }

    async fn update_config(
        &self,
        app: &Application,
        settings: &ConfigSettings,
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state.check(CallKind::UpdateConfig)?;
        let stored = state.app_mut(app)?;
        stored
            .config
            .extend(settings.iter().map(|(k, v)| (k.clone(), v.clone())));
        state.calls.push(Call::UpdateConfig {
            app: app.name.clone(),
            settings: settings.clone(),
        });
        Ok(())
    }

    async fn process_formation(&self, app: &Application) -> anyhow::Result<Vec<ProcessEntry>> {
        let mut state = self.state.write().await;
        state.check(CallKind::ReadFormation)?;
        Ok(state.app_mut(app)?.processes.clone())
    }

    fn supports_batch_updates(&self) -> bool {
        self.batch
    }

    async fn update_formation(
        &self,
        app: &Application,
        updates: &[FormationUpdate],
    ) -> anyhow::Result<()> {
        if !self.batch {
            bail!("batch formation updates are not supported");
        }
        let mut state = self.state.write().await;
        state.check(CallKind::UpdateFormation)?;
        let stored = state.app_mut(app)?;
        for update in updates {
            stored.apply(update);
        }
        state.calls.push(Call::UpdateFormation {
            app: app.name.clone(),
            updates: updates.to_vec(),
        });
        Ok(())
    }

    async fn update_process(
        &self,
        app: &Application,
        update: &FormationUpdate,
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state.check(CallKind::UpdateFormation)?;
        state.app_mut(app)?.apply(update);
        state.calls.push(Call::UpdateProcess {
            app: app.name.clone(),
            update: update.clone(),
        });
        Ok(())
    }

    async fn restart(&self, app: &Application) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state.check(CallKind::Restart)?;
        state.app_mut(app)?.restarts += 1;
        state.calls.push(Call::Restart(app.name.clone()));
        Ok(())
    }
}

#[async_trait]
impl Connector for MemoryPlatform {
    type Client = MemoryPlatform;

    async fn authenticate(&self, key: &ApiKey) -> anyhow::Result<Self::Client> {
        let mut state = self.state.write().await;
        state.check(CallKind::Authenticate)?;
        match state.api_key.as_deref() {
            Some(expected) if expected != key.expose() => bail!("401 invalid credentials"),
            _ => Ok(self.clone()),
        }
    }
}
