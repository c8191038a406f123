//! Invocation options
//!
//! [`Options`] is the schema of the configuration object accepted by
//! [`run`](crate::run). Every option has a fixed type and default, and options
//! restricted to a set of values are modelled as enums, so a configuration
//! object that deserializes is already valid at the schema level. Checks
//! that depend on several options at once (e.g. `formation` against
//! `size`/`count`) happen later, in [`normalize`](crate::normalize).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dyno::DynoType;
use crate::error::OptionsError;

/// State the application should end up in
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// The application does not exist
    Absent,
    /// The application exists, possibly as an empty shell
    #[default]
    Present,
    /// The application exists with its settings applied and declared dynos running
    Started,
    /// The application exists with no dynos running
    Stopped,
    /// The application has its settings applied and has just been restarted
    Restarted,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Absent => "absent",
            TargetState::Present => "present",
            TargetState::Started => "started",
            TargetState::Stopped => "stopped",
            TargetState::Restarted => "restarted",
        }
    }

    /// Whether the state leaves no dynos running, making formation inputs irrelevant
    pub fn implies_no_dynos(&self) -> bool {
        matches!(self, TargetState::Absent | TargetState::Stopped)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datacenter hosting the application
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Eu,
    Frankfurt,
    Oregon,
    Tokyo,
    #[default]
    Us,
    Virginia,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Eu => "eu",
            Region::Frankfurt => "frankfurt",
            Region::Oregon => "oregon",
            Region::Tokyo => "tokyo",
            Region::Us => "us",
            Region::Virginia => "virginia",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime image the application runs on
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stack {
    #[default]
    #[serde(rename = "cedar")]
    Cedar,
    #[serde(rename = "cedar-14")]
    Cedar14,
    #[serde(rename = "heroku-16")]
    Heroku16,
}

impl Stack {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stack::Cedar => "cedar",
            Stack::Cedar14 => "cedar-14",
            Stack::Heroku16 => "heroku-16",
        }
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform API key
///
/// The key is never printed, its `Debug` output is redacted and it does not
/// implement `Display`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Access the secret, for use by the transport only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

fn default_process_type() -> String {
    String::from("web")
}

fn default_create_missing() -> bool {
    true
}

/// Configuration object for one invocation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    /// API key to authenticate with the platform
    pub api_key: ApiKey,

    /// Name of the application
    pub app: String,

    /// State the application should end up in
    #[serde(default)]
    pub state: TargetState,

    /// Datacenter used when creating the application
    #[serde(default)]
    pub region: Region,

    /// Stack used when creating the application
    #[serde(default)]
    pub stack: Stack,

    /// Configuration variables for the application
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,

    /// Uppercase setting names before applying them
    #[serde(default)]
    pub uppercase: bool,

    /// Dynos per size. Exclusive with `size` and `count`
    #[serde(default)]
    pub formation: BTreeMap<String, i64>,

    /// Dyno size, used together with `count`
    #[serde(default)]
    pub size: Option<DynoType>,

    /// Number of dynos, used together with `size`
    #[serde(default)]
    pub count: Option<i64>,

    /// Process receiving dyno sizes the application does not run yet
    #[serde(default = "default_process_type")]
    pub process_type: String,

    /// Create the application when `started`, `stopped` or `restarted`
    /// target a missing application
    #[serde(default = "default_create_missing")]
    pub create_missing: bool,
}

impl Options {
    /// Options for `app` with every other option at its default
    pub fn new(api_key: ApiKey, app: impl Into<String>) -> Self {
        Self {
            api_key,
            app: app.into(),
            state: TargetState::default(),
            region: Region::default(),
            stack: Stack::default(),
            settings: BTreeMap::new(),
            uppercase: false,
            formation: BTreeMap::new(),
            size: None,
            count: None,
            process_type: default_process_type(),
            create_missing: default_create_missing(),
        }
    }

    pub fn from_json(value: Value) -> Result<Self, OptionsError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn state(self, state: TargetState) -> Self {
        let mut opts = self;
        opts.state = state;
        opts
    }

    pub fn region(self, region: Region) -> Self {
        let mut opts = self;
        opts.region = region;
        opts
    }

    pub fn stack(self, stack: Stack) -> Self {
        let mut opts = self;
        opts.stack = stack;
        opts
    }

    pub fn setting(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut opts = self;
        opts.settings.insert(name.into(), value.into());
        opts
    }

    pub fn uppercase(self, uppercase: bool) -> Self {
        let mut opts = self;
        opts.uppercase = uppercase;
        opts
    }

    pub fn formation(self, size: impl Into<String>, quantity: i64) -> Self {
        let mut opts = self;
        opts.formation.insert(size.into(), quantity);
        opts
    }

    pub fn size_and_count(self, size: DynoType, count: i64) -> Self {
        let mut opts = self;
        opts.size = Some(size);
        opts.count = Some(count);
        opts
    }

    pub fn process_type(self, process_type: impl Into<String>) -> Self {
        let mut opts = self;
        opts.process_type = process_type.into();
        opts
    }

    pub fn create_missing(self, create_missing: bool) -> Self {
        let mut opts = self;
        opts.create_missing = create_missing;
        opts
    }
}

impl FromStr for Options {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}
