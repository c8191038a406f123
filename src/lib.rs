#![cfg_attr(docsrs, feature(doc_cfg))]
//! dynostate reconciles the declared state of a cloud-hosted application with the state
//! reported by its platform.
//!
//! An application is declared by a target [state](`options::TargetState`) (`absent`, `present`,
//! `started`, `stopped` or `restarted`), its configuration variables and the dynos it should run.
//! On every invocation the platform is read again, the declaration is compared with what the
//! platform reports, and only the operations needed to close the gap are issued. Applying the
//! same declaration twice reports `changed: false` the second time.
//!
//! # Invocation
//!
//! A configuration object is parsed into [`Options`], validated, and run against a
//! [`Connector`](`platform::Connector`) that knows how to reach the platform.
//!
//! ```rust
//! use dynostate::platform::{MemoryApp, MemoryPlatform, MemoryState};
//! use dynostate::run_json;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let platform = MemoryPlatform::from(MemoryState::new().with_app(MemoryApp::new("my-app")));
//!
//! let outcome = run_json(
//!     json!({
//!         "api_key": "<your-api-key>",
//!         "app": "my-app",
//!         "state": "started",
//!         "settings": {"path": "/to/some/place"},
//!         "uppercase": true,
//!         "size": "standard-1x",
//!         "count": 2
//!     }),
//!     &platform,
//! )
//! .await
//! .unwrap();
//!
//! assert!(outcome.changed);
//! assert_eq!(outcome.message, "App 'my-app' successfully started (started standard-1x)");
//! # })
//! ```
//!
//! # Formation
//!
//! Dynos are declared either as a `formation` mapping sizes to quantities, or as a single
//! `size` and `count`. Size names are matched ignoring case and punctuation, so `standard1x`
//! and `standard-1x` are the same size. See [`normalize`] for the validation rules.
//!
//! # Failures
//!
//! Errors are reported as [`Error`]. Invalid inputs fail before the platform is contacted. A
//! failing remote call aborts the invocation, without undoing the steps that already succeeded.
//!
//! # Logging
//!
//! The library reports its progress through the [tracing crate](https://crates.io/crates/tracing).
//! With the `logging` feature enabled, [`init_logging`] installs a compact stderr subscriber
//! filtered by `RUST_LOG`. The API key is never logged, and settings are logged by name only.

pub mod controller;
pub mod dyno;
pub mod error;
pub mod formation;
pub mod options;
pub mod platform;
pub mod reader;
pub mod report;
pub mod settings;

mod invocation;
mod normalize;

#[cfg(feature = "logging")]
mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::init as init_logging;

pub use error::{Error, ErrorKind, Result};
pub use invocation::{run, run_json};
pub use normalize::normalize;
pub use options::Options;
pub use report::Outcome;
