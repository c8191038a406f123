use serde_json::Value;
use tracing::{info, info_span, Instrument};

use crate::controller::{Controller, Declared};
use crate::error::{Result, TransportError};
use crate::normalize::normalize;
use crate::options::Options;
use crate::platform::Connector;
use crate::reader;
use crate::report::Outcome;

/// Reconcile one application with its declared state
///
/// Inputs are validated before the platform is contacted, so an invalid
/// declaration never results in a remote call. The application is then read
/// once and moved to the declared state.
pub async fn run<C>(opts: Options, connector: &C) -> Result<Outcome>
where
    C: Connector + ?Sized,
{
    let span = info_span!("run", app = %opts.app, state = %opts.state);
    async move {
        let formation = normalize(opts.state, &opts.formation, opts.size, opts.count)?;
        let declared = Declared::new(&opts, formation);

        let client = connector
            .authenticate(&opts.api_key)
            .await
            .map_err(|e| TransportError::new("authenticate for", &opts.app, e))?;

        let app = reader::fetch(&client, &opts.app).await?;
        let report = Controller::new(&client, declared).reconcile(app).await?;

        let outcome = report.outcome();
        info!(changed = outcome.changed, "{}", outcome.message);
        Ok(outcome)
    }
    .instrument(span)
    .await
}

/// Like [`run`], reading the options from a configuration object
pub async fn run_json<C>(config: Value, connector: &C) -> Result<Outcome>
where
    C: Connector + ?Sized,
{
    let opts = Options::from_json(config)?;
    run(opts, connector).await
}
