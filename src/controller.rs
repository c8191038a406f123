//! State transition controller
//!
//! The [`Controller`] moves one application towards a [`TargetState`]. The
//! platform has no single status field to start from, so each transition is
//! decided from the target, whether the application exists, and the
//! settings and formation diffs.
//!
//! | Target      | App missing                       | App exists                       |
//! |-------------|-----------------------------------|----------------------------------|
//! | `absent`    | nothing                           | delete                           |
//! | `present`   | create                            | nothing                          |
//! | `started`   | create, configure, scale          | configure, scale                 |
//! | `stopped`   | create                            | scale every size to zero         |
//! | `restarted` | same as `started`                 | configure, restart               |
//!
//! A failing step aborts the transition. Steps already applied are kept, the
//! next invocation will diff against them and finish the work.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{NotFoundError, Result, TransportError};
use crate::formation::{Formation, ScaleOp};
use crate::options::{Options, Region, Stack, TargetState};
use crate::platform::{Application, FormationUpdate, Platform};
use crate::reader::RemoteFormation;
use crate::report::{Report, Step};
use crate::settings::diff_settings;

/// Normalized declaration of the application
#[derive(Debug, Clone, PartialEq)]
pub struct Declared {
    pub name: String,
    pub state: TargetState,
    pub region: Region,
    pub stack: Stack,
    pub formation: Formation,
    pub settings: BTreeMap<String, Value>,
    pub uppercase: bool,
    pub process_type: String,
    pub create_missing: bool,
}

impl Declared {
    /// Build a declaration from options and an already normalized formation
    pub fn new(opts: &Options, formation: Formation) -> Self {
        Self {
            name: opts.app.clone(),
            state: opts.state,
            region: opts.region,
            stack: opts.stack,
            formation,
            settings: opts.settings.clone(),
            uppercase: opts.uppercase,
            process_type: opts.process_type.clone(),
            create_missing: opts.create_missing,
        }
    }
}

/// Formation changes ready to be sent to the platform
#[derive(Debug, Clone, Default)]
struct ScalePlan {
    ops: Vec<ScaleOp>,
    updates: Vec<FormationUpdate>,
    result: Formation,
}

impl ScalePlan {
    fn new(
        name: &str,
        remote: &RemoteFormation,
        desired: &Formation,
        process_type: &str,
    ) -> Result<Self> {
        let ops = remote.formation().diff(desired);
        let updates = remote.bind(name, &ops, process_type)?;
        // Show pending changes at debug level
        if tracing::enabled!(tracing::Level::DEBUG) && !ops.is_empty() {
            debug!("pending formation changes:");
            for op in &ops {
                debug!("- {op} ({})", op.kind().as_str());
            }
        }

        Ok(Self {
            ops,
            updates,
            result: desired.clone(),
        })
    }
}

/// Drives one application to its declared state
pub struct Controller<'a, P: Platform + ?Sized> {
    client: &'a P,
    declared: Declared,
}

impl<'a, P: Platform + ?Sized> Controller<'a, P> {
    pub fn new(client: &'a P, declared: Declared) -> Self {
        Self { client, declared }
    }

    /// Run the transition for the declared target state
    ///
    /// `app` is the application as currently reported by the platform, `None`
    /// if it does not exist.
    #[instrument(name = "reconcile", skip_all, fields(app = %self.declared.name, state = %self.declared.state), err)]
    pub async fn reconcile(&self, app: Option<Application>) -> Result<Report> {
        let mut report = Report::new(&self.declared.name, self.declared.state);

        match (self.declared.state, app) {
            (TargetState::Absent, Some(app)) => self.absent(&app, &mut report).await?,
            (TargetState::Absent, None) => debug!("application does not exist"),
            (TargetState::Present, Some(app)) => report.app(Some(app)),
            (TargetState::Present, None) => {
                let app = self.create(&mut report).await?;
                report.app(Some(app));
            }
            (TargetState::Started, app) => self.started(app, "start", &mut report).await?,
            (TargetState::Stopped, app) => self.stopped(app, &mut report).await?,
            (TargetState::Restarted, Some(app)) => self.restarted(&app, &mut report).await?,
            (TargetState::Restarted, None) => {
                debug!("application does not exist, starting it instead");
                report.reached(TargetState::Started);
                self.started(None, "restart", &mut report).await?;
            }
        }

        if !report.changed() {
            info!("nothing to do");
        }
        Ok(report)
    }

    async fn absent(&self, app: &Application, report: &mut Report) -> Result<()> {
        info!("deleting application");
        self.client
            .delete_application(app)
            .await
            .map_err(|e| self.fail("delete", e))?;
        report.record(Step::Delete);
        Ok(())
    }

    async fn started(
        &self,
        app: Option<Application>,
        action: &'static str,
        report: &mut Report,
    ) -> Result<()> {
        let desired = &self.declared.formation;

        // plan the formation before any mutation, so an unsupported shape
        // leaves the application untouched
        let (app, plan) = match app {
            Some(app) => {
                let remote = RemoteFormation::read(self.client, &app).await?;
                let plan = self.plan(&remote, desired)?;
                (app, plan)
            }
            None => {
                let plan = self.plan(&RemoteFormation::default(), desired)?;
                let app = self.create_missing(action, report).await?;
                (app, plan)
            }
        };

        self.configure(&app, report).await?;
        self.scale(&app, plan, report).await?;
        report.app(Some(app));
        Ok(())
    }

    async fn stopped(&self, app: Option<Application>, report: &mut Report) -> Result<()> {
        let Some(app) = app else {
            // a new application has no dynos to stop
            let app = self.create_missing("stop", report).await?;
            report.formation(Formation::new());
            report.app(Some(app));
            return Ok(());
        };

        let remote = RemoteFormation::read(self.client, &app).await?;
        let plan = self.plan(&remote, &Formation::new())?;
        self.scale(&app, plan, report).await?;
        report.app(Some(app));
        Ok(())
    }

    async fn restarted(&self, app: &Application, report: &mut Report) -> Result<()> {
        self.configure(app, report).await?;

        info!("restarting application");
        self.client
            .restart(app)
            .await
            .map_err(|e| self.fail("restart", e))?;
        report.record(Step::Restart);
        report.app(Some(app.clone()));
        Ok(())
    }

    async fn create_missing(
        &self,
        action: &'static str,
        report: &mut Report,
    ) -> Result<Application> {
        if !self.declared.create_missing {
            return Err(NotFoundError {
                app: self.declared.name.clone(),
                action,
            }
            .into());
        }
        self.create(report).await
    }

    async fn create(&self, report: &mut Report) -> Result<Application> {
        let Declared {
            name,
            region,
            stack,
            ..
        } = &self.declared;

        info!(%region, %stack, "creating application");
        let app = self
            .client
            .create_application(name, *region, *stack)
            .await
            .map_err(|e| self.fail("create", e))?;
        debug!(id = %app.id, "application created");

        report.record(Step::Create);
        Ok(app)
    }

    /// Apply the declared settings if any of them differs
    async fn configure(&self, app: &Application, report: &mut Report) -> Result<()> {
        if self.declared.settings.is_empty() {
            return Ok(());
        }

        let current = self
            .client
            .config(app)
            .await
            .map_err(|e| self.fail("read configuration of", e))?;

        let diff = diff_settings(&current, &self.declared.settings, self.declared.uppercase);
        if diff.changed {
            info!(
                vars = ?diff.write.keys().collect::<Vec<_>>(),
                "updating configuration"
            );
            self.client
                .update_config(app, &diff.write)
                .await
                .map_err(|e| self.fail("update configuration of", e))?;
        }

        report.record(Step::Configure {
            changed: diff.changed,
        });
        Ok(())
    }

    fn plan(&self, remote: &RemoteFormation, desired: &Formation) -> Result<ScalePlan> {
        ScalePlan::new(
            &self.declared.name,
            remote,
            desired,
            &self.declared.process_type,
        )
    }

    async fn scale(&self, app: &Application, plan: ScalePlan, report: &mut Report) -> Result<()> {
        let ScalePlan {
            ops,
            updates,
            result,
        } = plan;

        if !updates.is_empty() {
            if self.client.supports_batch_updates() {
                info!(updates = updates.len(), "updating formation");
                self.client
                    .update_formation(app, &updates)
                    .await
                    .map_err(|e| self.fail("update formation of", e))?;
            } else {
                for update in &updates {
                    info!(
                        process = %update.process_type,
                        size = %update.size,
                        quantity = update.quantity,
                        "updating process"
                    );
                    self.client
                        .update_process(app, update)
                        .await
                        .map_err(|e| self.fail("update formation of", e))?;
                }
            }
        }

        report.record(Step::Scale { ops });
        report.formation(result);
        Ok(())
    }

    fn fail(&self, action: &'static str, e: anyhow::Error) -> TransportError {
        warn!("failed to {action} application: {e:#}");
        TransportError::new(action, &self.declared.name, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::dyno::DynoType;
    use crate::options::ApiKey;
    use crate::platform::{MemoryApp, MemoryPlatform, MemoryState};

    fn declared(state: TargetState, formation: Formation) -> Declared {
        let opts = Options::new(ApiKey::new("secret"), "my-app").state(state);
        Declared::new(&opts, formation)
    }

    async fn existing(platform: &MemoryPlatform) -> Option<Application> {
        platform.app("my-app").await.map(|stored| stored.app)
    }

    #[tokio::test]
    async fn it_records_steps_in_order() {
        let platform = MemoryPlatform::from(
            MemoryState::new().with_app(MemoryApp::new("my-app").process("web", DynoType::Hobby, 1)),
        );
        let mut declared = declared(
            TargetState::Started,
            Formation::single(DynoType::Hobby, 2),
        );
        declared.settings.insert("path".to_string(), "/srv".into());

        let app = existing(&platform).await;
        let report = Controller::new(&platform, declared).reconcile(app).await.unwrap();

        assert_eq!(
            report.steps(),
            &[
                Step::Configure { changed: true },
                Step::Scale {
                    ops: vec![ScaleOp {
                        size: DynoType::Hobby,
                        from: 1,
                        quantity: 2
                    }]
                }
            ]
        );
    }

    #[tokio::test]
    async fn it_skips_configuration_without_settings() {
        let platform = MemoryPlatform::from(MemoryState::new().with_app(MemoryApp::new("my-app")));

        let app = existing(&platform).await;
        let declared = declared(
            TargetState::Restarted,
            Formation::single(DynoType::Free, 1),
        );
        let report = Controller::new(&platform, declared)
            .reconcile(app)
            .await
            .unwrap();

        assert_eq!(report.steps(), &[Step::Restart]);
    }

    #[tokio::test]
    async fn it_creates_then_scales_a_missing_app() {
        let platform = MemoryPlatform::new();

        let declared = declared(
            TargetState::Restarted,
            Formation::single(DynoType::Free, 1),
        );
        let report = Controller::new(&platform, declared)
            .reconcile(None)
            .await
            .unwrap();

        assert!(report.changed());
        assert_eq!(report.steps().len(), 2);
        assert_eq!(report.steps()[0], Step::Create);
        assert_eq!(
            report.outcome().message,
            "App 'my-app' successfully started (started free)"
        );
    }

    #[tokio::test]
    async fn it_names_the_requested_action_for_missing_apps() {
        let platform = MemoryPlatform::new();

        for (state, action) in [
            (TargetState::Started, "start"),
            (TargetState::Stopped, "stop"),
            (TargetState::Restarted, "restart"),
        ] {
            let mut declared = declared(state, Formation::single(DynoType::Free, 1));
            declared.create_missing = false;

            let err = Controller::new(&platform, declared)
                .reconcile(None)
                .await
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("application 'my-app' does not exist, cannot {action} it")
            );
        }
        assert!(platform.calls().await.is_empty());
    }
}
