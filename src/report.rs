//! Aggregation of step results into the final outcome

use std::collections::BTreeSet;

use serde::Serialize;

use crate::formation::{Formation, ScaleKind, ScaleOp};
use crate::options::{Region, Stack, TargetState};
use crate::platform::Application;

/// A step taken while reconciling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Delete,
    Create,
    Configure { changed: bool },
    Scale { ops: Vec<ScaleOp> },
    Restart,
}

impl Step {
    pub fn changed(&self) -> bool {
        match self {
            Step::Delete | Step::Create | Step::Restart => true,
            Step::Configure { changed } => *changed,
            Step::Scale { ops } => !ops.is_empty(),
        }
    }
}

/// Application fields exposed in the outcome
///
/// This is a fixed projection, fields added to [`Application`] are not
/// exposed unless listed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppFacts {
    pub id: String,
    pub name: String,
    pub region: Region,
    pub stack: Stack,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formation: Option<Formation>,
}

impl From<&Application> for AppFacts {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id.clone(),
            name: app.name.clone(),
            region: app.region,
            stack: app.stack,
            web_url: app.web_url.clone(),
            formation: None,
        }
    }
}

/// Final result of an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AppFacts>,
}

/// Collects the steps of one reconciliation
#[derive(Debug, Clone)]
pub struct Report {
    name: String,
    state: TargetState,
    steps: Vec<Step>,
    app: Option<Application>,
    formation: Option<Formation>,
}

impl Report {
    pub fn new(name: impl Into<String>, state: TargetState) -> Self {
        Self {
            name: name.into(),
            state,
            steps: Vec::new(),
            app: None,
            formation: None,
        }
    }

    pub fn record(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Report the net action as reaching `state`
    pub fn reached(&mut self, state: TargetState) {
        self.state = state;
    }

    /// The application as left by the reconciliation
    pub fn app(&mut self, app: Option<Application>) {
        self.app = app;
    }

    /// The formation as left by the reconciliation
    pub fn formation(&mut self, formation: Formation) {
        self.formation = Some(formation);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn changed(&self) -> bool {
        self.steps.iter().any(Step::changed)
    }

    pub fn outcome(self) -> Outcome {
        let changed = self.changed();
        let message = if changed {
            let verb = match self.state {
                TargetState::Absent => "deleted",
                TargetState::Present => "created",
                TargetState::Started => "started",
                TargetState::Stopped => "stopped",
                TargetState::Restarted => "restarted",
            };
            let mut message = format!("App '{}' successfully {verb}", self.name);
            if let Some(summary) = scale_summary(&self.steps) {
                message.push_str(&format!(" ({summary})"));
            }
            message
        } else {
            format!("App '{}' left unchanged", self.name)
        };

        let app = self.app.as_ref().map(|app| AppFacts {
            formation: self.formation,
            ..AppFacts::from(app)
        });

        Outcome {
            changed,
            message,
            app,
        }
    }
}

// e.g. "started hobby, rescaled standard-1x"
fn scale_summary(steps: &[Step]) -> Option<String> {
    let mut kinds: BTreeSet<(ScaleKind, String)> = BTreeSet::new();
    for step in steps {
        if let Step::Scale { ops } = step {
            kinds.extend(ops.iter().map(|op| (op.kind(), op.size.to_string())));
        }
    }
    if kinds.is_empty() {
        return None;
    }

    let parts: Vec<String> = kinds
        .into_iter()
        .map(|(kind, size)| format!("{} {size}", kind.as_str()))
        .collect();
    Some(parts.join(", "))
}
