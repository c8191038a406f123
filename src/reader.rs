//! Reading the current state of an application from the platform

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::dyno::DynoType;
use crate::error::{TransportError, UnsupportedShapeError};
use crate::formation::{Formation, ScaleOp};
use crate::platform::{Application, FormationUpdate, Platform, ProcessEntry};

/// Look up an application by name
///
/// A missing application is not an error, callers decide what to do with it.
#[instrument(level = "debug", skip(client), err)]
pub async fn fetch<P>(client: &P, name: &str) -> Result<Option<Application>, TransportError>
where
    P: Platform + ?Sized,
{
    let mut apps = client
        .list_applications()
        .await
        .map_err(|e| TransportError::new("look up", name, e))?;

    let app = apps.remove(name);
    debug!(exists = app.is_some());
    Ok(app)
}

/// The process formation of an application, keyed by dyno size
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFormation {
    formation: Formation,
    // process running (or last configured with) each size
    processes: BTreeMap<DynoType, String>,
    // size and running quantity of each process
    sizes: BTreeMap<String, (DynoType, u32)>,
}

impl RemoteFormation {
    /// Read the current formation of the application
    pub async fn read<P>(client: &P, app: &Application) -> crate::error::Result<Self>
    where
        P: Platform + ?Sized,
    {
        let entries = client
            .process_formation(app)
            .await
            .map_err(|e| TransportError::new("read formation of", &app.name, e))?;

        let remote = RemoteFormation::from_entries(&app.name, entries)?;
        debug!(formation = %remote.formation, "current formation");
        Ok(remote)
    }

    /// Fold process entries into a formation
    ///
    /// Two processes running dynos of the same size cannot be told apart once
    /// keyed by size, so that shape is rejected. Idle processes never conflict.
    pub fn from_entries(
        app: &str,
        entries: Vec<ProcessEntry>,
    ) -> Result<Self, UnsupportedShapeError> {
        let mut remote = RemoteFormation::default();
        let mut running: BTreeMap<DynoType, String> = BTreeMap::new();

        for entry in entries.iter().filter(|e| e.quantity > 0) {
            if let Some(other) = running.get(&entry.size) {
                return Err(UnsupportedShapeError::shared_size(
                    app,
                    entry.size,
                    other,
                    &entry.process_type,
                ));
            }
            running.insert(entry.size, entry.process_type.clone());
            remote.formation.set(entry.size, entry.quantity);
        }

        for entry in entries {
            remote
                .processes
                .entry(entry.size)
                .or_insert_with(|| entry.process_type.clone());
            remote
                .sizes
                .insert(entry.process_type, (entry.size, entry.quantity));
        }
        remote.processes.extend(running);

        Ok(remote)
    }

    pub fn formation(&self) -> &Formation {
        &self.formation
    }

    /// Assign each operation to the process that should receive it
    ///
    /// Sizes the application already knows go to the process using them, new
    /// sizes go to `default_process`. A process both stopped on its old size and
    /// started on a new one receives a single resize.
    pub fn bind(
        &self,
        app: &str,
        ops: &[ScaleOp],
        default_process: &str,
    ) -> Result<Vec<FormationUpdate>, UnsupportedShapeError> {
        let mut updates: Vec<FormationUpdate> = Vec::with_capacity(ops.len());

        for op in ops {
            let process_type = self
                .processes
                .get(&op.size)
                .map(String::as_str)
                .unwrap_or(default_process);

            let update = FormationUpdate {
                process_type: process_type.to_string(),
                size: op.size,
                quantity: op.quantity,
            };

            match updates
                .iter_mut()
                .find(|u| u.process_type == update.process_type)
            {
                None => updates.push(update),
                Some(existing) if existing.quantity == 0 => *existing = update,
                Some(_) if update.quantity == 0 => {}
                Some(existing) => {
                    return Err(UnsupportedShapeError {
                        app: app.to_string(),
                        reason: format!(
                            "{} and {} dynos would both run as process '{}'",
                            existing.size, update.size, update.process_type
                        ),
                    })
                }
            }
        }

        // a process moved to another size must not leave running dynos behind
        for update in updates.iter().filter(|u| u.quantity > 0) {
            let Some((size, running)) = self.sizes.get(&update.process_type) else {
                continue;
            };
            let stops_old_size = ops.iter().any(|op| op.size == *size && op.quantity == 0);
            if *size != update.size && *running > 0 && !stops_old_size {
                return Err(UnsupportedShapeError {
                    app: app.to_string(),
                    reason: format!(
                        "process '{}' cannot run {} and {} dynos at once",
                        update.process_type, size, update.size
                    ),
                });
            }
        }

        Ok(updates)
    }
}
