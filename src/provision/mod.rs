//! The provisioning sequence.
//!
//! [`Provisioner::run`] walks the stack from nothing to an initialized
//! database:
//!
//! 1. broker image (built locally if its tag is missing)
//! 2. bridge network
//! 3. broker and coordinator containers, resolved or created
//! 4. coordinator started, then broker
//! 5. engine events printed in the background, from a subscription taken
//!    before step 1
//! 6. existing database container stopped and removed
//! 7. database recreated and started
//! 8. wait until it reports running
//! 9. wait until its management endpoint answers
//! 10. cluster-init, then bucket-create, inside it
//!
//! Steps are not rolled back on failure.

mod config;

pub use config::{DatabaseSpec, ServiceSpec, StackConfig, WaitConfig};

use crate::container::{
    ContainerError, ContainerManager, Engine, EventMonitor, ExecConfig, ImageBuilder,
    NetworkManager, RUN_LABEL, Resolved, Result, execute,
};
use crate::readiness::HttpProbe;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a provisioning run did.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub run_id: Uuid,
    pub broker_image: Resolved,
    pub network: Resolved,
    pub coordinator: Resolved,
    pub broker: Resolved,
    /// Id of the database container that was removed, if there was one
    pub removed_database: Option<String>,
    pub database: Resolved,
    pub readiness_attempts: u32,
    pub exec_results: Vec<ExecResult>,
    pub events_seen: u64,
}

/// Outcome of one initialization command.
#[derive(Debug, Clone, Serialize)]
pub struct ExecResult {
    pub command: String,
    pub exec_id: String,
    pub exit_code: Option<i64>,
    pub output: String,
}

struct DatabaseRun {
    removed: Option<String>,
    database: Resolved,
    readiness_attempts: u32,
    exec_results: Vec<ExecResult>,
}

/// Drives a provisioning run against an [`Engine`].
pub struct Provisioner {
    engine: Arc<dyn Engine>,
    config: StackConfig,
    run_id: Uuid,
}

impl Provisioner {
    pub fn new(engine: Arc<dyn Engine>, config: StackConfig) -> Self {
        Self {
            engine,
            config,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn labels(&self) -> HashMap<String, String> {
        HashMap::from([(RUN_LABEL.to_string(), self.run_id.to_string())])
    }

    /// Run the whole sequence.
    ///
    /// Engine events are subscribed to before the first step, so the report's
    /// event count covers the whole run. The monitor is stopped before this
    /// returns, whether the run succeeds or not.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. Resources created by earlier
    /// steps are left in place.
    pub async fn run(&self) -> Result<ProvisionReport> {
        self.config.validate()?;
        info!("Starting provisioning run {}", self.run_id);

        let monitor = EventMonitor::spawn(self.engine.clone());
        let result = self.run_steps().await;
        let events_seen = monitor.events_seen();
        monitor.stop().await;

        let mut report = result?;
        report.events_seen = events_seen;
        info!(
            "Provisioning run {} complete ({} engine events)",
            self.run_id, events_seen
        );
        Ok(report)
    }

    async fn run_steps(&self) -> Result<ProvisionReport> {
        let labels = self.labels();
        let manager =
            ContainerManager::new(self.engine.clone()).with_auto_pull(self.config.auto_pull);

        let broker_image = ImageBuilder::new(self.engine.clone())
            .ensure_image(&self.config.broker_image)
            .await?;

        let network = NetworkManager::new(self.engine.clone())
            .ensure_network(&self.config.network, &labels)
            .await?;

        // The broker image is built locally and never comes from a registry.
        let local = ContainerManager::new(self.engine.clone()).with_auto_pull(false);
        let broker = self
            .resolve_service(&local, &self.config.broker, &labels)
            .await?;
        let coordinator = self
            .resolve_service(&manager, &self.config.coordinator, &labels)
            .await?;

        manager.start(&coordinator.id).await?;
        manager.start(&broker.id).await?;

        let DatabaseRun {
            removed,
            database,
            readiness_attempts,
            exec_results,
        } = self.recreate_database(&manager, &labels).await?;

        Ok(ProvisionReport {
            run_id: self.run_id,
            broker_image,
            network,
            coordinator,
            broker,
            removed_database: removed,
            database,
            readiness_attempts,
            exec_results,
            events_seen: 0,
        })
    }

    async fn resolve_service(
        &self,
        manager: &ContainerManager,
        service: &ServiceSpec,
        labels: &HashMap<String, String>,
    ) -> Result<Resolved> {
        let config = service.container_config(&self.config.network, labels)?;
        manager.resolve_or_create(&service.name, &config).await
    }

    async fn recreate_database(
        &self,
        manager: &ContainerManager,
        labels: &HashMap<String, String>,
    ) -> Result<DatabaseRun> {
        let database = &self.config.database;

        let removed = match manager.find(&database.name).await? {
            Some(existing) => {
                info!(
                    "Recreating database container {} ({})",
                    database.name, existing.id
                );
                manager
                    .stop(&existing.id, database.stop_timeout_secs)
                    .await?;
                manager.remove(&existing.id).await?;
                Some(existing.id)
            }
            None if database.require_existing => {
                return Err(ContainerError::NotFound(format!(
                    "Database container {} does not exist",
                    database.name
                )));
            }
            None => {
                warn!(
                    "Database container {} does not exist, creating it",
                    database.name
                );
                None
            }
        };

        let config = database.container_config(labels)?;
        let created = manager.resolve_or_create(&database.name, &config).await?;
        manager.start(&created.id).await?;

        manager
            .wait_running(&database.name, &self.config.wait.running)
            .await?;

        let probe = HttpProbe::new(
            &database.readiness_url,
            Duration::from_secs(self.config.wait.probe_timeout_secs),
        )?;
        let readiness_attempts = probe.wait_ready(&self.config.wait.readiness).await?;

        let mut exec_results = Vec::new();
        for command in [database.cluster_init_command(), database.bucket_create_command()] {
            exec_results.push(self.run_init_command(&created.id, &command).await?);
        }

        Ok(DatabaseRun {
            removed,
            database: created,
            readiness_attempts,
            exec_results,
        })
    }

    async fn run_init_command(&self, container_id: &str, command: &ExecConfig) -> Result<ExecResult> {
        let label = command.cmd()[..2.min(command.cmd().len())].join(" ");
        info!("Running {} in {}", label, container_id);

        let output = execute(self.engine.as_ref(), container_id, command).await?;
        let text = output.text().into_owned();
        debug!("{} output:\n{}", label, text.trim_end());

        if !output.success() {
            return Err(ContainerError::ExecutionError(format!(
                "{} exited with {:?}: {}",
                label,
                output.exit_code,
                text.trim()
            )));
        }

        Ok(ExecResult {
            command: label,
            exec_id: output.exec_id,
            exit_code: output.exit_code,
            output: text,
        })
    }
}
