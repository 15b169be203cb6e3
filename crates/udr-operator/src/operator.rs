//! # UDR Operator
//!
//! Host-facing adapter: receives events, snapshots relation and workload
//! state, runs the reconciler and carries out the actions it returns.

use crate::error::Result;
use crate::events::{DeferredQueue, TriggerEvent};
use crate::host::PodIpSource;
use crate::plan::udr_layer;
use crate::reconciler::{reconcile, Action, ReconcileState};
use crate::relations::{
    DatabaseRequires, NrfRequires, RelationData, UnitModel, DATABASE_RELATION, NRF_RELATION,
};
use crate::service::UdrServicePatch;
use crate::status::{StatusRecord, UnitStatus};
use crate::workload::Workload;
use crate::OperatorConfig;
use tracing::{debug, info, warn};

/// Operator for one UDR unit
pub struct UdrOperator<W, P> {
    config: OperatorConfig,
    model: UnitModel,
    workload: W,
    pod_ip: P,
    database: DatabaseRequires,
    nrf: NrfRequires,
    status: StatusRecord,
    deferred: DeferredQueue,
    service_patch_pending: bool,
}

impl<W: Workload, P: PodIpSource> UdrOperator<W, P> {
    pub fn new(config: OperatorConfig, workload: W, pod_ip: P) -> Self {
        let model = UnitModel::new(config.app_name.clone(), config.model_name.clone());
        Self::with_model(config, model, workload, pod_ip)
    }

    /// Start from an existing unit model, e.g. one restored from disk
    pub fn with_model(config: OperatorConfig, model: UnitModel, workload: W, pod_ip: P) -> Self {
        let database = DatabaseRequires::new(
            DATABASE_RELATION,
            &config.database_name,
            &config.database_extra_user_roles,
        );
        Self {
            config,
            model,
            workload,
            pod_ip,
            database,
            nrf: NrfRequires::new(NRF_RELATION),
            status: StatusRecord::default(),
            deferred: DeferredQueue::default(),
            service_patch_pending: false,
        }
    }

    /// Deliver an event. Deferred events are redelivered first, oldest first.
    ///
    /// If a redelivery fails, the failed event, the events after it and
    /// `event` itself stay queued for the next delivery.
    pub fn emit(&mut self, event: TriggerEvent) -> Result<&UnitStatus> {
        let mut redeliver = self.deferred.take_all().into_iter();
        while let Some(deferred) = redeliver.next() {
            debug!("Redelivering deferred {}", deferred);
            if let Err(e) = self.dispatch(deferred.clone()) {
                warn!("Redelivery of {} failed, keeping it queued: {}", deferred, e);
                // Older events already deferred again in this pass keep their place.
                self.deferred.defer(deferred);
                for remaining in redeliver {
                    self.deferred.defer(remaining);
                }
                self.deferred.defer(event);
                return Err(e);
            }
        }

        self.dispatch(event)?;
        Ok(&self.status.status)
    }

    fn dispatch(&mut self, event: TriggerEvent) -> Result<()> {
        match &event {
            TriggerEvent::Install | TriggerEvent::Upgrade => {
                info!("Service patch requested by {}", event);
                self.service_patch_pending = true;
                Ok(())
            }
            TriggerEvent::RelationChanged { relation_id } => {
                let Ok(relation) = self.model.relation(*relation_id) else {
                    debug!("Relation {} is gone, ignoring change", relation_id);
                    return Ok(());
                };
                if let Some(url) = self.nrf.url_from_changed(relation) {
                    return self.dispatch(TriggerEvent::NrfAvailable { url });
                }
                if self.database.resource_created_in(relation) {
                    return self.dispatch(TriggerEvent::DatabaseCreated {
                        relation_id: *relation_id,
                    });
                }
                debug!("Relation {} changed without usable data", relation_id);
                Ok(())
            }
            TriggerEvent::DatabaseRelationJoined { relation_id } => {
                self.database.on_relation_joined(&mut self.model, *relation_id)?;
                self.reconcile(event)
            }
            _ if event.reconciles() => self.reconcile(event),
            _ => {
                debug!("Ignoring {}", event);
                Ok(())
            }
        }
    }

    fn snapshot(&self) -> Result<ReconcileState> {
        let container_reachable = self.workload.can_connect();
        let config_file_present = if container_reachable {
            let present = self.workload.exists(&self.config.config_path())?;
            if present {
                debug!("Config file is written");
            } else {
                info!("Config file is not written: {}", self.config.config_file_name);
            }
            present
        } else {
            false
        };

        Ok(ReconcileState {
            database: self.database.state(&self.model),
            nrf: self.nrf.state(&self.model),
            container_reachable,
            config_file_present,
        })
    }

    fn reconcile(&mut self, event: TriggerEvent) -> Result<()> {
        let state = self.snapshot()?;
        let decision = reconcile(&event, &state, &self.config);

        for action in &decision.actions {
            self.execute(action)?;
        }

        if decision.defer {
            warn!("Deferring {}: {}", event, decision.status);
            self.deferred.defer(event);
        }

        if decision.status != self.status.status {
            info!("Unit status: {}", decision.status);
        }
        self.status = StatusRecord::new(decision.status);
        Ok(())
    }

    fn execute(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::WriteConfig { path, config } => {
                let content = config.render()?;
                self.workload.push(path, &content)?;
                info!(
                    "Pushed {} config file to {}",
                    self.config.config_file_name,
                    self.workload.name()
                );
            }
            Action::ApplyLayer { label, combine } => {
                let pod_ip = self.pod_ip.pod_ip()?;
                let layer = udr_layer(&self.config, pod_ip);
                self.workload.add_layer(label, &layer, *combine)?;
                debug!("Applied layer {} with POD_IP {}", label, pod_ip);
            }
            Action::Replan => self.workload.replan()?,
        }
        Ok(())
    }

    /// Create a relation and emit its creation events
    pub fn relation_created(&mut self, name: &str, remote_app: &str) -> Result<u32> {
        let relation_id = self.model.add_relation(name, remote_app);
        if name == NRF_RELATION {
            self.emit(TriggerEvent::NrfRelationCreated { relation_id })?;
        }
        Ok(relation_id)
    }

    /// Add a remote unit to a relation and emit the joined event
    pub fn relation_joined(&mut self, relation_id: u32, remote_unit: &str) -> Result<()> {
        self.model.add_relation_unit(relation_id, remote_unit)?;
        if self.model.relation(relation_id)?.name == DATABASE_RELATION {
            self.emit(TriggerEvent::DatabaseRelationJoined { relation_id })?;
        }
        Ok(())
    }

    /// Update remote application data and emit relation-changed
    pub fn update_relation_data(&mut self, relation_id: u32, values: RelationData) -> Result<()> {
        self.model.update_remote_app_data(relation_id, values)?;
        self.emit(TriggerEvent::RelationChanged { relation_id })?;
        Ok(())
    }

    /// Service patch to apply if an install or upgrade asked for one
    pub fn take_service_patch(&mut self) -> Option<UdrServicePatch> {
        if std::mem::take(&mut self.service_patch_pending) {
            Some(UdrServicePatch::from_config(&self.config))
        } else {
            None
        }
    }

    pub fn status(&self) -> &StatusRecord {
        &self.status
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn model(&self) -> &UnitModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut UnitModel {
        &mut self.model
    }

    pub fn workload(&self) -> &W {
        &self.workload
    }

    pub fn workload_mut(&mut self) -> &mut W {
        &mut self.workload
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    /// Restore events deferred by a previous run
    pub fn set_deferred(&mut self, deferred: DeferredQueue) {
        self.deferred = deferred;
    }
}

/// Operator builder for fluent configuration
pub struct OperatorBuilder {
    config: OperatorConfig,
    leader: bool,
}

impl OperatorBuilder {
    pub fn new() -> Self {
        Self {
            config: OperatorConfig::default(),
            leader: false,
        }
    }

    pub fn app_name(mut self, name: &str) -> Self {
        self.config.app_name = name.to_string();
        self
    }

    pub fn model_name(mut self, name: &str) -> Self {
        self.config.model_name = name.to_string();
        self
    }

    pub fn config_dir(mut self, dir: &str) -> Self {
        self.config.config_dir = dir.to_string();
        self
    }

    pub fn binary_path(mut self, path: &str) -> Self {
        self.config.binary_path = path.to_string();
        self
    }

    pub fn database_name(mut self, name: &str) -> Self {
        self.config.database_name = name.to_string();
        self
    }

    pub fn sbi_port(mut self, port: u16) -> Self {
        self.config.sbi_port = port;
        self
    }

    pub fn leader(mut self, leader: bool) -> Self {
        self.leader = leader;
        self
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn build<W: Workload, P: PodIpSource>(self, workload: W, pod_ip: P) -> UdrOperator<W, P> {
        let mut operator = UdrOperator::new(self.config, workload, pod_ip);
        operator.model.leader = self.leader;
        operator
    }
}

impl Default for OperatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticPodIp;
    use crate::reconciler::{MSG_CONTAINER_NOT_READY, MSG_NO_DATABASE_RELATION};
    use crate::workload::InMemoryWorkload;
    use std::net::Ipv4Addr;

    fn operator() -> UdrOperator<InMemoryWorkload, StaticPodIp> {
        OperatorBuilder::new()
            .model_name("whatever")
            .leader(true)
            .build(InMemoryWorkload::new("udr"), StaticPodIp(Ipv4Addr::new(1, 2, 3, 4)))
    }

    #[test]
    fn test_operator_builder() {
        let builder = OperatorBuilder::new()
            .app_name("udr-operator")
            .model_name("test-ns")
            .sbi_port(30000)
            .leader(true);

        assert_eq!(builder.config().app_name, "udr-operator");
        assert_eq!(builder.config().model_name, "test-ns");
        assert_eq!(builder.config().sbi_port, 30000);
        assert!(builder.leader);
    }

    #[test]
    fn test_pebble_ready_without_relations_blocks() {
        let mut operator = operator();
        operator.workload_mut().set_can_connect(true);

        let status = operator.emit(TriggerEvent::PebbleReady).unwrap().clone();
        assert_eq!(status, UnitStatus::blocked(MSG_NO_DATABASE_RELATION));
        assert_eq!(operator.workload().push_count(), 0);
    }

    #[test]
    fn test_database_join_publishes_request() {
        let mut operator = operator();
        let id = operator.relation_created(DATABASE_RELATION, "mongodb").unwrap();
        operator.relation_joined(id, "mongodb/0").unwrap();

        let local = &operator.model().relation(id).unwrap().local_app_data;
        assert_eq!(local.get("database"), Some(&"free5gc".to_string()));
    }

    #[test]
    fn test_install_requests_service_patch_once() {
        let mut operator = operator();
        operator.emit(TriggerEvent::Install).unwrap();

        let patch = operator.take_service_patch().unwrap();
        assert_eq!(patch.namespace, "whatever");
        assert!(operator.take_service_patch().is_none());
    }

    #[test]
    fn test_unreachable_container_defers_event() {
        let mut operator = operator();
        let db = operator.relation_created(DATABASE_RELATION, "mongodb").unwrap();
        let nrf = operator.relation_created(NRF_RELATION, "nrf").unwrap();
        operator
            .update_relation_data(
                db,
                RelationData::from([
                    ("username".to_string(), "banana".to_string()),
                    ("password".to_string(), "pizza".to_string()),
                    ("uris".to_string(), "http://2.2.2.2".to_string()),
                ]),
            )
            .unwrap();
        operator
            .update_relation_data(
                nrf,
                RelationData::from([("url".to_string(), "http://1.1.1.1".to_string())]),
            )
            .unwrap();

        assert_eq!(operator.status().status, UnitStatus::waiting(MSG_CONTAINER_NOT_READY));
        assert!(!operator.deferred().is_empty());
    }
}
