//! # Reconciler
//!
//! Side-effect-free decision logic. Given a snapshot of relation and workload
//! state, decide the unit status and which side effects to perform.

use crate::events::TriggerEvent;
use crate::relations::{DatabaseData, RelationState};
use crate::status::UnitStatus;
use crate::udrcfg::{ConfigInputs, UdrConfig};
use crate::OperatorConfig;
use tracing::debug;

pub const MSG_NO_DATABASE_RELATION: &str = "Waiting for database relation to be created";
pub const MSG_NO_NRF_RELATION: &str = "Waiting for NRF relation to be created";
pub const MSG_DATABASE_NOT_READY: &str = "Waiting for database to be ready";
pub const MSG_NRF_NOT_READY: &str = "Waiting for NRF data to be available";
pub const MSG_CONTAINER_NOT_READY: &str = "Waiting for container to be ready";

/// Inputs observed at the start of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileState {
    pub database: RelationState<DatabaseData>,
    pub nrf: RelationState<String>,
    pub container_reachable: bool,
    /// Only meaningful when the container is reachable
    pub config_file_present: bool,
}

/// Side effect requested by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    WriteConfig { path: String, config: UdrConfig },
    /// Submit the UDR layer; the pod IP is resolved when the layer is built
    ApplyLayer { label: String, combine: bool },
    Replan,
}

/// Outcome of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub status: UnitStatus,
    pub actions: Vec<Action>,
    /// Re-queue the triggering event
    pub defer: bool,
}

impl Decision {
    fn status(status: UnitStatus) -> Self {
        Self {
            status,
            actions: Vec::new(),
            defer: false,
        }
    }

    pub fn writes_config(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a, Action::WriteConfig { .. }))
    }
}

/// Evaluate the guard cascade. The first unmet precondition decides the status.
pub fn reconcile(trigger: &TriggerEvent, state: &ReconcileState, config: &OperatorConfig) -> Decision {
    debug!("Evaluating reconciliation for {}", trigger);

    if !state.database.is_established() {
        return Decision::status(UnitStatus::blocked(MSG_NO_DATABASE_RELATION));
    }
    if !state.nrf.is_established() {
        return Decision::status(UnitStatus::blocked(MSG_NO_NRF_RELATION));
    }
    let Some(database) = state.database.ready() else {
        return Decision::status(UnitStatus::waiting(MSG_DATABASE_NOT_READY));
    };
    let Some(nrf_url) = state.nrf.ready() else {
        return Decision::status(UnitStatus::waiting(MSG_NRF_NOT_READY));
    };
    if !state.container_reachable {
        return Decision {
            defer: true,
            ..Decision::status(UnitStatus::waiting(MSG_CONTAINER_NOT_READY))
        };
    }

    let mut actions = Vec::with_capacity(3);
    if !state.config_file_present {
        let inputs = ConfigInputs {
            database_name: config.database_name.clone(),
            database_url: database.primary_uri().to_string(),
            nrf_url: nrf_url.clone(),
            hostname: config.hostname(),
            sbi_port: config.sbi_port,
        };
        actions.push(Action::WriteConfig {
            path: config.config_path(),
            config: UdrConfig::new(&inputs),
        });
    }
    actions.push(Action::ApplyLayer {
        label: config.layer_label.clone(),
        combine: true,
    });
    actions.push(Action::Replan);

    Decision {
        status: UnitStatus::Active,
        actions,
        defer: false,
    }
}
