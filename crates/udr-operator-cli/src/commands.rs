//! CLI commands

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::info;
use udr_operator::{
    plan::udr_layer, ConfigInputs, DeferredQueue, LocalWorkload, NrfRequires, OperatorConfig,
    PodIpSource, StaticPodIp, StatusRecord, TriggerEvent, UdrConfig, UdrOperator,
    UdrServicePatch, UnitGetPodIp, UnitModel, UnitStatus, NRF_RELATION,
};

#[derive(Parser, Debug)]
#[command(name = "udr-operator")]
#[command(about = "Lifecycle operator for the 5G UDR network function")]
#[command(version)]
pub struct Cli {
    /// Application name
    #[arg(long, env = "UDR_APP_NAME", default_value = "udr", global = true)]
    pub app_name: String,

    /// Model name (Kubernetes namespace)
    #[arg(long, env = "UDR_MODEL_NAME", default_value = "default", global = true)]
    pub model_name: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the UDR configuration file
    RenderConfig {
        /// NRF URL
        #[arg(long)]
        nrf_url: String,

        /// Comma-separated database connection strings
        #[arg(long)]
        database_uris: String,

        /// Registered hostname, defaults to the service hostname
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Print the UDR process layer
    Plan {
        /// Pod IP placed into the process environment
        #[arg(long)]
        pod_ip: Ipv4Addr,
    },

    /// Deliver one event against a filesystem-backed workload.
    /// Exits non-zero when the unit ends up blocked or waiting.
    Reconcile {
        /// Unit state file (JSON)
        #[arg(long)]
        state: PathBuf,

        /// Workload root directory
        #[arg(long)]
        root: PathBuf,

        /// Event to deliver
        #[arg(long, value_enum, default_value = "pebble-ready")]
        event: EventKind,

        /// Relation the event refers to
        #[arg(long)]
        relation_id: Option<u32>,

        /// Use a fixed pod IP instead of `unit-get private-address`
        #[arg(long)]
        pod_ip: Option<Ipv4Addr>,

        /// Print the service instead of applying it to the cluster
        #[arg(long)]
        no_kube: bool,
    },

    /// Apply the service patch to the current Kubernetes context
    PatchService,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Install,
    Upgrade,
    PebbleReady,
    NrfRelationCreated,
    NrfAvailable,
    DatabaseRelationJoined,
    DatabaseCreated,
    RelationChanged,
}

/// Persisted host state consumed and updated by `reconcile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostState {
    pub unit: UnitModel,
    #[serde(default)]
    pub deferred: DeferredQueue,
}

impl HostState {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading state file {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing state file {}", path.display()))
    }
}

#[derive(Debug, Serialize)]
struct ReconcileReport<'a> {
    status: &'a StatusRecord,
    deferred: Vec<String>,
}

/// Command execution result
#[derive(Debug)]
pub struct CommandResult {
    /// False when a reconcile left the unit blocked or waiting
    pub success: bool,
    pub output: String,
}

impl CommandResult {
    fn ok(output: String) -> Self {
        Self {
            success: true,
            output,
        }
    }
}

pub struct CommandExecutor {
    config: OperatorConfig,
}

impl CommandExecutor {
    pub fn new(cli: &Cli) -> Self {
        Self {
            config: OperatorConfig {
                app_name: cli.app_name.clone(),
                model_name: cli.model_name.clone(),
                ..Default::default()
            },
        }
    }

    pub async fn execute(&self, command: Commands) -> Result<CommandResult> {
        match command {
            Commands::RenderConfig {
                nrf_url,
                database_uris,
                hostname,
            } => self.render_config(&nrf_url, &database_uris, hostname),
            Commands::Plan { pod_ip } => {
                let layer = udr_layer(&self.config, pod_ip);
                Ok(CommandResult::ok(layer.to_yaml()?))
            }
            Commands::Reconcile {
                state,
                root,
                event,
                relation_id,
                pod_ip,
                no_kube,
            } => {
                let pod_ip: Box<dyn PodIpSource> = match pod_ip {
                    Some(ip) => Box::new(StaticPodIp(ip)),
                    None => Box::new(UnitGetPodIp::new()),
                };
                self.reconcile(&state, &root, event, relation_id, pod_ip, no_kube)
                    .await
            }
            Commands::PatchService => {
                let client = kube::Client::try_default()
                    .await
                    .context("connecting to Kubernetes")?;
                let service = UdrServicePatch::from_config(&self.config)
                    .apply(client)
                    .await?;
                Ok(CommandResult::ok(serde_json::to_string_pretty(&service)?))
            }
        }
    }

    fn render_config(
        &self,
        nrf_url: &str,
        database_uris: &str,
        hostname: Option<String>,
    ) -> Result<CommandResult> {
        let database_url = database_uris
            .split(',')
            .next()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| anyhow!("--database-uris must contain at least one URI"))?;

        let inputs = ConfigInputs {
            database_name: self.config.database_name.clone(),
            database_url: database_url.to_string(),
            nrf_url: nrf_url.to_string(),
            hostname: hostname.unwrap_or_else(|| self.config.hostname()),
            sbi_port: self.config.sbi_port,
        };
        Ok(CommandResult::ok(UdrConfig::new(&inputs).render()?))
    }

    async fn reconcile(
        &self,
        state_path: &Path,
        root: &Path,
        kind: EventKind,
        relation_id: Option<u32>,
        pod_ip: Box<dyn PodIpSource>,
        no_kube: bool,
    ) -> Result<CommandResult> {
        let state = HostState::load(state_path)?;
        let config = OperatorConfig {
            app_name: state.unit.app_name.clone(),
            model_name: state.unit.model_name.clone(),
            ..self.config.clone()
        };
        let event = build_event(kind, relation_id, &state.unit)?;
        info!("Delivering {} to {}", event, root.display());

        let workload = LocalWorkload::new(&config.container_name, root);
        let mut operator = UdrOperator::with_model(config, state.unit, workload, pod_ip);
        operator.set_deferred(state.deferred);
        operator.emit(event)?;

        let mut output = String::new();
        if let Some(patch) = operator.take_service_patch() {
            if no_kube {
                output.push_str(&serde_yaml::to_string(&patch.service())?);
            } else {
                let client = kube::Client::try_default()
                    .await
                    .context("connecting to Kubernetes")?;
                patch.apply(client).await?;
            }
        }

        let report = ReconcileReport {
            status: operator.status(),
            deferred: operator.deferred().iter().map(|e| e.to_string()).collect(),
        };
        output.push_str(&serde_json::to_string_pretty(&report)?);

        HostState {
            unit: operator.model().clone(),
            deferred: operator.deferred().clone(),
        }
        .save(state_path)?;

        let settled = !matches!(
            operator.status().status,
            UnitStatus::Blocked(_) | UnitStatus::Waiting(_)
        );
        Ok(CommandResult {
            success: settled,
            output,
        })
    }
}

fn build_event(kind: EventKind, relation_id: Option<u32>, unit: &UnitModel) -> Result<TriggerEvent> {
    let relation = || relation_id.ok_or_else(|| anyhow!("--relation-id is required for this event"));
    Ok(match kind {
        EventKind::Install => TriggerEvent::Install,
        EventKind::Upgrade => TriggerEvent::Upgrade,
        EventKind::PebbleReady => TriggerEvent::PebbleReady,
        EventKind::NrfRelationCreated => TriggerEvent::NrfRelationCreated {
            relation_id: relation()?,
        },
        EventKind::NrfAvailable => TriggerEvent::NrfAvailable {
            url: NrfRequires::new(NRF_RELATION)
                .get_nrf_url(unit)
                .unwrap_or_default(),
        },
        EventKind::DatabaseRelationJoined => TriggerEvent::DatabaseRelationJoined {
            relation_id: relation()?,
        },
        EventKind::DatabaseCreated => TriggerEvent::DatabaseCreated {
            relation_id: relation()?,
        },
        EventKind::RelationChanged => TriggerEvent::RelationChanged {
            relation_id: relation()?,
        },
    })
}
