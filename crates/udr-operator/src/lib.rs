//! # UDR Operator
//!
//! Lifecycle operator for the 5G UDR network function.
//! Watches the database and NRF relations, renders `udrcfg.conf` into the
//! workload container and keeps the UDR process plan applied.

pub mod error;
pub mod events;
pub mod host;
pub mod operator;
pub mod plan;
pub mod reconciler;
pub mod relations;
pub mod service;
pub mod status;
pub mod udrcfg;
pub mod workload;

pub use error::*;
pub use events::*;
pub use host::*;
pub use operator::*;
pub use plan::*;
pub use reconciler::*;
pub use relations::*;
pub use service::*;
pub use status::*;
pub use udrcfg::*;
pub use workload::*;

use serde::{Deserialize, Serialize};

/// Operator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    /// Application name, also the Kubernetes service name
    pub app_name: String,
    /// Model name, also the Kubernetes namespace
    pub model_name: String,
    pub container_name: String,
    pub service_name: String,
    pub config_dir: String,
    pub config_file_name: String,
    pub database_name: String,
    pub database_extra_user_roles: String,
    pub binary_path: String,
    pub sbi_port: u16,
    pub sbi_port_name: String,
    pub layer_label: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            app_name: "udr".to_string(),
            model_name: "default".to_string(),
            container_name: "udr".to_string(),
            service_name: "udr".to_string(),
            config_dir: "/etc/udr".to_string(),
            config_file_name: "udrcfg.conf".to_string(),
            database_name: "free5gc".to_string(),
            database_extra_user_roles: "admin".to_string(),
            binary_path: "/free5gc/udr/udr".to_string(),
            sbi_port: 29504,
            sbi_port_name: "sbi".to_string(),
            layer_label: "udr".to_string(),
        }
    }
}

impl OperatorConfig {
    /// Absolute path of the rendered config file inside the workload
    pub fn config_path(&self) -> String {
        format!("{}/{}", self.config_dir.trim_end_matches('/'), self.config_file_name)
    }

    /// Cluster-internal hostname the UDR registers with the NRF
    pub fn hostname(&self) -> String {
        format!("{}.{}.svc.cluster.local", self.app_name, self.model_name)
    }

    /// Command line of the managed UDR process
    pub fn command(&self) -> String {
        format!("{} --udrcfg {}", self.binary_path, self.config_path())
    }
}
