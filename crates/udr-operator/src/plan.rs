//! # Process plan
//!
//! Declarative layers submitted to the workload's process supervisor, and the
//! merged plan they produce.

use crate::error::Result;
use crate::OperatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    #[default]
    Replace,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    #[default]
    Enabled,
    Disabled,
}

/// A service entry of a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceSpec {
    #[serde(rename = "override")]
    pub override_: Override,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub startup: Startup,
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl ServiceSpec {
    fn merge_from(&mut self, other: &ServiceSpec) {
        match other.override_ {
            Override::Replace => *self = other.clone(),
            Override::Merge => {
                if !other.summary.is_empty() {
                    self.summary = other.summary.clone();
                }
                if !other.command.is_empty() {
                    self.command = other.command.clone();
                }
                self.startup = other.startup;
                self.environment.extend(other.environment.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

impl Layer {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Ordered, labelled layers held by the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LayerStack {
    layers: Vec<(String, Layer)>,
}

impl LayerStack {
    /// Add a layer. With `combine`, an existing layer with the same label is
    /// merged into; otherwise the layer is appended.
    pub fn add(&mut self, label: &str, layer: &Layer, combine: bool) {
        if combine {
            if let Some((_, existing)) = self.layers.iter_mut().find(|(l, _)| l == label) {
                if !layer.summary.is_empty() {
                    existing.summary = layer.summary.clone();
                }
                if !layer.description.is_empty() {
                    existing.description = layer.description.clone();
                }
                for (name, service) in &layer.services {
                    existing
                        .services
                        .entry(name.clone())
                        .or_default()
                        .merge_from(service);
                }
                return;
            }
        }
        self.layers.push((label.to_string(), layer.clone()));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Effective plan: all layers merged in order
    pub fn plan(&self) -> Plan {
        let mut services: BTreeMap<String, ServiceSpec> = BTreeMap::new();
        for (_, layer) in &self.layers {
            for (name, service) in &layer.services {
                services.entry(name.clone()).or_default().merge_from(service);
            }
        }
        Plan { services }
    }
}

/// Merged view of every layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Plan {
    pub services: BTreeMap<String, ServiceSpec>,
}

/// Environment of the UDR process
pub fn udr_environment(pod_ip: Ipv4Addr) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("GRPC_GO_LOG_VERBOSITY_LEVEL".to_string(), "99".to_string()),
        ("GRPC_GO_LOG_SEVERITY_LEVEL".to_string(), "info".to_string()),
        ("GRPC_TRACE".to_string(), "all".to_string()),
        ("GRPC_VERBOSITY".to_string(), "debug".to_string()),
        ("POD_IP".to_string(), pod_ip.to_string()),
        ("MANAGED_BY_CONFIG_POD".to_string(), "true".to_string()),
    ])
}

/// Layer describing the UDR service
pub fn udr_layer(config: &OperatorConfig, pod_ip: Ipv4Addr) -> Layer {
    let service = ServiceSpec {
        override_: Override::Replace,
        summary: String::new(),
        startup: Startup::Enabled,
        command: config.command(),
        environment: udr_environment(pod_ip),
    };

    Layer {
        summary: "udr layer".to_string(),
        description: "pebble config layer for udr".to_string(),
        services: BTreeMap::from([(config.service_name.clone(), service)]),
    }
}
