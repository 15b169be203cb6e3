//! # Kubernetes Service patch
//!
//! Advertises the UDR SBI port on the application's Kubernetes service

use crate::error::Result;
use crate::OperatorConfig;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::info;

pub const FIELD_MANAGER: &str = "udr-operator";

/// Desired ports of the application service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdrServicePatch {
    pub app_name: String,
    pub namespace: String,
    /// (name, port) pairs
    pub ports: Vec<(String, u16)>,
}

impl UdrServicePatch {
    pub fn from_config(config: &OperatorConfig) -> Self {
        Self {
            app_name: config.app_name.clone(),
            namespace: config.model_name.clone(),
            ports: vec![(config.sbi_port_name.clone(), config.sbi_port)],
        }
    }

    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("app.kubernetes.io/name".to_string(), self.app_name.clone())])
    }

    /// Service object to apply
    pub fn service(&self) -> Service {
        let ports = self
            .ports
            .iter()
            .map(|(name, port)| ServicePort {
                name: Some(name.clone()),
                port: i32::from(*port),
                target_port: Some(IntOrString::Int(i32::from(*port))),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            })
            .collect();

        Service {
            metadata: ObjectMeta {
                name: Some(self.app_name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(self.labels()),
                ports: Some(ports),
                type_: Some("ClusterIP".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Server-side apply the service
    pub async fn apply(&self, client: Client) -> Result<Service> {
        let api: Api<Service> = Api::namespaced(client, &self.namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let service = api
            .patch(&self.app_name, &params, &Patch::Apply(&self.service()))
            .await?;
        info!(
            "Patched service {}/{} with ports {:?}",
            self.namespace, self.app_name, self.ports
        );
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_exposes_sbi_port() {
        let config = OperatorConfig {
            app_name: "udr-operator".to_string(),
            model_name: "ns".to_string(),
            ..Default::default()
        };
        let service = UdrServicePatch::from_config(&config).service();

        assert_eq!(service.metadata.name.as_deref(), Some("udr-operator"));
        assert_eq!(service.metadata.namespace.as_deref(), Some("ns"));

        let spec = service.spec.unwrap();
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name.as_deref(), Some("sbi"));
        assert_eq!(ports[0].port, 29504);
        assert_eq!(
            spec.selector.unwrap().get("app.kubernetes.io/name"),
            Some(&"udr-operator".to_string())
        );
    }

    #[test]
    fn test_service_serializes_with_type_meta() {
        let service = UdrServicePatch::from_config(&OperatorConfig::default()).service();
        let json = serde_json::to_value(&service).unwrap();
        assert_eq!(json["apiVersion"], "v1");
        assert_eq!(json["kind"], "Service");
    }
}
