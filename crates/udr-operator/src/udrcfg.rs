//! # UDR configuration file
//!
//! Document model of `udrcfg.conf`, rendered as YAML. Everything except the
//! database URL, the NRF URL and the registered hostname is fixed.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SBI_BINDING_IPV4: &str = "0.0.0.0";
pub const SBI_SCHEME: &str = "http";

/// Subsystems that get a logger entry in the rendered file
pub const LOGGER_SUBSYSTEMS: [&str; 22] = [
    "AMF",
    "AUSF",
    "Aper",
    "CommonConsumerTest",
    "FSM",
    "MongoDBLibrary",
    "N3IWF",
    "NAS",
    "NGAP",
    "NRF",
    "NamfComm",
    "NamfEventExposure",
    "NsmfPDUSession",
    "NudrDataRepository",
    "OpenApi",
    "PCF",
    "PFCP",
    "PathUtil",
    "SMF",
    "UDM",
    "UDR",
    "WEBUI",
];

/// PLMN identities served by the UDR, as (mcc, mnc)
pub const PLMN_SUPPORT_LIST: [(&str, &str); 2] = [("208", "93"), ("333", "88")];

/// Values the rendered file depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigInputs {
    pub database_name: String,
    pub database_url: String,
    pub nrf_url: String,
    pub hostname: String,
    pub sbi_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdrConfig {
    pub configuration: Configuration,
    pub info: Info,
    pub logger: BTreeMap<String, LoggerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub mongodb: MongoDb,
    pub nrf_uri: String,
    pub plmn_support_list: Vec<PlmnSupport>,
    pub sbi: Sbi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoDb {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlmnSupport {
    pub plmn_id: PlmnId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlmnId {
    pub mcc: String,
    pub mnc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sbi {
    #[serde(rename = "bindingIPv4")]
    pub binding_ipv4: String,
    pub port: u16,
    #[serde(rename = "registerIPv4")]
    pub register_ipv4: String,
    pub scheme: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerEntry {
    #[serde(rename = "ReportCaller")]
    pub report_caller: bool,
    #[serde(rename = "debugLevel")]
    pub debug_level: String,
}

impl Default for LoggerEntry {
    fn default() -> Self {
        Self {
            report_caller: false,
            debug_level: "info".to_string(),
        }
    }
}

impl UdrConfig {
    pub fn new(inputs: &ConfigInputs) -> Self {
        let plmn_support_list = PLMN_SUPPORT_LIST
            .iter()
            .map(|(mcc, mnc)| PlmnSupport {
                plmn_id: PlmnId {
                    mcc: mcc.to_string(),
                    mnc: mnc.to_string(),
                },
            })
            .collect();

        let logger = LOGGER_SUBSYSTEMS
            .iter()
            .map(|name| (name.to_string(), LoggerEntry::default()))
            .collect();

        Self {
            configuration: Configuration {
                mongodb: MongoDb {
                    name: inputs.database_name.clone(),
                    url: inputs.database_url.clone(),
                },
                nrf_uri: inputs.nrf_url.clone(),
                plmn_support_list,
                sbi: Sbi {
                    binding_ipv4: SBI_BINDING_IPV4.to_string(),
                    port: inputs.sbi_port,
                    register_ipv4: inputs.hostname.clone(),
                    scheme: SBI_SCHEME.to_string(),
                },
            },
            info: Info {
                description: "UDR initial local configuration".to_string(),
                version: "1.0.0".to_string(),
            },
            logger,
        }
    }

    pub fn render(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
