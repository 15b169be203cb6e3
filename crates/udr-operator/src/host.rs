//! Host network metadata

use crate::error::{OperatorError, Result};
use std::net::Ipv4Addr;
use std::process::Command;
use tracing::debug;

/// Source of the pod's IP address
pub trait PodIpSource {
    fn pod_ip(&self) -> Result<Ipv4Addr>;
}

/// Reads the address with `unit-get private-address`
#[derive(Debug, Clone)]
pub struct UnitGetPodIp {
    program: String,
}

impl UnitGetPodIp {
    pub fn new() -> Self {
        Self::with_program("unit-get")
    }

    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl Default for UnitGetPodIp {
    fn default() -> Self {
        Self::new()
    }
}

impl PodIpSource for UnitGetPodIp {
    fn pod_ip(&self) -> Result<Ipv4Addr> {
        let output = Command::new(&self.program)
            .arg("private-address")
            .output()
            .map_err(|e| OperatorError::PodIp(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(OperatorError::PodIp(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let address = parse_pod_ip(&String::from_utf8_lossy(&output.stdout))?;
        debug!("Resolved pod IP {}", address);
        Ok(address)
    }
}

impl<T: PodIpSource + ?Sized> PodIpSource for Box<T> {
    fn pod_ip(&self) -> Result<Ipv4Addr> {
        (**self).pod_ip()
    }
}

/// Fixed address, for tests and offline runs
#[derive(Debug, Clone, Copy)]
pub struct StaticPodIp(pub Ipv4Addr);

impl PodIpSource for StaticPodIp {
    fn pod_ip(&self) -> Result<Ipv4Addr> {
        Ok(self.0)
    }
}

pub fn parse_pod_ip(raw: &str) -> Result<Ipv4Addr> {
    let trimmed = raw.trim();
    trimmed
        .parse()
        .map_err(|e| OperatorError::PodIp(format!("invalid address {:?}: {}", trimmed, e)))
}
