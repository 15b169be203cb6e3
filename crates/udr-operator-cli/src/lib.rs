//! # UDR Operator CLI Library
//!
//! Command-line front-end: render the UDR config and process layer, deliver
//! events against a local workload, patch the Kubernetes service.

pub mod commands;

pub use commands::*;
