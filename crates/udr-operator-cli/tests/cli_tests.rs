//! Tests for the udr-operator-cli crate

use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use udr_operator::{RelationData, UdrConfig, UnitModel, DATABASE_RELATION, NRF_RELATION};
use udr_operator_cli::{Cli, CommandExecutor, Commands, EventKind, HostState};

#[test]
fn test_cli_parsing_render_config() {
    let args = vec![
        "udr-operator",
        "render-config",
        "--nrf-url",
        "http://1.1.1.1",
        "--database-uris",
        "http://2.2.2.2,http://3.3.3.3",
    ];
    let cli = Cli::try_parse_from(args).unwrap();

    match cli.command {
        Commands::RenderConfig { nrf_url, database_uris, hostname } => {
            assert_eq!(nrf_url, "http://1.1.1.1");
            assert_eq!(database_uris, "http://2.2.2.2,http://3.3.3.3");
            assert_eq!(hostname, None);
        }
        _ => panic!("Expected RenderConfig command"),
    }
}

#[test]
fn test_cli_parsing_reconcile_defaults() {
    let args = vec![
        "udr-operator",
        "--model-name",
        "ns",
        "reconcile",
        "--state",
        "unit.json",
        "--root",
        "/tmp/udr",
    ];
    let cli = Cli::try_parse_from(args).unwrap();
    assert_eq!(cli.model_name, "ns");

    match cli.command {
        Commands::Reconcile { state, root, event, relation_id, pod_ip, no_kube } => {
            assert_eq!(state, PathBuf::from("unit.json"));
            assert_eq!(root, PathBuf::from("/tmp/udr"));
            assert_eq!(event, EventKind::PebbleReady);
            assert_eq!(relation_id, None);
            assert_eq!(pod_ip, None);
            assert!(!no_kube);
        }
        _ => panic!("Expected Reconcile command"),
    }
}

#[test]
fn test_cli_parsing_rejects_bad_pod_ip() {
    let args = vec!["udr-operator", "plan", "--pod-ip", "not-an-ip"];
    assert!(Cli::try_parse_from(args).is_err());
}

#[tokio::test]
async fn test_render_config_uses_first_uri() {
    let cli = Cli::try_parse_from(vec![
        "udr-operator",
        "--app-name",
        "udr-operator",
        "--model-name",
        "ns",
        "render-config",
        "--nrf-url",
        "http://1.1.1.1",
        "--database-uris",
        "http://2.2.2.2,http://3.3.3.3",
    ])
    .unwrap();
    let executor = CommandExecutor::new(&cli);
    let result = executor.execute(cli.command).await.unwrap();

    let config = UdrConfig::parse(&result.output).unwrap();
    assert_eq!(config.configuration.nrf_uri, "http://1.1.1.1");
    assert_eq!(config.configuration.mongodb.url, "http://2.2.2.2");
    assert_eq!(config.configuration.sbi.register_ipv4, "udr-operator.ns.svc.cluster.local");
}

#[tokio::test]
async fn test_plan_prints_layer() {
    let cli = Cli::try_parse_from(vec!["udr-operator", "plan", "--pod-ip", "10.0.0.9"]).unwrap();
    let executor = CommandExecutor::new(&cli);
    let result = executor.execute(cli.command).await.unwrap();

    assert!(result.success);
    assert!(result.output.contains("POD_IP: 10.0.0.9"));
    assert!(result.output.contains("--udrcfg /etc/udr/udrcfg.conf"));
}

#[tokio::test]
async fn test_reconcile_writes_config_and_updates_state() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("workload");
    std::fs::create_dir_all(&root).unwrap();
    let state_path = dir.path().join("unit.json");

    let mut unit = UnitModel::new("udr", "ns");
    unit.leader = true;
    let db = unit.add_relation(DATABASE_RELATION, "mongodb");
    unit.update_remote_app_data(
        db,
        RelationData::from([
            ("username".to_string(), "u".to_string()),
            ("password".to_string(), "p".to_string()),
            ("uris".to_string(), "mongodb://db:27017".to_string()),
        ]),
    )
    .unwrap();
    let nrf = unit.add_relation(NRF_RELATION, "nrf");
    unit.update_remote_app_data(nrf, [("url", "http://nrf:29510")]).unwrap();
    HostState { unit, deferred: Default::default() }
        .save(&state_path)
        .unwrap();

    let cli = Cli::try_parse_from(vec![
        "udr-operator".to_string(),
        "reconcile".to_string(),
        "--state".to_string(),
        state_path.display().to_string(),
        "--root".to_string(),
        root.display().to_string(),
        "--pod-ip".to_string(),
        Ipv4Addr::new(10, 0, 0, 2).to_string(),
    ])
    .unwrap();
    let executor = CommandExecutor::new(&cli);
    let result = executor.execute(cli.command).await.unwrap();

    let report: serde_json::Value = serde_json::from_str(&result.output).unwrap();
    assert!(result.success);
    assert_eq!(report["status"]["status"]["name"], "active");
    assert!(root.join("etc/udr/udrcfg.conf").is_file());
    assert!(HostState::load(&state_path).unwrap().deferred.is_empty());
}

#[tokio::test]
async fn test_reconcile_defers_when_workload_root_missing() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("unit.json");

    let mut unit = UnitModel::new("udr", "ns");
    let db = unit.add_relation(DATABASE_RELATION, "mongodb");
    unit.update_remote_app_data(db, [("username", "u"), ("password", "p"), ("uris", "mongodb://db")])
        .unwrap();
    let nrf = unit.add_relation(NRF_RELATION, "nrf");
    unit.update_remote_app_data(nrf, [("url", "http://nrf:29510")]).unwrap();
    HostState { unit, deferred: Default::default() }
        .save(&state_path)
        .unwrap();

    let cli = Cli::try_parse_from(vec![
        "udr-operator".to_string(),
        "reconcile".to_string(),
        "--state".to_string(),
        state_path.display().to_string(),
        "--root".to_string(),
        dir.path().join("missing").display().to_string(),
        "--pod-ip".to_string(),
        "10.0.0.2".to_string(),
    ])
    .unwrap();
    let executor = CommandExecutor::new(&cli);
    let result = executor.execute(cli.command).await.unwrap();

    let report: serde_json::Value = serde_json::from_str(&result.output).unwrap();
    assert!(!result.success);
    assert_eq!(report["status"]["status"]["name"], "waiting");
    assert_eq!(report["deferred"][0], "udr-pebble-ready");
    assert_eq!(HostState::load(&state_path).unwrap().deferred.len(), 1);
}
