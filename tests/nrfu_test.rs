use anta::app::{execute, EXIT_OK, EXIT_TESTS_ERROR, EXIT_TESTS_FAILED};
use anta::domain::model::TestStatus;
use anta::{run, AntaCatalog, AntaInventory, Cli, DeviceSettings, Proto, ResultManager, RunOptions};
use anyhow::Result;
use clap::Parser;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

const CATALOG: &str = r#"
[["anta.tests.configuration"]]
VerifyZeroTouch = {}

[["anta.tests.security"]]
VerifyTelnetStatus = { filters = { tags = ["spine"] } }

[["anta.tests.security"]]
VerifyAPIHttpStatus = { result_overwrite = { custom_field = "eAPI" } }
"#;

fn eapi_result(result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": "leaf1-0", "result": [result]})
}

/// Mocks an EOS device answering `show version`, ZTP disabled and the
/// eAPI HTTP server enabled.
fn mock_device(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show version");
        then.status(200)
            .json_body(eapi_result(json!({"modelName": "cEOSLab", "version": "4.31.1F"})));
    });
    server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show zerotouch");
        then.status(200).json_body(eapi_result(json!({"mode": "disabled"})));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/command-api")
            .body_contains("show management api http-commands");
        then.status(200).json_body(eapi_result(json!({
            "enabled": true,
            "httpServer": {"running": true, "port": 80}
        })));
    });
}

fn write_files(dir: &Path, server: &MockServer) -> Result<()> {
    std::fs::write(
        dir.join("inventory.toml"),
        format!(
            r#"
[anta_inventory]
[[anta_inventory.hosts]]
host = "127.0.0.1"
name = "leaf1"
port = {}
tags = ["leaf"]
"#,
            server.port()
        ),
    )?;
    std::fs::write(dir.join("catalog.toml"), CATALOG)?;
    Ok(())
}

#[tokio::test]
async fn test_run_catalog_against_mocked_device() -> Result<()> {
    let server = MockServer::start();
    mock_device(&server);
    let dir = TempDir::new()?;
    write_files(dir.path(), &server)?;

    let settings = DeviceSettings {
        username: "admin".to_string(),
        password: "admin".to_string(),
        proto: Proto::Http,
        ..DeviceSettings::default()
    };
    let inventory = AntaInventory::parse(dir.path().join("inventory.toml"), &settings)?;
    let catalog = AntaCatalog::parse(dir.path().join("catalog.toml"))?;
    assert_eq!(catalog.len(), 3);

    let mut manager = ResultManager::new();
    run(&mut manager, &inventory, &catalog, &RunOptions::default()).await;

    let results: Vec<(&str, TestStatus)> = manager
        .results()
        .iter()
        .map(|r| (r.test.as_str(), r.result))
        .collect();
    assert_eq!(
        results,
        vec![
            ("VerifyZeroTouch", TestStatus::Success),
            ("VerifyAPIHttpStatus", TestStatus::Failure),
        ]
    );
    assert_eq!(manager.results()[1].custom_field.as_deref(), Some("eAPI"));
    assert_eq!(manager.get_status(false), TestStatus::Failure);
    Ok(())
}

fn cli(dir: &Path, server_args: &[&str]) -> Result<Cli> {
    let inventory = dir.join("inventory.toml");
    let catalog = dir.join("catalog.toml");
    let mut args = vec![
        "anta".to_string(),
        "-i".to_string(),
        inventory.to_string_lossy().into_owned(),
        "-u".to_string(),
        "admin".to_string(),
        "-p".to_string(),
        "admin".to_string(),
        "--proto".to_string(),
        "http".to_string(),
        "nrfu".to_string(),
        "-c".to_string(),
        catalog.to_string_lossy().into_owned(),
    ];
    args.extend(server_args.iter().map(|a| a.to_string()));
    Ok(Cli::try_parse_from(args)?)
}

#[tokio::test]
async fn test_nrfu_exit_codes() -> Result<()> {
    let server = MockServer::start();
    mock_device(&server);
    let dir = TempDir::new()?;
    write_files(dir.path(), &server)?;

    assert_eq!(execute(cli(dir.path(), &["text"])?).await?, EXIT_TESTS_FAILED);
    assert_eq!(execute(cli(dir.path(), &["--ignore-status", "text"])?).await?, EXIT_OK);
    assert_eq!(
        execute(cli(dir.path(), &["--test", "VerifyZeroTouch", "text"])?).await?,
        EXIT_OK
    );
    Ok(())
}

#[tokio::test]
async fn test_nrfu_errors_take_precedence() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show version");
        then.status(200).json_body(eapi_result(json!({"modelName": "cEOSLab"})));
    });
    server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show zerotouch");
        then.status(200).json_body(eapi_result(json!({"unexpected": "output"})));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/command-api")
            .body_contains("show management api http-commands");
        then.status(200).json_body(eapi_result(json!({
            "enabled": true,
            "httpServer": {"running": true}
        })));
    });
    let dir = TempDir::new()?;
    write_files(dir.path(), &server)?;

    assert_eq!(execute(cli(dir.path(), &["text"])?).await?, EXIT_TESTS_ERROR);
    assert_eq!(
        execute(cli(dir.path(), &["--ignore-error", "text"])?).await?,
        EXIT_TESTS_FAILED
    );
    Ok(())
}

#[tokio::test]
async fn test_nrfu_saves_reports() -> Result<()> {
    let server = MockServer::start();
    mock_device(&server);
    let dir = TempDir::new()?;
    write_files(dir.path(), &server)?;

    let csv_path = dir.path().join("reports/results.csv");
    let csv_arg = csv_path.to_string_lossy().into_owned();
    execute(cli(dir.path(), &["csv", "--csv-output", &csv_arg])?).await?;
    let csv = std::fs::read_to_string(&csv_path)?;
    assert!(csv.starts_with("Device,Test Name,Test Status,Message(s),Test description,Test category\n"));
    assert!(csv.contains("leaf1,VerifyAPIHttpStatus,failure,eAPI HTTP server is enabled globally"));

    let json_path = dir.path().join("results.json");
    let json_arg = json_path.to_string_lossy().into_owned();
    execute(cli(dir.path(), &["--hide", "failure", "json", "--output", &json_arg])?).await?;
    let results: Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(results.as_array().map(Vec::len), Some(1));
    assert_eq!(results[0]["test"], "VerifyZeroTouch");
    Ok(())
}

#[tokio::test]
async fn test_check_catalog_rejects_invalid_inputs() -> Result<()> {
    let dir = TempDir::new()?;
    let catalog = dir.path().join("catalog.toml");
    std::fs::write(&catalog, "[[anta.tests.stp]]\nVerifySTPMode = { mode = \"pvst\" }\n")?;
    let catalog_arg = catalog.to_string_lossy().into_owned();

    let cli = Cli::try_parse_from(["anta", "check", "catalog", "-c", catalog_arg.as_str()])?;
    let err = execute(cli).await.unwrap_err();
    assert!(err.to_string().starts_with("VerifySTPMode test inputs are not valid"));
    assert_eq!(err.exit_code(), 1);

    std::fs::write(&catalog, CATALOG)?;
    let cli = Cli::try_parse_from(["anta", "check", "catalog", "-c", catalog_arg.as_str()])?;
    assert_eq!(execute(cli).await?, EXIT_OK);
    Ok(())
}
