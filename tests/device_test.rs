use anta::domain::model::{AntaCommand, ApiVersion};
use anta::domain::ports::EosDevice;
use anta::{AsyncEosDevice, DeviceSettings, Proto};
use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;

fn settings() -> DeviceSettings {
    DeviceSettings {
        username: "admin".to_string(),
        password: "arista".to_string(),
        proto: Proto::Http,
        ..DeviceSettings::default()
    }
}

fn device(server: &MockServer, settings: &DeviceSettings) -> Result<AsyncEosDevice> {
    Ok(AsyncEosDevice::new(
        "127.0.0.1",
        Some("leaf1".to_string()),
        Some(server.port()),
        vec!["leaf".to_string()],
        settings,
        false,
    )?)
}

fn show_version(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/command-api")
            .header_exists("authorization")
            .body_contains("show version");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "leaf1-0",
            "result": [{"modelName": "DCS-7280CR3-32P4", "version": "4.31.1F"}]
        }));
    })
}

#[tokio::test]
async fn test_refresh_establishes_device() -> Result<()> {
    let server = MockServer::start();
    let mock = show_version(&server);
    let device = device(&server, &settings())?;

    assert!(!device.established());
    device.refresh().await;

    mock.assert();
    assert!(device.is_online());
    assert!(device.established());
    assert_eq!(device.hw_model().as_deref(), Some("DCS-7280CR3-32P4"));
    assert!(device.tags().contains("leaf1"));
    Ok(())
}

#[tokio::test]
async fn test_refresh_without_model_is_not_established() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/command-api");
        then.status(200)
            .json_body(json!({"jsonrpc": "2.0", "id": "leaf1-0", "result": [{"version": "4.31.1F"}]}));
    });
    let device = device(&server, &settings())?;
    device.refresh().await;

    assert!(device.is_online());
    assert!(!device.established());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_device_is_offline() -> Result<()> {
    let settings = settings();
    // Nothing listens on port 9 of the loopback.
    let device = AsyncEosDevice::new("127.0.0.1", None, Some(9), Vec::new(), &settings, false)?;
    device.refresh().await;
    assert!(!device.is_online());
    assert!(!device.established());
    Ok(())
}

#[tokio::test]
async fn test_collect_uses_cache() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/command-api").body_contains("show zerotouch");
        then.status(200)
            .json_body(json!({"jsonrpc": "2.0", "id": "leaf1-0", "result": [{"mode": "disabled"}]}));
    });
    let device = device(&server, &settings())?;

    let mut first = AntaCommand::new("show zerotouch");
    let mut second = AntaCommand::new("show zerotouch");
    device.collect(&mut first).await;
    device.collect(&mut second).await;

    assert_eq!(mock.hits(), 1);
    assert_eq!(second.json_output()?["mode"], "disabled");
    let stats = device.cache_statistics().expect("cache is enabled");
    assert_eq!(stats.total_commands_sent, 2);
    assert_eq!(stats.cache_hits, 1);

    let mut uncached = AntaCommand::new("show zerotouch").without_cache();
    device.collect(&mut uncached).await;
    assert_eq!(mock.hits(), 2);
    Ok(())
}

#[tokio::test]
async fn test_collect_disabled_cache() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/command-api");
        then.status(200)
            .json_body(json!({"jsonrpc": "2.0", "id": "leaf1-0", "result": [{"mode": "disabled"}]}));
    });
    let settings = DeviceSettings {
        disable_cache: true,
        ..settings()
    };
    let device = device(&server, &settings)?;
    assert!(!device.cache_enabled());

    for _ in 0..2 {
        let mut command = AntaCommand::new("show zerotouch");
        device.collect(&mut command).await;
        assert!(command.collected());
    }
    assert_eq!(mock.hits(), 2);
    Ok(())
}

#[tokio::test]
async fn test_collect_records_eapi_errors() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/command-api");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "leaf1-0",
            "error": {
                "code": 1002,
                "message": "CLI command 1 of 1 'show hardware counter drop' failed: invalid command",
                "data": [{"errors": ["Unavailable command (not supported on this hardware platform)"]}]
            }
        }));
    });
    let device = device(&server, &settings())?;

    let mut command = AntaCommand::new("show hardware counter drop");
    device.collect(&mut command).await;

    assert!(!command.collected());
    assert!(!command.supported());
    assert_eq!(
        command.errors,
        vec!["Unavailable command (not supported on this hardware platform)"]
    );
    Ok(())
}

#[tokio::test]
async fn test_collect_text_and_enable() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/command-api")
            .body_contains("\"enable\"")
            .body_contains("\"input\":\"secret\"")
            .body_contains("\"format\":\"text\"")
            .body_contains("\"version\":1");
        then.status(200).json_body(json!({
            "jsonrpc": "2.0",
            "id": "leaf1-0",
            "result": [{}, {"output": "SSHD status for Default VRF is disabled\n"}]
        }));
    });
    let settings = DeviceSettings {
        enable: true,
        enable_password: Some("secret".to_string()),
        ..settings()
    };
    let device = device(&server, &settings)?;

    let mut command = AntaCommand::text("show management ssh").with_version(ApiVersion::One);
    device.collect(&mut command).await;

    mock.assert();
    assert_eq!(command.text_output()?, "SSHD status for Default VRF is disabled\n");
    Ok(())
}
