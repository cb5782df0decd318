use crate::domain::model::{AntaCommand, OutputFormat};
use crate::domain::ports::EosDevice;
use crate::utils::error::{AntaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    #[default]
    Https,
    Http,
}

impl Proto {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Https => 443,
            Self::Http => 80,
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Https => f.write_str("https"),
            Self::Http => f.write_str("http"),
        }
    }
}

impl FromStr for Proto {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "https" => Ok(Self::Https),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown protocol '{}', expected https or http", other)),
        }
    }
}

/// Connection settings shared by every device of an inventory.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub username: String,
    pub password: String,
    pub enable: bool,
    pub enable_password: Option<String>,
    pub timeout: Duration,
    pub insecure: bool,
    pub proto: Proto,
    pub disable_cache: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            enable: false,
            enable_password: None,
            timeout: Duration::from_secs(30),
            insecure: false,
            proto: Proto::Https,
            disable_cache: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DeviceState {
    is_online: bool,
    established: bool,
    hw_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatistics {
    pub total_commands_sent: u64,
    pub cache_hits: u64,
}

impl CacheStatistics {
    pub fn hit_ratio(&self) -> f64 {
        if self.total_commands_sent == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_commands_sent as f64
        }
    }
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits / {} commands ({:.2}%)",
            self.cache_hits,
            self.total_commands_sent,
            self.hit_ratio() * 100.0
        )
    }
}

#[derive(Default)]
struct CommandCache {
    outputs: Mutex<HashMap<String, Value>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    total: AtomicU64,
}

impl CommandCache {
    async fn lock_for(&self, uid: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(uid.to_string())
            .or_default()
            .clone()
    }
}

/// EOS device reached through eAPI.
pub struct AsyncEosDevice {
    name: String,
    host: String,
    port: u16,
    tags: BTreeSet<String>,
    username: String,
    password: String,
    enable: bool,
    enable_password: Option<String>,
    endpoint: Url,
    client: Client,
    cache: Option<CommandCache>,
    state: RwLock<DeviceState>,
    request_id: AtomicU64,
}

impl fmt::Debug for AsyncEosDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEosDevice")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("tags", &self.tags)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl AsyncEosDevice {
    pub fn new(
        host: impl Into<String>,
        name: Option<String>,
        port: Option<u16>,
        tags: impl IntoIterator<Item = String>,
        settings: &DeviceSettings,
        disable_cache: bool,
    ) -> Result<Self> {
        let host = host.into();
        let name = name.unwrap_or_else(|| host.clone());
        let port = port.unwrap_or_else(|| settings.proto.default_port());
        let endpoint = Url::parse(&format!("{}://{}:{}/command-api", settings.proto, host, port))?;

        let client = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.insecure)
            .build()?;

        let mut tags: BTreeSet<String> = tags.into_iter().collect();
        tags.insert(name.clone());

        let cache = if settings.disable_cache || disable_cache {
            None
        } else {
            Some(CommandCache::default())
        };

        Ok(Self {
            name,
            host,
            port,
            tags,
            username: settings.username.clone(),
            password: settings.password.clone(),
            enable: settings.enable,
            enable_password: settings.enable_password.clone(),
            endpoint,
            client,
            cache,
            state: RwLock::new(DeviceState::default()),
            request_id: AtomicU64::new(0),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cache_statistics(&self) -> Option<CacheStatistics> {
        self.cache.as_ref().map(|cache| CacheStatistics {
            total_commands_sent: cache.total.load(Ordering::Relaxed),
            cache_hits: cache.hits.load(Ordering::Relaxed),
        })
    }

    fn state(&self) -> DeviceState {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_state(&self, state: DeviceState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Sends one command and returns its output.
    async fn send(&self, command: &AntaCommand) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let enable = self
            .enable
            .then(|| enable_command(self.enable_password.as_deref()));
        let request = jsonrpc_request(&format!("{}-{}", self.name, id), command, enable);

        tracing::debug!("Sending '{}' to {}", command.command, self.name);
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;

        let mut outputs = parse_jsonrpc_response(&body, command.ofmt)?;
        let skip = usize::from(self.enable);
        if outputs.len() <= skip {
            return Err(AntaError::unexpected(format!(
                "eAPI returned no result for '{}'",
                command.command
            )));
        }
        Ok(outputs.swap_remove(skip))
    }

    async fn send_and_record(&self, command: &mut AntaCommand) {
        match self.send(command).await {
            Ok(output) => {
                command.output = Some(output);
                command.errors.clear();
            }
            Err(AntaError::EapiError { errors, .. }) => command.errors = errors,
            Err(e) => command.errors = vec![e.to_string()],
        }

        if command.errors.is_empty() {
            return;
        }
        if command.supported() {
            tracing::error!(
                "Command '{}' failed on {}: {}",
                command.command,
                self.name,
                command.errors.join(", ")
            );
        } else {
            tracing::debug!(
                "Command '{}' is not supported on {}: {}",
                command.command,
                self.name,
                command.errors.join(", ")
            );
        }
    }
}

#[async_trait]
impl EosDevice for AsyncEosDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    fn hw_model(&self) -> Option<String> {
        self.state().hw_model
    }

    fn is_online(&self) -> bool {
        self.state().is_online
    }

    fn established(&self) -> bool {
        self.state().established
    }

    async fn refresh(&self) {
        let command = AntaCommand::new("show version");
        let state = match self.send(&command).await {
            Ok(output) => match output.get("modelName").and_then(Value::as_str) {
                Some(model) => DeviceState {
                    is_online: true,
                    established: true,
                    hw_model: Some(model.to_string()),
                },
                None => {
                    tracing::warn!(
                        "Cannot parse 'show version' returned by device {}",
                        self.name
                    );
                    DeviceState {
                        is_online: true,
                        ..DeviceState::default()
                    }
                }
            },
            Err(AntaError::ApiError(e)) if e.is_connect() || e.is_timeout() => {
                tracing::warn!("Device {} is unreachable: {}", self.name, e);
                DeviceState::default()
            }
            Err(e) => {
                tracing::warn!("Could not collect 'show version' on {}: {}", self.name, e);
                DeviceState {
                    is_online: true,
                    ..DeviceState::default()
                }
            }
        };
        tracing::debug!(
            "Refreshed {}: online={} established={} model={:?}",
            self.name,
            state.is_online,
            state.established,
            state.hw_model
        );
        self.set_state(state);
    }

    async fn collect(&self, command: &mut AntaCommand) {
        let cache = match &self.cache {
            Some(cache) if command.use_cache => cache,
            _ => return self.send_and_record(command).await,
        };

        let uid = command.uid();
        let lock = cache.lock_for(&uid).await;
        let _guard = lock.lock().await;

        cache.total.fetch_add(1, Ordering::Relaxed);
        if let Some(output) = cache.outputs.lock().await.get(&uid).cloned() {
            cache.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Cache hit for '{}' on {}", command.command, self.name);
            command.output = Some(output);
            return;
        }

        self.send_and_record(command).await;
        if command.collected() {
            if let Some(output) = &command.output {
                cache.outputs.lock().await.insert(uid, output.clone());
            }
        }
    }
}

fn enable_command(password: Option<&str>) -> Value {
    match password {
        Some(password) => json!({"cmd": "enable", "input": password}),
        None => json!({"cmd": "enable"}),
    }
}

/// JSON-RPC `runCmds` payload for one command, optionally preceded by `enable`.
pub fn jsonrpc_request(id: &str, command: &AntaCommand, enable: Option<Value>) -> Value {
    let cmd = match command.revision {
        Some(revision) => json!({"cmd": command.command, "revision": revision}),
        None => json!(command.command),
    };
    let cmds: Vec<Value> = enable.into_iter().chain(std::iter::once(cmd)).collect();

    json!({
        "jsonrpc": "2.0",
        "method": "runCmds",
        "id": id,
        "params": {
            "version": command.version.to_json(),
            "cmds": cmds,
            "format": command.ofmt.to_string(),
            "timestamps": false,
            "autoComplete": false,
            "expandAliases": false,
        }
    })
}

/// Extracts command results from a JSON-RPC response body.
///
/// Text results are unwrapped from their `{"output": ...}` envelope.
pub fn parse_jsonrpc_response(body: &Value, ofmt: OutputFormat) -> Result<Vec<Value>> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown eAPI error")
            .to_string();
        let mut errors: Vec<String> = error
            .get("data")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.get("errors").and_then(Value::as_array))
            .flatten()
            .filter_map(|e| e.as_str().map(str::to_string))
            .collect();
        if errors.is_empty() {
            errors.push(message.clone());
        }
        return Err(AntaError::EapiError {
            code,
            message,
            errors,
        });
    }

    let results = body
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| AntaError::unexpected("eAPI response has no 'result' list"))?;

    Ok(results
        .iter()
        .map(|result| match ofmt {
            OutputFormat::Json => result.clone(),
            OutputFormat::Text => Value::String(
                result
                    .get("output")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ApiVersion;

    #[test]
    fn test_jsonrpc_request_with_enable_and_revision() {
        let command = AntaCommand::new("show interfaces").with_revision(2);
        let request = jsonrpc_request("leaf1-0", &command, Some(enable_command(Some("secret"))));
        assert_eq!(request["method"], "runCmds");
        assert_eq!(request["params"]["version"], "latest");
        assert_eq!(request["params"]["format"], "json");
        assert_eq!(request["params"]["autoComplete"], false);
        assert_eq!(
            request["params"]["cmds"],
            json!([
                {"cmd": "enable", "input": "secret"},
                {"cmd": "show interfaces", "revision": 2}
            ])
        );
    }

    #[test]
    fn test_jsonrpc_request_text_version_one() {
        let command = AntaCommand::text("show logging").with_version(ApiVersion::One);
        let request = jsonrpc_request("leaf1-1", &command, None);
        assert_eq!(request["params"]["version"], 1);
        assert_eq!(request["params"]["format"], "text");
        assert_eq!(request["params"]["cmds"], json!(["show logging"]));
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({"jsonrpc": "2.0", "id": "1", "result": [{"output": "line1\n"}]});
        let outputs = parse_jsonrpc_response(&body, OutputFormat::Text).unwrap();
        assert_eq!(outputs, vec![json!("line1\n")]);
    }

    #[test]
    fn test_parse_error_response() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": {
                "code": 1002,
                "message": "CLI command 2 of 2 'show bad' failed: invalid command",
                "data": [{}, {"errors": ["Invalid input (at token 1: 'bad')"]}]
            }
        });
        match parse_jsonrpc_response(&body, OutputFormat::Json).unwrap_err() {
            AntaError::EapiError { code, errors, .. } => {
                assert_eq!(code, 1002);
                assert_eq!(errors, vec!["Invalid input (at token 1: 'bad')"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_without_data_uses_message() {
        let body = json!({"error": {"code": -32600, "message": "Invalid request"}});
        match parse_jsonrpc_response(&body, OutputFormat::Json).unwrap_err() {
            AntaError::EapiError { errors, .. } => assert_eq!(errors, vec!["Invalid request"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_device_defaults() {
        let settings = DeviceSettings {
            proto: Proto::Http,
            ..DeviceSettings::default()
        };
        let device = AsyncEosDevice::new("10.0.0.1", None, None, vec!["leaf".to_string()], &settings, false)
            .unwrap();
        assert_eq!(device.name(), "10.0.0.1");
        assert_eq!(device.port(), 80);
        assert_eq!(device.endpoint().as_str(), "http://10.0.0.1/command-api");
        assert!(device.tags().contains("leaf"));
        assert!(device.tags().contains("10.0.0.1"));
        assert!(device.cache_enabled());
        assert!(!device.established());
    }
}
