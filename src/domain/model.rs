use crate::utils::error::{AntaError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Error fragments EOS returns for commands a platform does not implement.
const UNSUPPORTED_PLATFORM_ERRORS: [&str; 2] = [
    "not supported on this hardware platform",
    "Invalid input (at token 2: 'trident')",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Text => f.write_str("text"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown output format '{}', expected json or text", other)),
        }
    }
}

/// eAPI version requested for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiVersion {
    One,
    #[default]
    Latest,
}

impl ApiVersion {
    pub fn to_json(self) -> Value {
        match self {
            Self::One => Value::from(1),
            Self::Latest => Value::from("latest"),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("1"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1" => Ok(Self::One),
            "latest" => Ok(Self::Latest),
            other => Err(format!("unknown eAPI version '{}', expected 1 or latest", other)),
        }
    }
}

/// An EOS command to collect from a device, with its output once collected.
#[derive(Debug, Clone, PartialEq)]
pub struct AntaCommand {
    pub command: String,
    pub version: ApiVersion,
    pub revision: Option<u8>,
    pub ofmt: OutputFormat,
    pub use_cache: bool,
    pub template: Option<String>,
    pub params: BTreeMap<String, Value>,
    pub output: Option<Value>,
    pub errors: Vec<String>,
}

impl AntaCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            version: ApiVersion::Latest,
            revision: None,
            ofmt: OutputFormat::Json,
            use_cache: true,
            template: None,
            params: BTreeMap::new(),
            output: None,
            errors: Vec::new(),
        }
    }

    pub fn text(command: impl Into<String>) -> Self {
        Self::new(command).with_format(OutputFormat::Text)
    }

    pub fn with_format(mut self, ofmt: OutputFormat) -> Self {
        self.ofmt = ofmt;
        self
    }

    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_revision(mut self, revision: u8) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Cache key of the command.
    pub fn uid(&self) -> String {
        let revision = self
            .revision
            .map(|r| r.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!("{}:{}:{}:{}", self.ofmt, self.version, revision, self.command)
    }

    pub fn collected(&self) -> bool {
        self.output.is_some() && self.errors.is_empty()
    }

    pub fn supported(&self) -> bool {
        !self.errors.iter().any(|e| {
            UNSUPPORTED_PLATFORM_ERRORS
                .iter()
                .any(|fragment| e.contains(fragment))
        })
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn json_output(&self) -> Result<&Value> {
        if self.ofmt != OutputFormat::Json {
            return Err(AntaError::unexpected(format!(
                "Output of command '{}' is not JSON",
                self.command
            )));
        }
        self.output.as_ref().ok_or_else(|| {
            AntaError::unexpected(format!("There is no output for command '{}'", self.command))
        })
    }

    pub fn text_output(&self) -> Result<&str> {
        if self.ofmt != OutputFormat::Text {
            return Err(AntaError::unexpected(format!(
                "Output of command '{}' is not text",
                self.command
            )));
        }
        self.output
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AntaError::unexpected(format!("There is no output for command '{}'", self.command))
            })
    }
}

impl fmt::Display for AntaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)
    }
}

/// A command with `{placeholders}` rendered from test inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct AntaTemplate {
    pub template: String,
    pub version: ApiVersion,
    pub revision: Option<u8>,
    pub ofmt: OutputFormat,
    pub use_cache: bool,
}

impl AntaTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            version: ApiVersion::Latest,
            revision: None,
            ofmt: OutputFormat::Json,
            use_cache: true,
        }
    }

    pub fn with_format(mut self, ofmt: OutputFormat) -> Self {
        self.ofmt = ofmt;
        self
    }

    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_revision(mut self, revision: u8) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Renders the template. Every placeholder needs a parameter; extra
    /// parameters are kept on the returned command.
    pub fn render<I, K>(&self, params: I) -> Result<AntaCommand>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let params: BTreeMap<String, Value> =
            params.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let placeholder = Regex::new(r"\{(\w+)\}")?;

        for caps in placeholder.captures_iter(&self.template) {
            if !params.contains_key(&caps[1]) {
                return Err(AntaError::TemplateRenderError {
                    template: self.template.clone(),
                    key: caps[1].to_string(),
                });
            }
        }

        let command = placeholder
            .replace_all(&self.template, |caps: &regex::Captures| {
                params
                    .get(&caps[1])
                    .map(crate::utils::tools::display)
                    .unwrap_or_default()
            })
            .to_string();

        Ok(AntaCommand {
            command,
            version: self.version,
            revision: self.revision,
            ofmt: self.ofmt,
            use_cache: self.use_cache,
            template: Some(self.template.clone()),
            params,
            output: None,
            errors: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Unset,
    Success,
    Failure,
    Error,
    Skipped,
}

impl TestStatus {
    pub const ALL: [TestStatus; 5] = [
        TestStatus::Unset,
        TestStatus::Success,
        TestStatus::Failure,
        TestStatus::Error,
        TestStatus::Skipped,
    ];
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unset => "unset",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TestStatus::ALL
            .into_iter()
            .find(|status| status.to_string() == s.to_lowercase())
            .ok_or_else(|| format!("unknown test status '{}'", s))
    }
}

/// Outcome of one test on one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Device name.
    pub name: String,
    pub test: String,
    pub categories: Vec<String>,
    pub description: String,
    pub result: TestStatus,
    pub messages: Vec<String>,
    pub custom_field: Option<String>,
}

impl TestResult {
    pub fn new(
        device: impl Into<String>,
        test: impl Into<String>,
        categories: Vec<String>,
        description: impl Into<String>,
        custom_field: Option<String>,
    ) -> Self {
        Self {
            name: device.into(),
            test: test.into(),
            categories,
            description: description.into(),
            result: TestStatus::Unset,
            messages: Vec::new(),
            custom_field,
        }
    }

    pub fn is_success(&mut self) {
        self.set_status(TestStatus::Success, None);
    }

    pub fn is_failure(&mut self, message: impl Into<String>) {
        self.set_status(TestStatus::Failure, Some(message.into()));
    }

    pub fn is_error(&mut self, message: impl Into<String>) {
        self.set_status(TestStatus::Error, Some(message.into()));
    }

    pub fn is_skipped(&mut self, message: impl Into<String>) {
        self.set_status(TestStatus::Skipped, Some(message.into()));
    }

    fn set_status(&mut self, status: TestStatus, message: Option<String>) {
        self.result = status;
        if let Some(message) = message {
            self.messages.push(message);
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Test '{}' (on '{}'): Result '{}'\nMessages: {:?}",
            self.test, self.name, self.result, self.messages
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filters {
    pub tags: Option<Vec<String>>,
}

/// Replaces the metadata reported for a test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultOverwrite {
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub custom_field: Option<String>,
}

/// Keys accepted by every test besides its own inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommonInputs {
    pub filters: Option<Filters>,
    pub result_overwrite: Option<ResultOverwrite>,
}

impl CommonInputs {
    pub const KEYS: [&'static str; 2] = ["filters", "result_overwrite"];

    pub fn tags(&self) -> Option<&[String]> {
        self.filters.as_ref()?.tags.as_deref()
    }
}
