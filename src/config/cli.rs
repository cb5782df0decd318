//! Command line interface of the `anta` binary.

use crate::core::device::{DeviceSettings, Proto};
use crate::core::runner::DEFAULT_MAX_CONCURRENCY;
use crate::domain::model::{ApiVersion, OutputFormat, TestStatus};
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::{validate_positive_number, validate_required_field, Validate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "anta")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Arista Network Test Automation: test EOS devices over eAPI")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Inventory file
    #[arg(short, long, env = "ANTA_INVENTORY", global = true)]
    pub inventory: Option<PathBuf>,

    /// Username to connect to EOS
    #[arg(short, long, env = "ANTA_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password to connect to EOS
    #[arg(short, long, env = "ANTA_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Send `enable` before every command
    #[arg(long, env = "ANTA_ENABLE", global = true)]
    pub enable: bool,

    /// Password for the `enable` command
    #[arg(long, env = "ANTA_ENABLE_PASSWORD", global = true, hide_env_values = true)]
    pub enable_password: Option<String>,

    /// eAPI request timeout, in seconds
    #[arg(long, env = "ANTA_TIMEOUT", default_value_t = 30, global = true)]
    pub timeout: u64,

    /// Accept invalid TLS certificates
    #[arg(long, env = "ANTA_INSECURE", global = true)]
    pub insecure: bool,

    #[arg(long, value_enum, env = "ANTA_PROTO", default_value_t = Proto::Https, global = true)]
    pub proto: Proto,

    /// Disable the per-device command cache
    #[arg(long, env = "ANTA_DISABLE_CACHE", global = true)]
    pub disable_cache: bool,

    #[arg(long, env = "ANTA_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    pub fn inventory(&self) -> Result<&PathBuf> {
        validate_required_field("inventory", &self.inventory)
    }

    pub fn device_settings(&self) -> Result<DeviceSettings> {
        Ok(DeviceSettings {
            username: validate_required_field("username", &self.username)?.clone(),
            password: validate_required_field("password", &self.password)?.clone(),
            enable: self.enable,
            enable_password: self.enable_password.clone(),
            timeout: Duration::from_secs(self.timeout),
            insecure: self.insecure,
            proto: self.proto,
            disable_cache: self.disable_cache,
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run tests from a catalog against the inventory
    Nrfu(NrfuArgs),
    /// Validate ANTA files
    Check {
        #[command(subcommand)]
        action: CheckAction,
    },
    /// Execute EOS commands on the inventory
    Exec {
        #[command(subcommand)]
        action: ExecAction,
    },
    /// Show inventory, tags and available tests
    Get {
        #[command(subcommand)]
        action: GetAction,
    },
    /// Run a single command or template on one device
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    Device,
    Test,
}

#[derive(Debug, Args)]
pub struct NrfuArgs {
    /// Test catalog file
    #[arg(short, long, env = "ANTA_CATALOG")]
    pub catalog: PathBuf,

    /// Only test devices carrying one of these tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,

    /// Only test these devices
    #[arg(long)]
    pub device: Vec<String>,

    /// Only run these tests
    #[arg(long)]
    pub test: Vec<String>,

    /// Exit with code 0 whatever the test results
    #[arg(long, env = "ANTA_NRFU_IGNORE_STATUS")]
    pub ignore_status: bool,

    /// Do not exit with an error code when tests errored
    #[arg(long, env = "ANTA_NRFU_IGNORE_ERROR")]
    pub ignore_error: bool,

    /// Hide results with this status in reports
    #[arg(long)]
    pub hide: Vec<TestStatus>,

    /// Only show which tests would run
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, env = "ANTA_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    #[command(subcommand)]
    pub report: Option<NrfuReport>,
}

#[derive(Debug, Subcommand)]
pub enum NrfuReport {
    /// Results as a table
    Table {
        #[arg(long, value_enum)]
        group_by: Option<GroupBy>,
    },
    /// One line per result
    Text,
    /// Results as JSON
    Json {
        /// Save the report to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save results as CSV
    Csv {
        #[arg(long)]
        csv_output: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum CheckAction {
    /// Check that a test catalog is valid
    Catalog {
        #[arg(short, long, env = "ANTA_CATALOG")]
        catalog: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExecAction {
    /// Clear counter statistics on EOS devices
    ClearCounters {
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },
    /// Collect command outputs from devices in the inventory
    Snapshot {
        /// TOML file with `json_format` and `text_format` command lists
        #[arg(short, long)]
        commands_list: PathBuf,

        /// Output directory, suffixed with the current time
        #[arg(short, long, default_value = "anta_snapshot")]
        output: String,

        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },
}

#[derive(Debug, Subcommand)]
pub enum GetAction {
    /// Show the inventory
    Inventory {
        /// Connect to devices first to show their state
        #[arg(long)]
        connected: bool,

        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },
    /// List every tag of the inventory
    Tags,
    /// List the available tests
    Tests {
        /// Only list tests of this module
        #[arg(long)]
        module: Option<String>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct CommandFormat {
    #[arg(long, default_value = "json")]
    pub ofmt: OutputFormat,

    /// eAPI version of the command
    #[arg(long = "version", default_value = "latest")]
    pub api_version: ApiVersion,

    /// Command revision
    #[arg(short, long)]
    pub revision: Option<u8>,
}

#[derive(Debug, Subcommand)]
pub enum DebugAction {
    /// Run a command on a device
    RunCmd {
        #[arg(short, long)]
        device: String,

        #[arg(short, long)]
        command: String,

        #[command(flatten)]
        format: CommandFormat,
    },
    /// Render a template with KEY=VALUE parameters and run it on a device
    RunTemplate {
        #[arg(short, long)]
        device: String,

        #[arg(short, long)]
        template: String,

        #[command(flatten)]
        format: CommandFormat,

        /// Template parameters
        params: Vec<String>,
    },
}

/// Splits `KEY=VALUE` template parameters.
pub fn parse_params(params: &[String]) -> Result<Vec<(String, String)>> {
    params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| AntaError::InvalidConfigValueError {
                    field: "params".to_string(),
                    value: param.clone(),
                    reason: "expected KEY=VALUE".to_string(),
                })
        })
        .collect()
}

impl Commands {
    /// Whether the command talks to devices.
    fn needs_devices(&self) -> bool {
        match self {
            Commands::Nrfu(_) | Commands::Exec { .. } | Commands::Debug { .. } => true,
            Commands::Get {
                action: GetAction::Inventory { connected, .. },
            } => *connected,
            Commands::Get { .. } | Commands::Check { .. } => false,
        }
    }

    fn needs_inventory(&self) -> bool {
        match self {
            Commands::Check { .. } => false,
            Commands::Get {
                action: GetAction::Tests { .. },
            } => false,
            _ => true,
        }
    }
}

impl Validate for Cli {
    fn validate(&self) -> Result<()> {
        let Some(command) = &self.command else {
            return Ok(());
        };
        if command.needs_inventory() {
            self.global.inventory()?;
        }
        let usage = |e: AntaError| AntaError::usage(e.to_string());
        if command.needs_devices() {
            self.global.device_settings()?;
            validate_positive_number("timeout", self.global.timeout, 1).map_err(usage)?;
        }
        if let Commands::Nrfu(args) = command {
            validate_positive_number("max_concurrency", args.max_concurrency as u64, 1).map_err(usage)?;
        }
        if let Commands::Debug {
            action: DebugAction::RunTemplate { params, .. },
        } = command
        {
            parse_params(params).map_err(usage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_nrfu_defaults() {
        let cli = parse(&[
            "anta", "-i", "inv.toml", "-u", "admin", "-p", "admin", "nrfu", "-c", "catalog.toml",
        ]);
        let Some(Commands::Nrfu(args)) = &cli.command else {
            panic!("expected nrfu");
        };
        assert_eq!(args.max_concurrency, 100);
        assert!(args.report.is_none());
        assert_eq!(cli.global.proto, Proto::Https);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_nrfu_report_and_filters() {
        let cli = parse(&[
            "anta", "nrfu", "-c", "catalog.toml", "--tags", "leaf,spine", "--hide", "success",
            "--hide", "skipped", "table", "--group-by", "device",
        ]);
        let Some(Commands::Nrfu(args)) = &cli.command else {
            panic!("expected nrfu");
        };
        assert_eq!(args.tags, Some(vec!["leaf".to_string(), "spine".to_string()]));
        assert_eq!(args.hide, vec![TestStatus::Success, TestStatus::Skipped]);
        assert!(matches!(
            args.report,
            Some(NrfuReport::Table { group_by: Some(GroupBy::Device) })
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let cli = parse(&["anta", "-i", "inv.toml", "exec", "clear-counters"]);
        let err = cli.validate().unwrap_err();
        assert!(matches!(err, AntaError::MissingConfigError { .. }));

        let cli = parse(&["anta", "get", "tests"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_missing_options_are_usage_errors() {
        let cli = parse(&["anta", "get", "tags"]);
        if cli.global.inventory.is_none() {
            let err = cli.validate().unwrap_err();
            assert_eq!(err.to_string(), "Missing required configuration: inventory");
            assert_eq!(err.exit_code(), 2);
        }

        let cli = parse(&[
            "anta", "-i", "inv.toml", "-u", "admin", "-p", "admin", "nrfu", "-c", "catalog.toml",
            "--max-concurrency", "0",
        ]);
        let err = cli.validate().unwrap_err();
        assert!(matches!(err, AntaError::UsageError { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_debug_run_template_params() {
        let cli = parse(&[
            "anta", "-i", "inv.toml", "-u", "a", "-p", "b", "debug", "run-template", "-d", "leaf1",
            "-t", "show vlan {vlan_id}", "--version", "1", "vlan_id=10",
        ]);
        let Some(Commands::Debug {
            action: DebugAction::RunTemplate { params, format, .. },
        }) = &cli.command
        else {
            panic!("expected debug run-template");
        };
        assert_eq!(format.api_version, ApiVersion::One);
        assert_eq!(parse_params(params).unwrap(), vec![("vlan_id".to_string(), "10".to_string())]);
        assert!(parse_params(&["vlan_id".to_string()]).is_err());
    }

    #[test]
    fn test_unknown_option_is_usage_error() {
        let err = Cli::try_parse_from(["anta", "nrfu", "--bogus"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
