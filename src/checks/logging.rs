//! Syslog tests.
//!
//! `show logging` has no JSON rendering on EOS, so most of these tests parse
//! text outputs.

use crate::checks::{build, TestFactory, TestModule};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::AntaTest;
use crate::utils::error::Result;
use crate::utils::tools::{repr, JsonExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::debug;

pub const MODULE: TestModule = TestModule {
    name: "anta.tests.logging",
    tests: &[
        ("VerifyLoggingPersistent", build::<VerifyLoggingPersistent> as TestFactory),
        ("VerifyLoggingSourceIntf", build::<VerifyLoggingSourceIntf> as TestFactory),
        ("VerifyLoggingHosts", build::<VerifyLoggingHosts> as TestFactory),
        ("VerifyLoggingLogsGeneration", build::<VerifyLoggingLogsGeneration> as TestFactory),
        ("VerifyLoggingHostname", build::<VerifyLoggingHostname> as TestFactory),
        ("VerifyLoggingTimestamp", build::<VerifyLoggingTimestamp> as TestFactory),
        ("VerifyLoggingAccounting", build::<VerifyLoggingAccounting> as TestFactory),
        ("VerifyLoggingErrors", build::<VerifyLoggingErrors> as TestFactory),
    ],
};

const RECENT_LOGS: &str = "show logging informational last 30 seconds | grep ANTA";

/// Operational part of `show logging`, before the external configuration.
fn logging_states(output: &str) -> &str {
    let states = output
        .split_once("\n\nExternal configuration:")
        .map_or(output, |(states, _)| states);
    debug!("Device logging states:\n{}", states);
    states
}

/// Most recent line of `output` matching `pattern`, empty when none does.
fn last_line_matching<'a>(output: &'a str, pattern: &str) -> &'a str {
    output
        .trim()
        .lines()
        .rev()
        .find(|line| line.contains(pattern))
        .unwrap_or("")
}

fn send_log(test: &str) -> AntaCommand {
    AntaCommand::new(format!(
        "send log level informational message ANTA {} validation",
        test
    ))
}

fn recent_logs() -> AntaCommand {
    AntaCommand::text(RECENT_LOGS).without_cache()
}

fn default_vrf() -> String {
    "default".to_string()
}

/// Verifies if logging persistent is enabled and logs are saved in flash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingPersistent {}

impl AntaTest for VerifyLoggingPersistent {
    fn name(&self) -> &'static str {
        "VerifyLoggingPersistent"
    }

    fn description(&self) -> &'static str {
        "Verifies if logging persistent is enabled and logs are saved in flash."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![
            AntaCommand::text("show logging"),
            AntaCommand::text("dir flash:/persist/messages"),
        ])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        result.is_success();
        let log_output = commands[0].text_output()?;
        let dir_flash_output = commands[1].text_output()?;
        if logging_states(log_output).contains("Persistent logging: disabled") {
            result.is_failure("Persistent logging is disabled");
            return Ok(());
        }

        let file_size = Regex::new(r"-rw-\s+(\d+)")?;
        let saved = file_size
            .captures(dir_flash_output)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .is_some_and(|size| size > 0);
        if !saved {
            result.is_failure("No persistent logs are saved in flash");
        }
        Ok(())
    }
}

/// Verifies logging source-interface for a specified VRF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingSourceIntf {
    pub interface: String,
    #[serde(default = "default_vrf")]
    pub vrf: String,
}

impl AntaTest for VerifyLoggingSourceIntf {
    fn name(&self) -> &'static str {
        "VerifyLoggingSourceIntf"
    }

    fn description(&self) -> &'static str {
        "Verifies logging source-interface for a specified VRF."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::text("show logging")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let pattern = Regex::new(&format!(
            "Logging source-interface '{}'.*VRF {}",
            regex::escape(&self.interface),
            regex::escape(&self.vrf)
        ))?;
        if pattern.is_match(logging_states(commands[0].text_output()?)) {
            result.is_success();
        } else {
            result.is_failure(format!(
                "Source-interface '{}' is not configured in VRF {}",
                self.interface, self.vrf
            ));
        }
        Ok(())
    }
}

/// Verifies logging hosts (syslog servers) for a specified VRF.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingHosts {
    pub hosts: Vec<Ipv4Addr>,
    #[serde(default = "default_vrf")]
    pub vrf: String,
}

impl AntaTest for VerifyLoggingHosts {
    fn name(&self) -> &'static str {
        "VerifyLoggingHosts"
    }

    fn description(&self) -> &'static str {
        "Verifies logging hosts (syslog servers) for a specified VRF."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::text("show logging")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let states = logging_states(commands[0].text_output()?);
        let mut not_configured = Vec::new();
        for host in &self.hosts {
            let pattern = Regex::new(&format!(
                "Logging to '{}'.*VRF {}",
                regex::escape(&host.to_string()),
                regex::escape(&self.vrf)
            ))?;
            if !pattern.is_match(states) {
                not_configured.push(host.to_string());
            }
        }

        if not_configured.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "Syslog servers {} are not configured in VRF {}",
                repr(&not_configured),
                self.vrf
            ));
        }
        Ok(())
    }
}

/// Verifies if logs are generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingLogsGeneration {}

impl AntaTest for VerifyLoggingLogsGeneration {
    fn name(&self) -> &'static str {
        "VerifyLoggingLogsGeneration"
    }

    fn description(&self) -> &'static str {
        "Verifies if logs are generated."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![send_log(self.name()), recent_logs()])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = commands[1].text_output()?;
        if last_line_matching(output, "ANTA VerifyLoggingLogsGeneration validation").is_empty() {
            result.is_failure("Logs are not generated");
        } else {
            result.is_success();
        }
        Ok(())
    }
}

/// Verifies if logs are generated with the device FQDN.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingHostname {}

impl AntaTest for VerifyLoggingHostname {
    fn name(&self) -> &'static str {
        "VerifyLoggingHostname"
    }

    fn description(&self) -> &'static str {
        "Verifies if logs are generated with the device FQDN."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![
            AntaCommand::new("show hostname"),
            send_log(self.name()),
            recent_logs(),
        ])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let fqdn = commands[0].json_output()?.field("fqdn")?.text()?;
        let line = last_line_matching(commands[2].text_output()?, "ANTA VerifyLoggingHostname validation");
        if !line.is_empty() && line.contains(fqdn) {
            result.is_success();
        } else {
            result.is_failure("Logs are not generated with the device FQDN");
        }
        Ok(())
    }
}

/// Verifies if logs are generated with the appropriate timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingTimestamp {}

impl AntaTest for VerifyLoggingTimestamp {
    fn name(&self) -> &'static str {
        "VerifyLoggingTimestamp"
    }

    fn description(&self) -> &'static str {
        "Verifies if logs are generated with the appropriate timestamp."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![send_log(self.name()), recent_logs()])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        // RFC 3339 with microseconds and a numeric UTC offset.
        let timestamp = Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6}[+-]\d{2}:\d{2}")?;
        let line = last_line_matching(commands[1].text_output()?, "ANTA VerifyLoggingTimestamp validation");
        if timestamp.is_match(line) {
            result.is_success();
        } else {
            result.is_failure("Logs are not generated with the appropriate timestamp format");
        }
        Ok(())
    }
}

/// Verifies if AAA accounting logs are generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingAccounting {}

impl AntaTest for VerifyLoggingAccounting {
    fn name(&self) -> &'static str {
        "VerifyLoggingAccounting"
    }

    fn description(&self) -> &'static str {
        "Verifies if AAA accounting logs are generated."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::text("show aaa accounting logs | tail")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        if commands[0].text_output()?.contains("cmd=show aaa accounting logs") {
            result.is_success();
        } else {
            result.is_failure("AAA accounting logs are not generated");
        }
        Ok(())
    }
}

/// Verifies there are no syslog messages with a severity of ERRORS or higher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoggingErrors {}

impl AntaTest for VerifyLoggingErrors {
    fn name(&self) -> &'static str {
        "VerifyLoggingErrors"
    }

    fn description(&self) -> &'static str {
        "Verifies there are no syslog messages with a severity of ERRORS or higher."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["logging"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::text("show logging threshold errors")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        if commands[0].text_output()?.is_empty() {
            result.is_success();
        } else {
            result.is_failure("Device has reported syslog messages with a severity of ERRORS or higher");
        }
        Ok(())
    }
}
