//! Reachability and LLDP tests.

use crate::checks::{build, TestFactory, TestModule};
use crate::domain::custom_types::Interface;
use crate::domain::model::{AntaCommand, AntaTemplate, TestResult};
use crate::domain::ports::AntaTest;
use crate::utils::error::{AntaError, Result};
use crate::utils::tools::{display, repr, JsonExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

pub const MODULE: TestModule = TestModule {
    name: "anta.tests.connectivity",
    tests: &[
        ("VerifyReachability", build::<VerifyReachability> as TestFactory),
        ("VerifyLLDPNeighbors", build::<VerifyLLDPNeighbors> as TestFactory),
    ],
};

/// Source of a ping: an address or an egress interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PingSource {
    Address(Ipv4Addr),
    Interface(Interface),
}

impl fmt::Display for PingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{}", address),
            Self::Interface(interface) => write!(f, "{}", interface),
        }
    }
}

fn default_vrf() -> String {
    "default".to_string()
}

fn default_repeat() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    pub destination: Ipv4Addr,
    pub source: PingSource,
    #[serde(default = "default_vrf")]
    pub vrf: String,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

/// Tests network reachability to one or many destination IPs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyReachability {
    pub hosts: Vec<Host>,
}

impl AntaTest for VerifyReachability {
    fn name(&self) -> &'static str {
        "VerifyReachability"
    }

    fn description(&self) -> &'static str {
        "Test the network reachability to one or many destination IP(s)."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["connectivity"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        let template = AntaTemplate::new("ping vrf {vrf} {destination} source {source} repeat {repeat}");
        self.hosts
            .iter()
            .map(|host| {
                template.render([
                    ("destination", json!(host.destination.to_string())),
                    ("source", json!(host.source.to_string())),
                    ("vrf", json!(host.vrf)),
                    ("repeat", json!(host.repeat)),
                ])
            })
            .collect()
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let mut failures = Vec::new();
        for command in commands {
            let (Some(src), Some(dst), Some(repeat)) = (
                command.param("source"),
                command.param("destination"),
                command.param("repeat"),
            ) else {
                return Err(AntaError::MissingParamError {
                    message: format!(
                        "A parameter is missing to execute the test for command {}",
                        command
                    ),
                });
            };

            let output = command.json_output()?;
            let first_message = output
                .field("messages")?
                .array()?
                .first()
                .ok_or_else(|| AntaError::unexpected("ping returned no message"))?
                .text()?;
            if !first_message.contains(&format!("{} received", display(repeat))) {
                failures.push((display(src), display(dst)));
            }
        }

        if failures.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "Connectivity test failed for the following source-destination pairs: [{}]",
                failures
                    .iter()
                    .map(|(src, dst)| format!("('{}', '{}')", src, dst))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Neighbor {
    pub port: Interface,
    pub neighbor_device: String,
    pub neighbor_port: Interface,
}

/// Verifies that the provided LLDP neighbors are present and connected with
/// the correct configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLLDPNeighbors {
    pub neighbors: Vec<Neighbor>,
}

impl AntaTest for VerifyLLDPNeighbors {
    fn name(&self) -> &'static str {
        "VerifyLLDPNeighbors"
    }

    fn description(&self) -> &'static str {
        "Verifies that the provided LLDP neighbors are connected properly."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["connectivity"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show lldp neighbors detail")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let lldp_neighbors = commands[0].json_output()?.field("lldpNeighbors")?;
        let mut failures: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for neighbor in &self.neighbors {
            let port = neighbor.port.as_str();
            let Some(entry) = lldp_neighbors.get(port) else {
                failures.entry("port_not_configured").or_default().push(port);
                continue;
            };
            let info = entry.field("lldpNeighborInfo")?.array()?;
            let Some(first) = info.first() else {
                failures.entry("no_lldp_neighbor").or_default().push(port);
                continue;
            };
            let system_name = first.field("systemName")?.text()?;
            let neighbor_port = first
                .field("neighborInterfaceInfo")?
                .field("interfaceId_v2")?
                .text()?;
            if system_name != neighbor.neighbor_device || neighbor_port != neighbor.neighbor_port.as_str() {
                failures.entry("wrong_lldp_neighbor").or_default().push(port);
            }
        }

        if failures.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following port(s) have issues: {}",
                repr(&failures)
            ));
        }
        Ok(())
    }
}
