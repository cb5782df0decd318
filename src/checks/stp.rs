//! Spanning Tree Protocol tests.

use crate::checks::{build, TestFactory, TestModule};
use crate::domain::custom_types::Vlan;
use crate::domain::model::{AntaCommand, AntaTemplate, TestResult};
use crate::domain::ports::AntaTest;
use crate::utils::error::{AntaError, Result};
use crate::utils::tools::{get_value, repr, JsonExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const MODULE: TestModule = TestModule {
    name: "anta.tests.stp",
    tests: &[
        ("VerifySTPMode", build::<VerifySTPMode> as TestFactory),
        ("VerifySTPBlockedPorts", build::<VerifySTPBlockedPorts> as TestFactory),
        ("VerifySTPCounters", build::<VerifySTPCounters> as TestFactory),
        ("VerifySTPForwardingPorts", build::<VerifySTPForwardingPorts> as TestFactory),
        ("VerifySTPRootPriority", build::<VerifySTPRootPriority> as TestFactory),
    ],
};

fn render_per_vlan(template: &str, vlans: &[Vlan]) -> Result<Vec<AntaCommand>> {
    let template = AntaTemplate::new(template);
    vlans
        .iter()
        .map(|vlan| template.render([("vlan", json!(vlan.id()))]))
        .collect()
}

fn vlan_param(command: &AntaCommand) -> Result<u16> {
    command
        .param("vlan")
        .and_then(Value::as_u64)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| AntaError::MissingParamError {
            message: format!("'vlan' is missing for command {}", command),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StpMode {
    #[default]
    #[serde(rename = "mstp")]
    Mstp,
    #[serde(rename = "rstp")]
    Rstp,
    #[serde(rename = "rapidPvst")]
    RapidPvst,
}

impl StpMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mstp => "mstp",
            Self::Rstp => "rstp",
            Self::RapidPvst => "rapidPvst",
        }
    }
}

/// Verifies the configured STP mode for a list of VLANs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySTPMode {
    #[serde(default)]
    pub mode: StpMode,
    pub vlans: Vec<Vlan>,
}

impl AntaTest for VerifySTPMode {
    fn name(&self) -> &'static str {
        "VerifySTPMode"
    }

    fn description(&self) -> &'static str {
        "Verifies the configured STP mode for a provided list of VLAN(s)."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["stp"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        render_per_vlan("show spanning-tree vlan {vlan}", &self.vlans)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let mut not_configured = Vec::new();
        let mut wrong_stp_mode = Vec::new();

        for command in commands {
            let vlan_id = vlan_param(command)?;
            let key = format!("spanningTreeVlanInstances.{}.spanningTreeVlanInstance.protocol", vlan_id);
            match get_value(command.json_output()?, &key, ".").and_then(Value::as_str) {
                None | Some("") => not_configured.push(vlan_id),
                Some(mode) if mode != self.mode.as_str() => wrong_stp_mode.push(vlan_id),
                Some(_) => {}
            }
        }

        if !not_configured.is_empty() {
            result.is_failure(format!(
                "STP mode '{}' not configured for the following VLAN(s): {:?}",
                self.mode.as_str(),
                not_configured
            ));
        }
        if !wrong_stp_mode.is_empty() {
            result.is_failure(format!(
                "Wrong STP mode configured for the following VLAN(s): {:?}",
                wrong_stp_mode
            ));
        }
        if not_configured.is_empty() && wrong_stp_mode.is_empty() {
            result.is_success();
        }
        Ok(())
    }
}

/// Verifies there is no STP blocked ports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySTPBlockedPorts {}

impl AntaTest for VerifySTPBlockedPorts {
    fn name(&self) -> &'static str {
        "VerifySTPBlockedPorts"
    }

    fn description(&self) -> &'static str {
        "Verifies there is no STP blocked ports."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["stp"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show spanning-tree blockedports")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let instances = commands[0]
            .json_output()?
            .field("spanningTreeInstances")?
            .object()?;
        if instances.is_empty() {
            result.is_success();
            return Ok(());
        }

        let mut blocked = Map::new();
        for (instance, value) in instances {
            blocked.insert(instance.clone(), value.field("spanningTreeBlockedPorts")?.clone());
        }
        result.is_failure(format!(
            "The following ports are blocked by STP: {}",
            repr(&blocked)
        ));
        Ok(())
    }
}

/// Verifies there is no errors in STP BPDU packets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySTPCounters {}

impl AntaTest for VerifySTPCounters {
    fn name(&self) -> &'static str {
        "VerifySTPCounters"
    }

    fn description(&self) -> &'static str {
        "Verifies there is no errors in STP BPDU packets."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["stp"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show spanning-tree counters")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let interfaces = commands[0].json_output()?.field("interfaces")?.object()?;
        let mut with_errors = Vec::new();
        for (interface, counters) in interfaces {
            if counters.field("bpduTaggedError")?.int()? != 0 || counters.field("bpduOtherError")?.int()? != 0 {
                with_errors.push(interface.as_str());
            }
        }

        if with_errors.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following interfaces have STP BPDU packet errors: {}",
                repr(&with_errors)
            ));
        }
        Ok(())
    }
}

/// Verifies that all interfaces are forwarding for a list of VLANs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySTPForwardingPorts {
    pub vlans: Vec<Vlan>,
}

impl AntaTest for VerifySTPForwardingPorts {
    fn name(&self) -> &'static str {
        "VerifySTPForwardingPorts"
    }

    fn description(&self) -> &'static str {
        "Verifies that all interfaces are forwarding for a provided list of VLAN(s)."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["stp"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        render_per_vlan("show spanning-tree topology vlan {vlan} status", &self.vlans)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let mut not_configured = Vec::new();
        let mut not_forwarding: Vec<BTreeMap<String, Vec<String>>> = Vec::new();

        for command in commands {
            let vlan_id = vlan_param(command)?;
            let topology = get_value(command.json_output()?, "topologies", ".")
                .and_then(Value::as_object)
                .and_then(|topologies| {
                    topologies.values().find(|t| {
                        t.get("vlans")
                            .and_then(Value::as_array)
                            .is_some_and(|vlans| vlans.iter().any(|v| v.as_u64() == Some(u64::from(vlan_id))))
                    })
                });
            let Some(topology) = topology else {
                not_configured.push(vlan_id);
                continue;
            };

            let mut interfaces = Vec::new();
            for (interface, state) in topology.field("interfaces")?.object()? {
                if state.field("state")?.text()? != "forwarding" {
                    interfaces.push(interface.clone());
                }
            }
            if !interfaces.is_empty() {
                not_forwarding.push(BTreeMap::from([(format!("VLAN {}", vlan_id), interfaces)]));
            }
        }

        if !not_configured.is_empty() {
            result.is_failure(format!(
                "STP instance is not configured for the following VLAN(s): {:?}",
                not_configured
            ));
        }
        if !not_forwarding.is_empty() {
            result.is_failure(format!(
                "The following VLAN(s) have interface(s) that are not in a forwarding state: {}",
                repr(&not_forwarding)
            ));
        }
        if not_configured.is_empty() && not_forwarding.is_empty() {
            result.is_success();
        }
        Ok(())
    }
}

/// Verifies the STP root priority for a list of VLAN or MST instance IDs.
///
/// Without `instances`, every instance reported by the device is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySTPRootPriority {
    pub priority: i64,
    #[serde(default)]
    pub instances: Vec<Vlan>,
}

impl AntaTest for VerifySTPRootPriority {
    fn name(&self) -> &'static str {
        "VerifySTPRootPriority"
    }

    fn description(&self) -> &'static str {
        "Verifies the STP root priority for a provided list of VLAN or MST instance ID(s)."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["stp"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show spanning-tree root detail")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = commands[0].json_output()?;
        let instances = output.field("instances")?.object()?;
        let Some(first_name) = instances.keys().next() else {
            result.is_failure("No STP instances configured");
            return Ok(());
        };

        let prefix = if first_name.starts_with("MST") {
            "MST"
        } else if first_name.starts_with("VL") {
            "VL"
        } else {
            result.is_failure(format!("Unsupported STP instance type: {}", first_name));
            return Ok(());
        };

        let check_instances: Vec<String> = if self.instances.is_empty() {
            instances.keys().cloned().collect()
        } else {
            self.instances
                .iter()
                .map(|id| format!("{}{}", prefix, id))
                .collect()
        };

        let wrong_priority: Vec<String> = check_instances
            .into_iter()
            .filter(|instance| {
                let key = format!("instances.{}.rootBridge.priority", instance);
                get_value(output, &key, ".").and_then(Value::as_i64) != Some(self.priority)
            })
            .collect();

        if wrong_priority.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following instance(s) have the wrong STP root priority configured: {}",
                repr(&wrong_priority)
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{assert_result, evaluate, inputs};
    use crate::domain::model::TestStatus;

    fn vlan_mode(vlan: u16, protocol: &str) -> Value {
        json!({"spanningTreeVlanInstances": {vlan.to_string(): {"spanningTreeVlanInstance": {"protocol": protocol}}}})
    }

    #[test]
    fn test_verify_stp_mode() {
        let test: VerifySTPMode = inputs(json!({"mode": "rstp", "vlans": [10, 20]}));
        let result = evaluate(&test, vec![vlan_mode(10, "rstp"), vlan_mode(20, "rstp")]);
        assert_result(&result, TestStatus::Success, &[]);

        let result = evaluate(&test, vec![json!({}), vlan_mode(20, "mstp")]);
        assert_result(
            &result,
            TestStatus::Failure,
            &[
                "STP mode 'rstp' not configured for the following VLAN(s): [10]",
                "Wrong STP mode configured for the following VLAN(s): [20]",
            ],
        );
    }

    #[test]
    fn test_verify_stp_mode_defaults_and_validation() {
        let test: VerifySTPMode = inputs(json!({"vlans": [1]}));
        assert_eq!(test.mode, StpMode::Mstp);
        assert!(serde_json::from_value::<VerifySTPMode>(json!({"mode": "pvst", "vlans": [1]})).is_err());
        assert!(serde_json::from_value::<VerifySTPMode>(json!({"vlans": [4095]})).is_err());
    }

    #[test]
    fn test_verify_stp_blocked_ports() {
        let result = evaluate(&VerifySTPBlockedPorts {}, vec![json!({"spanningTreeInstances": {}})]);
        assert_result(&result, TestStatus::Success, &[]);

        let output = json!({"spanningTreeInstances": {"MST0": {"spanningTreeBlockedPorts": ["Ethernet10"]}}});
        let result = evaluate(&VerifySTPBlockedPorts {}, vec![output]);
        assert_result(
            &result,
            TestStatus::Failure,
            &["The following ports are blocked by STP: {'MST0': ['Ethernet10']}"],
        );
    }

    #[test]
    fn test_verify_stp_counters() {
        let output = json!({"interfaces": {
            "Ethernet10": {"bpduSent": 99, "bpduReceived": 0, "bpduTaggedError": 0, "bpduOtherError": 0},
            "Ethernet11": {"bpduSent": 99, "bpduReceived": 0, "bpduTaggedError": 3, "bpduOtherError": 0}
        }});
        let result = evaluate(&VerifySTPCounters {}, vec![output]);
        assert_result(
            &result,
            TestStatus::Failure,
            &["The following interfaces have STP BPDU packet errors: ['Ethernet11']"],
        );
    }

    #[test]
    fn test_verify_stp_forwarding_ports() {
        let test: VerifySTPForwardingPorts = inputs(json!({"vlans": [10, 20, 30]}));
        let vlan10 = json!({"topologies": {"Mst10": {
            "vlans": [10],
            "interfaces": {"Ethernet10": {"state": "forwarding"}}
        }}});
        let vlan20 = json!({"topologies": {"Mst20": {
            "vlans": [20],
            "interfaces": {"Ethernet10": {"state": "discarding"}, "MplsTrunk1": {"state": "forwarding"}}
        }}});
        let result = evaluate(&test, vec![vlan10, vlan20, json!({})]);
        assert_result(
            &result,
            TestStatus::Failure,
            &[
                "STP instance is not configured for the following VLAN(s): [30]",
                "The following VLAN(s) have interface(s) that are not in a forwarding state: [{'VLAN 20': ['Ethernet10']}]",
            ],
        );
    }

    #[test]
    fn test_verify_stp_root_priority() {
        let output = json!({"instances": {
            "VL10": {"rootBridge": {"priority": 32778}},
            "VL20": {"rootBridge": {"priority": 32768}}
        }});
        let test: VerifySTPRootPriority = inputs(json!({"priority": 32768, "instances": [20]}));
        assert_result(&evaluate(&test, vec![output.clone()]), TestStatus::Success, &[]);

        let test: VerifySTPRootPriority = inputs(json!({"priority": 32768}));
        assert_result(
            &evaluate(&test, vec![output]),
            TestStatus::Failure,
            &["The following instance(s) have the wrong STP root priority configured: ['VL10']"],
        );
    }

    #[test]
    fn test_verify_stp_root_priority_edge_cases() {
        let test: VerifySTPRootPriority = inputs(json!({"priority": 32768}));
        assert_result(
            &evaluate(&test, vec![json!({"instances": {}})]),
            TestStatus::Failure,
            &["No STP instances configured"],
        );
        assert_result(
            &evaluate(&test, vec![json!({"instances": {"PVST0": {"rootBridge": {"priority": 32768}}}})]),
            TestStatus::Failure,
            &["Unsupported STP instance type: PVST0"],
        );
    }
}
