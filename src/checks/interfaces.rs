//! Interface tests: counters, states, MTU and addressing.

use crate::checks::{build, TestFactory, TestModule};
use crate::domain::custom_types::{Interface, Ipv4Network, MacAddress, Percent};
use crate::domain::model::{AntaCommand, AntaTemplate, TestResult};
use crate::domain::ports::AntaTest;
use crate::utils::error::{AntaError, Result};
use crate::utils::tools::{display, get_item, repr, JsonExt};
use crate::utils::validation::validate_positive_number;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const MODULE: TestModule = TestModule {
    name: "anta.tests.interfaces",
    tests: &[
        ("VerifyInterfaceUtilization", build::<VerifyInterfaceUtilization> as TestFactory),
        ("VerifyInterfaceErrors", build::<VerifyInterfaceErrors> as TestFactory),
        ("VerifyInterfaceDiscards", build::<VerifyInterfaceDiscards> as TestFactory),
        ("VerifyInterfaceErrDisabled", build::<VerifyInterfaceErrDisabled> as TestFactory),
        ("VerifyInterfacesStatus", build::<VerifyInterfacesStatus> as TestFactory),
        ("VerifyStormControlDrops", build::<VerifyStormControlDrops> as TestFactory),
        ("VerifyPortChannels", build::<VerifyPortChannels> as TestFactory),
        ("VerifyIllegalLACP", build::<VerifyIllegalLACP> as TestFactory),
        ("VerifyLoopbackCount", build::<VerifyLoopbackCount> as TestFactory),
        ("VerifySVI", build::<VerifySVI> as TestFactory),
        ("VerifyL3MTU", build::<VerifyL3MTU> as TestFactory),
        ("VerifyIPProxyARP", build::<VerifyIPProxyARP> as TestFactory),
        ("VerifyL2MTU", build::<VerifyL2MTU> as TestFactory),
        ("VerifyInterfaceIPv4", build::<VerifyInterfaceIPv4> as TestFactory),
        ("VerifyIpVirtualRouterMac", build::<VerifyIpVirtualRouterMac> as TestFactory),
    ],
};

const VIRTUAL_PLATFORMS: &[&str] = &["cEOSLab", "vEOS-lab"];

fn is_up(status: &str) -> bool {
    matches!(status, "up" | "connected")
}

fn operational(interface: &Value) -> Result<bool> {
    Ok(interface.field("lineProtocolStatus")?.text()? == "up"
        && interface.field("interfaceStatus")?.text()? == "connected")
}

fn has_positive_counter(counters: &Value) -> Result<bool> {
    Ok(counters
        .object()?
        .values()
        .any(|v| v.as_f64().is_some_and(|n| n > 0.0)))
}

fn default_threshold() -> Percent {
    Percent::new_unchecked(75.0)
}

/// Verifies that the utilization of interfaces is below a threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceUtilization {
    #[serde(default = "default_threshold")]
    pub threshold: Percent,
}

impl AntaTest for VerifyInterfaceUtilization {
    fn name(&self) -> &'static str {
        "VerifyInterfaceUtilization"
    }

    fn description(&self) -> &'static str {
        "Verifies that the utilization of interfaces is below a certain threshold."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![
            AntaCommand::new("show interfaces counters rates"),
            AntaCommand::new("show interfaces"),
        ])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let rates = commands[0].json_output()?.field("interfaces")?.object()?;
        let interfaces = commands[1].json_output()?.field("interfaces")?;
        let mut failed: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();

        for (intf, rate) in rates {
            let details = interfaces.field(intf)?;
            if let Some(duplex) = details.get("duplex") {
                if duplex.text()? != "duplexFull" {
                    result.is_error(format!(
                        "Interface {} is not Full-Duplex, VerifyInterfaceUtilization has not been implemented in ANTA",
                        intf
                    ));
                    return Ok(());
                }
            } else if let Some(members) = details.get("memberInterfaces") {
                for (member, stats) in members.object()? {
                    if stats.field("duplex")?.text()? != "duplexFull" {
                        result.is_error(format!(
                            "Member {} of {} is not Full-Duplex, VerifyInterfaceUtilization has not been implemented in ANTA",
                            member, intf
                        ));
                        return Ok(());
                    }
                }
            }

            let bandwidth = details.field("bandwidth")?.float()?;
            if bandwidth <= 0.0 {
                return Err(AntaError::unexpected(format!(
                    "Interface {} reports a bandwidth of {}",
                    intf, bandwidth
                )));
            }
            for bps_rate in ["inBpsRate", "outBpsRate"] {
                let usage = rate.field(bps_rate)?.float()? / bandwidth * 100.0;
                if usage > self.threshold.value() {
                    failed.entry(intf.as_str()).or_default().insert(bps_rate, usage);
                }
            }
        }

        if failed.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following interfaces have a usage > {}%: {}",
                self.threshold,
                repr(&failed)
            ));
        }
        Ok(())
    }
}

/// Verifies that the interfaces error counters are equal to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceErrors {}

impl AntaTest for VerifyInterfaceErrors {
    fn name(&self) -> &'static str {
        "VerifyInterfaceErrors"
    }

    fn description(&self) -> &'static str {
        "Verifies there are no interface error counters."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show interfaces counters errors")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let counters = commands[0]
            .json_output()?
            .field("interfaceErrorCounters")?
            .object()?;
        let mut wrong = Vec::new();
        for (interface, values) in counters {
            if has_positive_counter(values)? {
                wrong.push(json!({ interface.as_str(): values }));
            }
        }

        if wrong.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following interface(s) have non-zero error counters: {}",
                repr(&wrong)
            ));
        }
        Ok(())
    }
}

/// Verifies that the interfaces packet discard counters are equal to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceDiscards {}

impl AntaTest for VerifyInterfaceDiscards {
    fn name(&self) -> &'static str {
        "VerifyInterfaceDiscards"
    }

    fn description(&self) -> &'static str {
        "Verifies there are no interface discard counters."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show interfaces counters discards")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let interfaces = commands[0].json_output()?.field("interfaces")?.object()?;
        let mut wrong = Vec::new();
        for (interface, values) in interfaces {
            if has_positive_counter(values)? {
                wrong.push(json!({ interface.as_str(): values }));
            }
        }

        if wrong.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following interfaces have non 0 discard counter(s): {}",
                repr(&wrong)
            ));
        }
        Ok(())
    }
}

/// Verifies there are no interfaces in the errdisabled state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceErrDisabled {}

impl AntaTest for VerifyInterfaceErrDisabled {
    fn name(&self) -> &'static str {
        "VerifyInterfaceErrDisabled"
    }

    fn description(&self) -> &'static str {
        "Verifies there are no interfaces in the errdisabled state."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show interfaces status")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let statuses = commands[0]
            .json_output()?
            .field("interfaceStatuses")?
            .object()?;
        let mut errdisabled = Vec::new();
        for (interface, value) in statuses {
            if value.field("linkStatus")?.text()? == "errdisabled" {
                errdisabled.push(interface.as_str());
            }
        }

        if errdisabled.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following interfaces are in error disabled state: {}",
                repr(&errdisabled)
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterfaceStatus {
    Up,
    Down,
    AdminDown,
}

impl InterfaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::AdminDown => "adminDown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineProtocolStatus {
    Up,
    Down,
    Testing,
    Unknown,
    Dormant,
    NotPresent,
    LowerLayerDown,
}

impl LineProtocolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Testing => "testing",
            Self::Unknown => "unknown",
            Self::Dormant => "dormant",
            Self::NotPresent => "notPresent",
            Self::LowerLayerDown => "lowerLayerDown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceState {
    pub name: Interface,
    pub status: InterfaceStatus,
    pub line_protocol_status: Option<LineProtocolStatus>,
}

/// Verifies the status of the provided interfaces.
///
/// With a line protocol status, both statuses must match. Without one, an
/// expected `up` requires both the status and the line protocol to be up,
/// any other expected status is compared on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfacesStatus {
    pub interfaces: Vec<InterfaceState>,
}

impl AntaTest for VerifyInterfacesStatus {
    fn name(&self) -> &'static str {
        "VerifyInterfacesStatus"
    }

    fn description(&self) -> &'static str {
        "Verifies the status of the provided interfaces."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show interfaces description")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let descriptions = commands[0]
            .json_output()?
            .field("interfaceDescriptions")?;
        result.is_success();

        let mut not_configured = Vec::new();
        let mut wrong_state = Vec::new();
        for interface in &self.interfaces {
            let Some(actual) = descriptions.get(interface.name.as_str()) else {
                not_configured.push(interface.name.to_string());
                continue;
            };
            let status = actual.field("interfaceStatus")?.text()?;
            let status = if is_up(status) { "up" } else { status };
            let proto = actual.field("lineProtocolStatus")?.text()?;
            let proto = if is_up(proto) { "up" } else { proto };

            let wrong = match interface.line_protocol_status {
                Some(expected_proto) => {
                    interface.status.as_str() != status || expected_proto.as_str() != proto
                }
                None => {
                    (interface.status == InterfaceStatus::Up && (status != "up" || proto != "up"))
                        || interface.status.as_str() != status
                }
            };
            if wrong {
                wrong_state.push(format!("{} is {}/{}", interface.name, status, proto));
            }
        }

        if !not_configured.is_empty() {
            result.is_failure(format!(
                "The following interface(s) are not configured: {}",
                repr(&not_configured)
            ));
        }
        if !wrong_state.is_empty() {
            result.is_failure(format!(
                "The following interface(s) are not in the expected state: {}",
                repr(&wrong_state)
            ));
        }
        Ok(())
    }
}

/// Verifies there are no interface storm-control drop counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyStormControlDrops {}

impl AntaTest for VerifyStormControlDrops {
    fn name(&self) -> &'static str {
        "VerifyStormControlDrops"
    }

    fn description(&self) -> &'static str {
        "Verifies there are no interface storm-control drop counters."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show storm-control")])
    }

    fn skipped_platforms(&self) -> &'static [&'static str] {
        VIRTUAL_PLATFORMS
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let interfaces = commands[0].json_output()?.field("interfaces")?.object()?;
        let mut dropping: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();
        for (interface, details) in interfaces {
            for (traffic_type, counters) in details.field("trafficTypes")?.object()? {
                if let Some(drop) = counters.get("drop") {
                    if drop.float()? != 0.0 {
                        dropping
                            .entry(interface.as_str())
                            .or_default()
                            .insert(traffic_type.clone(), drop.clone());
                    }
                }
            }
        }

        if dropping.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following interfaces have none 0 storm-control drop counters {}",
                repr(&dropping)
            ));
        }
        Ok(())
    }
}

/// Verifies there are no inactive ports in all port channels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyPortChannels {}

impl AntaTest for VerifyPortChannels {
    fn name(&self) -> &'static str {
        "VerifyPortChannels"
    }

    fn description(&self) -> &'static str {
        "Verifies there are no inactive ports in all port channels."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show port-channel")])
    }

    fn skipped_platforms(&self) -> &'static [&'static str] {
        VIRTUAL_PLATFORMS
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let port_channels = commands[0].json_output()?.field("portChannels")?.object()?;
        let mut with_inactive = Vec::new();
        for (port_channel, details) in port_channels {
            let inactive = details.field("inactivePorts")?;
            let count = match inactive {
                Value::Object(ports) => ports.len(),
                Value::Array(ports) => ports.len(),
                other => return Err(AntaError::unexpected(format!("inactivePorts is {}", other))),
            };
            if count != 0 {
                with_inactive.push(port_channel.as_str());
            }
        }

        if with_inactive.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following port-channels have inactive port(s): {}",
                repr(&with_inactive)
            ));
        }
        Ok(())
    }
}

/// Verifies there are no illegal LACP packets in all port channels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyIllegalLACP {}

impl AntaTest for VerifyIllegalLACP {
    fn name(&self) -> &'static str {
        "VerifyIllegalLACP"
    }

    fn description(&self) -> &'static str {
        "Verifies there are no illegal LACP packets in all port channels."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show lacp counters all-ports")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let port_channels = commands[0].json_output()?.field("portChannels")?.object()?;
        let mut illegal = Vec::new();
        for (port_channel, details) in port_channels {
            for (interface, counters) in details.field("interfaces")?.object()? {
                if counters.field("illegalRxCount")?.int()? != 0 {
                    illegal.push(json!({ port_channel.as_str(): interface }));
                }
            }
        }

        if illegal.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following port-channels have received illegal LACP packets on the following ports: {}",
                repr(&illegal)
            ));
        }
        Ok(())
    }
}

/// Verifies the number of loopback interfaces and that all are operational.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLoopbackCount {
    pub number: u64,
}

impl AntaTest for VerifyLoopbackCount {
    fn name(&self) -> &'static str {
        "VerifyLoopbackCount"
    }

    fn description(&self) -> &'static str {
        "Verifies the number of loopback interfaces and their status."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show ip interface brief")])
    }

    fn validate(&self) -> Result<()> {
        validate_positive_number("number", self.number, 1)
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let interfaces = commands[0].json_output()?.field("interfaces")?.object()?;
        let mut count = 0u64;
        let mut down = Vec::new();
        for (interface, details) in interfaces {
            if interface.contains("Loopback") {
                count += 1;
                if !operational(details)? {
                    down.push(interface.as_str());
                }
            }
        }

        if count != self.number {
            result.is_failure(format!(
                "Found {} Loopbacks when expecting {}",
                count, self.number
            ));
        } else if !down.is_empty() {
            result.is_failure(format!("The following Loopbacks are not up: {}", repr(&down)));
        } else {
            result.is_success();
        }
        Ok(())
    }
}

/// Verifies the status of all SVIs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySVI {}

impl AntaTest for VerifySVI {
    fn name(&self) -> &'static str {
        "VerifySVI"
    }

    fn description(&self) -> &'static str {
        "Verifies the status of all SVIs."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show ip interface brief")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let interfaces = commands[0].json_output()?.field("interfaces")?.object()?;
        let mut down = Vec::new();
        for (interface, details) in interfaces {
            if interface.contains("Vlan") && !operational(details)? {
                down.push(interface.as_str());
            }
        }

        if down.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!("The following SVIs are not up: {}", repr(&down)));
        }
        Ok(())
    }
}

fn default_ignored_interfaces() -> Vec<String> {
    ["Management", "Loopback", "Vxlan", "Tunnel"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn specific_mtu_for(specific_mtu: &[BTreeMap<String, i64>], interface: &str) -> Option<i64> {
    specific_mtu.iter().find_map(|m| m.get(interface).copied())
}

/// MTU check shared by the L3 and L2 tests: `family` extracts the part of the
/// interface name compared against `ignored_interfaces`.
fn wrong_mtu_interfaces(
    interfaces: &Map<String, Value>,
    forwarding_model: &str,
    mtu: i64,
    ignored_interfaces: &[String],
    specific_mtu: &[BTreeMap<String, i64>],
    family: impl Fn(&str) -> Option<String>,
) -> Result<Vec<Value>> {
    let mut wrong = Vec::new();
    for (interface, values) in interfaces {
        let Some(family) = family(interface) else {
            continue;
        };
        if ignored_interfaces.contains(&family) || values.field("forwardingModel")?.text()? != forwarding_model {
            continue;
        }
        let actual = values.field("mtu")?.int()?;
        let expected = specific_mtu_for(specific_mtu, interface).unwrap_or(mtu);
        if actual != expected {
            wrong.push(json!({ interface.as_str(): actual }));
        }
    }
    Ok(wrong)
}

fn default_l3_mtu() -> i64 {
    1500
}

/// Verifies the global L3 MTU of all L3 interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyL3MTU {
    #[serde(default = "default_l3_mtu")]
    pub mtu: i64,
    #[serde(default = "default_ignored_interfaces")]
    pub ignored_interfaces: Vec<String>,
    #[serde(default)]
    pub specific_mtu: Vec<BTreeMap<String, i64>>,
}

impl AntaTest for VerifyL3MTU {
    fn name(&self) -> &'static str {
        "VerifyL3MTU"
    }

    fn description(&self) -> &'static str {
        "Verifies the global L3 MTU of all L3 interfaces."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show interfaces")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let interfaces = commands[0].json_output()?.field("interfaces")?.object()?;
        let family_re = RegexBuilder::new(r"[a-z]+").case_insensitive(true).build()?;
        let wrong = wrong_mtu_interfaces(
            interfaces,
            "routed",
            self.mtu,
            &self.ignored_interfaces,
            &self.specific_mtu,
            |name| family_re.find(name).map(|m| m.as_str().to_string()),
        )?;

        if wrong.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "Some interfaces do not have correct MTU configured:\n{}",
                repr(&wrong)
            ));
        }
        Ok(())
    }
}

/// Verifies if Proxy-ARP is enabled for the provided interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyIPProxyARP {
    pub interfaces: Vec<String>,
}

impl AntaTest for VerifyIPProxyARP {
    fn name(&self) -> &'static str {
        "VerifyIPProxyARP"
    }

    fn description(&self) -> &'static str {
        "Verifies if Proxy ARP is enabled."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        let template = AntaTemplate::new("show ip interface {intf}");
        self.interfaces
            .iter()
            .map(|intf| template.render([("intf", json!(intf))]))
            .collect()
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let mut disabled = Vec::new();
        for command in commands {
            let intf = command
                .param("intf")
                .map(display)
                .ok_or_else(|| AntaError::MissingParamError {
                    message: format!("'intf' is missing for command {}", command),
                })?;
            let proxy_arp = command
                .json_output()?
                .field("interfaces")?
                .field(&intf)?
                .field("proxyArp")?
                .flag()?;
            if !proxy_arp {
                disabled.push(intf);
            }
        }

        if disabled.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "The following interface(s) have Proxy-ARP disabled: {}",
                repr(&disabled)
            ));
        }
        Ok(())
    }
}

fn default_l2_mtu() -> i64 {
    9214
}

/// Verifies the global L2 MTU of all L2 interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyL2MTU {
    #[serde(default = "default_l2_mtu")]
    pub mtu: i64,
    #[serde(default = "default_ignored_interfaces")]
    pub ignored_interfaces: Vec<String>,
    #[serde(default)]
    pub specific_mtu: Vec<BTreeMap<String, i64>>,
}

impl AntaTest for VerifyL2MTU {
    fn name(&self) -> &'static str {
        "VerifyL2MTU"
    }

    fn description(&self) -> &'static str {
        "Verifies the global L2 MTU of all L2 interfaces."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show interfaces")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let interfaces = commands[0].json_output()?.field("interfaces")?.object()?;
        let family_re = RegexBuilder::new(r"^[e,p][a-zA-Z]+[-,a-zA-Z]*\d+/*\d*")
            .case_insensitive(true)
            .build()?;
        let wrong = wrong_mtu_interfaces(
            interfaces,
            "bridged",
            self.mtu,
            &self.ignored_interfaces,
            &self.specific_mtu,
            |name| family_re.find(name).map(|m| m.as_str().to_string()),
        )?;

        if wrong.is_empty() {
            result.is_success();
        } else {
            result.is_failure(format!(
                "Some L2 interfaces do not have correct MTU configured:\n{}",
                repr(&wrong)
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceDetail {
    pub name: Interface,
    pub primary_ip: Ipv4Network,
    pub secondary_ips: Option<Vec<Ipv4Network>>,
}

/// Verifies the primary and optional secondary IPv4 addresses of interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyInterfaceIPv4 {
    pub interfaces: Vec<InterfaceDetail>,
}

fn address_with_mask(entry: &Value) -> Result<String> {
    Ok(format!(
        "{}/{}",
        entry.field("address")?.text()?,
        entry.field("maskLen")?.int()?
    ))
}

impl AntaTest for VerifyInterfaceIPv4 {
    fn name(&self) -> &'static str {
        "VerifyInterfaceIPv4"
    }

    fn description(&self) -> &'static str {
        "Verifies the interface IPv4 addresses."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        let template = AntaTemplate::new("show ip interface {interface}");
        self.interfaces
            .iter()
            .map(|detail| {
                let secondary_ips = detail.secondary_ips.as_ref().map(|ips| {
                    ips.iter().map(|ip| ip.to_string()).collect::<Vec<_>>()
                });
                template.render([
                    ("interface", json!(detail.name.as_str())),
                    ("primary_ip", json!(detail.primary_ip.to_string())),
                    ("secondary_ips", json!(secondary_ips)),
                ])
            })
            .collect()
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        result.is_success();
        for command in commands {
            let missing = |key: &str| AntaError::MissingParamError {
                message: format!("'{}' is missing for command {}", key, command),
            };
            let intf = command.param("interface").map(display).ok_or_else(|| missing("interface"))?;
            let input_primary_ip = command.param("primary_ip").map(display).ok_or_else(|| missing("primary_ip"))?;

            let address = command
                .json_output()?
                .field("interfaces")?
                .get(&intf)
                .and_then(|i| i.get("interfaceAddress"))
                .filter(|a| !a.is_null() && a.as_object().is_some_and(|o| !o.is_empty()));
            let Some(address) = address else {
                result.is_failure(format!("For interface `{}`, IP address is not configured.", intf));
                continue;
            };

            let mut failed_messages = Vec::new();
            let actual_primary_ip = address_with_mask(address.field("primaryIp")?)?;
            if actual_primary_ip != input_primary_ip {
                failed_messages.push(format!(
                    "The expected primary IP address is `{}`, but the actual primary IP address is `{}`.",
                    input_primary_ip, actual_primary_ip
                ));
            }

            if let Some(expected) = command.param("secondary_ips").and_then(Value::as_array) {
                let mut input_secondary_ips: Vec<String> = expected.iter().map(display).collect();
                input_secondary_ips.sort();
                let mut actual_secondary_ips = address
                    .field("secondaryIpsOrderedList")?
                    .array()?
                    .iter()
                    .map(address_with_mask)
                    .collect::<Result<Vec<_>>>()?;
                actual_secondary_ips.sort();

                if actual_secondary_ips.is_empty() {
                    failed_messages.push(format!(
                        "The expected secondary IP addresses are `{}`, but the actual secondary IP address is not configured.",
                        repr(&input_secondary_ips)
                    ));
                } else if actual_secondary_ips != input_secondary_ips {
                    failed_messages.push(format!(
                        "The expected secondary IP addresses are `{}`, but the actual secondary IP addresses are `{}`.",
                        repr(&input_secondary_ips),
                        repr(&actual_secondary_ips)
                    ));
                }
            }

            if !failed_messages.is_empty() {
                result.is_failure(format!("For interface `{}`, {}", intf, failed_messages.join(" ")));
            }
        }
        Ok(())
    }
}

/// Verifies the IP virtual router MAC address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyIpVirtualRouterMac {
    pub mac_address: MacAddress,
}

impl AntaTest for VerifyIpVirtualRouterMac {
    fn name(&self) -> &'static str {
        "VerifyIpVirtualRouterMac"
    }

    fn description(&self) -> &'static str {
        "Verifies the IP virtual router MAC address."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["interfaces"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show ip virtual-router")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let virtual_macs = commands[0].json_output()?.field("virtualMacs")?;
        match get_item(virtual_macs, "macAddress", &json!(self.mac_address.as_str())) {
            Some(_) => result.is_success(),
            None => result.is_failure(format!(
                "IP virtual router MAC address `{}` is not configured.",
                self.mac_address
            )),
        }
        Ok(())
    }
}
