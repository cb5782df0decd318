//! Management plane security tests.

use crate::checks::{build, TestFactory, TestModule};
use crate::domain::custom_types::EncryptionAlgorithm;
use crate::domain::model::{AntaCommand, AntaTemplate, TestResult};
use crate::domain::ports::AntaTest;
use crate::utils::error::{AntaError, Result};
use crate::utils::tools::{display, get_failed_logs, get_item, get_value, repr, JsonExt};
use crate::utils::validation::validate_positive_number;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MODULE: TestModule = TestModule {
    name: "anta.tests.security",
    tests: &[
        ("VerifySSHStatus", build::<VerifySSHStatus> as TestFactory),
        ("VerifySSHIPv4Acl", build::<VerifySSHIPv4Acl> as TestFactory),
        ("VerifySSHIPv6Acl", build::<VerifySSHIPv6Acl> as TestFactory),
        ("VerifyTelnetStatus", build::<VerifyTelnetStatus> as TestFactory),
        ("VerifyAPIHttpStatus", build::<VerifyAPIHttpStatus> as TestFactory),
        ("VerifyAPIHttpsSSL", build::<VerifyAPIHttpsSSL> as TestFactory),
        ("VerifyAPIIPv4Acl", build::<VerifyAPIIPv4Acl> as TestFactory),
        ("VerifyAPIIPv6Acl", build::<VerifyAPIIPv6Acl> as TestFactory),
        ("VerifyAPISSLCertificate", build::<VerifyAPISSLCertificate> as TestFactory),
        ("VerifyBannerLogin", build::<VerifyBannerLogin> as TestFactory),
        ("VerifyBannerMotd", build::<VerifyBannerMotd> as TestFactory),
        ("VerifyIPv4ACL", build::<VerifyIPv4ACL> as TestFactory),
    ],
};

const SECONDS_PER_DAY: f64 = 86_400.0;

fn default_vrf() -> String {
    "default".to_string()
}

/// Checks an ACL summary: `number` ACLs, all configured and active in `vrf`.
/// `label` is used in messages, e.g. "SSH IPv4".
fn check_acl_summary(
    output: &Value,
    list_key: &str,
    label: &str,
    number: u64,
    vrf: &str,
    result: &mut TestResult,
) -> Result<()> {
    let acl_list = output.field(list_key)?.field("aclList")?.array()?;
    if acl_list.len() as u64 != number {
        result.is_failure(format!(
            "Expected {} {} ACL(s) in vrf {} but got {}",
            number,
            label,
            vrf,
            acl_list.len()
        ));
        return Ok(());
    }

    let contains_vrf = |acl: &Value, key: &str| -> Result<bool> {
        Ok(acl.field(key)?.array()?.iter().any(|v| v.as_str() == Some(vrf)))
    };
    let mut not_configured = Vec::new();
    for acl in acl_list {
        if !contains_vrf(acl, "configuredVrfs")? || !contains_vrf(acl, "activeVrfs")? {
            not_configured.push(acl.field("name")?.text()?.to_string());
        }
    }

    if not_configured.is_empty() {
        result.is_success();
    } else {
        result.is_failure(format!(
            "{} ACL(s) not configured or active in vrf {}: {}",
            label,
            vrf,
            repr(&not_configured)
        ));
    }
    Ok(())
}

/// Verifies if the SSHD agent is disabled in the default VRF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySSHStatus {}

impl AntaTest for VerifySSHStatus {
    fn name(&self) -> &'static str {
        "VerifySSHStatus"
    }

    fn description(&self) -> &'static str {
        "Verifies if the SSHD agent is disabled in the default VRF."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::text("show management ssh")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = commands[0].text_output()?;
        let line = output
            .lines()
            .find(|line| line.starts_with("SSHD status"))
            .ok_or_else(|| AntaError::unexpected("no 'SSHD status' line in 'show management ssh'"))?;
        let status = line
            .split_once("is ")
            .map(|(_, status)| status)
            .ok_or_else(|| AntaError::unexpected(format!("cannot parse '{}'", line)))?;

        if status == "disabled" {
            result.is_success();
        } else {
            result.is_failure(line);
        }
        Ok(())
    }
}

macro_rules! acl_summary_test {
    ($name:ident, $description:literal, $command:literal, $list_key:literal, $label:literal) => {
        #[doc = $description]
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $name {
            pub number: u64,
            #[serde(default = "default_vrf")]
            pub vrf: String,
        }

        impl AntaTest for $name {
            fn name(&self) -> &'static str {
                stringify!($name)
            }

            fn description(&self) -> &'static str {
                $description
            }

            fn categories(&self) -> &'static [&'static str] {
                &["security"]
            }

            fn commands(&self) -> Result<Vec<AntaCommand>> {
                Ok(vec![AntaCommand::new($command)])
            }

            fn validate(&self) -> Result<()> {
                validate_positive_number("number", self.number, 1)
            }

            fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
                check_acl_summary(
                    commands[0].json_output()?,
                    $list_key,
                    $label,
                    self.number,
                    &self.vrf,
                    result,
                )
            }
        }
    };
}

acl_summary_test!(
    VerifySSHIPv4Acl,
    "Verifies if the SSHD agent has IPv4 ACL(s) configured.",
    "show management ssh ip access-list summary",
    "ipAclList",
    "SSH IPv4"
);

acl_summary_test!(
    VerifySSHIPv6Acl,
    "Verifies if the SSHD agent has IPv6 ACL(s) configured.",
    "show management ssh ipv6 access-list summary",
    "ipv6AclList",
    "SSH IPv6"
);

acl_summary_test!(
    VerifyAPIIPv4Acl,
    "Verifies if eAPI has the right number IPv4 ACL(s) configured for a specified VRF.",
    "show management api http-commands ip access-list summary",
    "ipAclList",
    "eAPI IPv4"
);

acl_summary_test!(
    VerifyAPIIPv6Acl,
    "Verifies if eAPI has the right number IPv6 ACL(s) configured for a specified VRF.",
    "show management api http-commands ipv6 access-list summary",
    "ipv6AclList",
    "eAPI IPv6"
);

/// Verifies if Telnet is disabled in the default VRF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyTelnetStatus {}

impl AntaTest for VerifyTelnetStatus {
    fn name(&self) -> &'static str {
        "VerifyTelnetStatus"
    }

    fn description(&self) -> &'static str {
        "Verifies if Telnet is disabled in the default VRF."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show management telnet")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        if commands[0].json_output()?.field("serverState")?.text()? == "disabled" {
            result.is_success();
        } else {
            result.is_failure("Telnet status for Default VRF is enabled");
        }
        Ok(())
    }
}

/// Verifies if eAPI HTTP server is disabled globally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyAPIHttpStatus {}

impl AntaTest for VerifyAPIHttpStatus {
    fn name(&self) -> &'static str {
        "VerifyAPIHttpStatus"
    }

    fn description(&self) -> &'static str {
        "Verifies if eAPI HTTP server is disabled globally."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show management api http-commands")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = commands[0].json_output()?;
        let enabled = output.field("enabled")?.flag()?;
        let http_running = output.field("httpServer")?.field("running")?.flag()?;
        if enabled && !http_running {
            result.is_success();
        } else {
            result.is_failure("eAPI HTTP server is enabled globally");
        }
        Ok(())
    }
}

/// Verifies if the eAPI has a valid SSL profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyAPIHttpsSSL {
    pub profile: String,
}

impl AntaTest for VerifyAPIHttpsSSL {
    fn name(&self) -> &'static str {
        "VerifyAPIHttpsSSL"
    }

    fn description(&self) -> &'static str {
        "Verifies if the eAPI has a valid SSL profile."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show management api http-commands")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let profile = commands[0].json_output()?.get("sslProfile");
        let name = profile.and_then(|p| p.get("name")).and_then(Value::as_str);
        let state = profile.and_then(|p| p.get("state")).and_then(Value::as_str);

        match (name, state) {
            (Some(name), Some(state)) if name == self.profile && state == "valid" => result.is_success(),
            (Some(_), Some(_)) => result.is_failure(format!(
                "eAPI HTTPS server SSL profile ({}) is misconfigured or invalid",
                self.profile
            )),
            _ => result.is_failure(format!(
                "eAPI HTTPS server SSL profile ({}) is not configured",
                self.profile
            )),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSslCertificate {
    pub certificate_name: String,
    /// Days before expiry under which the test fails.
    pub expiry_threshold: i64,
    pub common_name: String,
    pub encryption_algorithm: EncryptionAlgorithm,
    pub key_size: u32,
}

/// Verifies the eAPI SSL certificate expiry, common subject name, encryption
/// algorithm and key size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyAPISSLCertificate {
    pub certificates: Vec<ApiSslCertificate>,
}

impl AntaTest for VerifyAPISSLCertificate {
    fn name(&self) -> &'static str {
        "VerifyAPISSLCertificate"
    }

    fn description(&self) -> &'static str {
        "Verifies the eAPI SSL certificate expiry, common subject name, encryption algorithm and key size."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![
            AntaCommand::new("show management security ssl certificate"),
            AntaCommand::new("show clock"),
        ])
    }

    fn validate(&self) -> Result<()> {
        for certificate in &self.certificates {
            let allowed = certificate.encryption_algorithm.allowed_key_sizes();
            if !allowed.contains(&certificate.key_size) {
                return Err(AntaError::InvalidInputs {
                    test: self.name().to_string(),
                    message: format!(
                        "`{}` key size {} is invalid for {} encryption. Allowed sizes are {:?}.",
                        certificate.certificate_name,
                        certificate.key_size,
                        certificate.encryption_algorithm.as_str(),
                        allowed
                    ),
                });
            }
        }
        Ok(())
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        result.is_success();
        let certificates = commands[0].json_output()?.field("certificates")?;
        let now = commands[1].json_output()?.field("utcTime")?.float()?;

        for certificate in &self.certificates {
            let Some(data) = certificates
                .get(&certificate.certificate_name)
                .filter(|d| d.as_object().is_some_and(|o| !o.is_empty()))
            else {
                result.is_failure(format!(
                    "SSL certificate '{}', is not configured.\n",
                    certificate.certificate_name
                ));
                continue;
            };

            let expiry = data.field("notAfter")?.float()?;
            let days = ((expiry - now) / SECONDS_PER_DAY).floor() as i64;
            if 0 < days && days < certificate.expiry_threshold {
                result.is_failure(format!(
                    "SSL certificate `{}` is about to expire in {} days.\n",
                    certificate.certificate_name, days
                ));
            } else if days < 0 {
                result.is_failure(format!(
                    "SSL certificate `{}` is expired.\n",
                    certificate.certificate_name
                ));
            }

            let expected = [
                ("subject.commonName", json!(certificate.common_name)),
                ("publicKey.encryptionAlgorithm", json!(certificate.encryption_algorithm)),
                ("publicKey.size", json!(certificate.key_size)),
            ];
            let actual: Vec<(&str, Option<Value>)> = expected
                .iter()
                .map(|(key, _)| (*key, get_value(data, key, ".").cloned()))
                .collect();
            let failed_logs = get_failed_logs(&expected, &actual);
            if !failed_logs.is_empty() {
                result.is_failure(format!(
                    "SSL certificate `{}` is not configured properly:{}\n",
                    certificate.certificate_name, failed_logs
                ));
            }
        }
        Ok(())
    }
}

/// Trims every line of a banner the way EOS stores it.
fn clean_banner(banner: &str) -> String {
    banner
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verifies the login banner of a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyBannerLogin {
    pub login_banner: String,
}

impl AntaTest for VerifyBannerLogin {
    fn name(&self) -> &'static str {
        "VerifyBannerLogin"
    }

    fn description(&self) -> &'static str {
        "Verifies the login banner of a device."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show banner login")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let banner = commands[0].json_output()?.field("loginBanner")?.text()?;
        let expected = clean_banner(&self.login_banner);
        if banner == expected {
            result.is_success();
        } else {
            result.is_failure(format!(
                "Expected `{}` as the login banner, but found `{}` instead.",
                expected, banner
            ));
        }
        Ok(())
    }
}

/// Verifies the motd banner of a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyBannerMotd {
    pub motd_banner: String,
}

impl AntaTest for VerifyBannerMotd {
    fn name(&self) -> &'static str {
        "VerifyBannerMotd"
    }

    fn description(&self) -> &'static str {
        "Verifies the motd banner of a device."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show banner motd")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let banner = commands[0].json_output()?.field("motd")?.text()?;
        let expected = clean_banner(&self.motd_banner);
        if banner == expected {
            result.is_success();
        } else {
            result.is_failure(format!(
                "Expected `{}` as the motd banner, but found `{}` instead.",
                expected, banner
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AclEntry {
    pub sequence: u32,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ipv4Acl {
    pub name: String,
    pub entries: Vec<AclEntry>,
}

/// Verifies the configuration of IPv4 ACLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyIPv4ACL {
    pub ipv4_access_lists: Vec<Ipv4Acl>,
}

impl AntaTest for VerifyIPv4ACL {
    fn name(&self) -> &'static str {
        "VerifyIPv4ACL"
    }

    fn description(&self) -> &'static str {
        "Verifies the configuration of IPv4 ACLs."
    }

    fn categories(&self) -> &'static [&'static str] {
        &["security"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        let template = AntaTemplate::new("show ip access-lists {acl}");
        self.ipv4_access_lists
            .iter()
            .map(|acl| {
                template.render([
                    ("acl", json!(acl.name)),
                    ("entries", serde_json::to_value(&acl.entries)?),
                ])
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for acl in &self.ipv4_access_lists {
            for entry in &acl.entries {
                validate_positive_number("sequence", u64::from(entry.sequence), 1)?;
            }
        }
        Ok(())
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        result.is_success();
        for command in commands {
            let missing = |key: &str| AntaError::MissingParamError {
                message: format!("'{}' is missing for command {}", key, command),
            };
            let acl_name = command.param("acl").map(display).ok_or_else(|| missing("acl"))?;
            let entries: Vec<AclEntry> =
                serde_json::from_value(command.param("entries").cloned().ok_or_else(|| missing("entries"))?)?;

            let acl_list = command.json_output()?.field("aclList")?.array()?;
            let Some(acl) = acl_list.first() else {
                result.is_failure(format!("{}: Not found", acl_name));
                continue;
            };

            let sequences = acl.field("sequence")?;
            let mut failed_log = String::new();
            for entry in &entries {
                match get_item(sequences, "sequenceNumber", &json!(entry.sequence)) {
                    None => failed_log.push_str(&format!(
                        "Sequence number `{}` is not found.\n",
                        entry.sequence
                    )),
                    Some(actual) => {
                        let text = actual.field("text")?.text()?;
                        if text != entry.action {
                            failed_log.push_str(&format!(
                                "Expected `{}` as sequence number {} action but found `{}` instead.\n",
                                entry.action, entry.sequence, text
                            ));
                        }
                    }
                }
            }
            if !failed_log.is_empty() {
                result.is_failure(format!("{}:\n{}", acl_name, failed_log));
            }
        }
        Ok(())
    }
}
