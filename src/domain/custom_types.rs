//! Validated input types shared by the test modules and the inventory.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

const INTERFACE_PATTERN: &str =
    r"^(Dps|Ethernet|Fabric|Loopback|Management|Port-Channel|Tunnel|Vlan|Vxlan)[0-9]+(/[0-9]+)*(\.[0-9]+)?$";
const INTERFACE_ID_PATTERN: &str = r"\d+(/\d+)*(\.\d+)?";

/// An EOS interface name such as `Ethernet1/1` or `Port-Channel10.100`.
///
/// Short aliases (`et`, `eth`, `po`, `lo`) are expanded and the first letter
/// is upper-cased before the name is checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interface(String);

impl Interface {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn autocomplete_interface(value: &str) -> Result<String, String> {
    let id_re = Regex::new(INTERFACE_ID_PATTERN).map_err(|e| e.to_string())?;
    let Some(id) = id_re.find(value) else {
        return Err(format!("Could not parse interface ID in interface '{}'", value));
    };
    let lower = value.to_lowercase();
    for (alias, full_name) in [
        ("et", "Ethernet"),
        ("eth", "Ethernet"),
        ("po", "Port-Channel"),
        ("lo", "Loopback"),
    ] {
        if lower.starts_with(alias) {
            return Ok(format!("{}{}", full_name, id.as_str()));
        }
    }
    Ok(value.to_string())
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl FromStr for Interface {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = autocomplete_interface(&capitalize(value))?;
        let re = Regex::new(INTERFACE_PATTERN).map_err(|e| e.to_string())?;
        if re.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(format!(
                "Interface '{}' should match pattern '{}'",
                value, INTERFACE_PATTERN
            ))
        }
    }
}

impl TryFrom<String> for Interface {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interface> for String {
    fn from(value: Interface) -> Self {
        value.0
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// VLAN identifier, 1 to 4094.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Vlan(u16);

impl Vlan {
    pub fn id(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Vlan {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (1..=4094).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("VLAN {} is out of range 1-4094", value))
        }
    }
}

impl From<Vlan> for u16 {
    fn from(value: Vlan) -> Self {
        value.0
    }
}

impl fmt::Display for Vlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Percentage between 0 and 100.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percent(f64);

impl Percent {
    /// Builds a percentage from a constant known to be in range.
    pub(crate) const fn new_unchecked(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Percent {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if (0.0..=100.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("{} is not a percentage between 0 and 100", value))
        }
    }
}

impl From<Percent> for f64 {
    fn from(value: Percent) -> Self {
        value.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IPv4 network in CIDR notation with no host bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Network {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Network {
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix_len))
        }
    }

    /// Every address of the network, network and broadcast included.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        let start = u32::from(self.address);
        let end = start | !self.mask();
        (start..=end).map(Ipv4Addr::from)
    }
}

impl FromStr for Ipv4Network {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = value.split_once('/').unwrap_or((value, "32"));
        let address: Ipv4Addr = address
            .parse()
            .map_err(|_| format!("'{}' is not a valid IPv4 network", value))?;
        let prefix_len: u8 = prefix
            .parse()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| format!("'{}' has an invalid prefix length", value))?;
        let network = Self { address, prefix_len };
        if u32::from(address) & !network.mask() != 0 {
            return Err(format!("'{}' has host bits set", value));
        }
        Ok(network)
    }
}

impl TryFrom<String> for Ipv4Network {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Network> for String {
    fn from(value: Ipv4Network) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Ipv4Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// MAC address normalised to lower-case colon-separated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("'{}' is not a valid MAC address", value);
        let hex: String = if value.contains('.') {
            let groups: Vec<&str> = value.split('.').collect();
            if groups.len() != 3 || groups.iter().any(|g| g.len() != 4) {
                return Err(invalid());
            }
            groups.concat()
        } else {
            let octets: Vec<&str> = value.split([':', '-']).collect();
            if octets.len() != 6 || octets.iter().any(|o| o.len() != 2) {
                return Err(invalid());
            }
            octets.concat()
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let hex = hex.to_lowercase();
        let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
        Ok(Self(octets.join(":")))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(value: MacAddress) -> Self {
        value.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "ECDSA")]
    Ecdsa,
}

impl EncryptionAlgorithm {
    pub fn allowed_key_sizes(&self) -> &'static [u32] {
        match self {
            Self::Rsa => &[2048, 3072, 4096],
            Self::Ecdsa => &[256, 384, 521],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ecdsa => "ECDSA",
        }
    }
}
