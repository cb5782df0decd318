use crate::config::substitute_env_vars;
use crate::domain::custom_types::Ipv4Network;
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryFile {
    pub anta_inventory: InventoryInput,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryInput {
    #[serde(default)]
    pub hosts: Vec<InventoryHost>,
    #[serde(default)]
    pub networks: Vec<InventoryNetwork>,
    #[serde(default)]
    pub ranges: Vec<InventoryRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryHost {
    pub host: String,
    pub name: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub disable_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryNetwork {
    pub network: Ipv4Network,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub disable_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub disable_cache: bool,
}

impl InventoryRange {
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }
}

impl InventoryFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;
        let file: Self = toml::from_str(&processed_content)
            .map_err(|e| AntaError::inventory(format!("Inventory file is not valid: {}", e)))?;
        file.validate()?;
        Ok(file)
    }
}

impl Validate for InventoryFile {
    fn validate(&self) -> Result<()> {
        for host in &self.anta_inventory.hosts {
            validate_non_empty_string("anta_inventory.hosts.host", &host.host)?;
        }
        for range in &self.anta_inventory.ranges {
            if range.start > range.end {
                return Err(AntaError::InvalidConfigValueError {
                    field: "anta_inventory.ranges".to_string(),
                    value: format!("{}-{}", range.start, range.end),
                    reason: "start address is greater than end address".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = r#"
[anta_inventory]
[[anta_inventory.hosts]]
host = "192.168.0.10"
name = "leaf1"
tags = ["leaf"]

[[anta_inventory.networks]]
network = "10.0.0.0/30"
tags = ["spine"]

[[anta_inventory.ranges]]
start = "10.1.0.1"
end = "10.1.0.3"
disable_cache = true
"#;

    #[test]
    fn test_parse_inventory_file() {
        let file = InventoryFile::from_toml_str(INVENTORY).unwrap();
        let input = &file.anta_inventory;
        assert_eq!(input.hosts[0].name.as_deref(), Some("leaf1"));
        assert_eq!(input.networks[0].network.addresses().count(), 4);
        assert_eq!(input.ranges[0].addresses().count(), 3);
        assert!(input.ranges[0].disable_cache);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let content = "[anta_inventory]\n[[anta_inventory.hosts]]\nhost = \"10.0.0.1\"\nusername = \"admin\"\n";
        let err = InventoryFile::from_toml_str(content).unwrap_err();
        assert!(matches!(err, AntaError::InventoryError { .. }));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let content = "[anta_inventory]\n[[anta_inventory.ranges]]\nstart = \"10.0.0.5\"\nend = \"10.0.0.1\"\n";
        assert!(matches!(
            InventoryFile::from_toml_str(content),
            Err(AntaError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("ANTA_TEST_INVENTORY_HOST", "172.16.0.1");
        let content = "[anta_inventory]\n[[anta_inventory.hosts]]\nhost = \"${ANTA_TEST_INVENTORY_HOST}\"\n";
        let file = InventoryFile::from_toml_str(content).unwrap();
        assert_eq!(file.anta_inventory.hosts[0].host, "172.16.0.1");
    }
}
