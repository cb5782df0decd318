use crate::config::inventory::InventoryFile;
use crate::core::device::{AsyncEosDevice, DeviceSettings};
use crate::domain::ports::EosDevice;
use crate::utils::error::{AntaError, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Devices to test, in insertion order, with unique names.
#[derive(Clone, Default)]
pub struct AntaInventory {
    devices: Vec<Arc<dyn EosDevice>>,
}

impl std::fmt::Debug for AntaInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.devices.iter().map(|d| d.name()))
            .finish()
    }
}

impl AntaInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an inventory file and builds one eAPI device per entry.
    pub fn parse<P: AsRef<Path>>(path: P, settings: &DeviceSettings) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading inventory from {}", path.display());
        let file = InventoryFile::from_file(path).map_err(|e| match e {
            AntaError::IoError(io) => {
                AntaError::inventory(format!("Unable to read inventory file '{}': {}", path.display(), io))
            }
            other => other,
        })?;
        Self::from_file(&file, settings)
    }

    pub fn from_file(file: &InventoryFile, settings: &DeviceSettings) -> Result<Self> {
        let mut inventory = Self::new();
        let input = &file.anta_inventory;

        for host in &input.hosts {
            let device = AsyncEosDevice::new(
                host.host.clone(),
                host.name.clone(),
                host.port,
                host.tags.clone(),
                settings,
                host.disable_cache,
            )?;
            inventory.add_device(Arc::new(device))?;
        }

        for network in &input.networks {
            for address in network.network.addresses() {
                let device = AsyncEosDevice::new(
                    address.to_string(),
                    None,
                    None,
                    network.tags.clone(),
                    settings,
                    network.disable_cache,
                )?;
                inventory.add_device(Arc::new(device))?;
            }
        }

        for range in &input.ranges {
            for address in range.addresses() {
                let device = AsyncEosDevice::new(
                    address.to_string(),
                    None,
                    None,
                    range.tags.clone(),
                    settings,
                    range.disable_cache,
                )?;
                inventory.add_device(Arc::new(device))?;
            }
        }

        tracing::info!("Inventory loaded with {} device(s)", inventory.len());
        Ok(inventory)
    }

    pub fn add_device(&mut self, device: Arc<dyn EosDevice>) -> Result<()> {
        if self.get(device.name()).is_some() {
            return Err(AntaError::inventory(format!(
                "Device name '{}' is already used in the inventory",
                device.name()
            )));
        }
        self.devices.push(device);
        Ok(())
    }

    pub fn devices(&self) -> &[Arc<dyn EosDevice>] {
        &self.devices
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn EosDevice>> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Union of every device tag.
    pub fn tags(&self) -> BTreeSet<String> {
        self.devices
            .iter()
            .flat_map(|d| d.tags().iter().cloned())
            .collect()
    }

    /// Filtered view sharing the same devices.
    ///
    /// A device matches `tags` when it carries at least one of them.
    pub fn get_inventory(&self, established_only: bool, tags: Option<&[String]>) -> Self {
        let devices = self
            .devices
            .iter()
            .filter(|d| !established_only || d.established())
            .filter(|d| match tags {
                Some(tags) => tags.iter().any(|t| d.tags().contains(t)),
                None => true,
            })
            .cloned()
            .collect();
        Self { devices }
    }

    /// Refreshes every device concurrently.
    pub async fn connect_inventory(&self) {
        tracing::info!("Connecting to {} device(s)", self.len());
        let mut set = JoinSet::new();
        for device in &self.devices {
            let device = Arc::clone(device);
            set.spawn(async move { device.refresh().await });
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Error when refreshing inventory: {}", e);
            }
        }
        let established = self.devices.iter().filter(|d| d.established()).count();
        tracing::info!("{}/{} device(s) established", established, self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::inventory::InventoryFile;

    fn inventory() -> AntaInventory {
        let file = InventoryFile::from_toml_str(
            r#"
[anta_inventory]
[[anta_inventory.hosts]]
host = "192.168.0.10"
name = "leaf1"
tags = ["leaf"]

[[anta_inventory.hosts]]
host = "192.168.0.11"
name = "spine1"
tags = ["spine"]

[[anta_inventory.ranges]]
start = "10.1.0.1"
end = "10.1.0.2"
tags = ["leaf"]
"#,
        )
        .unwrap();
        AntaInventory::from_file(&file, &DeviceSettings::default()).unwrap()
    }

    #[test]
    fn test_from_file_builds_every_device() {
        let inventory = inventory();
        assert_eq!(inventory.len(), 4);
        assert!(inventory.get("10.1.0.2").is_some());
        assert_eq!(inventory.get("spine1").unwrap().port(), 443);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut inventory = inventory();
        let device = AsyncEosDevice::new(
            "192.168.0.99",
            Some("leaf1".to_string()),
            None,
            Vec::new(),
            &DeviceSettings::default(),
            false,
        )
        .unwrap();
        let err = inventory.add_device(Arc::new(device)).unwrap_err();
        assert!(err.to_string().contains("leaf1"));
    }

    #[test]
    fn test_get_inventory_by_tags() {
        let inventory = inventory();
        let tags = vec!["leaf".to_string()];
        let filtered = inventory.get_inventory(false, Some(&tags));
        let names: Vec<&str> = filtered.devices().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["leaf1", "10.1.0.1", "10.1.0.2"]);
        assert!(inventory.get_inventory(true, None).is_empty());
    }

    #[test]
    fn test_tags_include_device_names() {
        let tags = inventory().tags();
        assert!(tags.contains("leaf"));
        assert!(tags.contains("spine1"));
    }
}
