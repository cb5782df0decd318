use crate::core::catalog::{AntaCatalog, AntaTestDefinition};
use crate::core::executor::execute;
use crate::core::inventory::AntaInventory;
use crate::core::result_manager::ResultManager;
use crate::domain::ports::EosDevice;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Only devices carrying one of these tags are tested.
    pub tags: Option<Vec<String>>,
    pub established_only: bool,
    /// Upper bound on tests running at the same time.
    pub max_concurrency: usize,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tags: None,
            established_only: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Whether `definition` applies to `device`: no filter tags, or a tag in
/// common.
fn selected(device: &dyn EosDevice, definition: &AntaTestDefinition) -> bool {
    match definition.tags() {
        Some(tags) => tags.iter().any(|t| device.tags().contains(t)),
        None => true,
    }
}

/// Runs the catalog on the inventory and adds every result to `manager`.
pub async fn run(manager: &mut ResultManager, inventory: &AntaInventory, catalog: &AntaCatalog, options: &RunOptions) {
    if catalog.is_empty() {
        tracing::warn!("The list of tests is empty, exiting");
        return;
    }

    let filtered = inventory.get_inventory(false, options.tags.as_deref());
    if filtered.is_empty() {
        tracing::warn!("The inventory is empty after filtering on tags {:?}, exiting", options.tags);
        return;
    }
    filtered.connect_inventory().await;
    let selected_inventory = filtered.get_inventory(options.established_only, None);
    if selected_inventory.is_empty() {
        tracing::warn!("No reachable device was found");
        return;
    }

    let pairs: Vec<(Arc<dyn EosDevice>, AntaTestDefinition)> = selected_inventory
        .devices()
        .iter()
        .flat_map(|device| {
            catalog
                .tests()
                .iter()
                .filter(|definition| selected(device.as_ref(), definition))
                .map(|definition| (Arc::clone(device), definition.clone()))
        })
        .collect();

    if options.dry_run {
        for (device, definition) in &pairs {
            tracing::info!("Dry-run: {} would run on {}", definition.name(), device.name());
        }
        tracing::info!("Dry-run mode, {} test(s) selected, exiting", pairs.len());
        return;
    }

    tracing::info!(
        "Running {} test(s) on {} device(s), {} at a time",
        pairs.len(),
        selected_inventory.len(),
        options.max_concurrency
    );

    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let mut set = JoinSet::new();
    for (index, (device, definition)) in pairs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            (index, execute(device.as_ref(), &definition).await)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(indexed) => results.push(indexed),
            Err(e) => tracing::error!("Error when running tests: {}", e),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    manager.add_results(results.into_iter().map(|(_, result)| result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::fake::FakeDevice;
    use crate::domain::model::TestStatus;
    use serde_json::{json, Value};

    fn inventory() -> AntaInventory {
        let mut inventory = AntaInventory::new();
        let leaf = FakeDevice::new("leaf1", &["leaf"])
            .with_output("show zerotouch", json!({"mode": "disabled"}))
            .with_output("show management telnet", json!({"serverState": "disabled"}));
        let spine = FakeDevice::new("spine1", &["spine"])
            .with_output("show zerotouch", json!({"mode": "enabled"}))
            .with_output("show management telnet", json!({"serverState": "disabled"}));
        let mut down = FakeDevice::new("leaf2", &["leaf"]);
        down.established = false;
        inventory.add_device(Arc::new(leaf)).unwrap();
        inventory.add_device(Arc::new(spine)).unwrap();
        inventory.add_device(Arc::new(down)).unwrap();
        inventory
    }

    fn catalog() -> AntaCatalog {
        AntaCatalog::from_list([
            ("VerifyZeroTouch", Value::Null),
            ("VerifyTelnetStatus", json!({"filters": {"tags": ["spine"]}})),
        ])
        .unwrap()
    }

    fn summary(manager: &ResultManager) -> Vec<(String, String, TestStatus)> {
        manager
            .results()
            .iter()
            .map(|r| (r.name.clone(), r.test.clone(), r.result))
            .collect()
    }

    #[tokio::test]
    async fn test_run_device_major_order() {
        let mut manager = ResultManager::new();
        run(&mut manager, &inventory(), &catalog(), &RunOptions::default()).await;
        assert_eq!(
            summary(&manager),
            vec![
                ("leaf1".to_string(), "VerifyZeroTouch".to_string(), TestStatus::Success),
                ("spine1".to_string(), "VerifyZeroTouch".to_string(), TestStatus::Failure),
                ("spine1".to_string(), "VerifyTelnetStatus".to_string(), TestStatus::Success),
            ]
        );
        assert_eq!(manager.get_status(false), TestStatus::Failure);
    }

    #[tokio::test]
    async fn test_run_with_tags_and_low_concurrency() {
        let mut manager = ResultManager::new();
        let options = RunOptions {
            tags: Some(vec!["leaf".to_string()]),
            max_concurrency: 1,
            ..RunOptions::default()
        };
        run(&mut manager, &inventory(), &catalog(), &options).await;
        assert_eq!(
            summary(&manager),
            vec![("leaf1".to_string(), "VerifyZeroTouch".to_string(), TestStatus::Success)]
        );
    }

    #[tokio::test]
    async fn test_run_includes_unestablished_devices_on_request() {
        let mut manager = ResultManager::new();
        let options = RunOptions {
            established_only: false,
            ..RunOptions::default()
        };
        run(&mut manager, &inventory(), &catalog(), &options).await;
        assert_eq!(manager.get_devices().len(), 3);
        assert_eq!(manager.get_status(false), TestStatus::Error);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_stop_the_run() {
        let mut inventory = AntaInventory::new();
        let leaf = FakeDevice::new("leaf1", &["leaf"])
            .with_output("show zerotouch", json!({"mode": "disabled"}))
            .with_panic("show management telnet");
        let spine = FakeDevice::new("spine1", &["spine"])
            .with_output("show zerotouch", json!({"mode": "enabled"}))
            .with_output("show management telnet", json!({"serverState": "disabled"}));
        inventory.add_device(Arc::new(leaf)).unwrap();
        inventory.add_device(Arc::new(spine)).unwrap();
        let catalog = AntaCatalog::from_list([
            ("VerifyZeroTouch", Value::Null),
            ("VerifyTelnetStatus", Value::Null),
        ])
        .unwrap();

        let mut manager = ResultManager::new();
        run(&mut manager, &inventory, &catalog, &RunOptions::default()).await;
        assert_eq!(
            summary(&manager),
            vec![
                ("leaf1".to_string(), "VerifyZeroTouch".to_string(), TestStatus::Success),
                ("spine1".to_string(), "VerifyZeroTouch".to_string(), TestStatus::Failure),
                ("spine1".to_string(), "VerifyTelnetStatus".to_string(), TestStatus::Success),
            ]
        );
    }

    #[tokio::test]
    async fn test_dry_run_and_empty_catalog() {
        let mut manager = ResultManager::new();
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        run(&mut manager, &inventory(), &catalog(), &options).await;
        assert!(manager.is_empty());

        run(&mut manager, &inventory(), &AntaCatalog::default(), &RunOptions::default()).await;
        assert!(manager.is_empty());
    }
}
