//! Operational helpers run outside of a test catalog.

use crate::config::commands::SnapshotCommands;
use crate::core::inventory::AntaInventory;
use crate::domain::model::{AntaCommand, AntaTemplate, OutputFormat};
use crate::domain::ports::{EosDevice, Storage};
use crate::utils::error::Result;
use chrono::Local;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Platforms without hardware drop counters.
const VIRTUAL_PLATFORMS: [&str; 2] = ["cEOSLab", "vEOS-lab"];

/// Connects to the devices matching `tags` and keeps the established ones.
async fn established_inventory(inventory: &AntaInventory, tags: Option<&[String]>) -> AntaInventory {
    let filtered = inventory.get_inventory(false, tags);
    filtered.connect_inventory().await;
    filtered.get_inventory(true, None)
}

/// Clears interface counters, and hardware drop counters on physical
/// platforms, on every established device.
pub async fn clear_counters(inventory: &AntaInventory, tags: Option<&[String]>) {
    let inventory = established_inventory(inventory, tags).await;
    let mut set = JoinSet::new();
    for device in inventory.devices() {
        let device = Arc::clone(device);
        set.spawn(async move {
            let model = device.hw_model().unwrap_or_default();
            let mut commands = vec![AntaCommand::new("clear counters").without_cache()];
            if !VIRTUAL_PLATFORMS.contains(&model.as_str()) {
                commands.push(AntaCommand::new("clear hardware counter drop").without_cache());
            }
            for command in &mut commands {
                device.collect(command).await;
                if !command.collected() {
                    tracing::error!(
                        "Could not clear counters on device {}: {}",
                        device.name(),
                        command.errors.join(", ")
                    );
                    return;
                }
            }
            tracing::info!("Cleared counters on {} ({})", device.name(), model);
        });
    }
    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Error when clearing counters: {}", e);
        }
    }
}

/// File name for a command output: `/` and `|` become `_`.
pub fn output_file_name(command: &str, ofmt: OutputFormat) -> String {
    let name = command.replace(['/', '|'], "_");
    match ofmt {
        OutputFormat::Json => format!("{}.json", name),
        OutputFormat::Text => format!("{}.log", name),
    }
}

/// Snapshot directory for `output`, suffixed with the current local time.
pub fn snapshot_dir(output: &str) -> String {
    format!("{}_{}", output, Local::now().format("%Y-%m-%d_%H%M%S"))
}

async fn collect_device<S: Storage>(device: &dyn EosDevice, commands: &SnapshotCommands, storage: &S) -> Result<usize> {
    let requests = commands
        .json_format
        .iter()
        .map(|c| AntaCommand::new(c.as_str()))
        .chain(commands.text_format.iter().map(|c| AntaCommand::text(c.as_str())));

    let mut saved = 0;
    for mut command in requests {
        device.collect(&mut command).await;
        let Some(output) = command.output.as_ref().filter(|_| command.collected()) else {
            tracing::error!(
                "Could not collect '{}' on device {}: {}",
                command.command,
                device.name(),
                command.errors.join(", ")
            );
            continue;
        };
        let (subdir, data) = match (command.ofmt, output) {
            (OutputFormat::Json, output) => ("json", serde_json::to_string_pretty(output)?),
            (OutputFormat::Text, Value::String(text)) => ("text", text.clone()),
            (OutputFormat::Text, other) => ("text", other.to_string()),
        };
        let path = format!(
            "{}/{}/{}",
            device.name(),
            subdir,
            output_file_name(&command.command, command.ofmt)
        );
        storage.write_file(&path, data.as_bytes()).await?;
        saved += 1;
    }
    Ok(saved)
}

/// Saves the outputs of `commands` for every established device under
/// `<device>/json/` and `<device>/text/` in `storage`.
pub async fn collect_commands<S>(
    inventory: &AntaInventory,
    commands: &SnapshotCommands,
    storage: Arc<S>,
    tags: Option<&[String]>,
) -> Result<()>
where
    S: Storage + 'static,
{
    let inventory = established_inventory(inventory, tags).await;
    let commands = Arc::new(commands.clone());
    let mut set = JoinSet::new();
    for device in inventory.devices() {
        let device = Arc::clone(device);
        let commands = Arc::clone(&commands);
        let storage = Arc::clone(&storage);
        set.spawn(async move {
            let saved = collect_device(device.as_ref(), &commands, storage.as_ref()).await;
            (device.name().to_string(), saved)
        });
    }
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((name, Ok(saved))) => tracing::info!("Collected {} command output(s) from {}", saved, name),
            Ok((name, Err(e))) => tracing::error!("Could not save outputs of {}: {}", name, e),
            Err(e) => tracing::error!("Error when collecting commands: {}", e),
        }
    }
    Ok(())
}

/// Collects a single command, for debugging.
pub async fn run_command(device: &dyn EosDevice, mut command: AntaCommand) -> AntaCommand {
    device.collect(&mut command).await;
    command
}

/// Renders `template` with `params` and collects it.
pub async fn run_template<I>(device: &dyn EosDevice, template: &AntaTemplate, params: I) -> Result<AntaCommand>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let command = template.render(params)?;
    Ok(run_command(device, command).await)
}
