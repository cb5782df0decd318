//! Handlers behind each `anta` subcommand.

use crate::checks::MODULES;
use crate::config::cli::{
    parse_params, CheckAction, Cli, CommandFormat, Commands, DebugAction, ExecAction, GetAction, GlobalArgs,
    GroupBy, NrfuArgs, NrfuReport,
};
use crate::config::commands::SnapshotCommands;
use crate::core::catalog::AntaCatalog;
use crate::core::device::DeviceSettings;
use crate::core::exec::{clear_counters, collect_commands, run_command, run_template, snapshot_dir};
use crate::core::inventory::AntaInventory;
use crate::core::reporter;
use crate::core::result_manager::ResultManager;
use crate::core::runner::{run, RunOptions};
use crate::core::storage::LocalStorage;
use crate::domain::model::{AntaCommand, AntaTemplate, OutputFormat, TestStatus};
use crate::domain::ports::EosDevice;
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::Validate;
use clap::CommandFactory;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

pub const EXIT_OK: u8 = 0;
pub const EXIT_TESTS_ERROR: u8 = 3;
pub const EXIT_TESTS_FAILED: u8 = 4;

/// Runs the parsed command line and returns the process exit code.
pub async fn execute(cli: Cli) -> Result<u8> {
    cli.validate()?;
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(EXIT_OK);
    };
    let global = cli.global;

    match command {
        Commands::Nrfu(args) => nrfu(&global, args).await,
        Commands::Check {
            action: CheckAction::Catalog { catalog },
        } => {
            let catalog = AntaCatalog::parse(&catalog)?;
            println!(
                "Catalog is valid: {} ({} test(s))",
                catalog.filename().map(|p| p.display().to_string()).unwrap_or_default(),
                catalog.len()
            );
            Ok(EXIT_OK)
        }
        Commands::Exec { action } => {
            let inventory = load_inventory(&global)?;
            match action {
                ExecAction::ClearCounters { tags } => clear_counters(&inventory, tags.as_deref()).await,
                ExecAction::Snapshot {
                    commands_list,
                    output,
                    tags,
                } => {
                    let commands = SnapshotCommands::from_file(&commands_list)?;
                    let dir = snapshot_dir(&output);
                    let storage = Arc::new(LocalStorage::new(&dir));
                    collect_commands(&inventory, &commands, storage, tags.as_deref()).await?;
                    println!("Snapshot saved to {}", dir);
                }
            }
            Ok(EXIT_OK)
        }
        Commands::Get { action } => get(&global, action).await,
        Commands::Debug { action } => debug(&global, action).await,
    }
}

fn load_inventory(global: &GlobalArgs) -> Result<AntaInventory> {
    let settings = global.device_settings()?;
    AntaInventory::parse(global.inventory()?, &settings)
}

async fn nrfu(global: &GlobalArgs, args: NrfuArgs) -> Result<u8> {
    let mut inventory = load_inventory(global)?;
    if !args.device.is_empty() {
        let mut selected = AntaInventory::new();
        for device in inventory.devices() {
            if args.device.iter().any(|d| d == device.name()) {
                selected.add_device(Arc::clone(device))?;
            }
        }
        inventory = selected;
    }

    let mut catalog = AntaCatalog::parse(&args.catalog)?;
    if !args.test.is_empty() {
        let tests = catalog
            .tests()
            .iter()
            .filter(|t| args.test.iter().any(|name| name == t.name()))
            .cloned()
            .collect();
        catalog.set_tests(tests);
    }

    let options = RunOptions {
        tags: args.tags.clone(),
        max_concurrency: args.max_concurrency,
        dry_run: args.dry_run,
        ..RunOptions::default()
    };
    let mut manager = ResultManager::new();
    run(&mut manager, &inventory, &catalog, &options).await;
    if args.dry_run {
        return Ok(EXIT_OK);
    }

    let shown = manager.filter(&args.hide);
    match args.report.unwrap_or(NrfuReport::Table { group_by: None }) {
        NrfuReport::Table { group_by: None } => print!("{}", reporter::report_all(&shown, "All tests results")),
        NrfuReport::Table {
            group_by: Some(GroupBy::Device),
        } => print!("{}", reporter::report_summary_devices(&shown)),
        NrfuReport::Table {
            group_by: Some(GroupBy::Test),
        } => print!("{}", reporter::report_summary_tests(&shown)),
        NrfuReport::Text => print!("{}", reporter::report_text(&shown)),
        NrfuReport::Json { output: None } => println!("{}", reporter::report_json(&shown)?),
        NrfuReport::Json { output: Some(path) } => {
            reporter::save_json(&shown, &LocalStorage::new(PathBuf::new()), &path.to_string_lossy()).await?;
        }
        NrfuReport::Csv { csv_output } => {
            reporter::save_csv(&shown, &LocalStorage::new(PathBuf::new()), &csv_output.to_string_lossy()).await?;
        }
    }

    Ok(exit_code(&manager, args.ignore_status, args.ignore_error))
}

/// Exit code of a run: errors first, then failures.
pub fn exit_code(manager: &ResultManager, ignore_status: bool, ignore_error: bool) -> u8 {
    if ignore_status {
        return EXIT_OK;
    }
    match manager.get_status(ignore_error) {
        TestStatus::Error => EXIT_TESTS_ERROR,
        TestStatus::Failure => EXIT_TESTS_FAILED,
        _ => EXIT_OK,
    }
}

async fn get(global: &GlobalArgs, action: GetAction) -> Result<u8> {
    match action {
        GetAction::Inventory { connected, tags } => {
            let settings = if connected {
                global.device_settings()?
            } else {
                DeviceSettings::default()
            };
            let inventory = AntaInventory::parse(global.inventory()?, &settings)?.get_inventory(false, tags.as_deref());
            if connected {
                inventory.connect_inventory().await;
            }
            let devices: Vec<Value> = inventory
                .devices()
                .iter()
                .map(|d| {
                    json!({
                        "name": d.name(),
                        "host": d.host(),
                        "port": d.port(),
                        "tags": d.tags(),
                        "is_online": d.is_online(),
                        "established": d.established(),
                        "hw_model": d.hw_model(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        GetAction::Tags => {
            let inventory = AntaInventory::parse(global.inventory()?, &DeviceSettings::default())?;
            println!("{}", serde_json::to_string_pretty(&inventory.tags())?);
        }
        GetAction::Tests { module } => {
            for test_module in MODULES {
                if module.as_deref().is_some_and(|m| m != test_module.name) {
                    continue;
                }
                println!("{}:", test_module.name);
                for name in test_module.test_names() {
                    println!("  - {}", name);
                }
            }
        }
    }
    Ok(EXIT_OK)
}

async fn debug(global: &GlobalArgs, action: DebugAction) -> Result<u8> {
    let inventory = load_inventory(global)?;
    let device_name = match &action {
        DebugAction::RunCmd { device, .. } | DebugAction::RunTemplate { device, .. } => device,
    };
    let device = inventory
        .get(device_name)
        .ok_or_else(|| AntaError::inventory(format!("Device {} does not exist in the inventory", device_name)))?;
    device.refresh().await;

    let command = match action {
        DebugAction::RunCmd { command, format, .. } => {
            run_command(device.as_ref(), with_format(AntaCommand::new(command), &format)).await
        }
        DebugAction::RunTemplate {
            template,
            format,
            params,
            ..
        } => {
            let mut template = AntaTemplate::new(template)
                .with_format(format.ofmt)
                .with_version(format.api_version);
            if let Some(revision) = format.revision {
                template = template.with_revision(revision);
            }
            let params = parse_params(&params)?
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)));
            run_template(device.as_ref(), &template, params).await?
        }
    };

    print_command(device.as_ref(), &command)?;
    Ok(if command.collected() { EXIT_OK } else { 1 })
}

fn with_format(command: AntaCommand, format: &CommandFormat) -> AntaCommand {
    let command = command.with_format(format.ofmt).with_version(format.api_version);
    match format.revision {
        Some(revision) => command.with_revision(revision),
        None => command,
    }
}

fn print_command(device: &dyn EosDevice, command: &AntaCommand) -> Result<()> {
    if !command.collected() {
        eprintln!(
            "Command '{}' failed on {}: {}",
            command.command,
            device.name(),
            command.errors.join(", ")
        );
        return Ok(());
    }
    println!("run command '{}' on {}", command.command, device.name());
    match (command.ofmt, &command.output) {
        (OutputFormat::Text, Some(Value::String(text))) => print!("{}", text),
        (_, Some(output)) => println!("{}", serde_json::to_string_pretty(output)?),
        (_, None) => {}
    }
    Ok(())
}
