// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootctl command-line tool over the boot control service
//! OWNERS: @tools-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: No tests (logic covered by bootctld unit tests + tests/bootctl_host)
//!
//! PUBLIC API:
//!   - CLI: bootctl [--config <toml>] [--device <path>] [--slot-suffix <sfx>] <command>
//!
//! Exit status: 0 success / true, 1 false, 2 failure or undeterminable.
//!
//! DEPENDENCIES:
//!   - clap: argument parsing
//!   - env_logger: RUST_LOG-controlled diagnostics on stderr

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use bootctl::{MergeStatus, SlotTable};
use bootctld::{BoolResult, BootControlService, BootctlConfig, CommandResult, DEFAULT_CONFIG_PATH};
use storage::FileDevice;

const EXIT_FALSE: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "bootctl", version, about = "A/B slot and Virtual A/B merge-status control")]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Misc device (or image) to operate on, overriding the config.
    #[arg(long)]
    device: Option<PathBuf>,
    /// Running slot suffix, overriding config and kernel command line.
    #[arg(long)]
    slot_suffix: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print backend information.
    HalInfo,
    GetNumberSlots,
    GetCurrentSlot,
    MarkBootSuccessful,
    SetActiveBootSlot { slot: u32 },
    SetSlotAsUnbootable { slot: u32 },
    IsSlotBootable { slot: u32 },
    IsSlotMarkedSuccessful { slot: u32 },
    GetSuffix { slot: u32 },
    /// One of: none, unknown, snapshotted, merging, cancelled.
    SetSnapshotMergeStatus { status: MergeStatus },
    GetSnapshotMergeStatus,
    /// Print the slot table as stored.
    Dump,
    /// Write the factory slot table.
    Provision {
        /// Overwrite a table that is still valid.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = match BootctlConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("bootctl: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    if let Some(device) = cli.device {
        config.misc_device = device;
    }
    if let Some(suffix) = cli.slot_suffix {
        config.slot_suffix = Some(suffix);
    }

    let service = BootControlService::from_config(&config);
    run(&service, cli.command)
}

fn run(service: &BootControlService<FileDevice>, command: Command) -> ExitCode {
    match command {
        Command::HalInfo => {
            println!(
                "bootctl: misc-backed A/B slot table v{}.{}, virtual A/B record v{}",
                bootctl::metadata::SLOT_TABLE_MAJOR_VERSION,
                bootctl::metadata::SLOT_TABLE_MINOR_VERSION,
                bootctl::virtual_ab::VIRTUAL_AB_VERSION,
            );
            ExitCode::SUCCESS
        }
        Command::GetNumberSlots => {
            println!("{}", service.get_number_slots());
            ExitCode::SUCCESS
        }
        Command::GetCurrentSlot => match service.get_current_slot() {
            Some(slot) => {
                println!("{slot}");
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("bootctl: current slot is unknown");
                ExitCode::from(EXIT_FAILURE)
            }
        },
        Command::MarkBootSuccessful => command_exit(service.mark_boot_successful()),
        Command::SetActiveBootSlot { slot } => command_exit(service.set_active_boot_slot(slot)),
        Command::SetSlotAsUnbootable { slot } => {
            command_exit(service.set_slot_as_unbootable(slot))
        }
        Command::IsSlotBootable { slot } => bool_exit(service.is_slot_bootable(slot)),
        Command::IsSlotMarkedSuccessful { slot } => {
            bool_exit(service.is_slot_marked_successful(slot))
        }
        Command::GetSuffix { slot } => {
            println!("{}", service.get_suffix(slot));
            ExitCode::SUCCESS
        }
        Command::SetSnapshotMergeStatus { status } => {
            if service.set_snapshot_merge_status(status) {
                ExitCode::SUCCESS
            } else {
                eprintln!("bootctl: failed to set merge status {status}");
                ExitCode::from(EXIT_FAILURE)
            }
        }
        Command::GetSnapshotMergeStatus => {
            println!("{}", service.get_snapshot_merge_status());
            ExitCode::SUCCESS
        }
        Command::Dump => match service.dump() {
            Ok(table) => {
                print_table(&table);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("bootctl: {err}");
                ExitCode::from(EXIT_FAILURE)
            }
        },
        Command::Provision { force } => match service.provision(force) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => {
                eprintln!("bootctl: slot table already valid (use --force to overwrite)");
                ExitCode::from(EXIT_FAILURE)
            }
            Err(err) => {
                eprintln!("bootctl: {err}");
                ExitCode::from(EXIT_FAILURE)
            }
        },
    }
}

fn command_exit(result: CommandResult) -> ExitCode {
    if result.success {
        ExitCode::SUCCESS
    } else {
        eprintln!("bootctl: {}", result.err_msg);
        ExitCode::from(EXIT_FAILURE)
    }
}

fn bool_exit(result: BoolResult) -> ExitCode {
    match result {
        BoolResult::True => {
            println!("true");
            ExitCode::SUCCESS
        }
        BoolResult::False => {
            println!("false");
            ExitCode::from(EXIT_FALSE)
        }
        BoolResult::InvalidSlot => {
            eprintln!("bootctl: invalid slot or unreadable metadata");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn print_table(table: &SlotTable) {
    println!("version: {}.{}", table.version_major, table.version_minor);
    for slot in bootctl::Slot::ALL {
        let record = table.slot(slot);
        println!(
            "slot {}: priority={} tries_remaining={} successful_boot={} bootable={}",
            slot,
            record.priority,
            record.tries_remaining,
            u8::from(record.successful_boot),
            record.is_bootable(),
        );
    }
}
