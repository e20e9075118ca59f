use std::path::Path;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dumpkeeper::cli::{Cli, Command, DumpArgs, StorageArgs};
use dumpkeeper::config::Config;
use dumpkeeper::error::BackupError;
use dumpkeeper::lock::RunLock;
use dumpkeeper::orchestrator::Orchestrator;
use dumpkeeper::report;
use dumpkeeper::{RetentionEngine, SnapshotCreator};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dumpkeeper={default_level},warn")));

    // stdout carries the report, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(
    cli_config: Option<&Path>,
    storage: &StorageArgs,
    dump: Option<&DumpArgs>,
) -> Result<Config, BackupError> {
    let mut config = Config::load(cli_config)?;
    config.apply_storage_args(storage);
    if let Some(dump) = dump {
        config.apply_dump_args(dump)?;
    }
    Ok(config)
}

// directories are created by the first apply, never by planning
fn retention_engine(config: &Config) -> RetentionEngine {
    RetentionEngine::new(&config.backup_dir, config.archive_dir()).with_policy(config.policy.clone())
}

fn snapshot_creator(config: &Config) -> Result<SnapshotCreator, BackupError> {
    SnapshotCreator::with_tool(config.database_url()?, &config.backup_dir, &config.dump_tool)
        .map(|creator| creator.timeout(config.timeout))
}

fn run(cli: Cli) -> Result<(), BackupError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Run(args) => {
            let config = load_config(config_path, &args.storage, Some(&args.dump))?;

            // fails fast before any retention work
            let creator = snapshot_creator(&config)?;
            let engine = retention_engine(&config);

            let report = Orchestrator::new(&engine, &creator, &config.backup_dir)
                .lock_wait(config.lock_wait)
                .run()?;
            report::print_cycle(&report, args.json);
        }
        Command::Create(args) => {
            let config = load_config(config_path, &args.storage, Some(&args.dump))?;
            let creator = snapshot_creator(&config)?;

            let _lock = RunLock::acquire(&config.backup_dir, config.lock_wait)?;
            let info = creator.create()?;
            report::print_snapshot(&info, args.json);
        }
        Command::Retain(args) => {
            let config = load_config(config_path, &args.storage, None)?;
            let engine = retention_engine(&config);

            if args.dry_run {
                let plan = engine.plan_at(Utc::now())?;
                report::print_rows(&report::plan_rows(&plan), args.json);
            } else {
                let _lock = RunLock::acquire(&config.backup_dir, config.lock_wait)?;
                let stats = engine.apply()?;
                report::print_stats(&stats, args.json);
            }
        }
        Command::List(args) => {
            let config = load_config(config_path, &args.storage, None)?;
            let engine = retention_engine(&config);

            let plan = engine.plan_at(Utc::now())?;
            report::print_rows(&report::listing_rows(&plan), args.json);
        }
    }

    Ok(())
}

/// 2 when nothing was attempted because of setup (config or missing tool), 1 otherwise.
fn exit_code(err: &BackupError) -> i32 {
    if err.is_setup_failure() {
        2
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}
