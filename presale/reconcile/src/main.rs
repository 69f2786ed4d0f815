//! Reconciles the presale ledger with purchases recorded elsewhere.
//!
//! Reads a CSV with header `wallet,token,amount,transaction_signature,timestamp`
//! and appends every row whose signature the ledger does not know yet.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;

use clap::{crate_version, App, Arg};
use log::LevelFilter;

use shared::logging::{self, Settings};
use storage::ledger::Ledger;
use storage::persistence::JsonFileStore;
use storage::reconcile::{self, ImportReport};
use storage::Error;

const APP_NAME: &str = "presale-reconcile";

const DATA_DIR_ARG_NAME: &str = "data-dir";
const DATA_DIR_ARG_SHORT: &str = "d";
const DATA_DIR_ARG_VALUE_NAME: &str = "DIR";
const DATA_DIR_ARG_HELP: &str = "Directory holding the ledger files of the presale server";
const DEFAULT_DATA_DIR: &str = "./data";

const CSV_ARG_NAME: &str = "csv";
const CSV_ARG_SHORT: &str = "c";
const CSV_ARG_VALUE_NAME: &str = "FILE";
const CSV_ARG_HELP: &str = "CSV file of purchases to import";

const DRY_RUN_ARG_NAME: &str = "dry-run";
const DRY_RUN_ARG_HELP: &str = "Report what would be imported without writing anything";

struct Args {
    data_dir: PathBuf,
    csv_path: PathBuf,
    dry_run: bool,
}

fn get_args() -> Args {
    let arg_matches = App::new(APP_NAME)
        .version(crate_version!())
        .arg(
            Arg::with_name(DATA_DIR_ARG_NAME)
                .long(DATA_DIR_ARG_NAME)
                .short(DATA_DIR_ARG_SHORT)
                .value_name(DATA_DIR_ARG_VALUE_NAME)
                .help(DATA_DIR_ARG_HELP)
                .default_value(DEFAULT_DATA_DIR)
                .takes_value(true),
        )
        .arg(
            Arg::with_name(CSV_ARG_NAME)
                .long(CSV_ARG_NAME)
                .short(CSV_ARG_SHORT)
                .value_name(CSV_ARG_VALUE_NAME)
                .help(CSV_ARG_HELP)
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name(DRY_RUN_ARG_NAME)
                .long(DRY_RUN_ARG_NAME)
                .help(DRY_RUN_ARG_HELP),
        )
        .get_matches();

    Args {
        data_dir: PathBuf::from(
            arg_matches
                .value_of(DATA_DIR_ARG_NAME)
                .unwrap_or(DEFAULT_DATA_DIR),
        ),
        csv_path: PathBuf::from(arg_matches.value_of(CSV_ARG_NAME).unwrap_or_default()),
        dry_run: arg_matches.is_present(DRY_RUN_ARG_NAME),
    }
}

/// Runs one import. A dry run plans the import against the current ledger and
/// leaves the filesystem untouched, including a data directory that does not
/// exist yet.
fn run(data_dir: &Path, csv_path: &Path, dry_run: bool) -> Result<ImportReport, Error> {
    let csv = File::open(csv_path)?;

    if dry_run {
        let ledger = Ledger::open(JsonFileStore::existing(data_dir))?;
        let (_, report) = reconcile::plan_import(&ledger, csv)?;
        return Ok(report);
    }
    let mut ledger = Ledger::open(JsonFileStore::new(data_dir)?)?;
    reconcile::import_csv(&mut ledger, csv)
}

fn main() {
    if let Err(error) = logging::initialize(Settings::new(LevelFilter::Info)) {
        eprintln!("could not initialize logging: {}", error);
        process::exit(1)
    }

    let args = get_args();

    match run(&args.data_dir, &args.csv_path, args.dry_run) {
        Ok(report) => {
            let mode = if args.dry_run { "dry run" } else { "import" };
            logging::log_info(&format!(
                "{} of {}: added {}, skipped {} ({} duplicate, {} malformed)",
                mode,
                args.csv_path.display(),
                report.added,
                report.skipped(),
                report.duplicates,
                report.malformed
            ));
        }
        Err(error) => {
            logging::log_error(&format!(
                "reconciliation of {} into {} failed: {}",
                args.csv_path.display(),
                args.data_dir.display(),
                error
            ));
            process::exit(1)
        }
    }
}
