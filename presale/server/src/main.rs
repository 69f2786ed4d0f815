use std::process;
use std::sync::Arc;

use engine::engine_state::PresaleEngine;
use server::config::{Config, ConfigError};
use server::service;
use shared::logging::{self, Settings};
use storage::ledger::Ledger;
use storage::persistence::JsonFileStore;
use storage::tier::TierTable;

fn get_config() -> Config {
    match Config::from_env() {
        Ok(config) => config,
        Err(ConfigError::Args(error)) => error.exit(),
        Err(error) => {
            eprintln!("invalid configuration: {}", error);
            process::exit(1)
        }
    }
}

fn main() {
    let config = get_config();

    let settings = Settings::new(config.log_level).with_metrics_enabled(config.metrics_enabled);
    if let Err(error) = logging::initialize(settings) {
        eprintln!("could not initialize logging: {}", error);
        process::exit(1)
    }

    let tiers = TierTable::load(&config.tiers_path);
    if tiers.is_empty() {
        logging::log_warning(&format!(
            "no tiers loaded from {}; purchases will not be assigned a tier",
            config.tiers_path.display()
        ));
    }

    let store = match JsonFileStore::new(&config.data_dir) {
        Ok(store) => store,
        Err(error) => {
            logging::log_error(&format!(
                "could not open data directory {}: {}",
                config.data_dir.display(),
                error
            ));
            process::exit(1)
        }
    };
    let ledger = Ledger::load(store);

    let engine = Arc::new(PresaleEngine::new(tiers, ledger, config.presale.clone()));

    let (addr, server) = match service::bind(engine, &config.addr) {
        Ok(bound) => bound,
        Err(error) => {
            logging::log_error(&format!("could not bind {}: {}", config.addr, error));
            process::exit(1)
        }
    };

    logging::log_info(&format!("presale server listening on {}", addr));

    hyper::rt::run(server);
}
