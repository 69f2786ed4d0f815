//! Command line and environment configuration for the presale server.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{App, Arg, ArgMatches};
use failure::Fail;
use log::LevelFilter;

use engine::engine_state::PresaleSettings;

const APP_NAME: &str = "presale-server";

const ADDR_ARG: &str = "addr";
const ADDR_ARG_SHORT: &str = "a";
const ADDR_ENV: &str = "PRESALE_ADDR";

const DATA_DIR_ARG: &str = "data-dir";
const DATA_DIR_ARG_SHORT: &str = "d";
const DATA_DIR_ENV: &str = "PRESALE_DATA_DIR";

const TIERS_ARG: &str = "tiers";
const TIERS_ARG_SHORT: &str = "t";
const TIERS_ENV: &str = "PRESALE_TIERS";

const ADMIN_SECRET_ARG: &str = "admin-secret";
const ADMIN_SECRET_ENV: &str = "PRESALE_ADMIN_SECRET";

const SPL_ADDRESS_ARG: &str = "spl-address";
const SPL_ADDRESS_ENV: &str = "PRESALE_SPL_ADDRESS";

const FEE_WALLET_ARG: &str = "fee-wallet";
const FEE_WALLET_ENV: &str = "PRESALE_FEE_WALLET";

const PRESALE_ENDED_ARG: &str = "presale-ended";
const PRESALE_ENDED_ENV: &str = "PRESALE_ENDED";
const BOOL_VALUES: &[&str] = &["true", "false"];

const LOG_LEVEL_ARG: &str = "log-level";
const LOG_LEVEL_ARG_SHORT: &str = "l";
const LOG_LEVEL_ENV: &str = "PRESALE_LOG_LEVEL";

const METRICS_ARG: &str = "metrics";

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_TIERS_PATH: &str = "./config/tiers.json";

#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "{}", _0)]
    Args(#[fail(cause)] clap::Error),

    #[fail(display = "could not parse addr {:?}: expected host:port", _0)]
    InvalidAddr(String),

    #[fail(display = "could not parse log-level {:?}", _0)]
    InvalidLogLevel(String),
}

impl From<clap::Error> for ConfigError {
    fn from(error: clap::Error) -> Self {
        ConfigError::Args(error)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub tiers_path: PathBuf,
    pub log_level: LevelFilter,
    pub metrics_enabled: bool,
    pub presale: PresaleSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: ([127, 0, 0, 1], 3000).into(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tiers_path: PathBuf::from(DEFAULT_TIERS_PATH),
            log_level: LevelFilter::Info,
            metrics_enabled: false,
            presale: PresaleSettings::default(),
        }
    }
}

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new(APP_NAME)
        .about("Serves the token presale ledger over HTTP")
        .arg(
            Arg::with_name(ADDR_ARG)
                .long(ADDR_ARG)
                .short(ADDR_ARG_SHORT)
                .env(ADDR_ENV)
                .value_name("HOST:PORT")
                .help("Address to listen on")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(DATA_DIR_ARG)
                .long(DATA_DIR_ARG)
                .short(DATA_DIR_ARG_SHORT)
                .env(DATA_DIR_ENV)
                .value_name("DIR")
                .help("Directory holding purchases.json, claims.json and migration.json")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(TIERS_ARG)
                .long(TIERS_ARG)
                .short(TIERS_ARG_SHORT)
                .env(TIERS_ENV)
                .value_name("FILE")
                .help("Tier table in json")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(ADMIN_SECRET_ARG)
                .long(ADMIN_SECRET_ARG)
                .env(ADMIN_SECRET_ENV)
                .hide_env_values(true)
                .value_name("SECRET")
                .help("Shared secret expected in the x-admin-secret header")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(SPL_ADDRESS_ARG)
                .long(SPL_ADDRESS_ARG)
                .env(SPL_ADDRESS_ENV)
                .value_name("ADDRESS")
                .help("Mint address of the token being sold")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(FEE_WALLET_ARG)
                .long(FEE_WALLET_ARG)
                .env(FEE_WALLET_ENV)
                .value_name("ADDRESS")
                .help("Wallet receiving purchase fees")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(PRESALE_ENDED_ARG)
                .long(PRESALE_ENDED_ARG)
                .env(PRESALE_ENDED_ENV)
                .value_name("BOOL")
                .possible_values(BOOL_VALUES)
                .help("Starts the server with the presale already ended")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(LOG_LEVEL_ARG)
                .long(LOG_LEVEL_ARG)
                .short(LOG_LEVEL_ARG_SHORT)
                .env(LOG_LEVEL_ENV)
                .value_name("LEVEL")
                .help("One of off, error, warn, info, debug, trace")
                .takes_value(true),
        )
        .arg(
            Arg::with_name(METRICS_ARG)
                .long(METRICS_ARG)
                .help("Emits duration metrics to the log"),
        )
}

fn owned_value(matches: &ArgMatches, name: &str) -> Option<String> {
    matches.value_of(name).map(str::to_string)
}

impl Config {
    /// Reads the configuration from the process arguments and environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_args(std::env::args_os())
    }

    pub fn from_args<I, T>(args: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = app().get_matches_from_safe(args)?;
        let mut ret: Config = Default::default();

        if let Some(addr) = matches.value_of(ADDR_ARG) {
            ret.addr = addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddr(addr.to_string()))?;
        }

        if let Some(data_dir) = matches.value_of(DATA_DIR_ARG) {
            ret.data_dir = PathBuf::from(data_dir);
        }

        if let Some(tiers_path) = matches.value_of(TIERS_ARG) {
            ret.tiers_path = PathBuf::from(tiers_path);
        }

        if let Some(log_level) = matches.value_of(LOG_LEVEL_ARG) {
            ret.log_level = log_level
                .parse()
                .map_err(|_| ConfigError::InvalidLogLevel(log_level.to_string()))?;
        }

        ret.metrics_enabled = matches.is_present(METRICS_ARG);

        ret.presale = PresaleSettings {
            spl_address: owned_value(&matches, SPL_ADDRESS_ARG).unwrap_or_default(),
            fee_wallet: owned_value(&matches, FEE_WALLET_ARG).unwrap_or_default(),
            admin_secret: owned_value(&matches, ADMIN_SECRET_ARG),
            presale_ended: matches.value_of(PRESALE_ENDED_ARG) == Some("true"),
        };

        Ok(ret)
    }
}
