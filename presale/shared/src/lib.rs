//! Logging and small common types shared by the presale ledger crates.

#[macro_use]
extern crate lazy_static;

pub mod logging;
pub mod newtypes;
pub mod utils;
