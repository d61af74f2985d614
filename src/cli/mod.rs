//! CLI subcommand implementations for the portico binary.

pub mod doctor;
pub mod fetch_cmd;
pub mod output;
