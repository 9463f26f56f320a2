//! Subcommand implementations

pub mod config;
pub mod doctor;
pub mod feed;
pub mod fetch;
pub mod run;
