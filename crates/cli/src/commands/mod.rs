//! CLI subcommands.

pub mod migrate;
pub mod password;
