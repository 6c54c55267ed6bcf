//! Subcommands

pub mod send;
pub mod serve;
