//! Command implementations behind the `scout` binary

pub mod commands;
pub mod display;
