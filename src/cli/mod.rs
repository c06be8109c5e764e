//! Command-line interface
//!
//! Argument definitions and command handlers for the `livecoord` binary.

pub mod args;
pub mod commands;
