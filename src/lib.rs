//! immuctl installs immudb and immugw as OS background services and drives
//! their lifecycle: install, uninstall, start, stop, restart and status.
//! Stop and restart can be scheduled a number of seconds ahead, and a service
//! can be launched detached after checking for an already running instance.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Lifecycle orchestration.
pub mod controller;

/// OS daemon registry.
pub mod daemon;

/// Error handling.
pub mod error;

/// Host paths, program files and privileges.
pub mod host;

/// Detached relaunch of the current executable.
pub mod launcher;

/// Process table scanning.
pub mod process;

/// Yes/no confirmation prompts.
pub mod prompt;

/// Delayed self-relaunch.
pub mod schedule;

/// Service names, actions and requests.
pub mod service;

#[cfg(test)]
pub(crate) mod test_utils;
