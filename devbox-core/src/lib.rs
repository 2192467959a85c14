//! 🧰 devbox core library.
//!
//! `devbox-core` turns a TOML catalogue into concrete provisioning steps for
//! the sequencer in `devbox-workflow`, and holds the shared pieces the binary
//! needs around it (CLI, logging, operator prompts, report persistence and
//! console rendering).

pub mod cli;
pub mod config;
pub mod downloader;
pub mod errors;
pub mod logging;
pub mod operator;
pub mod packages;
pub mod render;
pub mod report_store;
pub mod steps;

#[cfg(test)]
pub mod test_env;
