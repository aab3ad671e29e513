// ABOUTME: Library root for ferry - exposes the deployment pipeline for embedding and tests.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod resolve;
pub mod secrets;
pub mod ssh;
pub mod transport;
pub mod types;
