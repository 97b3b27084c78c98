//! Library exports for the binary and integration tests.
/// Application directory resolution.
pub mod app_dirs;
/// Classification service client.
pub mod classifier;
/// Persistent configuration.
pub mod config;
mod http_client;
/// In-memory image file handed between components.
pub mod image_file;
/// Tracing setup.
pub mod logging;
/// Session state and the view gate.
pub mod session;
/// egui shell.
pub mod ui;
/// Upload-and-classify controller.
pub mod upload;
