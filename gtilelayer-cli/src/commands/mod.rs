//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`attribution`] - Viewport attribution lookup through a headless map
//! - [`session`] - Session creation
//! - [`tile`] - Tile URL resolution and download

pub mod attribution;
pub mod common;
pub mod session;
pub mod tile;
