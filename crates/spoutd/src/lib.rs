//! # spoutd
//!
//! The spout daemon: attaches to every Docker container on the host and
//! ships their output to the configured routes, with an HTTP API for live
//! tailing and route management.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;

pub use app::run;
pub use config::{Cli, expand_env, route_from_uri};
