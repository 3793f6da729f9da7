//! # spout-logs
//!
//! Data model shared by every part of the spout log router.
//!
//! This crate provides:
//!
//! - [`LogRecord`]: One line of container output with its container identity
//! - [`StreamType`]: Which output stream (stdout/stderr) a record came from
//! - [`ContainerInfo`]: Id, name and image of a running container
//! - [`Source`]: Selector deciding which containers a listener wants
//! - [`TypeFilter`]: Accepted stream types for a consumer
//! - [`Colorizer`]: Per-response terminal colour assignment by container name
//! - [`LineSplitter`]: Turns raw runtime chunks into whole lines
//!
//! ## Example
//!
//! ```rust
//! use spout_logs::{ContainerInfo, LogRecord, Source, StreamType};
//!
//! let web = ContainerInfo::new("0123456789abcdef0123", "/web-1", "nginx:latest");
//! let record = LogRecord::new(&web, StreamType::Stdout, "GET / 200");
//!
//! let source = Source::filter("web");
//! assert!(source.matches(&web.id, &web.name));
//! assert_eq!(record.name, "web-1");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod color;
pub mod error;
pub mod lines;
pub mod source;
pub mod types;

// Re-export main types
pub use color::{Colorizer, COLOR_RESET};
pub use error::{LogsError, Result};
pub use lines::{DEFAULT_MAX_LINE, LineSplitter};
pub use source::{NameFilter, Source};
pub use types::{short_id, ContainerInfo, LogRecord, StreamType, TypeFilter, SHORT_ID_LEN};
