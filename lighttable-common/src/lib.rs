//! # Lighttable Common Library
//!
//! Domain code shared by the Lighttable media review service:
//! - Sidecar metadata store (`<file>.txt` beside each content file)
//! - File tree listing with derived-artifact filtering
//! - Users, session tokens and start-path confinement
//! - Configuration loading
//! - Path, naming and MIME utilities

pub mod access;
pub mod config;
pub mod error;
pub mod files;
pub mod metadata;
pub mod mime;
pub mod naming;
pub mod paths;
pub mod time;

pub use error::{Error, Result};
pub use metadata::{Actor, Metadata, MetadataStore, SidecarRead};
