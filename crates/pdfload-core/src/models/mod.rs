//! Data models.

pub mod config;
pub mod info;

pub use config::{OutputConfig, PdfLoadConfig};
pub use info::DocumentInfo;
