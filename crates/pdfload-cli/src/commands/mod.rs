//! Subcommands of the `pdfload` binary.

pub mod config;
pub mod inspect;
