//! Common utilities shared by the library and the CLI

pub mod error;
pub mod files;
pub mod logging;
pub mod paths;
pub mod settings;

pub use error::{ConfigStatus, Error, Result};
