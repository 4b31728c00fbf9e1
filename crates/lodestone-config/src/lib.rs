#![forbid(unsafe_code)]

//! Configuration loading for the Lodestone services.
//!
//! Settings are layered: programmatic defaults, then an optional `config.*`
//! file in the working directory, then `LODESTONE_`-prefixed environment
//! variables (nested keys separated with `__`).

mod error;
mod model;

pub use error::{ConfigError, Result};
pub use model::{
    AuthSettings, DatabaseSettings, DownloadSettings, ServerSettings, Settings, StorageSettings,
};
