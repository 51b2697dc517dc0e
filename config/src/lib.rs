//! Configuration for the martech sync service.
//!
//! Holds the runtime [`Environment`] selector, the hierarchical [`load_config`] loader and the
//! run configuration types shared by the library and the `syncer` binary.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
