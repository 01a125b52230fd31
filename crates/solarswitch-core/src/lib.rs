//! solarswitch core: threshold-duration accounting and the periodic relay
//! decision loop driven by a normalized solar index.

pub mod bounds;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod hw;
pub mod monitor;
pub mod sensor;
pub mod storage;
pub mod validation;

pub use bounds::*;
// `self::` keeps the module apart from the `config` crate.
pub use self::config::*;
pub use controller::*;
pub use diagnostics::*;
pub use error::*;
pub use hw::*;
pub use monitor::*;
pub use sensor::*;
pub use storage::*;
pub use validation::*;

#[cfg(test)]
mod tests_config;
#[cfg(test)]
mod tests_scenario;
