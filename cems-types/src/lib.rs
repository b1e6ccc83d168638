//! # cems-types
//!
//! Core vocabulary shared by CEMS monitoring tools: the fixed set of measured
//! stack parameters and the analyzer gas configuration served by the CEMS
//! backend.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to read backend JSON
//! - **Fixed wire order**: [`Parameter::GAS_ORDER`] is the positional layout of the
//!   gas feed vector and must never be reordered
//!
//! ## Features
//!
//! - `serde`: JSON deserialization of [`GasConfigResponse`] and friends
//!
//! ## Example
//!
//! ```rust
//! use cems_types::{GasConfig, GasConfigResponse, Parameter};
//!
//! let config = GasConfigResponse::builder()
//!     .default_gas(GasConfig::new("SO2", "ppm").alarm_threshold(200.0))
//!     .default_gas(GasConfig::new("O2", "%"))
//!     .build();
//!
//! let enabled: Vec<Parameter> = config.enabled_parameters().collect();
//! assert_eq!(enabled, vec![Parameter::So2, Parameter::O2]);
//! ```

mod gas_config;
mod parameter;

pub use gas_config::*;
pub use parameter::*;
