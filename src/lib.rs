#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod blueprint;
mod core;
mod engine;
mod error;
mod graph;
pub mod registry;
pub mod template;
mod utils;

pub use crate::blueprint::Blueprint;
pub use crate::core::Options;
pub use crate::engine::{Diagnostics, TaskExecution};
pub use crate::error::*;
pub use crate::registry::Registry;
pub use crate::template::{Fragment, Template};

#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
