//! Stagehand is the prefab subsystem of a 3D scene editor.
//!
//! A prefab is a reusable template of scene objects. Instances of it are placed in a level,
//! expanded into live objects with stable ids, and kept in step with the template as either
//! side is edited.
//!
//! # Example
//!
//! ```
//! use stagehand::prelude::*;
//!
//! let mut level = Level::new(PrefabConfig::default());
//! let template = level.library_mut().create("Crate");
//! let instance = level.instantiate(template).unwrap();
//! assert!(level.instance(instance).unwrap().template() == Some(template));
//! ```

#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    rust_2018_compatibility
)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

pub use stagehand_config as config;
pub use stagehand_core as core;
pub use stagehand_error as error;
pub use stagehand_prefab as prefab;

pub use self::{
    error::{Error, Result},
    logger::{start_logger, LevelFilter as LogLevelFilter, LoggerConfig},
};

pub mod prelude;

mod logger;
