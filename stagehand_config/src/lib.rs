//! Loads RON files into a structure for easy / statically typed usage.

#![warn(missing_docs, rust_2018_idioms, rust_2018_compatibility)]

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use err_derive::Error;
use log::error;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while reading or writing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error(display = "config file i/o failed: {}", _0)]
    File(#[cause] io::Error),
    /// The file is not valid RON for the requested structure.
    #[error(display = "config file could not be parsed: {}", _0)]
    Parser(#[cause] ron::error::SpannedError),
    /// The value could not be serialized.
    #[error(display = "config could not be serialized: {}", _0)]
    Serializer(#[cause] ron::Error),
    /// The path does not end in `.ron`.
    #[error(display = "{}: invalid path extension, expected \"ron\"", _0)]
    Extension(String),
}

impl ConfigError {
    fn extension(path: &Path) -> Self {
        ConfigError::Extension(path.display().to_string())
    }
}

/// Configuration structures that can be stored as RON.
///
/// Implemented for every `Serialize + Deserialize + Default` type.
pub trait Config
where
    Self: Sized,
{
    /// Loads a configuration structure from a file, falling back to the default on any failure.
    fn load<P: AsRef<Path>>(path: P) -> Self;

    /// Loads a configuration structure from a file.
    fn load_no_fallback<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError>;

    /// Loads a configuration structure from raw bytes.
    fn load_bytes(bytes: &[u8]) -> Result<Self, ConfigError>;

    /// Writes a configuration structure to a file.
    fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError>;
}

impl<T> Config for T
where
    T: for<'a> Deserialize<'a> + Serialize + Default,
{
    fn load<P: AsRef<Path>>(path: P) -> Self {
        Self::load_no_fallback(path.as_ref()).unwrap_or_else(|e| {
            error!(
                "Failed to load config file '{}': {}",
                path.as_ref().display(),
                e
            );
            Self::default()
        })
    }

    fn load_no_fallback<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !has_ron_extension(path) {
            return Err(ConfigError::extension(path));
        }

        let content = fs::read(path)?;
        Self::load_bytes(&content)
    }

    fn load_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(ron::de::from_bytes(bytes)?)
    }

    fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if !has_ron_extension(path) {
            return Err(ConfigError::extension(path));
        }

        let s = ron::ser::to_string_pretty(self, PrettyConfig::default())?;
        fs::write(path, s.as_bytes())?;

        Ok(())
    }
}

fn has_ron_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("ron")
}

/// Returns `dir/name.ron`.
pub fn ron_path<P: AsRef<Path>>(dir: P, name: &str) -> PathBuf {
    dir.as_ref().join(format!("{}.ron", name))
}
