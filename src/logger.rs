use std::{env, io, str::FromStr};

pub use log::LevelFilter;
use log::debug;
use serde::{Deserialize, Serialize};

/// Logger configuration object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Whether to use color output when logging to the terminal or not.
    pub use_colors: bool,
    /// Sets the overarching level filter for the logger.
    pub level_filter: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> LoggerConfig {
        let use_colors = env::var("STAGEHAND_LOG_DISABLE_COLORS").is_err();
        let level_filter = env::var("STAGEHAND_LOG_LEVEL_FILTER")
            .ok()
            .and_then(|lf| LevelFilter::from_str(&lf).ok())
            .unwrap_or(LevelFilter::Debug);
        LoggerConfig {
            use_colors,
            level_filter,
        }
    }
}

/// Starts a basic logger outputting to stdout with color on supported platforms.
///
/// An editor embedding stagehand that has its own logger should install it instead; a second
/// global logger is never installed.
pub fn start_logger(config: LoggerConfig) {
    let color_config = fern::colors::ColoredLevelConfig::new();

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{color}[{level}][{target}] {message}{color_reset}",
                color = if config.use_colors {
                    format!(
                        "\x1B[{}m",
                        color_config.get_color(&record.level()).to_fg_str()
                    )
                } else {
                    String::new()
                },
                level = record.level(),
                target = record.target(),
                message = message,
                color_reset = if config.use_colors { "\x1B[0m" } else { "" }
            ))
        })
        .level(config.level_filter)
        .chain(io::stdout())
        .apply()
        .unwrap_or_else(|_| {
            debug!("Global logger already set, default stagehand logger will not be used")
        });
}
