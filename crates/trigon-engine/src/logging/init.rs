use std::sync::Once;

use serde::{Deserialize, Serialize};

/// Terminal coloring for log output.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl From<ColorMode> for env_logger::WriteStyle {
    fn from(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Auto => env_logger::WriteStyle::Auto,
            ColorMode::Always => env_logger::WriteStyle::Always,
            ColorMode::Never => env_logger::WriteStyle::Never,
        }
    }
}

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "trigon_engine=debug"). When unset, `RUST_LOG` is consulted.
///
/// `verbose_shaders` raises the engine's own level to `debug` in the fallback
/// filter, which surfaces link successes, buffer growth and re-declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub verbose_shaders: bool,
    pub color: ColorMode,
}

impl LoggingConfig {
    /// Filter used when neither `env_filter` nor `RUST_LOG` is set.
    pub fn fallback_filter(&self) -> String {
        if self.verbose_shaders {
            "info,trigon_engine=debug".to_owned()
        } else {
            "info".to_owned()
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Subsequent calls are ignored, so tests may call this freely.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = logger_builder(config);

        // Another logger may already be installed by the host application.
        if builder.try_init().is_err() {
            log::debug!("logger already installed; keeping it");
            return;
        }

        log::debug!("logging initialized");
    });
}

fn logger_builder(config: &LoggingConfig) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();

    match (&config.env_filter, std::env::var("RUST_LOG")) {
        (Some(filter), _) => builder.parse_filters(filter),
        (None, Ok(filter)) => builder.parse_filters(&filter),
        (None, Err(_)) => builder.parse_filters(&config.fallback_filter()),
    };

    builder.write_style(config.color.into());
    // Route output through the test harness so it is captured per test.
    builder.is_test(cfg!(test));
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_shaders_raises_engine_level() {
        let config = LoggingConfig { verbose_shaders: true, ..Default::default() };
        assert_eq!(config.fallback_filter(), "info,trigon_engine=debug");
        assert_eq!(LoggingConfig::default().fallback_filter(), "info");
    }

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig { env_filter: Some("warn".into()), ..Default::default() };
        let logger = logger_builder(&config).build();
        assert_eq!(logger.filter(), log::LevelFilter::Warn);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(&LoggingConfig::default());
        init_logging(&LoggingConfig { env_filter: Some("warn".into()), ..Default::default() });
    }

    #[test]
    fn color_mode_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            color: ColorMode,
        }
        let w: Wrapper = toml::from_str("color = \"never\"").unwrap();
        assert_eq!(w.color, ColorMode::Never);
    }
}
