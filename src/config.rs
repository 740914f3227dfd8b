//! Engine configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::str::FromStr;

use crate::error::ConfigError;
use crate::icon::{IconAtlas, IconSpec};
use crate::surface::FitOptions;

pub const DEFAULT_ICON_SIZE: u32 = 28;
pub const DEFAULT_ICON_PIXEL_RATIO: u32 = 2;
pub const DEFAULT_HOVER_SHADE_PERCENT: f64 = 20.0;
pub const DEFAULT_SELECT_SHADE_PERCENT: f64 = 35.0;
pub const DEFAULT_FIT_PADDING: f64 = 60.0;
pub const DEFAULT_FIT_MAX_ZOOM: f64 = 17.0;
pub const DEFAULT_ICON: &str = "home";
pub const DEFAULT_COLOR: &str = "#0176DE";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Logical icon side, in pixels.
    pub icon_size: u32,
    /// Device pixels per logical pixel for icon rasters.
    pub icon_pixel_ratio: u32,
    pub hover_shade_percent: f64,
    pub select_shade_percent: f64,
    pub fit_padding: f64,
    pub fit_max_zoom: f64,
    /// Icon used when neither the feature nor the catalog names one.
    pub default_icon: IconSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            icon_size: DEFAULT_ICON_SIZE,
            icon_pixel_ratio: DEFAULT_ICON_PIXEL_RATIO,
            hover_shade_percent: DEFAULT_HOVER_SHADE_PERCENT,
            select_shade_percent: DEFAULT_SELECT_SHADE_PERCENT,
            fit_padding: DEFAULT_FIT_PADDING,
            fit_max_zoom: DEFAULT_FIT_MAX_ZOOM,
            default_icon: IconSpec::new(DEFAULT_ICON, DEFAULT_COLOR),
        }
    }
}

impl EngineConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `OVERLAY_ICON_SIZE` (28)
    /// - `OVERLAY_ICON_PIXEL_RATIO` (2)
    /// - `OVERLAY_HOVER_SHADE_PERCENT` (20)
    /// - `OVERLAY_SELECT_SHADE_PERCENT` (35)
    /// - `OVERLAY_FIT_PADDING` (60)
    /// - `OVERLAY_FIT_MAX_ZOOM` (17)
    /// - `OVERLAY_DEFAULT_ICON` (`home`)
    /// - `OVERLAY_DEFAULT_COLOR` (`#0176DE`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a value is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let icon_size = parse(&lookup, "OVERLAY_ICON_SIZE", defaults.icon_size)?;
        let icon_pixel_ratio = parse(&lookup, "OVERLAY_ICON_PIXEL_RATIO", defaults.icon_pixel_ratio)?;
        if icon_size == 0 {
            return Err(ConfigError::Invalid { key: "OVERLAY_ICON_SIZE", value: "0".into() });
        }
        if icon_pixel_ratio == 0 {
            return Err(ConfigError::Invalid { key: "OVERLAY_ICON_PIXEL_RATIO", value: "0".into() });
        }
        let glyph = lookup("OVERLAY_DEFAULT_ICON")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.default_icon.glyph);
        let color = match lookup("OVERLAY_DEFAULT_COLOR") {
            Some(raw) if crate::color::parse_hex_rgb(&raw).is_some() => raw.trim().to_string(),
            Some(raw) => return Err(ConfigError::Invalid { key: "OVERLAY_DEFAULT_COLOR", value: raw }),
            None => defaults.default_icon.color,
        };

        Ok(Self {
            icon_size,
            icon_pixel_ratio,
            hover_shade_percent: parse(&lookup, "OVERLAY_HOVER_SHADE_PERCENT", defaults.hover_shade_percent)?,
            select_shade_percent: parse(&lookup, "OVERLAY_SELECT_SHADE_PERCENT", defaults.select_shade_percent)?,
            fit_padding: parse(&lookup, "OVERLAY_FIT_PADDING", defaults.fit_padding)?,
            fit_max_zoom: parse(&lookup, "OVERLAY_FIT_MAX_ZOOM", defaults.fit_max_zoom)?,
            default_icon: IconSpec::new(glyph, color),
        })
    }

    #[must_use]
    pub fn atlas(&self) -> IconAtlas {
        IconAtlas::new(self.icon_size, self.icon_pixel_ratio, self.hover_shade_percent)
    }

    #[must_use]
    pub fn fit_options(&self) -> FitOptions {
        FitOptions { padding: self.fit_padding, max_zoom: self.fit_max_zoom }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}
