//! Clock presenter: turns a location snapshot into chrome updates.

use super::chrome::{Chrome, ChromeError, IconSet, Rgb};
use super::flags::{flag_url, FlagImageCache};
use super::format::{compact_time, country_flag, format_time};
use super::icon::{draw_clock_icon, ICON_SIZES};
use crate::location::LocationState;
use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};

/// How the flag reaches the chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStyle {
    /// Regional-indicator glyph in the title, time in the badge.
    #[default]
    Glyph,
    /// Flag image and time rasterized into the icon.
    Image,
}

pub struct ClockPresenter {
    chrome: Box<dyn Chrome>,
    style: FlagStyle,
    flags: Option<FlagImageCache>,
    flag_cdn: String,
    badge_background: Rgb,
    badge_text_color: Rgb,
}

impl ClockPresenter {
    pub fn new(chrome: Box<dyn Chrome>, flag_cdn: &str) -> Self {
        Self {
            chrome,
            style: FlagStyle::Glyph,
            flags: None,
            flag_cdn: flag_cdn.to_string(),
            badge_background: super::icon::BACKGROUND,
            badge_text_color: super::icon::FOREGROUND,
        }
    }

    /// Switch to icon rendering, fetching flags through `flags`.
    pub fn with_flag_images(mut self, flags: FlagImageCache) -> Self {
        self.style = FlagStyle::Image;
        self.flags = Some(flags);
        self
    }

    pub fn with_badge_colors(mut self, background: Rgb, text: Rgb) -> Self {
        self.badge_background = background;
        self.badge_text_color = text;
        self
    }

    /// Render the current instant. Chrome failures are logged.
    pub fn render(&self, state: &LocationState) {
        if let Err(e) = self.render_at(state, Utc::now()) {
            error!("clock render failed: {}", e);
        }
    }

    pub fn render_at(&self, state: &LocationState, now: DateTime<Utc>) -> Result<(), ChromeError> {
        let time = format_time(now, state.time_zone);
        match self.style {
            FlagStyle::Glyph => self.render_badge(state, &time),
            FlagStyle::Image => self.render_icon(state, &time),
        }
    }

    fn render_badge(&self, state: &LocationState, time: &str) -> Result<(), ChromeError> {
        let flag = country_flag(state.country_code);
        self.chrome.set_badge_text(&compact_time(time))?;
        self.chrome.set_badge_background_color(self.badge_background)?;
        self.chrome.set_badge_text_color(self.badge_text_color)?;
        self.chrome
            .set_title(&format!("{} {} ({})", flag, time, state.time_zone.name()))
    }

    fn render_icon(&self, state: &LocationState, time: &str) -> Result<(), ChromeError> {
        let flag = self
            .flags
            .as_ref()
            .and_then(|cache| cache.get(state.country_code));
        let short = compact_time(time);

        let icons: IconSet = ICON_SIZES
            .iter()
            .map(|&size| (size, draw_clock_icon(size, &short, flag.as_deref())))
            .collect();
        debug!("rendering {} icons for {}", icons.len(), short);

        self.chrome.set_icon(&icons)?;
        self.chrome
            .set_title(&format!("{} ({})", time, state.time_zone.name()))
    }

    /// Answer for the `get-state` query.
    pub fn snapshot(&self, state: &LocationState, now: DateTime<Utc>) -> StateResponse {
        StateResponse {
            country_code: state.country_code.to_string(),
            flag: country_flag(state.country_code),
            flag_url: flag_url(&self.flag_cdn, state.country_code),
            time: format_time(now, state.time_zone),
            time_zone: state.time_zone.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub country_code: String,
    pub flag: String,
    pub flag_url: Option<String>,
    pub time: String,
    pub time_zone: String,
}
