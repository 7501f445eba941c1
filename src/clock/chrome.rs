//! Host chrome: where the clock ends up.
//!
//! The presenter only talks to the [`Chrome`] trait. [`StatusLineChrome`]
//! prints the title to stdout for status bars and can drop the icon
//! bitmaps into a directory as PNG files.

use image::RgbaImage;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Icon bitmaps keyed by edge length in pixels.
pub type IconSet = BTreeMap<u32, RgbaImage>;

#[derive(Debug, Error)]
pub enum ChromeError {
    #[error("chrome I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("icon encoding error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 0xff])
    }
}

pub trait Chrome: Send + Sync {
    fn set_icon(&self, icons: &IconSet) -> Result<(), ChromeError>;
    fn set_badge_text(&self, text: &str) -> Result<(), ChromeError>;
    fn set_badge_background_color(&self, color: Rgb) -> Result<(), ChromeError>;
    fn set_badge_text_color(&self, color: Rgb) -> Result<(), ChromeError>;
    fn set_title(&self, title: &str) -> Result<(), ChromeError>;
}

pub struct StatusLineChrome {
    icon_dir: Option<PathBuf>,
    last_title: Mutex<String>,
}

impl StatusLineChrome {
    pub fn new(icon_dir: Option<PathBuf>) -> Self {
        Self {
            icon_dir,
            last_title: Mutex::new(String::new()),
        }
    }
}

impl Chrome for StatusLineChrome {
    fn set_icon(&self, icons: &IconSet) -> Result<(), ChromeError> {
        let Some(dir) = &self.icon_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)?;
        for (size, bitmap) in icons {
            bitmap.save(dir.join(format!("icon-{}.png", size)))?;
        }
        Ok(())
    }

    fn set_badge_text(&self, text: &str) -> Result<(), ChromeError> {
        trace!("badge text: {}", text);
        Ok(())
    }

    fn set_badge_background_color(&self, color: Rgb) -> Result<(), ChromeError> {
        trace!("badge background: {}", color.to_hex());
        Ok(())
    }

    fn set_badge_text_color(&self, color: Rgb) -> Result<(), ChromeError> {
        trace!("badge text color: {}", color.to_hex());
        Ok(())
    }

    /// Prints a line only when the title changes.
    fn set_title(&self, title: &str) -> Result<(), ChromeError> {
        let mut last = self.last_title.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == title {
            return Ok(());
        }
        debug!("title: {}", title);
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", title)?;
        stdout.flush()?;
        *last = title.to_string();
        Ok(())
    }
}
