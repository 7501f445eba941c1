//! Clock presentation: time formatting, flags, icon rasterizing and the
//! chrome the result is pushed into.

pub mod chrome;
pub mod flags;
pub mod format;
pub mod icon;
pub mod presenter;

pub use chrome::{Chrome, ChromeError, IconSet, Rgb, StatusLineChrome};
pub use flags::{CdnFlagSource, FlagError, FlagImageCache, FlagSource};
pub use format::{flag_glyph, flag_image_key, format_time};
pub use presenter::{ClockPresenter, FlagStyle, StateResponse};
