#![allow(dead_code)]

use geoclock::clock::{Chrome, ChromeError, ClockPresenter, FlagError, FlagImageCache, FlagSource, IconSet, Rgb};
use image::RgbaImage;
use geoclock::controller::{Controller, Intervals};
use geoclock::location::store::{load_stored, save_state};
use geoclock::location::{
    CountryCode, FailurePolicy, KeyValueStore, LocationError, LocationProvider, LocationResolver, LocationState,
    MemoryStore, ProviderLocation,
};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct Recorder {
    pub titles: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

pub struct RecordingChrome(pub Arc<Recorder>);

impl Chrome for RecordingChrome {
    fn set_icon(&self, _icons: &IconSet) -> Result<(), ChromeError> {
        Ok(())
    }
    fn set_badge_text(&self, _text: &str) -> Result<(), ChromeError> {
        Ok(())
    }
    fn set_badge_background_color(&self, _color: Rgb) -> Result<(), ChromeError> {
        Ok(())
    }
    fn set_badge_text_color(&self, _color: Rgb) -> Result<(), ChromeError> {
        Ok(())
    }
    fn set_title(&self, title: &str) -> Result<(), ChromeError> {
        self.0.titles.lock().unwrap().push(title.to_string());
        Ok(())
    }
}

/// Answers with a fixed location, or fails when `location` is `None`.
pub struct StaticProvider {
    pub location: Option<(Option<&'static str>, Option<&'static str>)>,
}

impl LocationProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn locate(&self) -> Result<ProviderLocation, LocationError> {
        match self.location {
            Some((tz, cc)) => ProviderLocation::from_raw(tz, cc),
            None => Err(LocationError::Network("unreachable".into())),
        }
    }
}

/// Blocks until its sender is dropped or sends, then fails.
pub struct GatedProvider {
    pub gate: Mutex<Receiver<()>>,
}

impl LocationProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    fn locate(&self) -> Result<ProviderLocation, LocationError> {
        let _ = self.gate.lock().unwrap().recv();
        Err(LocationError::Network("gate closed".into()))
    }
}

/// Every fetch takes `delay` and then fails, like an unreachable CDN.
pub struct SlowFailingFlags {
    pub delay: Duration,
}

impl FlagSource for SlowFailingFlags {
    fn fetch(&self, _key: &str) -> Result<RgbaImage, FlagError> {
        std::thread::sleep(self.delay);
        Err(FlagError::Network("timed out".into()))
    }
}

pub fn paris() -> LocationState {
    LocationState::new(chrono_tz::Europe::Paris, CountryCode::parse("FR").unwrap())
}

pub fn quiet_intervals() -> Intervals {
    Intervals {
        render: Duration::from_secs(3600),
        resolve: Duration::from_secs(3600),
    }
}

pub struct Harness {
    pub controller: Arc<Controller>,
    pub recorder: Arc<Recorder>,
    pub store: Arc<MemoryStore>,
}

/// Controller over a memory store seeded with `persisted`, the way the
/// binary loads it at startup.
pub fn harness(
    persisted: Option<LocationState>,
    providers: Vec<Box<dyn LocationProvider>>,
    intervals: Intervals,
) -> Harness {
    build_harness(persisted, providers, intervals, None)
}

/// Same as [`harness`], rendering icons with flags from `flags`.
pub fn harness_with_flags(
    persisted: Option<LocationState>,
    providers: Vec<Box<dyn LocationProvider>>,
    intervals: Intervals,
    flags: FlagImageCache,
) -> Harness {
    build_harness(persisted, providers, intervals, Some(flags))
}

fn build_harness(
    persisted: Option<LocationState>,
    providers: Vec<Box<dyn LocationProvider>>,
    intervals: Intervals,
    flags: Option<FlagImageCache>,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    if let Some(state) = &persisted {
        save_state(store.as_ref(), state).unwrap();
    }

    let defaults = LocationState::new(chrono_tz::UTC, CountryCode::UNKNOWN);
    let initial = match load_stored(store.as_ref() as &dyn KeyValueStore).unwrap() {
        Some(stored) => defaults.merge_stored(stored),
        None => defaults,
    };

    let recorder = Arc::new(Recorder::default());
    let resolver = LocationResolver::new(
        providers,
        store.clone(),
        FailurePolicy::RetainLastKnown,
        CountryCode::parse("US").unwrap(),
    );
    let mut presenter = ClockPresenter::new(Box::new(RecordingChrome(recorder.clone())), "https://flagcdn.com");
    if let Some(flags) = flags {
        presenter = presenter.with_flag_images(flags);
    }
    let controller = Controller::new(initial, resolver, presenter, intervals);

    Harness {
        controller,
        recorder,
        store,
    }
}
