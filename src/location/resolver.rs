//! Location resolver: runs the provider fallback chain.
//!
//! Flow: provider 1 → provider 2 → … → fallback rule. The outcome is
//! persisted whether or not any provider answered.

use super::providers::LocationProvider;
use super::store::{save_state, KeyValueStore};
use super::types::{CountryCode, FailurePolicy, LocationState, ProviderLocation};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{error, info, warn};
use std::sync::Arc;

/// Zones whose country is not obvious from providers that omit it.
const TIME_ZONE_COUNTRY_FALLBACKS: &[(&str, &str)] = &[
    ("Asia/Calcutta", "IN"),
    ("Asia/Kolkata", "IN"),
];

/// Country implied by a zone in the fallback table.
pub fn country_for_time_zone(tz: Tz) -> Option<CountryCode> {
    TIME_ZONE_COUNTRY_FALLBACKS
        .iter()
        .find(|(zone, _)| *zone == tz.name())
        .and_then(|(_, code)| CountryCode::parse(code))
}

pub struct LocationResolver {
    providers: Vec<Box<dyn LocationProvider>>,
    store: Arc<dyn KeyValueStore>,
    policy: FailurePolicy,
    locale_country: CountryCode,
    offline: bool,
}

impl LocationResolver {
    pub fn new(
        providers: Vec<Box<dyn LocationProvider>>,
        store: Arc<dyn KeyValueStore>,
        policy: FailurePolicy,
        locale_country: CountryCode,
    ) -> Self {
        Self {
            providers,
            store,
            policy,
            locale_country,
            offline: false,
        }
    }

    /// Skip every provider and go straight to the fallback rule.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Resolve and persist. Never fails.
    pub fn resolve(&self, current: &LocationState) -> LocationState {
        self.resolve_at(current, Utc::now())
    }

    pub fn resolve_at(&self, current: &LocationState, now: DateTime<Utc>) -> LocationState {
        let mut next = current.clone();

        match self.query_providers() {
            Some((provider, location)) => {
                if let Some(tz) = location.time_zone {
                    next.time_zone = tz;
                }
                if let Some(code) = location.country_code {
                    next.country_code = code;
                }
                info!(
                    "location resolved by {}: {} / {}",
                    provider,
                    next.time_zone.name(),
                    next.country_code
                );
            }
            None => {
                next.country_code = self.fallback_country(current);
                if !self.offline {
                    warn!(
                        "all location providers failed, keeping {} / {}",
                        next.time_zone.name(),
                        next.country_code
                    );
                }
            }
        }

        next.last_sync = Some(now);
        if let Err(e) = save_state(self.store.as_ref(), &next) {
            error!("failed to persist location state: {}", e);
        }
        next
    }

    fn query_providers(&self) -> Option<(&str, ProviderLocation)> {
        if self.offline {
            return None;
        }
        for provider in &self.providers {
            match provider.locate() {
                Ok(location) => return Some((provider.name(), location)),
                Err(e) => warn!("location provider {} failed: {}", provider.name(), e),
            }
        }
        None
    }

    /// Country code to use once every provider has failed.
    fn fallback_country(&self, current: &LocationState) -> CountryCode {
        if let Some(code) = country_for_time_zone(current.time_zone) {
            return code;
        }
        match self.policy {
            FailurePolicy::ResetUnknown => CountryCode::UNKNOWN,
            FailurePolicy::RetainLastKnown if current.country_code.is_known() => current.country_code,
            FailurePolicy::RetainLastKnown => self.locale_country,
        }
    }
}
