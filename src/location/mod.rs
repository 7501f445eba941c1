//! Location subsystem for geoclock.
//!
//! Provides IP-based geolocation with a provider fallback chain, the
//! persisted location record, and host locale defaults.

pub mod locale;
pub mod providers;
pub mod resolver;
pub mod store;
pub mod types;

pub use locale::{default_state, HostLocale, SystemLocale};
pub use providers::{build_agent, LocationProvider, ProviderKind};
pub use resolver::LocationResolver;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
pub use types::{CountryCode, FailurePolicy, LocationError, LocationState, ProviderLocation};
