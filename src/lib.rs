//! geoclock: a status-bar clock that follows the timezone of the machine's
//! IP-detected location and shows the matching country flag.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod server;
