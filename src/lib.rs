pub mod advisory;
pub mod api;
pub mod arrivals;
pub mod config;
pub mod gtfs;
pub mod watch;
