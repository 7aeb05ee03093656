pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod domain_events;
pub mod main_lib;
pub mod ws;

pub use main_lib::{build_state, init_tracing, AppState};
