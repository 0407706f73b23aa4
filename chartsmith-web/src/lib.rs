//! # Chartsmith Web
//!
//! Single-page web interface over `chartsmith-core`: a query form, example
//! queries, the research and chart-code panels, and a code download.

pub mod page;
pub mod server;

pub use server::{AppState, SESSION_COOKIE, SharedApp, router, run};
