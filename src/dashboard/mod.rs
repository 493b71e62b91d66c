//! Local web dashboard.
//!
//! Serves the chat, image-analysis and image-generation tabs, one session
//! per browser, and proxies every action to the backend service.

pub mod routes;
pub mod server;
pub mod state;
pub mod templates;

pub use server::{router, start_dashboard};
pub use state::{DashboardState, SessionHandle};
