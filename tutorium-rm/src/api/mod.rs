//! HTTP API handlers for tutorium-rm

pub mod auth;
pub mod health;
pub mod resources;

pub use auth::{require_management, Caller};
pub use health::health_routes;
pub use resources::{
    apply_plan, get_inefficiencies, get_overview, manual_override_change, optimize,
};
