//! HTTP API handlers for teamatlas-engine

pub mod health;
pub mod stats;
pub mod teams;

pub use health::health_routes;
pub use stats::stats_routes;
pub use teams::team_routes;
