pub mod artifacts;
pub mod config;
pub mod error;
pub mod market;
pub mod pipeline;
pub mod routes;
pub mod scheduler;
pub mod telemetry;
pub mod tracker;

use std::sync::Arc;

pub use config::Config;
pub use tracker::Tracker;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Tracker>,
    pub config: Config,
}
