pub mod analyze;
pub mod chart;
pub mod format;
pub mod narrative;
pub mod orchestrator;
pub mod process;
pub mod spreadsheet;

pub use analyze::MarketStats;
pub use orchestrator::{RenderedArtifacts, render_artifacts};
pub use process::MarketRow;
