pub mod budget;
pub mod metrics;
pub mod pacing;

pub use budget::*;
pub use metrics::*;
pub use pacing::*;
