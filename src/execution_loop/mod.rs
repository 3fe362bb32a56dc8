pub mod engine;
pub mod error_classifier;
pub mod state;

pub use engine::*;
pub use error_classifier::*;
pub use state::*;
