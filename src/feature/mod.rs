//! Feature computation: rolling-state snapshots, closed-form formulas, and
//! rolling z-score normalisation.

pub mod engine;
pub mod normalizer;
pub mod processor;
pub mod set;
pub mod snapshot;

pub use engine::FeatureEngine;
pub use normalizer::FeatureNormalizer;
pub use processor::FeatureProcessor;
pub use set::FeatureSet;
pub use snapshot::FeatureInputSnapshot;
