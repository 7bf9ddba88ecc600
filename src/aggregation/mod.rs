//! Sliding-window aggregation of external net volume and threshold evaluation

pub mod thresholds;
pub mod window;

pub use thresholds::{StagedThresholds, ThresholdMode, TriggerStage};
pub use window::{
    AggregationSnapshot, ThresholdCrossing, VolumeWindow, VolumeWindowEntry, WindowUpdate,
};
