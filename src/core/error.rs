//! Errors for rejected operations at the network boundary.
//!
//! Structural corruption of the neuron graph is not represented here; those
//! paths assert.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonaError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid need index {index} (network has {num_needs} needs)")]
    InvalidNeed { index: usize, num_needs: usize },

    #[error("invalid mediator level {level} (max {max})")]
    InvalidLevel { level: usize, max: usize },

    #[error("invalid number of effect event intervals: {0} (expected 1..=100)")]
    InvalidIntervalCount(usize),

    #[error("invalid interval index {index} for level {level} ({count} intervals)")]
    InvalidIntervalIndex {
        level: usize,
        index: usize,
        count: usize,
    },

    #[error("invalid effect event interval: {0}")]
    InvalidInterval(String),

    #[error("invalid sensor mode {mode} ({count} modes defined)")]
    InvalidSensorMode { mode: usize, count: usize },

    #[error("sensor mask length mismatch: expected {expected}, got {got}")]
    InvalidSensorMask { expected: usize, got: usize },

    #[error("invalid sensor resolution {0} (must be >= 0)")]
    InvalidResolution(f32),

    #[error("sensor vector length mismatch: expected {expected}, got {got}")]
    SensorCount { expected: usize, got: usize },

    #[error("sensor {index} is not a finite number")]
    NonFiniteSensor { index: usize },

    #[error("invalid response {response} (network has {num_responses} responses)")]
    InvalidResponse {
        response: usize,
        num_responses: usize,
    },

    #[error("invalid mediator structure: {0}")]
    InvalidMediator(String),

    #[error("corrupt network image: {0}")]
    Image(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MonaError>;
