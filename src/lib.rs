#[path = "core/config.rs"]
pub mod config;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/value_set.rs"]
pub mod value_set;

#[path = "core/motive.rs"]
pub mod motive;

#[path = "core/enabling.rs"]
pub mod enabling;

#[path = "core/neuron.rs"]
pub mod neuron;

#[path = "core/sensor.rs"]
pub mod sensor;

#[path = "core/mona.rs"]
pub mod mona;

#[path = "core/enable.rs"]
mod enable;

#[path = "core/drive.rs"]
mod drive;

#[path = "core/learn.rs"]
pub mod learn;

#[path = "core/image.rs"]
mod image;

#[path = "core/dump.rs"]
mod dump;

pub mod observer;

pub use config::MonaConfig;
pub use error::{MonaError, Result};
pub use mona::{Diagnostics, Mona};
pub use neuron::NeuronId;
