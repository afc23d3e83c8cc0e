pub mod association;
pub mod config;
pub mod data_loader;
pub mod detected_points;
pub mod error;
pub mod io;
pub mod nms;
pub mod pipeline;
pub mod projection;
pub mod response;
pub mod statistics;
pub mod synthetic;
pub mod ttc;
pub mod types;

pub use error::{Error, Result};
