use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::nms::{KeypointDeduplicator, SuppressionPolicy};
use crate::statistics::DEFAULT_FENCE_FACTOR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sensor frame rate in Hz.
    pub frame_rate: f64,
    pub nms: NmsConfig,
    pub association: AssociationConfig,
    pub lidar_ttc: LidarTtcConfig,
    pub camera_ttc: CameraTtcConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 10.0,
            nms: NmsConfig::default(),
            association: AssociationConfig::default(),
            lidar_ttc: LidarTtcConfig::default(),
            camera_ttc: CameraTtcConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmsConfig {
    /// Minimum value in the 0..255 normalized response map.
    pub min_response: f32,
    /// Sobel aperture; the keypoint neighborhood diameter is twice this.
    pub aperture_size: u32,
    /// Structure tensor window edge.
    pub block_size: usize,
    pub harris_k: f32,
    pub policy: SuppressionPolicy,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            min_response: 100.0,
            aperture_size: 3,
            block_size: 2,
            harris_k: 0.04,
            policy: SuppressionPolicy::default(),
        }
    }
}

impl NmsConfig {
    pub fn deduplicator(&self) -> Result<KeypointDeduplicator> {
        KeypointDeduplicator::new(self.min_response, self.aperture_size, self.policy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Fraction of each ROI dimension removed before LiDAR containment tests.
    pub shrink_factor: f32,
    /// IQR multiplier for keypoint displacement outliers.
    pub fence_factor: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            shrink_factor: 0.10,
            fence_factor: DEFAULT_FENCE_FACTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarTtcConfig {
    pub fence_factor: f64,
    /// Assumed ego lane width in meters.
    pub lane_width: f64,
    /// Ignore returns with `|y| > lane_width / 2`.
    pub restrict_to_ego_lane: bool,
}

impl Default for LidarTtcConfig {
    fn default() -> Self {
        Self {
            fence_factor: DEFAULT_FENCE_FACTOR,
            lane_width: 4.0,
            restrict_to_ego_lane: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraTtcConfig {
    /// Minimum current-frame distance for a keypoint pair to contribute.
    pub min_dist: f64,
    pub fence_factor: f64,
    pub reject_position_outliers: bool,
}

impl Default for CameraTtcConfig {
    fn default() -> Self {
        Self {
            min_dist: 100.0,
            fence_factor: DEFAULT_FENCE_FACTOR,
            reject_position_outliers: true,
        }
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let data = std::fs::read_to_string(path)?;
    let config: PipelineConfig = serde_json::from_str(&data)?;
    if !(0.0..1.0).contains(&config.association.shrink_factor) {
        return Err(Error::invalid(
            "association.shrink_factor",
            format!("{} is outside [0, 1)", config.association.shrink_factor),
        ));
    }
    if !(config.frame_rate.is_finite() && config.frame_rate > 0.0) {
        return Err(Error::invalid("frame_rate", "must be positive"));
    }
    Ok(config)
}
