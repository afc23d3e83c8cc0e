use std::collections::BTreeMap;

use glam::{DVec3, Vec2};
use serde::{Deserialize, Serialize};

use crate::detected_points::{KeyPoint, KeypointMatch};

/// Single LiDAR return in sensor coordinates.
///
/// `x` points forward, `y` left and `z` up, all in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LidarPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Reflectivity in [0, 1].
    #[serde(default)]
    pub r: f64,
}

impl LidarPoint {
    pub fn new(x: f64, y: f64, z: f64) -> LidarPoint {
        LidarPoint { x, y, z, r: 0.0 }
    }

    pub fn to_dvec3(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

/// Axis-aligned region of interest in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Roi {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Roi {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Roi {
        Roi {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open containment test, `x <= px < x + width`.
    pub fn contains(&self, p: Vec2) -> bool {
        self.x <= p.x && p.x < self.x + self.width && self.y <= p.y && p.y < self.y + self.height
    }

    /// Shrinks the region by `factor` of its size, keeping it centered.
    pub fn shrink(&self, factor: f32) -> Roi {
        Roi {
            x: self.x + factor * self.width / 2.0,
            y: self.y + factor * self.height / 2.0,
            width: self.width * (1.0 - factor),
            height: self.height * (1.0 - factor),
        }
    }
}

/// Detected object in one frame together with the sensor data assigned to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub box_id: i32,
    #[serde(default)]
    pub class_id: i32,
    #[serde(default)]
    pub confidence: f64,
    pub roi: Roi,
    #[serde(default)]
    pub lidar_points: Vec<LidarPoint>,
    #[serde(default)]
    pub kpt_matches: Vec<KeypointMatch>,
}

impl BoundingBox {
    pub fn new(box_id: i32, roi: Roi) -> BoundingBox {
        BoundingBox {
            box_id,
            roi,
            ..Default::default()
        }
    }
}

/// Everything known about one time step.
///
/// `kpt_matches` and `bb_matches` relate this frame to the previous one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub keypoints: Vec<KeyPoint>,
    #[serde(default)]
    pub kpt_matches: Vec<KeypointMatch>,
    #[serde(default)]
    pub bounding_boxes: Vec<BoundingBox>,
    #[serde(default)]
    pub lidar_points: Vec<LidarPoint>,
    #[serde(default)]
    pub bb_matches: BTreeMap<i32, i32>,
}

impl Frame {
    pub fn bounding_box(&self, box_id: i32) -> Option<&BoundingBox> {
        self.bounding_boxes.iter().find(|bb| bb.box_id == box_id)
    }

    pub fn bounding_box_mut(&mut self, box_id: i32) -> Option<&mut BoundingBox> {
        self.bounding_boxes.iter_mut().find(|bb| bb.box_id == box_id)
    }
}
