//! Synthetic scenes: a vehicle ahead approaching at constant speed.
//!
//! The camera is a pinhole looking along the LiDAR x axis. The vehicle's rear
//! face is a plane at distance `d(k) = start_distance - speed * k / frame_rate`
//! carrying a grid of LiDAR returns and a grid of tracked keypoints. A few
//! ghost returns and wrong matches are added so the outlier fences have
//! something to reject.
use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::detected_points::{KeyPoint, KeypointMatch};
use crate::projection::{Calibration, LidarProjection};
use crate::types::{BoundingBox, Frame, LidarPoint, Roi};

pub const IMAGE_WIDTH: f32 = 1242.0;
pub const IMAGE_HEIGHT: f32 = 375.0;

const HALF_WIDTH: f64 = 0.9;
const Z_BOTTOM: f64 = -0.6;
const Z_TOP: f64 = 0.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    pub num_frames: usize,
    pub frame_rate: f64,
    /// Distance to the rear face in the first frame, meters.
    pub start_distance: f64,
    /// Closing speed, meters per second.
    pub speed: f64,
    pub lidar_noise: f64,
    pub pixel_noise: f32,
    pub ghost_returns: usize,
    pub wrong_matches: usize,
    pub background_keypoints: usize,
    pub seed: u64,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            num_frames: 8,
            frame_rate: 10.0,
            start_distance: 12.0,
            speed: 5.0,
            lidar_noise: 0.01,
            pixel_noise: 0.2,
            ghost_returns: 2,
            wrong_matches: 2,
            background_keypoints: 20,
            seed: 0,
        }
    }
}

impl SceneParams {
    pub fn distance(&self, frame_idx: usize) -> f64 {
        self.start_distance - self.speed * frame_idx as f64 / self.frame_rate
    }

    /// Ground-truth time to collision at `frame_idx`.
    pub fn true_ttc(&self, frame_idx: usize) -> f64 {
        self.distance(frame_idx) / self.speed
    }
}

/// Pinhole camera mounted 0.1 m below the LiDAR, looking forward.
pub fn default_calibration() -> Calibration {
    let f = 720.0;
    Calibration {
        p_rect: [
            f, 0.0, 620.0, 0.0, //
            0.0, f, 190.0, 0.0, //
            0.0, 0.0, 1.0, 0.0,
        ],
        r_rect: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        rt: [
            0.0, -1.0, 0.0, 0.0, //
            0.0, 0.0, -1.0, -0.1, //
            1.0, 0.0, 0.0, 0.0,
        ],
    }
}

fn face_grid(distance: f64, cols: usize, rows: usize, margin: f64) -> Vec<DVec3> {
    let mut points = Vec::with_capacity(cols * rows);
    let y_span = 2.0 * (HALF_WIDTH - margin);
    let z_span = Z_TOP - Z_BOTTOM - 2.0 * margin;
    for r in 0..rows {
        for c in 0..cols {
            let y = -(HALF_WIDTH - margin) + y_span * c as f64 / (cols - 1) as f64;
            let z = Z_BOTTOM + margin + z_span * r as f64 / (rows - 1) as f64;
            points.push(DVec3::new(distance, y, z));
        }
    }
    points
}

fn vehicle_roi(distance: f64, projection: &LidarProjection) -> Roi {
    let corners = [
        DVec3::new(distance, HALF_WIDTH, Z_TOP),
        DVec3::new(distance, -HALF_WIDTH, Z_BOTTOM),
    ];
    let (Some(a), Some(b)) = (projection.project(corners[0]), projection.project(corners[1])) else {
        return Roi::default();
    };
    let min = a.min(b);
    let max = a.max(b);
    Roi::new(min.x, min.y, max.x - min.x, max.y - min.y)
}

/// Generates the frames and the calibration they were projected with.
pub fn generate_sequence(params: &SceneParams) -> (Vec<Frame>, Calibration) {
    let calibration = default_calibration();
    let projection = LidarProjection::from_calibration(&calibration);
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

    let background: Vec<KeyPoint> = (0..params.background_keypoints)
        .map(|_| {
            KeyPoint::new(
                rng.random_range(0.0..IMAGE_WIDTH * 0.3),
                rng.random_range(0.0..IMAGE_HEIGHT),
            )
        })
        .collect();
    let side_roi = Roi::new(0.0, 0.0, IMAGE_WIDTH * 0.3, IMAGE_HEIGHT);

    let mut frames = Vec::with_capacity(params.num_frames);
    for k in 0..params.num_frames {
        let distance = params.distance(k);

        let mut lidar_points: Vec<LidarPoint> = face_grid(distance, 17, 9, 0.1)
            .into_iter()
            .map(|p| {
                let noise = rng.random_range(-params.lidar_noise..=params.lidar_noise);
                LidarPoint {
                    x: p.x + noise,
                    y: p.y,
                    z: p.z,
                    r: rng.random_range(0.2..0.8),
                }
            })
            .collect();
        for g in 0..params.ghost_returns {
            lidar_points.push(LidarPoint::new(distance - 1.5 - 0.1 * g as f64, 0.0, -0.1));
        }

        let mut keypoints: Vec<KeyPoint> = face_grid(distance, 8, 5, 0.05)
            .into_iter()
            .filter_map(|p| projection.project(p))
            .map(|px| {
                KeyPoint::new(
                    px.x + rng.random_range(-params.pixel_noise..=params.pixel_noise),
                    px.y + rng.random_range(-params.pixel_noise..=params.pixel_noise),
                )
            })
            .collect();
        let vehicle_kpts = keypoints.len();
        keypoints.extend(background.iter().copied());

        let kpt_matches = if k == 0 {
            Vec::new()
        } else {
            let mut matches: Vec<_> = (0..keypoints.len()).map(|i| KeypointMatch::new(i, i)).collect();
            for w in 0..params.wrong_matches.min(vehicle_kpts / 2) {
                let a = w;
                let b = vehicle_kpts - 1 - w;
                matches[a] = KeypointMatch::new(b, a);
            }
            matches
        };

        let mut vehicle = BoundingBox::new(0, vehicle_roi(distance, &projection));
        vehicle.class_id = 2;
        vehicle.confidence = 0.9;
        let mut side = BoundingBox::new(1, side_roi);
        side.class_id = 0;
        side.confidence = 0.5;

        frames.push(Frame {
            keypoints,
            kpt_matches,
            bounding_boxes: vec![vehicle, side],
            lidar_points,
            ..Default::default()
        });
    }
    (frames, calibration)
}
