//! Time-to-collision from two consecutive measurements of one object.
//!
//! Both estimators assume a constant-velocity model between the frames,
//! `dT = 1 / frame_rate` apart.
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::{CameraTtcConfig, LidarTtcConfig};
use crate::detected_points::{KeyPoint, KeypointMatch};
use crate::error::{Error, Result};
use crate::statistics::{AxisFilter, median};
use crate::types::LidarPoint;

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    InvalidFrameRate,
    InsufficientPoints,
    NoDistanceRatios,
    ZeroDenominator,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtcEstimate {
    Valid(f64),
    NotComputable(Degeneracy),
}

impl TtcEstimate {
    /// Seconds to collision, NaN when not computable.
    pub fn seconds(&self) -> f64 {
        match self {
            TtcEstimate::Valid(s) => *s,
            TtcEstimate::NotComputable(_) => f64::NAN,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TtcEstimate::Valid(_))
    }
}

fn frame_interval(frame_rate: f64) -> Option<f64> {
    (frame_rate.is_finite() && frame_rate > 0.0).then(|| 1.0 / frame_rate)
}

fn closest_distance(points: &[LidarPoint], config: &LidarTtcConfig) -> Option<f64> {
    let half_lane = config.lane_width / 2.0;
    let points: Vec<LidarPoint> = points
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite())
        .filter(|p| !config.restrict_to_ego_lane || p.y.abs() <= half_lane)
        .copied()
        .collect();
    if points.is_empty() {
        return None;
    }
    let filter = AxisFilter::<3>::new(config.fence_factor);
    let (inliers, diag) = filter.apply(&points, |p| [p.x, p.y, p.z]).ok()?;
    debug!("lidar fence kept {} of {} points", diag.kept, diag.total);
    inliers.iter().map(|p| p.x).min_by(|a, b| a.total_cmp(b))
}

/// TTC from the closest LiDAR return in each frame, after rejecting points
/// that are an IQR outlier along x, y or z. Non-finite returns are ignored.
pub fn compute_ttc_lidar(
    lidar_points_prev: &[LidarPoint],
    lidar_points_curr: &[LidarPoint],
    frame_rate: f64,
    config: &LidarTtcConfig,
) -> TtcEstimate {
    let Some(dt) = frame_interval(frame_rate) else {
        warn!("frame rate {} is not usable", frame_rate);
        return TtcEstimate::NotComputable(Degeneracy::InvalidFrameRate);
    };
    let (Some(min_x_prev), Some(min_x_curr)) = (
        closest_distance(lidar_points_prev, config),
        closest_distance(lidar_points_curr, config),
    ) else {
        return TtcEstimate::NotComputable(Degeneracy::InsufficientPoints);
    };

    let denominator = min_x_prev - min_x_curr;
    if denominator.abs() <= EPS {
        return TtcEstimate::NotComputable(Degeneracy::ZeroDenominator);
    }
    let ttc = min_x_curr * dt / denominator;
    debug!(
        "lidar ttc {:.3} s (min x {:.3} -> {:.3} m)",
        ttc, min_x_prev, min_x_curr
    );
    TtcEstimate::Valid(ttc)
}

fn matched_pairs(
    kpts_prev: &[KeyPoint],
    kpts_curr: &[KeyPoint],
    kpt_matches: &[KeypointMatch],
) -> Result<Vec<(KeyPoint, KeyPoint)>> {
    kpt_matches
        .iter()
        .map(|m| {
            let prev = kpts_prev.get(m.prev_idx).ok_or(Error::KeypointIndex {
                index: m.prev_idx,
                len: kpts_prev.len(),
            })?;
            let curr = kpts_curr.get(m.curr_idx).ok_or(Error::KeypointIndex {
                index: m.curr_idx,
                len: kpts_curr.len(),
            })?;
            Ok((*prev, *curr))
        })
        .collect()
}

/// Drops pairs whose previous or current keypoint is an IQR outlier in x or y
/// among the matched keypoints of its frame.
fn reject_position_outliers(
    pairs: Vec<(KeyPoint, KeyPoint)>,
    fence_factor: f64,
) -> Result<Vec<(KeyPoint, KeyPoint)>> {
    if pairs.is_empty() {
        return Ok(pairs);
    }
    let filter = AxisFilter::<4>::new(fence_factor);
    let inliers = filter.inlier_indices(&pairs, |(p, c)| {
        [p.pt.x as f64, p.pt.y as f64, c.pt.x as f64, c.pt.y as f64]
    })?;
    Ok(inliers.into_iter().map(|i| pairs[i]).collect())
}

/// TTC from the scale change of the matched keypoints, using the median of
/// all pairwise distance ratios.
pub fn compute_ttc_camera(
    kpts_prev: &[KeyPoint],
    kpts_curr: &[KeyPoint],
    kpt_matches: &[KeypointMatch],
    frame_rate: f64,
    config: &CameraTtcConfig,
) -> Result<TtcEstimate> {
    let Some(dt) = frame_interval(frame_rate) else {
        warn!("frame rate {} is not usable", frame_rate);
        return Ok(TtcEstimate::NotComputable(Degeneracy::InvalidFrameRate));
    };
    let mut pairs = matched_pairs(kpts_prev, kpts_curr, kpt_matches)?;
    if config.reject_position_outliers {
        let total = pairs.len();
        pairs = reject_position_outliers(pairs, config.fence_factor)?;
        debug!("position fence kept {} of {} matches", pairs.len(), total);
    }

    let mut dist_ratios = Vec::new();
    for (i, (outer_prev, outer_curr)) in pairs.iter().enumerate() {
        for (inner_prev, inner_curr) in &pairs[i + 1..] {
            let dist_curr = outer_curr.pt.distance(inner_curr.pt) as f64;
            let dist_prev = outer_prev.pt.distance(inner_prev.pt) as f64;
            if dist_prev > f64::EPSILON && dist_curr >= config.min_dist {
                dist_ratios.push(dist_curr / dist_prev);
            }
        }
    }
    if dist_ratios.is_empty() {
        return Ok(TtcEstimate::NotComputable(Degeneracy::NoDistanceRatios));
    }

    let median_ratio = median(&dist_ratios)?;
    let denominator = 1.0 - median_ratio;
    if denominator.abs() <= EPS {
        return Ok(TtcEstimate::NotComputable(Degeneracy::ZeroDenominator));
    }
    let ttc = -dt / denominator;
    debug!(
        "camera ttc {:.3} s from {} ratios (median {:.5})",
        ttc,
        dist_ratios.len(),
        median_ratio
    );
    Ok(TtcEstimate::Valid(ttc))
}
