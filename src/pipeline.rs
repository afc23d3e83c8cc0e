use std::collections::BTreeMap;

use image::GrayImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::association::{
    cluster_kpt_matches_with_roi, cluster_lidar_with_roi, drop_ambiguous_matches, match_bounding_boxes,
};
use crate::config::{NmsConfig, PipelineConfig};
use crate::detected_points::{KeypointMatch, ScoredPoint};
use crate::error::Result;
use crate::projection::LidarProjection;
use crate::response::{ResponseMap, harris_response};
use crate::ttc::{TtcEstimate, compute_ttc_camera, compute_ttc_lidar};
use crate::types::Frame;

/// Harris response normalized to 0..255 followed by keypoint deduplication.
pub fn detect_corners(img: &GrayImage, config: &NmsConfig) -> Result<Vec<ScoredPoint>> {
    let deduplicator = config.deduplicator()?;
    let gray = ResponseMap::from_luma(img);
    let response = harris_response(&gray, config.block_size, config.harris_k)?;
    let normalized = response.normalize_min_max(0.0, 255.0);
    Ok(deduplicator.deduplicate(&normalized))
}

/// TTC estimates for one object tracked from the previous into the current
/// frame.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectTtc {
    pub prev_box_id: i32,
    pub curr_box_id: i32,
    pub lidar_points_prev: usize,
    pub lidar_points_curr: usize,
    pub num_kpt_matches: usize,
    pub ttc_lidar: TtcEstimate,
    pub ttc_camera: TtcEstimate,
    #[serde(skip)]
    pub kpt_matches: Vec<KeypointMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FramePairReport {
    /// Index of the current frame in its sequence.
    pub frame_index: usize,
    pub bb_matches: BTreeMap<i32, i32>,
    pub objects: Vec<ObjectTtc>,
}

impl FramePairReport {
    /// Writes box matches and per-box keypoint matches back into `curr`.
    pub fn apply_to(&self, curr: &mut Frame) {
        curr.bb_matches = self.bb_matches.clone();
        for object in &self.objects {
            if let Some(bb) = curr.bounding_box_mut(object.curr_box_id) {
                bb.kpt_matches = object.kpt_matches.clone();
            }
        }
    }
}

/// Assigns the frame's LiDAR points to its bounding boxes.
pub fn associate_lidar(
    frame: &mut Frame,
    projection: &LidarProjection,
    config: &PipelineConfig,
) -> Result<usize> {
    let Frame {
        bounding_boxes,
        lidar_points,
        ..
    } = frame;
    cluster_lidar_with_roi(
        bounding_boxes,
        lidar_points,
        config.association.shrink_factor,
        projection,
    )
}

/// Estimates TTC for every object linked between `prev` and `curr`.
///
/// Both frames must already carry their LiDAR associations. Objects without
/// LiDAR points in either frame are skipped. Matches whose current keypoint
/// falls inside several boxes feed no object.
pub fn estimate_frame_pair(
    prev: &Frame,
    curr: &Frame,
    frame_index: usize,
    config: &PipelineConfig,
) -> Result<FramePairReport> {
    let bb_matches = match_bounding_boxes(&curr.kpt_matches, prev, curr)?;
    let kpt_matches =
        drop_ambiguous_matches(&curr.kpt_matches, &curr.keypoints, &curr.bounding_boxes)?;
    let mut objects = Vec::with_capacity(bb_matches.len());

    for (&prev_id, &curr_id) in &bb_matches {
        let (Some(prev_bb), Some(curr_bb)) = (prev.bounding_box(prev_id), curr.bounding_box(curr_id))
        else {
            continue;
        };
        if prev_bb.lidar_points.is_empty() || curr_bb.lidar_points.is_empty() {
            debug!("frame {}: box {} has no lidar support", frame_index, curr_id);
            continue;
        }

        let ttc_lidar = compute_ttc_lidar(
            &prev_bb.lidar_points,
            &curr_bb.lidar_points,
            config.frame_rate,
            &config.lidar_ttc,
        );

        let mut curr_bb = curr_bb.clone();
        cluster_kpt_matches_with_roi(
            &mut curr_bb,
            &prev.keypoints,
            &curr.keypoints,
            &kpt_matches,
            config.association.fence_factor,
        )?;
        let ttc_camera = compute_ttc_camera(
            &prev.keypoints,
            &curr.keypoints,
            &curr_bb.kpt_matches,
            config.frame_rate,
            &config.camera_ttc,
        )?;

        if !ttc_lidar.is_valid() || !ttc_camera.is_valid() {
            warn!(
                "frame {} box {}: lidar {:?}, camera {:?}",
                frame_index, curr_id, ttc_lidar, ttc_camera
            );
        }
        objects.push(ObjectTtc {
            prev_box_id: prev_id,
            curr_box_id: curr_id,
            lidar_points_prev: prev_bb.lidar_points.len(),
            lidar_points_curr: curr_bb.lidar_points.len(),
            num_kpt_matches: curr_bb.kpt_matches.len(),
            ttc_lidar,
            ttc_camera,
            kpt_matches: curr_bb.kpt_matches,
        });
    }

    Ok(FramePairReport {
        frame_index,
        bb_matches,
        objects,
    })
}

/// Associates `curr`, estimates against `prev` and stores the results in
/// `curr`.
pub fn track_frame_pair(
    prev: &Frame,
    curr: &mut Frame,
    frame_index: usize,
    projection: &LidarProjection,
    config: &PipelineConfig,
) -> Result<FramePairReport> {
    associate_lidar(curr, projection, config)?;
    let report = estimate_frame_pair(prev, curr, frame_index, config)?;
    report.apply_to(curr);
    Ok(report)
}

/// Runs the whole sequence. Frames are associated in parallel, then every
/// consecutive pair is estimated in parallel; reports come back in order.
pub fn process_sequence(
    frames: &mut [Frame],
    projection: &LidarProjection,
    config: &PipelineConfig,
) -> Result<Vec<FramePairReport>> {
    let associated: usize = frames
        .par_iter_mut()
        .map(|frame| associate_lidar(frame, projection, config))
        .collect::<Result<Vec<_>>>()?
        .iter()
        .sum();
    debug!("associated {} lidar points over {} frames", associated, frames.len());

    let reports = frames
        .par_windows(2)
        .enumerate()
        .map(|(i, pair)| estimate_frame_pair(&pair[0], &pair[1], i + 1, config))
        .collect::<Result<Vec<_>>>()?;

    for report in &reports {
        report.apply_to(&mut frames[report.frame_index]);
    }
    info!(
        "processed {} frame pairs, {} object estimates",
        reports.len(),
        reports.iter().map(|r| r.objects.len()).sum::<usize>()
    );
    Ok(reports)
}
