//! Assignment of LiDAR points and keypoint matches to bounding boxes, and
//! linking of boxes across two frames.
use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use log::{debug, trace};

use crate::detected_points::{KeyPoint, KeypointMatch};
use crate::error::{Error, Result};
use crate::projection::LidarProjection;
use crate::statistics::Fence;
use crate::types::{BoundingBox, Frame, LidarPoint};

/// Groups LiDAR points by the bounding box their projection falls into.
///
/// Each ROI is shrunk by `shrink_factor` before the containment test. Points
/// enclosed by no box or by more than one box are dropped. Existing point
/// sets are cleared. Returns the number of associated points.
pub fn cluster_lidar_with_roi(
    bounding_boxes: &mut [BoundingBox],
    lidar_points: &[LidarPoint],
    shrink_factor: f32,
    projection: &LidarProjection,
) -> Result<usize> {
    if !(0.0..1.0).contains(&shrink_factor) {
        return Err(Error::invalid(
            "shrink_factor",
            format!("{} is outside [0, 1)", shrink_factor),
        ));
    }
    let shrunk: Vec<_> = bounding_boxes
        .iter()
        .map(|bb| bb.roi.shrink(shrink_factor))
        .collect();
    for bb in bounding_boxes.iter_mut() {
        bb.lidar_points.clear();
    }

    let mut associated = 0usize;
    let mut ambiguous = 0usize;
    for point in lidar_points {
        let Some(px) = projection.project(point.to_dvec3()) else {
            continue;
        };
        let mut enclosing = shrunk
            .iter()
            .enumerate()
            .filter(|(_, roi)| roi.contains(px))
            .map(|(i, _)| i);
        match (enclosing.next(), enclosing.next()) {
            (Some(i), None) => {
                bounding_boxes[i].lidar_points.push(*point);
                associated += 1;
            }
            (Some(_), Some(_)) => ambiguous += 1,
            _ => {}
        }
    }
    debug!(
        "associated {} of {} lidar points with {} boxes, {} ambiguous",
        associated,
        lidar_points.len(),
        bounding_boxes.len(),
        ambiguous
    );
    Ok(associated)
}

fn keypoint_at(kpts: &[KeyPoint], index: usize) -> Result<Vec2> {
    kpts.get(index).map(|k| k.pt).ok_or(Error::KeypointIndex {
        index,
        len: kpts.len(),
    })
}

/// Drops the matches whose current keypoint lies inside more than one of
/// `bounding_boxes`, so every remaining match can join at most one box.
pub fn drop_ambiguous_matches(
    kpt_matches: &[KeypointMatch],
    kpts_curr: &[KeyPoint],
    bounding_boxes: &[BoundingBox],
) -> Result<Vec<KeypointMatch>> {
    let mut kept = Vec::with_capacity(kpt_matches.len());
    for m in kpt_matches {
        let curr = keypoint_at(kpts_curr, m.curr_idx)?;
        let enclosing = bounding_boxes
            .iter()
            .filter(|bb| bb.roi.contains(curr))
            .take(2)
            .count();
        if enclosing < 2 {
            kept.push(*m);
        }
    }
    if kept.len() < kpt_matches.len() {
        debug!(
            "dropped {} matches inside overlapping boxes",
            kpt_matches.len() - kept.len()
        );
    }
    Ok(kept)
}

/// Stores in `bounding_box` the matches whose current keypoint lies inside
/// its ROI, minus those whose pixel displacement is an IQR outlier.
///
/// Boxes are handled one at a time; run the matches through
/// [`drop_ambiguous_matches`] first when ROIs may overlap.
pub fn cluster_kpt_matches_with_roi(
    bounding_box: &mut BoundingBox,
    kpts_prev: &[KeyPoint],
    kpts_curr: &[KeyPoint],
    kpt_matches: &[KeypointMatch],
    fence_factor: f64,
) -> Result<()> {
    bounding_box.kpt_matches.clear();

    let mut inside = Vec::new();
    let mut displacements = Vec::new();
    for m in kpt_matches {
        let curr = keypoint_at(kpts_curr, m.curr_idx)?;
        let prev = keypoint_at(kpts_prev, m.prev_idx)?;
        if bounding_box.roi.contains(curr) {
            displacements.push(curr.distance(prev) as f64);
            inside.push(*m);
        }
    }
    if inside.is_empty() {
        trace!("box {} encloses no matched keypoints", bounding_box.box_id);
        return Ok(());
    }

    let fence = Fence::from_sample(&displacements, fence_factor)?;
    bounding_box.kpt_matches = inside
        .iter()
        .zip(&displacements)
        .filter(|(_, d)| fence.contains(**d))
        .map(|(m, _)| *m)
        .collect();
    debug!(
        "box {}: kept {} of {} enclosed matches, displacement fence [{:.3}, {:.3}]",
        bounding_box.box_id,
        bounding_box.kpt_matches.len(),
        inside.len(),
        fence.lower,
        fence.upper
    );
    Ok(())
}

/// Links every previous-frame box to the current-frame box sharing the most
/// keypoint matches with it.
///
/// A match votes for each (previous box, current box) pair enclosing its
/// previous and current keypoint. Ties keep the earlier current box. A current
/// box is linked to at most one previous box: when several pick it, the one
/// with the most votes keeps it (the earlier one on a tie) and the others stay
/// unmatched.
pub fn match_bounding_boxes(
    kpt_matches: &[KeypointMatch],
    prev_frame: &Frame,
    curr_frame: &Frame,
) -> Result<BTreeMap<i32, i32>> {
    let mut votes: HashMap<(i32, i32), usize> = HashMap::new();
    for m in kpt_matches {
        let prev = keypoint_at(&prev_frame.keypoints, m.prev_idx)?;
        let curr = keypoint_at(&curr_frame.keypoints, m.curr_idx)?;
        for bbp in prev_frame.bounding_boxes.iter().filter(|bb| bb.roi.contains(prev)) {
            for bbc in curr_frame.bounding_boxes.iter().filter(|bb| bb.roi.contains(curr)) {
                *votes.entry((bbp.box_id, bbc.box_id)).or_default() += 1;
            }
        }
    }

    // current box id -> (previous box id, votes)
    let mut claimed: HashMap<i32, (i32, usize)> = HashMap::new();
    for bbp in &prev_frame.bounding_boxes {
        let mut best: Option<(i32, usize)> = None;
        for bbc in &curr_frame.bounding_boxes {
            let count = votes.get(&(bbp.box_id, bbc.box_id)).copied().unwrap_or(0);
            if count > best.map_or(0, |(_, c)| c) {
                best = Some((bbc.box_id, count));
            }
        }
        let Some((curr_id, count)) = best else {
            continue;
        };
        match claimed.get(&curr_id) {
            Some(&(other, other_count)) if other_count >= count => {
                trace!(
                    "box {} loses {} to box {} ({} <= {} matches)",
                    bbp.box_id, curr_id, other, count, other_count
                );
            }
            _ => {
                claimed.insert(curr_id, (bbp.box_id, count));
            }
        }
    }

    let best_matches: BTreeMap<i32, i32> = claimed
        .into_iter()
        .map(|(curr_id, (prev_id, count))| {
            trace!("box {} -> {} with {} matches", prev_id, curr_id, count);
            (prev_id, curr_id)
        })
        .collect();
    Ok(best_matches)
}
