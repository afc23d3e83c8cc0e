//! Greedy deduplication of thresholded response-map cells.
//!
//! The map is scanned in row-major order. Every cell above `min_response`
//! becomes a candidate with a circular neighborhood of diameter
//! `2 * aperture_size`; two points conflict when the circles overlap at all.
//! Which conflicts a candidate has to beat is set by [`SuppressionPolicy`].
//!
//! Accepted points are bucketed on a grid whose cell edge equals the
//! neighborhood diameter, so a candidate only inspects the 3x3 surrounding
//! buckets instead of every accepted point.
use std::collections::HashMap;

use glam::IVec2;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::detected_points::ScoredPoint;
use crate::error::{Error, Result};
use crate::response::ResponseMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionPolicy {
    /// Replace the first conflicting point the candidate outscores and stop
    /// looking. Survivors may still overlap each other.
    FirstConflict,
    /// The candidate must outscore every conflicting point. It then takes
    /// the slot of the earliest one and the others are dropped, so survivors
    /// never overlap.
    #[default]
    AllConflicts,
}

/// Deduplicates keypoints picked from a dense response map.
#[derive(Debug, Clone)]
pub struct KeypointDeduplicator {
    pub min_response: f32,
    pub aperture_size: u32,
    pub policy: SuppressionPolicy,
}

impl KeypointDeduplicator {
    pub fn new(min_response: f32, aperture_size: u32, policy: SuppressionPolicy) -> Result<Self> {
        if aperture_size == 0 {
            return Err(Error::invalid("aperture_size", "must be at least 1"));
        }
        Ok(KeypointDeduplicator {
            min_response,
            aperture_size,
            policy,
        })
    }

    /// Neighborhood diameter of every produced point.
    pub fn neighborhood_size(&self) -> f32 {
        2.0 * self.aperture_size as f32
    }

    pub fn deduplicate(&self, map: &ResponseMap) -> Vec<ScoredPoint> {
        self.deduplicate_seeded(map, Vec::new())
    }

    /// Runs the scan on top of an already accepted set of points.
    ///
    /// Seed points are expected to share [`Self::neighborhood_size`].
    pub fn deduplicate_seeded(&self, map: &ResponseMap, seed: Vec<ScoredPoint>) -> Vec<ScoredPoint> {
        let size = self.neighborhood_size();
        let mut accepted = AcceptedSet::new(size, seed);
        let mut candidates = 0usize;

        for (x, y, response) in map.cells() {
            if response <= self.min_response {
                continue;
            }
            candidates += 1;
            let candidate = ScoredPoint::new(x as i32, y as i32, response, size);
            let conflicts = accepted.conflicts(&candidate);

            if conflicts.is_empty() {
                accepted.push(candidate);
                continue;
            }
            match self.policy {
                SuppressionPolicy::FirstConflict => {
                    if let Some(&slot) = conflicts
                        .iter()
                        .find(|&&i| candidate.score > accepted.score(i))
                    {
                        trace!("({}, {}) replaces slot {}", x, y, slot);
                        accepted.replace(slot, candidate);
                    }
                }
                SuppressionPolicy::AllConflicts => {
                    if conflicts.iter().all(|&i| candidate.score > accepted.score(i)) {
                        trace!("({}, {}) replaces {} points", x, y, conflicts.len());
                        accepted.replace(conflicts[0], candidate);
                        for &i in &conflicts[1..] {
                            accepted.remove(i);
                        }
                    }
                }
            }
        }

        let points = accepted.into_points();
        debug!(
            "deduplicated {} candidates into {} keypoints ({:?})",
            candidates,
            points.len(),
            self.policy
        );
        points
    }
}

/// Accepted points with a bucket index. Removed slots become `None` so
/// indices of the remaining points stay stable during a scan.
struct AcceptedSet {
    cell: f32,
    slots: Vec<Option<ScoredPoint>>,
    buckets: HashMap<IVec2, Vec<usize>>,
}

impl AcceptedSet {
    fn new(cell: f32, seed: Vec<ScoredPoint>) -> Self {
        let mut set = AcceptedSet {
            cell: cell.max(1.0),
            slots: Vec::with_capacity(seed.len()),
            buckets: HashMap::new(),
        };
        for p in seed {
            set.push(p);
        }
        set
    }

    fn bucket_of(&self, p: &ScoredPoint) -> IVec2 {
        (p.pos.as_vec2() / self.cell).floor().as_ivec2()
    }

    fn score(&self, idx: usize) -> f32 {
        self.slots[idx].map_or(f32::NEG_INFINITY, |p| p.score)
    }

    /// Indices of accepted points overlapping `candidate`, ascending.
    fn conflicts(&self, candidate: &ScoredPoint) -> Vec<usize> {
        let center = self.bucket_of(candidate);
        let mut found = Vec::new();
        for dy in -1..=1 {
            for dx in -1..=1 {
                let Some(indices) = self.buckets.get(&(center + IVec2::new(dx, dy))) else {
                    continue;
                };
                for &i in indices {
                    if let Some(p) = &self.slots[i] {
                        if candidate.overlap(p) > 0.0 {
                            found.push(i);
                        }
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    fn push(&mut self, p: ScoredPoint) {
        let idx = self.slots.len();
        let bucket = self.bucket_of(&p);
        self.slots.push(Some(p));
        self.buckets.entry(bucket).or_default().push(idx);
    }

    fn unlink(&mut self, idx: usize) {
        if let Some(old) = self.slots[idx] {
            let bucket = self.bucket_of(&old);
            if let Some(indices) = self.buckets.get_mut(&bucket) {
                indices.retain(|&i| i != idx);
            }
        }
    }

    fn replace(&mut self, idx: usize, p: ScoredPoint) {
        self.unlink(idx);
        let bucket = self.bucket_of(&p);
        self.slots[idx] = Some(p);
        self.buckets.entry(bucket).or_default().push(idx);
    }

    fn remove(&mut self, idx: usize) {
        self.unlink(idx);
        self.slots[idx] = None;
    }

    fn into_points(self) -> Vec<ScoredPoint> {
        self.slots.into_iter().flatten().collect()
    }
}
