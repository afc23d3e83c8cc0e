use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// A keypoint as delivered by an external detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub pt: Vec2,
    /// Diameter of the meaningful neighborhood in pixels.
    #[serde(default)]
    pub size: f32,
    #[serde(default)]
    pub response: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32) -> KeyPoint {
        KeyPoint {
            pt: Vec2::new(x, y),
            size: 0.0,
            response: 0.0,
        }
    }
}

/// Putative correspondence between a keypoint of the previous frame and one
/// of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeypointMatch {
    pub prev_idx: usize,
    pub curr_idx: usize,
}

impl KeypointMatch {
    pub fn new(prev_idx: usize, curr_idx: usize) -> KeypointMatch {
        KeypointMatch { prev_idx, curr_idx }
    }
}

/// Integer pixel location picked from a response map.
///
/// `pos.x` is the column, `pos.y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub pos: IVec2,
    pub score: f32,
    /// Neighborhood diameter, twice the detector aperture.
    pub size: f32,
}

impl ScoredPoint {
    pub fn new(x: i32, y: i32, score: f32, size: f32) -> ScoredPoint {
        ScoredPoint {
            pos: IVec2::new(x, y),
            score,
            size,
        }
    }

    /// Intersection over union of the two neighborhood circles.
    ///
    /// A circle fully inside the other yields the ratio of their areas.
    pub fn overlap(&self, other: &ScoredPoint) -> f32 {
        let a = self.size * 0.5;
        let b = other.size * 0.5;
        let a_2 = a * a;
        let b_2 = b * b;
        let c = self.pos.as_vec2().distance(other.pos.as_vec2());

        if a.min(b) + c <= a.max(b) {
            if a_2.max(b_2) == 0.0 {
                return 0.0;
            }
            return a_2.min(b_2) / a_2.max(b_2);
        }
        if c >= a + b {
            return 0.0;
        }

        let c_2 = c * c;
        let cos_alpha = ((b_2 + c_2 - a_2) / (2.0 * b * c)).clamp(-1.0, 1.0);
        let cos_beta = ((a_2 + c_2 - b_2) / (2.0 * a * c)).clamp(-1.0, 1.0);
        let alpha = cos_alpha.acos();
        let beta = cos_beta.acos();

        let segment_a = a_2 * beta;
        let segment_b = b_2 * alpha;
        let triangle_a = a_2 * beta.sin() * cos_beta;
        let triangle_b = b_2 * alpha.sin() * cos_alpha;
        let intersection = segment_a + segment_b - triangle_a - triangle_b;
        let union = (a_2 + b_2) * std::f32::consts::PI - intersection;
        intersection / union
    }
}

impl From<ScoredPoint> for KeyPoint {
    fn from(p: ScoredPoint) -> Self {
        KeyPoint {
            pt: p.pos.as_vec2(),
            size: p.size,
            response: p.score,
        }
    }
}
