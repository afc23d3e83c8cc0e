use glam::{DVec3, Vec2};
use nalgebra as na;
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

/// Camera/LiDAR calibration as stored on disk, all matrices row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// 3x4 rectified projection matrix.
    pub p_rect: [f64; 12],
    /// 3x3 rectifying rotation.
    pub r_rect: [f64; 9],
    /// 3x4 rigid transform from the LiDAR frame into the camera frame.
    pub rt: [f64; 12],
}

/// Projects LiDAR points into image pixels.
///
/// Holds the composition `P_rect * R_rect * RT` as a single 3x4 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LidarProjection {
    matrix: na::Matrix3x4<f64>,
}

impl LidarProjection {
    pub fn new(
        p_rect: &na::Matrix3x4<f64>,
        r_rect: &na::Matrix4<f64>,
        rt: &na::Matrix4<f64>,
    ) -> LidarProjection {
        LidarProjection {
            matrix: p_rect * r_rect * rt,
        }
    }

    pub fn from_calibration(calib: &Calibration) -> LidarProjection {
        let p_rect = na::Matrix3x4::from_row_slice(&calib.p_rect);
        let r3 = na::Matrix3::from_row_slice(&calib.r_rect);
        let mut r_rect = na::Matrix4::identity();
        r_rect.fixed_view_mut::<3, 3>(0, 0).copy_from(&r3);
        let mut rt = na::Matrix4::identity();
        rt.fixed_view_mut::<3, 4>(0, 0)
            .copy_from(&na::Matrix3x4::from_row_slice(&calib.rt));
        Self::new(&p_rect, &r_rect, &rt)
    }

    pub fn matrix(&self) -> &na::Matrix3x4<f64> {
        &self.matrix
    }

    /// Pixel coordinate of `p`, or `None` when it does not land in front of
    /// the image plane.
    pub fn project(&self, p: DVec3) -> Option<Vec2> {
        let y = self.matrix * na::Vector4::new(p.x, p.y, p.z, 1.0);
        let w = y[2];
        if !w.is_finite() || w <= EPS {
            return None;
        }
        let u = y[0] / w;
        let v = y[1] / w;
        if !u.is_finite() || !v.is_finite() {
            return None;
        }
        Some(Vec2::new(u as f32, v as f32))
    }
}
