//! Dense per-pixel maps and the small filters that produce them.
//!
//! Borders are reflected without repeating the edge pixel (`gfedcb|abcdefgh|gfedcba`).
use image::{GrayImage, Luma};

use crate::error::{Error, Result};

/// 5x5 Gaussian smoothing kernel, normalized by its sum (273).
const GAUSS_5X5: [f32; 25] = [
    1.0, 4.0, 7.0, 4.0, 1.0, //
    4.0, 16.0, 26.0, 16.0, 4.0, //
    7.0, 26.0, 41.0, 26.0, 7.0, //
    4.0, 16.0, 26.0, 16.0, 4.0, //
    1.0, 4.0, 7.0, 4.0, 1.0,
];

const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// Row-major grid of `f32` scores, one per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ResponseMap {
    pub fn new(width: usize, height: usize) -> ResponseMap {
        ResponseMap {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<ResponseMap> {
        if data.len() != width * height {
            return Err(Error::invalid(
                "data",
                format!("expected {} values for {}x{}, got {}", width * height, width, height, data.len()),
            ));
        }
        Ok(ResponseMap {
            width,
            height,
            data,
        })
    }

    pub fn from_luma(img: &GrayImage) -> ResponseMap {
        ResponseMap {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.pixels().map(|p| p.0[0] as f32).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    #[inline]
    fn get_reflected(&self, x: isize, y: isize) -> f32 {
        self.get(reflect_101(x, self.width), reflect_101(y, self.height))
    }

    /// Row-major iterator over `(x, y, value)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (i % self.width, i / self.width, v))
    }

    /// `(min, max)` over all cells, `None` for an empty map.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Linearly rescales values so that the minimum maps to `lo` and the
    /// maximum to `hi`. A constant map becomes all `lo`.
    pub fn normalize_min_max(&self, lo: f32, hi: f32) -> ResponseMap {
        let Some((min, max)) = self.min_max() else {
            return self.clone();
        };
        let range = max - min;
        let scale = if range > 0.0 { (hi - lo) / range } else { 0.0 };
        ResponseMap {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|v| lo + (v - min) * scale).collect(),
        }
    }

    /// Saturating conversion to 8 bit, absolute values rounded.
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = self.get(x as usize, y as usize).abs().round().clamp(0.0, 255.0);
            Luma([v as u8])
        })
    }

    fn map2(&self, other: &ResponseMap, f: impl Fn(f32, f32) -> f32) -> ResponseMap {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        ResponseMap {
            width: self.width,
            height: self.height,
            data: self.data.iter().zip(&other.data).map(|(a, b)| f(*a, *b)).collect(),
        }
    }
}

fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let i = i.rem_euclid(period);
    if i >= n as isize { (period - i) as usize } else { i as usize }
}

/// Correlates `src` with a square, odd-sized kernel.
fn filter_2d(src: &ResponseMap, kernel: &[f32], ksize: usize) -> ResponseMap {
    debug_assert_eq!(kernel.len(), ksize * ksize);
    let half = (ksize / 2) as isize;
    let mut dst = ResponseMap::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let mut acc = 0.0f32;
            for ky in 0..ksize {
                for kx in 0..ksize {
                    let sx = x as isize + kx as isize - half;
                    let sy = y as isize + ky as isize - half;
                    acc += src.get_reflected(sx, sy) * kernel[ky * ksize + kx];
                }
            }
            dst.set(x, y, acc);
        }
    }
    dst
}

pub fn gaussian_blur_5x5(src: &ResponseMap) -> ResponseMap {
    let sum: f32 = GAUSS_5X5.iter().sum();
    let kernel: Vec<f32> = GAUSS_5X5.iter().map(|k| k / sum).collect();
    filter_2d(src, &kernel, 5)
}

pub fn sobel_x(src: &ResponseMap) -> ResponseMap {
    filter_2d(src, &SOBEL_X, 3)
}

pub fn sobel_y(src: &ResponseMap) -> ResponseMap {
    filter_2d(src, &SOBEL_Y, 3)
}

/// `sqrt(gx^2 + gy^2)` of the Sobel gradients of `src`.
pub fn gradient_magnitude(src: &ResponseMap) -> ResponseMap {
    let gx = sobel_x(src);
    let gy = sobel_y(src);
    gx.map2(&gy, |a, b| (a * a + b * b).sqrt())
}

/// Harris cornerness `det(M) - k * trace(M)^2`.
///
/// `M` is the structure tensor summed over a `block_size x block_size`
/// window of Sobel products.
pub fn harris_response(src: &ResponseMap, block_size: usize, k: f32) -> Result<ResponseMap> {
    if block_size == 0 {
        return Err(Error::invalid("block_size", "must be at least 1"));
    }
    let ix = sobel_x(src);
    let iy = sobel_y(src);
    let ixx = ix.map2(&ix, |a, b| a * b);
    let iyy = iy.map2(&iy, |a, b| a * b);
    let ixy = ix.map2(&iy, |a, b| a * b);

    let lo = -((block_size / 2) as isize);
    let hi = lo + block_size as isize;
    let mut response = ResponseMap::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
            for dy in lo..hi {
                for dx in lo..hi {
                    let sx = x as isize + dx;
                    let sy = y as isize + dy;
                    sxx += ixx.get_reflected(sx, sy);
                    syy += iyy.get_reflected(sx, sy);
                    sxy += ixy.get_reflected(sx, sy);
                }
            }
            let det = sxx * syy - sxy * sxy;
            let trace = sxx + syy;
            response.set(x, y, det - k * trace * trace);
        }
    }
    Ok(response)
}
