//! Order statistics used for outlier rejection.
//!
//! Quartiles are picked with a truncating index into the sorted sample
//! (`floor(n * 0.25)` and `floor(n * 0.75)`), without interpolation.
use crate::error::{Error, Result};

pub const DEFAULT_FENCE_FACTOR: f64 = 1.5;

/// Acceptable value range derived from the interquartile range of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fence {
    pub lower: f64,
    pub upper: f64,
}

impl Fence {
    /// Builds `(Q1 - factor * IQR, Q3 + factor * IQR)` over `sample`.
    pub fn from_sample(sample: &[f64], factor: f64) -> Result<Fence> {
        let sorted = sorted_finite(sample, "fence")?;
        let n = sorted.len();
        let q1 = sorted[quantile_index(n, 0.25)];
        let q3 = sorted[quantile_index(n, 0.75)];
        let iqr = q3 - q1;
        Ok(Fence {
            lower: q1 - factor * iqr,
            upper: q3 + factor * iqr,
        })
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value > self.upper || value < self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        !self.is_outlier(value)
    }
}

/// Median of `sample`; the mean of the two middle values for even sizes.
pub fn median(sample: &[f64]) -> Result<f64> {
    let sorted = sorted_finite(sample, "median")?;
    let n = sorted.len();
    if n % 2 == 0 {
        Ok((sorted[n / 2 - 1] + sorted[n / 2]) * 0.5)
    } else {
        Ok(sorted[n / 2])
    }
}

fn quantile_index(n: usize, q: f64) -> usize {
    ((n as f64 * q) as usize).min(n - 1)
}

fn sorted_finite(sample: &[f64], context: &'static str) -> Result<Vec<f64>> {
    if sample.is_empty() {
        return Err(Error::InsufficientData {
            context,
            required: 1,
            actual: 0,
        });
    }
    if sample.iter().any(|v| !v.is_finite()) {
        return Err(Error::invalid("sample", "contains non-finite values"));
    }
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(sorted)
}

/// Counters reported by [`AxisFilter::apply`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterDiagnostics {
    pub total: usize,
    pub kept: usize,
    pub rejected: usize,
}

/// Rejects items that are an outlier along any of `N` scalar axes.
///
/// One fence is fitted per axis over the whole input.
pub struct AxisFilter<const N: usize> {
    pub factor: f64,
}

impl<const N: usize> AxisFilter<N> {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Returns the indices of the items that pass every axis fence.
    pub fn inlier_indices<T, F>(&self, items: &[T], axes: F) -> Result<Vec<usize>>
    where
        F: Fn(&T) -> [f64; N],
    {
        let values: Vec<[f64; N]> = items.iter().map(&axes).collect();
        let mut fences = Vec::with_capacity(N);
        for axis in 0..N {
            let column: Vec<f64> = values.iter().map(|v| v[axis]).collect();
            fences.push(Fence::from_sample(&column, self.factor)?);
        }
        Ok(values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.iter().zip(&fences).all(|(x, f)| f.contains(*x)))
            .map(|(i, _)| i)
            .collect())
    }

    /// Keeps the items that pass every axis fence.
    pub fn apply<T, F>(&self, items: &[T], axes: F) -> Result<(Vec<T>, FilterDiagnostics)>
    where
        T: Clone,
        F: Fn(&T) -> [f64; N],
    {
        let kept: Vec<T> = self
            .inlier_indices(items, axes)?
            .into_iter()
            .map(|i| items[i].clone())
            .collect();
        let diag = FilterDiagnostics {
            total: items.len(),
            kept: kept.len(),
            rejected: items.len() - kept.len(),
        };
        Ok((kept, diag))
    }
}
