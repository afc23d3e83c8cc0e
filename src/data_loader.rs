use std::path::{Path, PathBuf};

use glob::glob;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::io::object_from_json;
use crate::projection::{Calibration, LidarProjection};
use crate::types::Frame;

fn json_filter(rp: glob::GlobResult) -> Option<Result<PathBuf>> {
    match rp {
        Ok(p) if p.extension().is_some_and(|e| e == "json") => Some(Ok(p)),
        Ok(_) => None,
        Err(e) => Some(Err(e.into())),
    }
}

/// Sorted paths of all frame files in `folder`.
pub fn frame_paths(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", folder.display()),
        )));
    }
    let pattern = folder.join("*.json");
    let mut paths = glob(&pattern.to_string_lossy())?
        .filter_map(json_filter)
        .collect::<Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

/// Loads a sequence of frames, one JSON file per frame ordered by file name.
///
/// Files are parsed in parallel.
pub fn load_frame_sequence(folder: &Path) -> Result<Vec<Frame>> {
    let paths = frame_paths(folder)?;
    log::trace!("loading {} frames from {}", paths.len(), folder.display());
    paths
        .par_iter()
        .progress_count(paths.len() as u64)
        .map(|p| object_from_json::<Frame>(p))
        .collect()
}

pub fn load_projection(calibration_path: &Path) -> Result<LidarProjection> {
    let calib: Calibration = object_from_json(calibration_path)?;
    Ok(LidarProjection::from_calibration(&calib))
}
