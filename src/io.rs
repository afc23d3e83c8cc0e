use std::io::Write;
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::FramePairReport;

/// Serializes an object to a pretty-printed JSON file.
pub fn object_to_json<T: Serialize>(output_path: &Path, object: &T) -> Result<()> {
    let j = serde_json::to_string_pretty(object)?;
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(j.as_bytes())?;
    Ok(())
}

/// Deserializes an object from a JSON file.
pub fn object_from_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[derive(Serialize)]
struct TtcReport<'a> {
    timestamp: String,
    config: &'a PipelineConfig,
    valid_lidar: usize,
    valid_camera: usize,
    frame_pairs: &'a [FramePairReport],
}

/// Writes every estimate of a sequence run, with the configuration used.
pub fn write_ttc_report(
    output_path: &Path,
    config: &PipelineConfig,
    reports: &[FramePairReport],
) -> Result<()> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let timestamp = now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string());
    let objects = || reports.iter().flat_map(|r| r.objects.iter());

    let report = TtcReport {
        timestamp,
        config,
        valid_lidar: objects().filter(|o| o.ttc_lidar.is_valid()).count(),
        valid_camera: objects().filter(|o| o.ttc_camera.is_valid()).count(),
        frame_pairs: reports,
    };
    object_to_json(output_path, &report)
}

fn format_seconds(s: f64) -> String {
    if s.is_finite() {
        format!("{:.6}", s)
    } else if s.is_nan() {
        "nan".to_string()
    } else if s > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

/// Plain text table, one `frame box lidar camera` line per object estimate.
pub fn write_ttc_table(output_path: &Path, reports: &[FramePairReport]) -> Result<()> {
    let mut s = String::new();
    for report in reports {
        for object in &report.objects {
            s += format!(
                "{} {} {} {}\n",
                report.frame_index,
                object.curr_box_id,
                format_seconds(object.ttc_lidar.seconds()),
                format_seconds(object.ttc_camera.seconds())
            )
            .as_str();
        }
    }
    std::fs::write(output_path, s)?;
    Ok(())
}
