use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use image::ImageReader;
use ttc_toolkit::config::{PipelineConfig, load_config};
use ttc_toolkit::data_loader::{load_frame_sequence, load_projection};
use ttc_toolkit::detected_points::KeyPoint;
use ttc_toolkit::io::{object_to_json, write_ttc_report, write_ttc_table};
use ttc_toolkit::pipeline::{detect_corners, process_sequence};
use ttc_toolkit::response::{ResponseMap, gaussian_blur_5x5, gradient_magnitude};

#[derive(Parser)]
#[command(version, about, author)]
struct TtcCli {
    /// pipeline configuration json, defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harris corners with neighborhood deduplication
    Corners {
        /// grayscale or color image
        image: PathBuf,

        /// keypoint json output
        #[arg(short, long, default_value = "keypoints.json")]
        output: PathBuf,
    },
    /// Sobel gradient magnitude of the smoothed image
    Magnitude {
        image: PathBuf,
        output: PathBuf,
    },
    /// Time to collision over a sequence of frame files
    Track {
        /// folder with one json file per frame
        frames: PathBuf,

        /// camera/lidar calibration json
        calibration: PathBuf,

        /// json report output
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// plain text table, one line per object estimate
        #[arg(short, long)]
        table: Option<PathBuf>,
    },
}

fn load_gray(path: &Path) -> Result<image::GrayImage, Box<dyn std::error::Error>> {
    Ok(ImageReader::open(path)?.decode()?.to_luma8())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = TtcCli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Corners { image, output } => {
            let img = load_gray(&image)?;
            let now = Instant::now();
            let corners = detect_corners(&img, &config.nms)?;
            log::info!(
                "{} keypoints in {:.3} ms",
                corners.len(),
                now.elapsed().as_secs_f64() * 1e3
            );
            let keypoints: Vec<KeyPoint> = corners.into_iter().map(KeyPoint::from).collect();
            object_to_json(&output, &keypoints)?;
        }
        Commands::Magnitude { image, output } => {
            let img = load_gray(&image)?;
            let blurred = gaussian_blur_5x5(&ResponseMap::from_luma(&img));
            gradient_magnitude(&blurred).to_luma8().save(&output)?;
            log::info!("wrote {}", output.display());
        }
        Commands::Track {
            frames,
            calibration,
            report,
            table,
        } => {
            let projection = load_projection(&calibration)?;
            let mut frames = load_frame_sequence(&frames)?;
            let now = Instant::now();
            let reports = process_sequence(&mut frames, &projection, &config)?;
            log::info!(
                "tracking {} frames took {:.6} sec",
                frames.len(),
                now.elapsed().as_secs_f64()
            );
            for r in &reports {
                for o in &r.objects {
                    println!(
                        "frame {:>4} box {:>3}: lidar {:>9.3} s  camera {:>9.3} s",
                        r.frame_index,
                        o.curr_box_id,
                        o.ttc_lidar.seconds(),
                        o.ttc_camera.seconds()
                    );
                }
            }
            if let Some(path) = report {
                write_ttc_report(&path, &config, &reports)?;
            }
            if let Some(path) = table {
                write_ttc_table(&path, &reports)?;
            }
        }
    }
    Ok(())
}
