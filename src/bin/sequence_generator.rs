use clap::Parser;
use std::path::PathBuf;
use ttc_toolkit::io::object_to_json;
use ttc_toolkit::synthetic::{SceneParams, generate_sequence};

#[derive(Parser)]
#[command(author, version, about = "Generate a synthetic approaching-vehicle sequence", long_about = None)]
struct Args {
    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Number of frames to generate
    #[arg(short, long, default_value = "8")]
    num_frames: usize,

    /// Distance to the vehicle in the first frame, meters
    #[arg(long, default_value = "12.0")]
    start_distance: f64,

    /// Closing speed, meters per second
    #[arg(long, default_value = "5.0")]
    speed: f64,

    /// Frame rate in Hz
    #[arg(long, default_value = "10.0")]
    frame_rate: f64,

    #[arg(long, default_value = "0")]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let params = SceneParams {
        num_frames: args.num_frames,
        start_distance: args.start_distance,
        speed: args.speed,
        frame_rate: args.frame_rate,
        seed: args.seed,
        ..Default::default()
    };
    let (frames, calibration) = generate_sequence(&params);

    let frames_dir = args.output.join("frames");
    std::fs::create_dir_all(&frames_dir)?;
    for (i, frame) in frames.iter().enumerate() {
        object_to_json(&frames_dir.join(format!("{:06}.json", i)), frame)?;
    }
    object_to_json(&args.output.join("calibration.json"), &calibration)?;
    object_to_json(&args.output.join("scene.json"), &params)?;

    println!("Generated {} frames in {}", frames.len(), args.output.display());
    for k in 1..frames.len() {
        log::info!("frame {}: true ttc {:.3} s", k, params.true_ttc(k));
    }
    Ok(())
}
