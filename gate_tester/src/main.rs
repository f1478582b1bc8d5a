use anyhow::{Context, Result, bail};
use env_logger::{Builder, Env};
use gate_vision::core_modules::utils::image_helper;
use gate_vision::{DetectorConfig, DirectoryFrameSource, FrameSource, PlaybackDriver, shared_start_timestamp, time_label};
use log::{info, warn};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const USAGE: &str = "Usage: gate_tester <camera_dir> [<second_camera_dir>] [--output <dir>]";

#[derive(Debug, PartialEq)]
struct Args {
    cameras: Vec<PathBuf>,
    output: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut cameras = Vec::new();
    let mut output = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--output" {
            let dir = iter.next().context("--output needs a directory")?;
            output = Some(PathBuf::from(dir));
        } else {
            cameras.push(PathBuf::from(arg));
        }
    }
    if cameras.is_empty() || cameras.len() > 2 {
        bail!(USAGE);
    }
    Ok(Args { cameras, output })
}

/// Replaces `target` with the parsed value of environment variable `name`, if set.
fn env_override<T: FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} is not a valid value: {raw:?}"))?;
    }
    Ok(())
}

fn load_config() -> Result<DetectorConfig> {
    let mut config = DetectorConfig::default();
    env_override("GATE_CENTER_COLUMN", &mut config.center_column)?;
    env_override("GATE_GROUND_LEVEL", &mut config.ground_level)?;
    env_override("GATE_COOLDOWN_FRAMES", &mut config.cooldown_frames)?;
    env_override("GATE_LOOKBACK", &mut config.lookback_budget)?;
    config.validate()?;
    Ok(config)
}

/// One camera to scan, with the other camera of the gate if there is one.
struct CameraScan {
    label: String,
    source: DirectoryFrameSource,
    sibling: Option<DirectoryFrameSource>,
}

/// Scans every frame of one camera and returns the number of crossings found.
/// Times are labelled from `start`, shared by both cameras.
async fn scan_camera(scan: CameraScan, config: DetectorConfig, start: i64, output: Option<PathBuf>) -> Result<usize> {
    let CameraScan { label, source, sibling } = scan;
    let Some(last_frame) = source.last_frame() else {
        warn!("[{label}] no frames found");
        return Ok(0);
    };
    let center_column = config.center_column;
    info!("[{label}] scanning frames 1..={last_frame}");

    let mut driver = PlaybackDriver::new(source, config)?;
    let mut crossings = 0;
    for frame_number in 1..=last_frame {
        let Some(event) = driver.track_frame(frame_number).await? else {
            continue;
        };
        crossings += 1;
        let sibling_frame = sibling.as_ref().and_then(|s| s.frame_at_or_after(event.timestamp));
        info!(
            "[{label}] {:?} crossing at frame {} ({}), other camera frame {:?}",
            event.direction,
            event.frame_number,
            time_label(event.timestamp, start),
            sibling_frame
        );

        if let (Some(output), Some(result)) = (output.as_deref(), driver.last_result()) {
            let mut annotated = result.annotated.clone();
            image_helper::draw_center_line(&mut annotated, center_column);
            save_crossing(output, &label, frame_number, &annotated)?;
        }
    }

    info!("[{label}] {crossings} crossing(s)");
    Ok(crossings)
}

fn save_crossing(output: &Path, label: &str, frame_number: u64, image: &image::GrayImage) -> Result<()> {
    let path = output.join(format!("{label}_{frame_number:09}.png"));
    image_helper::save_gray(&path, image).with_context(|| format!("writing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    // --- 1. Argument Parsing & Setup ---
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&raw)?;
    let config = load_config()?;
    if let Some(output) = &args.output {
        std::fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    }

    // --- 2. Open the cameras on a shared clock ---
    let sources = args
        .cameras
        .iter()
        .map(|dir| DirectoryFrameSource::open(dir).with_context(|| format!("opening {}", dir.display())))
        .collect::<Result<Vec<_>>>()?;
    let start = shared_start_timestamp(&sources);
    info!("Shared start timestamp {start} ms");

    // --- 3. Scan both cameras concurrently ---
    let scans = sources.iter().enumerate().map(|(index, source)| {
        let scan = CameraScan {
            label: format!("camera{}", index + 1),
            source: source.clone(),
            sibling: sources.get(1 - index).cloned(),
        };
        scan_camera(scan, config.clone(), start, args.output.clone())
    });
    let counts = futures::future::try_join_all(scans).await?;

    let total: usize = counts.iter().sum();
    info!("Finished: {total} crossing(s) across {} camera(s)", counts.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_or_two_cameras_with_optional_output() {
        let args = parse_args(&strings(&["cam1", "--output", "out", "cam2"])).unwrap();
        assert_eq!(
            args,
            Args {
                cameras: vec![PathBuf::from("cam1"), PathBuf::from("cam2")],
                output: Some(PathBuf::from("out")),
            }
        );
        assert_eq!(parse_args(&strings(&["cam1"])).unwrap().output, None);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&strings(&["a", "b", "c"])).is_err());
        assert!(parse_args(&strings(&["a", "--output"])).is_err());
    }

    #[test]
    fn unset_override_keeps_the_default() {
        let mut value = 7u32;
        env_override("GATE_TESTER_UNSET_VARIABLE", &mut value).unwrap();
        assert_eq!(value, 7);
    }
}
