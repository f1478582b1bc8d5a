// THEORY:
// `DirectoryFrameSource` reads a camera recording in the on-disk layout used
// by the gate's capture software. Frames are JPEG files grouped into bucket
// directories of one hundred:
//
//     <camera dir>/000100/image000000123.jpg
//
// Capture times live next to the buckets in `timestamps.txt`, one
// `<frame number> <milliseconds>` pair per line. The file is optional; frames
// without an entry get timestamp 0.

use crate::core_modules::frame::{Frame, FrameSource};
use crate::error::{Result, VisionError};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const FRAMES_PER_BUCKET: u64 = 100;
const TIMESTAMP_FILE: &str = "timestamps.txt";

/// Frame source over one camera's recording directory.
#[derive(Debug, Clone)]
pub struct DirectoryFrameSource {
    root: PathBuf,
    timestamps: HashMap<u64, i64>,
    last_frame: Option<u64>,
}

impl DirectoryFrameSource {
    /// Opens `root`, indexing the frames on disk and loading timestamps if present.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let last_frame = scan_last_frame(&root)?;

        let timestamp_path = root.join(TIMESTAMP_FILE);
        let timestamps = if timestamp_path.is_file() {
            parse_timestamps(&fs::read_to_string(&timestamp_path)?)?
        } else {
            HashMap::new()
        };

        debug!(
            "Opened {} with last frame {:?} and {} timestamps",
            root.display(),
            last_frame,
            timestamps.len()
        );
        Ok(Self {
            root,
            timestamps,
            last_frame,
        })
    }

    /// Path of the image for `frame_number`.
    pub fn frame_path(&self, frame_number: u64) -> PathBuf {
        self.bucket_path(frame_number)
            .join(format!("image{:09}.jpg", frame_number))
    }

    fn bucket_path(&self, frame_number: u64) -> PathBuf {
        let bucket = (frame_number / FRAMES_PER_BUCKET) * FRAMES_PER_BUCKET;
        self.root.join(format!("{:06}", bucket))
    }

}

impl FrameSource for DirectoryFrameSource {
    fn frame(&self, frame_number: u64) -> Result<Option<Frame>> {
        let path = self.frame_path(frame_number);
        if !path.is_file() {
            return Ok(None);
        }
        let image = image::open(&path)?.to_luma8();
        let timestamp = self.timestamp(frame_number).unwrap_or(0);
        Ok(Some(Frame::new(frame_number, timestamp, image)))
    }

    fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Frames in range without a `timestamps.txt` entry are stamped 0.
    fn timestamp(&self, frame_number: u64) -> Option<i64> {
        let last = self.last_frame?;
        (1..=last)
            .contains(&frame_number)
            .then(|| self.timestamps.get(&frame_number).copied().unwrap_or(0))
    }
}

/// Parses `<frame number> <timestamp ms>` lines; blank lines and `#` comments are skipped.
pub fn parse_timestamps(content: &str) -> Result<HashMap<u64, i64>> {
    let mut timestamps = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let parsed = match (fields.next(), fields.next(), fields.next()) {
            (Some(frame), Some(timestamp), None) => frame.parse::<u64>().ok().zip(timestamp.parse::<i64>().ok()),
            _ => None,
        };
        let Some((frame_number, timestamp)) = parsed else {
            return Err(VisionError::Timestamp {
                line: index + 1,
                content: line.to_string(),
            });
        };
        if timestamps.insert(frame_number, timestamp).is_some() {
            warn!("Duplicate timestamp for frame {} on line {}, keeping the later one", frame_number, index + 1);
        }
    }
    Ok(timestamps)
}

fn scan_last_frame(root: &Path) -> Result<Option<u64>> {
    let mut last = None;
    for bucket in fs::read_dir(root)? {
        let bucket = bucket?;
        let is_bucket = bucket.file_type()?.is_dir()
            && bucket.file_name().to_str().is_some_and(|name| name.parse::<u64>().is_ok());
        if !is_bucket {
            continue;
        }
        for file in fs::read_dir(bucket.path())? {
            let name = file?.file_name();
            let frame_number = name
                .to_str()
                .and_then(|n| n.strip_prefix("image"))
                .and_then(|n| n.strip_suffix(".jpg"))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(frame_number) = frame_number {
                last = last.max(Some(frame_number));
            }
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gate_vision_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("Error creating scratch directory.");
        dir
    }

    fn write_frame(source: &DirectoryFrameSource, frame_number: u64, shade: u8) {
        let path = source.frame_path(frame_number);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        GrayImage::from_pixel(32, 24, Luma([shade]))
            .save(&path)
            .expect("Error Saving File.");
    }

    #[test]
    fn frame_paths_follow_bucket_layout() {
        let source = DirectoryFrameSource {
            root: PathBuf::from("/flight/cam1"),
            timestamps: HashMap::new(),
            last_frame: None,
        };
        assert_eq!(
            source.frame_path(123),
            PathBuf::from("/flight/cam1/000100/image000000123.jpg")
        );
        assert_eq!(
            source.frame_path(99),
            PathBuf::from("/flight/cam1/000000/image000000099.jpg")
        );
        assert_eq!(
            source.frame_path(4200),
            PathBuf::from("/flight/cam1/004200/image000004200.jpg")
        );
    }

    #[test]
    fn reads_frames_and_timestamps_from_disk() {
        let dir = scratch_dir("read");
        let layout = DirectoryFrameSource::open(&dir).unwrap();
        assert_eq!(layout.last_frame(), None);
        for frame_number in [98, 99, 100, 101] {
            write_frame(&layout, frame_number, 128);
        }
        fs::write(dir.join(TIMESTAMP_FILE), "# frame ms\n98 1000\n99 1040\n\n100 1080\n").unwrap();

        let source = DirectoryFrameSource::open(&dir).unwrap();
        assert_eq!(source.last_frame(), Some(101));
        let frame = source.frame(100).unwrap().expect("frame 100 exists");
        assert_eq!(frame.timestamp, 1080);
        assert_eq!(frame.dimensions(), (32, 24));
        assert_eq!(source.frame(101).unwrap().unwrap().timestamp, 0);
        assert!(source.frame(102).unwrap().is_none());
        assert!(source.frame(5000).unwrap().is_none());
        assert_eq!(source.timestamp(99), Some(1040));
        assert_eq!(source.timestamp(500), None);
        assert_eq!(source.frame_at_or_after(1050), Some(100));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_timestamp_line_is_reported() {
        let err = parse_timestamps("1 100\n2 abc\n").unwrap_err();
        match err {
            VisionError::Timestamp { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "2 abc");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(parse_timestamps("1 2 3").is_err());
        assert_eq!(parse_timestamps("7 -20").unwrap()[&7], -20);
    }
}
