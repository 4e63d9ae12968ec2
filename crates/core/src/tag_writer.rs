use crate::convert::{ConvertError, TagWriter};
use crate::normalize::{CanonicalMetadata, TakenTime};
use chrono::FixedOffset;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct ExifToolWriter {
    pub command: PathBuf,
}

impl Default for ExifToolWriter {
    fn default() -> Self {
        Self {
            command: PathBuf::from("exiftool"),
        }
    }
}

impl TagWriter for ExifToolWriter {
    fn embed(&self, target: &Path, metadata: &CanonicalMetadata) -> Result<(), ConvertError> {
        let args = tag_arguments(metadata);
        if args.is_empty() {
            return Ok(());
        }

        let output = Command::new(&self.command)
            .arg("-overwrite_original")
            .args(&args)
            .arg(target)
            .output()
            .map_err(|err| {
                ConvertError::Write(format!("exiftoolを起動できませんでした: {err}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Write(format!(
                "{}: {}",
                target.display(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn tag_arguments(metadata: &CanonicalMetadata) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(taken) = metadata.taken.as_ref() {
        let rendered = render_datetime(taken);
        args.push(format!("-DateTimeOriginal={rendered}"));
        args.push(format!("-CreateDate={rendered}"));
        if let Some(offset) = taken.offset_seconds {
            args.push(format!("-OffsetTimeOriginal={}", format_offset(offset)));
        }
    }
    if let Some(modified) = metadata.modified.as_ref() {
        args.push(format!("-ModifyDate={}", render_datetime(modified)));
    }

    if let Some(location) = metadata.location.as_ref() {
        args.push(format!("-GPSLatitude={}", location.latitude.abs()));
        args.push(format!(
            "-GPSLatitudeRef={}",
            if location.latitude < 0.0 { "S" } else { "N" }
        ));
        args.push(format!("-GPSLongitude={}", location.longitude.abs()));
        args.push(format!(
            "-GPSLongitudeRef={}",
            if location.longitude < 0.0 { "W" } else { "E" }
        ));
        if let Some(altitude) = location.altitude {
            args.push(format!("-GPSAltitude={altitude}"));
        }
    }

    if let Some(description) = metadata.description.as_deref() {
        args.push(format!("-ImageDescription={description}"));
        args.push(format!("-XMP-dc:Description={description}"));
    }
    for person in &metadata.people {
        args.push(format!("-XMP-iptcExt:PersonInImage+={person}"));
    }
    if metadata.favorite {
        args.push("-XMP-xmp:Rating=5".to_string());
    }
    if let Some(device) = metadata.device.as_deref() {
        args.push(format!("-XMP-xmp:CreatorTool={device}"));
    }

    args
}

fn render_datetime(time: &TakenTime) -> String {
    match time.offset_seconds.and_then(FixedOffset::east_opt) {
        Some(offset) => time
            .utc
            .with_timezone(&offset)
            .format("%Y:%m:%d %H:%M:%S")
            .to_string(),
        None => time.utc.format("%Y:%m:%d %H:%M:%S").to_string(),
    }
}

fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    format!("{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
}

pub fn restore_file_times(path: &Path, metadata: &CanonicalMetadata) -> std::io::Result<()> {
    let Some(time) = metadata.modified.or(metadata.taken) else {
        return Ok(());
    };
    filetime::set_file_mtime(path, FileTime::from_unix_time(time.utc.timestamp(), 0))
}
