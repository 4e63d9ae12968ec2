use crate::convert::{ConvertError, ImageTranscoder, VideoRemuxer};
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Default)]
pub struct ImageCrateTranscoder;

impl ImageTranscoder for ImageCrateTranscoder {
    fn transcode_to_tiff(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let decoded = image::open(source)
            .map_err(|err| ConvertError::Decode(format!("{}: {}", source.display(), err)))?;
        decoded
            .save_with_format(target, ImageFormat::Tiff)
            .map_err(|err| ConvertError::Write(format!("{}: {}", target.display(), err)))
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    pub command: PathBuf,
}

impl Default for FfmpegRemuxer {
    fn default() -> Self {
        Self {
            command: PathBuf::from("ffmpeg"),
        }
    }
}

impl VideoRemuxer for FfmpegRemuxer {
    fn remux_to_mov(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let already_mov = source
            .extension()
            .and_then(|v| v.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("mov"))
            .unwrap_or(false);
        if already_mov {
            fs::copy(source, target)
                .map_err(|err| ConvertError::Write(format!("{}: {}", target.display(), err)))?;
            return Ok(());
        }

        let output = Command::new(&self.command)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-c", "copy", "-f", "mov"])
            .arg(target)
            .output()
            .map_err(|err| {
                ConvertError::Decode(format!("ffmpegを起動できませんでした: {err}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Decode(format!(
                "{}: {}",
                source.display(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}
