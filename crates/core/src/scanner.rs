use crate::match_key::{classify_extension, is_sidecar_file, MatchKey, MediaKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub byte_size: u64,
    pub modified: DateTime<Utc>,
    pub extension: String,
    pub key: MatchKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub scanned_files: usize,
    pub images: usize,
    pub videos: usize,
    pub sidecar_files: usize,
    pub skipped_unrecognized: usize,
    pub skipped_hidden: usize,
}

pub fn scan_assets(root: &Path, extra_suffixes: &[String]) -> Result<(Vec<MediaAsset>, ScanStats)> {
    if !root.is_dir() {
        anyhow::bail!("アーカイブフォルダを読めませんでした: {}", root.display());
    }

    let mut stats = ScanStats::default();
    let mut candidates = Vec::<(PathBuf, MediaKind, String)>::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        stats.scanned_files += 1;

        if is_hidden(path) {
            stats.skipped_hidden += 1;
            continue;
        }

        let file_name = path.file_name().and_then(|v| v.to_str()).unwrap_or_default();
        if is_sidecar_file(file_name) {
            stats.sidecar_files += 1;
            continue;
        }

        let extension = path
            .extension()
            .and_then(|v| v.to_str())
            .unwrap_or_default()
            .to_string();
        match classify_extension(&extension) {
            Some(MediaKind::Image) => {
                stats.images += 1;
                candidates.push((path.to_path_buf(), MediaKind::Image, extension));
            }
            Some(MediaKind::Video) => {
                stats.videos += 1;
                candidates.push((path.to_path_buf(), MediaKind::Video, extension));
            }
            None => {
                stats.skipped_unrecognized += 1;
            }
        }
    }

    let mut assets = candidates
        .into_par_iter()
        .map(|(path, kind, extension)| build_asset(path, kind, extension, extra_suffixes))
        .collect::<Result<Vec<_>>>()?;
    assets.sort_by(|a, b| a.path.cmp(&b.path));

    Ok((assets, stats))
}

fn build_asset(
    path: PathBuf,
    kind: MediaKind,
    extension: String,
    extra_suffixes: &[String],
) -> Result<MediaAsset> {
    let meta = fs::metadata(&path)
        .with_context(|| format!("ファイル情報を取得できませんでした: {}", path.display()))?;
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .with_context(|| format!("更新日時を取得できませんでした: {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .unwrap_or_default();

    Ok(MediaAsset {
        key: MatchKey::for_media(stem, kind, extra_suffixes),
        byte_size: meta.len(),
        modified,
        extension,
        kind,
        path,
    })
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
