use crate::match_key::{is_sidecar_file, MediaKind};
use crate::matcher::{match_assets, MatchStats, MatchedPair};
use crate::normalize::{normalize_sidecar, CanonicalMetadata};
use crate::scanner::{scan_assets, ScanStats};
use crate::sidecar::{read_sidecar, RawSidecar, SidecarError};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub archive_root: PathBuf,
    pub output_dir: PathBuf,
    pub extra_edit_suffixes: Vec<String>,
    pub hash_names: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportItem {
    pub pair: MatchedPair,
    pub metadata: CanonicalMetadata,
    pub target_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub scan: ScanStats,
    pub matches: MatchStats,
    pub parsed_sidecars: usize,
    pub malformed_sidecars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPlan {
    pub archive_root: PathBuf,
    pub output_dir: PathBuf,
    pub items: Vec<ImportItem>,
    pub stats: ImportStats,
}

pub fn generate_plan(options: &ImportOptions) -> Result<ImportPlan> {
    if !options.archive_root.exists() {
        anyhow::bail!(
            "アーカイブフォルダが存在しません: {}",
            options.archive_root.display()
        );
    }

    let (assets, scan_stats) = scan_assets(&options.archive_root, &options.extra_edit_suffixes)?;
    let (sidecars, malformed_sidecars) = parse_sidecar_tree(&options.archive_root)?;
    let parsed_sidecars = sidecars.len();

    let (pairs, match_stats) = match_assets(assets, sidecars, &options.extra_edit_suffixes);

    let hashed_names: Vec<Option<String>> = if options.hash_names {
        pairs
            .par_iter()
            .map(|pair| content_hash_name(&pair.asset.path).ok())
            .collect()
    } else {
        vec![None; pairs.len()]
    };

    let mut planned_paths = HashSet::<PathBuf>::new();
    let mut items = Vec::with_capacity(pairs.len());
    for (pair, hashed) in pairs.into_iter().zip(hashed_names) {
        let metadata = match pair.sidecar.as_ref() {
            Some(sidecar) => normalize_sidecar(sidecar),
            None => CanonicalMetadata::unmatched(),
        };
        let target_path = resolve_target_path(
            &options.output_dir,
            &pair,
            hashed.as_deref(),
            &mut planned_paths,
        );
        items.push(ImportItem {
            pair,
            metadata,
            target_path,
        });
    }

    Ok(ImportPlan {
        archive_root: options.archive_root.clone(),
        output_dir: options.output_dir.clone(),
        items,
        stats: ImportStats {
            scan: scan_stats,
            matches: match_stats,
            parsed_sidecars,
            malformed_sidecars,
        },
    })
}

fn parse_sidecar_tree(root: &Path) -> Result<(Vec<RawSidecar>, usize)> {
    let mut sidecar_paths = Vec::<PathBuf>::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if is_sidecar_file(&file_name) {
            sidecar_paths.push(entry.path().to_path_buf());
        }
    }

    let parsed: Vec<Result<RawSidecar, SidecarError>> = sidecar_paths
        .par_iter()
        .map(|path| read_sidecar(path))
        .collect();

    let mut sidecars = Vec::with_capacity(parsed.len());
    let mut malformed = 0usize;
    for result in parsed {
        match result {
            Ok(sidecar) => sidecars.push(sidecar),
            Err(_) => malformed += 1,
        }
    }
    Ok((sidecars, malformed))
}

pub fn target_extension(pair: &MatchedPair) -> &'static str {
    match pair.asset.kind {
        MediaKind::Image => "tiff",
        MediaKind::Video => "mov",
    }
}

fn resolve_target_path(
    output_dir: &Path,
    pair: &MatchedPair,
    hashed: Option<&str>,
    planned_paths: &mut HashSet<PathBuf>,
) -> PathBuf {
    let extension = target_extension(pair);
    let stem = match hashed {
        Some(hash) => hash.to_string(),
        None => pair
            .asset
            .path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string()),
    };

    let candidate = output_dir.join(format!("{stem}.{extension}"));
    if planned_paths.insert(candidate.clone()) {
        return candidate;
    }

    let mut n = 1usize;
    loop {
        let candidate = output_dir.join(format!("{stem}_{n:03}.{extension}"));
        if planned_paths.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn content_hash_name(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("ハッシュ対象を読めませんでした: {}", path.display()))?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{digest:x}"))
}
