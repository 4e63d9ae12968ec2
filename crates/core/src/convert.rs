use crate::match_key::MediaKind;
use crate::matcher::{Confidence, MatchStats};
use crate::normalize::CanonicalMetadata;
use crate::plan::{ImportItem, ImportPlan};
use crate::tag_writer::restore_file_times;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvertError {
    #[error("未対応の形式です: {0}")]
    UnsupportedFormat(String),
    #[error("デコードに失敗しました: {0}")]
    Decode(String),
    #[error("書き込みに失敗しました: {0}")]
    Write(String),
}

pub trait ImageTranscoder: Sync {
    fn transcode_to_tiff(&self, source: &Path, target: &Path) -> Result<(), ConvertError>;
}

pub trait VideoRemuxer: Sync {
    fn remux_to_mov(&self, source: &Path, target: &Path) -> Result<(), ConvertError>;
}

pub trait TagWriter: Sync {
    fn embed(&self, target: &Path, metadata: &CanonicalMetadata) -> Result<(), ConvertError>;
}

pub struct Workers<'a> {
    pub image: &'a dyn ImageTranscoder,
    pub video: &'a dyn VideoRemuxer,
    pub tags: &'a dyn TagWriter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Converted,
    ConvertedWithoutMetadata,
    Failed(ConvertError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResult {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub confidence: Confidence,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertSummary {
    pub converted: usize,
    pub converted_without_metadata: usize,
    pub failed: usize,
    pub aborted: usize,
    pub unsupported_format: usize,
    pub decode_failures: usize,
    pub write_failures: usize,
    pub matches: MatchStats,
    pub results: Vec<ItemResult>,
}

impl ConvertSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.aborted == 0
    }
}

pub fn run_plan(
    plan: &ImportPlan,
    workers: &Workers<'_>,
    jobs: Option<usize>,
    abort: &AtomicBool,
) -> Result<ConvertSummary> {
    fs::create_dir_all(&plan.output_dir).with_context(|| {
        format!(
            "出力フォルダを作成できませんでした: {}",
            plan.output_dir.display()
        )
    })?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()
        .context("ワーカープールを作成できませんでした")?;

    let results: Vec<ItemResult> = pool.install(|| {
        plan.items
            .par_iter()
            .filter_map(|item| {
                if abort.load(Ordering::Relaxed) {
                    return None;
                }
                Some(convert_one(item, workers))
            })
            .collect()
    });

    let mut summary = ConvertSummary {
        aborted: plan.items.len() - results.len(),
        matches: plan.stats.matches.clone(),
        ..ConvertSummary::default()
    };
    for result in &results {
        match &result.outcome {
            Outcome::Converted => summary.converted += 1,
            Outcome::ConvertedWithoutMetadata => summary.converted_without_metadata += 1,
            Outcome::Failed(error) => {
                summary.failed += 1;
                match error {
                    ConvertError::UnsupportedFormat(_) => summary.unsupported_format += 1,
                    ConvertError::Decode(_) => summary.decode_failures += 1,
                    ConvertError::Write(_) => summary.write_failures += 1,
                }
            }
        }
    }
    summary.results = results;
    Ok(summary)
}

fn convert_one(item: &ImportItem, workers: &Workers<'_>) -> ItemResult {
    let outcome = match try_convert(item, workers) {
        Ok(outcome) => outcome,
        Err(error) => {
            if item.target_path.exists() {
                let _ = fs::remove_file(&item.target_path);
            }
            Outcome::Failed(error)
        }
    };

    ItemResult {
        source_path: item.pair.asset.path.clone(),
        target_path: item.target_path.clone(),
        confidence: item.pair.confidence,
        outcome,
    }
}

fn try_convert(item: &ImportItem, workers: &Workers<'_>) -> Result<Outcome, ConvertError> {
    let source = &item.pair.asset.path;
    let target = &item.target_path;

    match item.pair.asset.kind {
        MediaKind::Image => workers.image.transcode_to_tiff(source, target)?,
        MediaKind::Video => {
            let extension = item.pair.asset.extension.to_lowercase();
            if extension != "mp4" && extension != "mov" {
                return Err(ConvertError::UnsupportedFormat(format!(
                    "{}: {}",
                    source.display(),
                    item.pair.asset.extension
                )));
            }
            workers.video.remux_to_mov(source, target)?;
        }
    }

    if item.pair.sidecar.is_none() {
        return Ok(Outcome::ConvertedWithoutMetadata);
    }

    workers.tags.embed(target, &item.metadata)?;
    let _ = restore_file_times(target, &item.metadata);
    Ok(Outcome::Converted)
}
