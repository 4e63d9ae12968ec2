mod codec;
mod config;
mod convert;
mod match_key;
mod matcher;
mod normalize;
mod plan;
mod scanner;
mod sidecar;
mod tag_writer;

pub use codec::{FfmpegRemuxer, ImageCrateTranscoder};
pub use config::{app_paths, load_config, save_config, AppConfig, AppPaths};
pub use convert::{
    run_plan, ConvertError, ConvertSummary, ImageTranscoder, ItemResult, Outcome, TagWriter,
    VideoRemuxer, Workers,
};
pub use match_key::{classify_extension, normalize_base, sidecar_key, MatchKey, MediaKind};
pub use matcher::{match_assets, Confidence, MatchStats, MatchedPair};
pub use normalize::{
    normalize_sidecar, CanonicalMetadata, GeoPoint, MetadataOrigin, TakenTime,
};
pub use plan::{generate_plan, ImportItem, ImportOptions, ImportPlan, ImportStats};
pub use scanner::{scan_assets, MediaAsset, ScanStats};
pub use sidecar::{parse_sidecar, read_sidecar, GeoData, RawSidecar, SidecarError, SidecarTime};
pub use tag_writer::{restore_file_times, ExifToolWriter};
