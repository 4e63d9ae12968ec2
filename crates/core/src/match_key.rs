use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "webp", "bmp", "tif", "tiff",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "3gp", "m4v", "mpg", "mpeg", "wmv",
];

const EDIT_SUFFIXES: &[&str] = &["-edited", "-effects", "-animation", "-collage", "-bearbeitet"];

const SIDECAR_SUFFIX: &str = "supplemental-metadata";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub base: String,
    pub kind: MediaKind,
}

impl MatchKey {
    pub fn for_media(stem: &str, kind: MediaKind, extra_suffixes: &[String]) -> Self {
        Self {
            base: normalize_base(stem, extra_suffixes),
            kind,
        }
    }
}

pub fn classify_extension(ext: &str) -> Option<MediaKind> {
    if IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    {
        return Some(MediaKind::Image);
    }
    if VIDEO_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    {
        return Some(MediaKind::Video);
    }
    None
}

pub fn normalize_base(stem: &str, extra_suffixes: &[String]) -> String {
    let lowered = stem.trim().to_lowercase();
    let stripped = strip_duplicate_counter(&lowered);
    let stripped = strip_edit_suffix(stripped, extra_suffixes);
    strip_duplicate_counter(stripped).to_string()
}

pub fn is_sidecar_file(file_name: &str) -> bool {
    file_name.len() > ".json".len() && file_name.to_lowercase().ends_with(".json")
}

/// `IMG_01.jpg.supplemental-metadata.json` → `img_01.jpg`
/// (切り詰め形 `...supplemental-met.json` と連番形 `...jpg(1).json` を含む)
pub fn sidecar_media_name(file_name: &str) -> Option<String> {
    let lowered = file_name.to_lowercase();
    let stem = lowered.strip_suffix(".json")?;
    if stem.is_empty() {
        return None;
    }

    let stem = match stem.rfind('.') {
        Some(pos) => {
            let segment = strip_duplicate_counter(&stem[pos + 1..]);
            if !segment.is_empty() && SIDECAR_SUFFIX.starts_with(segment) {
                &stem[..pos]
            } else {
                stem
            }
        }
        None => stem,
    };

    let stem = strip_duplicate_counter(stem);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

pub fn sidecar_key(
    title: Option<&str>,
    file_name: &str,
    extra_suffixes: &[String],
) -> Option<MatchKey> {
    let media_name = match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => title.to_lowercase(),
        None => sidecar_media_name(file_name)?,
    };

    let dot = media_name.rfind('.')?;
    let kind = classify_extension(&media_name[dot + 1..])?;
    Some(MatchKey::for_media(&media_name[..dot], kind, extra_suffixes))
}

fn strip_duplicate_counter(value: &str) -> &str {
    let trimmed = value.trim_end();
    let Some(open) = trimmed.rfind('(') else {
        return trimmed;
    };
    if !trimmed.ends_with(')') {
        return trimmed;
    }

    let inner = &trimmed[open + 1..trimmed.len() - 1];
    if inner.is_empty() || !inner.chars().all(|c| c.is_ascii_digit()) {
        return trimmed;
    }

    trimmed[..open].trim_end()
}

fn strip_edit_suffix<'a>(value: &'a str, extra_suffixes: &[String]) -> &'a str {
    for suffix in EDIT_SUFFIXES {
        if let Some(stripped) = value.strip_suffix(suffix) {
            return stripped;
        }
    }
    for suffix in extra_suffixes {
        let lowered = suffix.to_lowercase();
        if !lowered.is_empty() {
            if let Some(stripped) = value.strip_suffix(lowered.as_str()) {
                return stripped;
            }
        }
    }
    value
}
