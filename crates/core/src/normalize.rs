use crate::sidecar::{RawSidecar, SidecarTime};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataOrigin {
    Matched,
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakenTime {
    pub utc: DateTime<Utc>,
    pub offset_seconds: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMetadata {
    pub origin: MetadataOrigin,
    pub taken: Option<TakenTime>,
    pub modified: Option<TakenTime>,
    pub location: Option<GeoPoint>,
    pub description: Option<String>,
    pub people: Vec<String>,
    pub favorite: bool,
    pub device: Option<String>,
}

impl CanonicalMetadata {
    pub fn unmatched() -> Self {
        Self {
            origin: MetadataOrigin::Unmatched,
            taken: None,
            modified: None,
            location: None,
            description: None,
            people: Vec::new(),
            favorite: false,
            device: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_none()
            && self.modified.is_none()
            && self.location.is_none()
            && self.description.is_none()
            && self.people.is_empty()
            && !self.favorite
            && self.device.is_none()
    }
}

pub fn normalize_sidecar(raw: &RawSidecar) -> CanonicalMetadata {
    CanonicalMetadata {
        origin: MetadataOrigin::Matched,
        taken: raw.capture_time().and_then(resolve_time),
        modified: raw.modified.as_ref().and_then(resolve_time),
        location: raw
            .geo
            .as_ref()
            .filter(|geo| !geo.is_sentinel())
            .map(|geo| GeoPoint {
                latitude: geo.latitude,
                longitude: geo.longitude,
                altitude: geo.altitude,
            }),
        description: trim_nonempty(raw.description.as_deref()),
        people: dedupe_people(&raw.people),
        favorite: raw.favorited,
        device: trim_nonempty(raw.device.as_deref()),
    }
}

pub(crate) fn resolve_time(time: &SidecarTime) -> Option<TakenTime> {
    let offset_seconds = time
        .formatted
        .as_deref()
        .and_then(|f| parse_formatted(f).and_then(|(_, offset)| offset));

    if let Some(epoch) = time.epoch {
        let utc = Utc.timestamp_opt(epoch, 0).single()?;
        return Some(TakenTime {
            utc,
            offset_seconds,
        });
    }

    let (utc, offset) = parse_formatted(time.formatted.as_deref()?)?;
    Some(TakenTime {
        utc,
        offset_seconds: offset,
    })
}

pub(crate) fn time_instant(time: &SidecarTime) -> Option<DateTime<Utc>> {
    resolve_time(time).map(|t| t.utc)
}

fn parse_formatted(input: &str) -> Option<(DateTime<Utc>, Option<i32>)> {
    let normalized: String = input
        .trim()
        .chars()
        .map(|c| if c == '\u{202f}' || c == '\u{a0}' { ' ' } else { c })
        .collect();

    const OFFSET_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%b %d, %Y, %I:%M:%S %p %z",
    ];
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, fmt) {
            return Some((dt.with_timezone(&Utc), Some(dt.offset().local_minus_utc())));
        }
    }

    let (naive_input, known_utc) = match normalized
        .strip_suffix(" UTC")
        .or_else(|| normalized.strip_suffix(" GMT"))
    {
        Some(stripped) => (stripped.to_string(), true),
        None => (normalized, false),
    };

    const NAIVE_FORMATS: &[&str] = &[
        "%b %d, %Y, %I:%M:%S %p",
        "%b %d, %Y, %H:%M:%S",
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&naive_input, fmt) {
            let offset = if known_utc { Some(0) } else { None };
            return Some((naive.and_utc(), offset));
        }
    }

    None
}

fn trim_nonempty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn dedupe_people(people: &[String]) -> Vec<String> {
    let mut seen = HashSet::<String>::new();
    let mut out = Vec::new();
    for name in people {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out
}
