use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("サイドカーJSONを解析できませんでした: {0}")]
    Malformed(String),
    #[error("サイドカーを読めませんでした: {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarTime {
    pub epoch: Option<i64>,
    pub formatted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoData {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

impl GeoData {
    pub fn is_sentinel(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSidecar {
    pub path: PathBuf,
    pub byte_size: u64,
    pub title: Option<String>,
    pub taken: Option<SidecarTime>,
    pub created: Option<SidecarTime>,
    pub modified: Option<SidecarTime>,
    pub geo: Option<GeoData>,
    pub description: Option<String>,
    pub people: Vec<String>,
    pub favorited: bool,
    pub trashed: bool,
    pub archived: bool,
    pub device: Option<String>,
    pub album: bool,
}

impl RawSidecar {
    pub fn capture_time(&self) -> Option<&SidecarTime> {
        self.taken.as_ref().or(self.created.as_ref())
    }

    pub fn timestamp_unresolved(&self) -> bool {
        self.taken.is_none() && self.created.is_none()
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or_default()
    }
}

pub fn read_sidecar(path: &Path) -> Result<RawSidecar, SidecarError> {
    let body = fs::read_to_string(path).map_err(|source| SidecarError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let byte_size = body.len() as u64;
    parse_sidecar(path, &body, byte_size)
}

pub fn parse_sidecar(path: &Path, body: &str, byte_size: u64) -> Result<RawSidecar, SidecarError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| SidecarError::Malformed(format!("{}: {}", path.display(), err)))?;
    let Value::Object(fields) = value else {
        return Err(SidecarError::Malformed(format!(
            "{}: JSONオブジェクトではありません",
            path.display()
        )));
    };

    let taken = read_time(fields.get("photoTakenTime"));
    let created = read_time(fields.get("creationTime"));
    let album = fields.contains_key("albumData")
        || (fields.contains_key("date") && taken.is_none() && created.is_none());

    Ok(RawSidecar {
        path: path.to_path_buf(),
        byte_size,
        title: read_string(fields.get("title")),
        taken,
        created,
        modified: read_time(fields.get("modificationTime")),
        geo: read_geo(fields.get("geoData")).or_else(|| read_geo(fields.get("geoDataExif"))),
        description: read_string(fields.get("description")),
        people: read_people(fields.get("people")),
        favorited: read_bool(fields.get("favorited")),
        trashed: read_bool(fields.get("trashed")),
        archived: read_bool(fields.get("archived")),
        device: read_device(&fields),
        album,
    })
}

fn read_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|v| !v.is_empty())
}

fn read_bool(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

fn read_epoch(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn read_time(value: Option<&Value>) -> Option<SidecarTime> {
    let obj = value?.as_object()?;
    let epoch = read_epoch(obj.get("timestamp"));
    let formatted = read_string(obj.get("formatted"));
    if epoch.is_none() && formatted.is_none() {
        return None;
    }
    Some(SidecarTime { epoch, formatted })
}

fn read_float(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn read_geo(value: Option<&Value>) -> Option<GeoData> {
    let obj = value?.as_object()?;
    let latitude = read_float(obj.get("latitude"))?;
    let longitude = read_float(obj.get("longitude"))?;
    Some(GeoData {
        latitude,
        longitude,
        altitude: read_float(obj.get("altitude")),
    })
}

fn read_people(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name.clone()),
            Value::Object(fields) => read_string(fields.get("name")),
            _ => None,
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn read_device(fields: &serde_json::Map<String, Value>) -> Option<String> {
    let from_origin = fields
        .get("googlePhotosOrigin")
        .and_then(|v| v.get("mobileUpload"))
        .and_then(|v| v.get("deviceType"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|v| !v.is_empty());
    from_origin.or_else(|| read_string(fields.get("deviceType")))
}
