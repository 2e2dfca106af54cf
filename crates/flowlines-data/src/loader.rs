//! File loading: format detection and deserialization of settings and maps.
//!
//! Files may be RON, TOML or JSON; the format is picked from the extension.

use std::path::{Path, PathBuf};

use flowlines_core::error::ErrorKind;
use flowlines_core::network::{FlowMap, MapError};
use flowlines_core::settings::{Settings, SettingsError};
use flowlines_core::sink::PresentationSink;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::schema::MapDescription;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The settings file parsed but holds unusable values.
    #[error("invalid settings in {file}: {source}")]
    Settings {
        file: PathBuf,
        #[source]
        source: SettingsError,
    },

    /// The map description parsed but does not form a valid map.
    #[error(transparent)]
    Map(#[from] MapError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DataLoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataLoadError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            DataLoadError::Map(e) => e.kind(),
            DataLoadError::Settings { source, .. } => source.kind(),
            _ => ErrorKind::InvalidArgument,
        }
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `origin` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let parsed = match format {
        Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|detail| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    })
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Load and validate a settings file. Missing fields take their defaults.
pub fn load_settings(path: &Path) -> Result<Settings, DataLoadError> {
    let settings: Settings = deserialize_file(path)?;
    settings
        .validate()
        .map_err(|source| DataLoadError::Settings {
            file: path.to_path_buf(),
            source,
        })?;
    debug!(file = %path.display(), "settings loaded");
    Ok(settings)
}

/// Load a map description without building it.
pub fn load_map_description(path: &Path) -> Result<MapDescription, DataLoadError> {
    let description: MapDescription = deserialize_file(path)?;
    debug!(
        file = %path.display(),
        nodes = description.nodes.len(),
        "map description loaded"
    );
    Ok(description)
}

/// Load a map file and build it into a live [`FlowMap`] drawing into `sink`.
pub fn load_map<S: PresentationSink + 'static>(
    path: &Path,
    settings: &Settings,
    sink: S,
) -> Result<FlowMap<S>, DataLoadError> {
    let description = load_map_description(path)?;
    Ok(description.build(settings.clone(), sink)?)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flowlines-data-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(detect_format(Path::new("a.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("a.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("dir/a.json")).unwrap(), Format::Json);
        let err = detect_format(Path::new("a.yaml")).unwrap_err();
        assert!(matches!(err, DataLoadError::UnsupportedFormat { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn settings_in_every_format() {
        let ron = temp_file("settings.ron", "(dispositions_sum: 30.0)");
        let toml = temp_file("settings.toml", "dispositions_sum = 30.0\nconnection_spacing = 0.2\n");
        let json = temp_file("settings.json", r#"{"unit_scale": 2.0}"#);

        let from_ron = load_settings(&ron).unwrap();
        assert_eq!(from_ron.dispositions_sum, 30.0);
        assert_eq!(from_ron.connection_spacing, 0.1);

        let from_toml = load_settings(&toml).unwrap();
        assert_eq!(from_toml.connection_spacing, 0.2);

        let from_json = load_settings(&json).unwrap();
        assert_eq!(from_json.unit_scale, 2.0);
        assert_eq!(from_json.dispositions_sum, 15.0);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let path = temp_file("bad_settings.json", r#"{"dispositions_sum": 0.0}"#);
        let err = load_settings(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::Settings { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let path = temp_file("broken.json", "{ not json");
        let err = load_settings(&path).unwrap_err();
        match err {
            DataLoadError::Parse { file, .. } => assert_eq!(file, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_settings(Path::new("/definitely/not/here.ron")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn loads_and_builds_a_map() {
        let path = temp_file(
            "map.json",
            r#"{
                "a": {"x": 0, "y": 0, "production": 1,
                      "connections": {"b": {"throughput": 0.3, "travel_time": 100}}},
                "b": {"x": 10, "y": 0, "production": 2, "connections": {}}
            }"#,
        );
        let map = load_map(&path, &Settings::default(), ()).unwrap();
        let a = map.node_id("a").unwrap();
        let b = map.node_id("b").unwrap();
        let link = map.connection_between(a, b).unwrap();
        assert_eq!(map.connection(link).unwrap().travel_time(), 100.0);
        assert_eq!(map.ratios(a).unwrap().get(link), Some(15.0));
    }

    #[test]
    fn map_with_dangling_target_fails() {
        let path = temp_file(
            "dangling.ron",
            r#"{"a": (x: 0.0, y: 0.0, production: 1.0, connections: {"ghost": (throughput: 1.0, travel_time: 5.0)})}"#,
        );
        let err = load_map(&path, &Settings::default(), ()).unwrap_err();
        assert!(matches!(err, DataLoadError::Map(MapError::UnknownNodeName(ref n)) if n == "ghost"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
