use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::{LayoutKind, MAX_TAGS};

/// Problems found while reading either declarative document. All of them
/// are reported as warnings; the offending key is skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}: unknown key")]
    UnknownKey(String),
    #[error("{key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("{key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Keys accepted in `defaults` and per-monitor objects of the layout document.
pub const LAYOUT_KEYS: &[&str] = &[
    "layout",
    "master-count",
    "master-fraction",
    "gaps",
    "gap-size",
    "border-width",
    "bar-height",
    "show-bar",
    "class-grouping",
    "tag-count",
    "attach-below",
    "border-focus",
    "border-normal",
    "border-urgent",
    "snap-distance",
];

/// Keys accepted inside a per-tag override.
pub const TAG_KEYS: &[&str] = &["layout", "master-count", "master-fraction", "gaps"];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub layout: LayoutKind,
    pub master_count: u32,
    pub master_fraction: f32,
    pub gaps: bool,
    pub gap_size: u32,
    pub border_width: u32,
    /// Space reserved for an external bar at the top of each monitor.
    pub bar_height: u32,
    pub show_bar: bool,
    pub class_grouping: bool,
    pub tag_count: u32,
    pub attach_below: bool,
    pub border_focus: u32,
    pub border_normal: u32,
    pub border_urgent: u32,
    pub snap_distance: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            layout: LayoutKind::Tile,
            master_count: 1,
            master_fraction: 0.55,
            gaps: false,
            gap_size: 6,
            border_width: 1,
            bar_height: 0,
            show_bar: true,
            class_grouping: false,
            tag_count: 9,
            attach_below: false,
            border_focus: 0x005577,
            border_normal: 0x444444,
            border_urgent: 0xff0000,
            snap_distance: 32,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSettings {
    pub layout: Option<LayoutKind>,
    pub master_count: Option<u32>,
    pub master_fraction: Option<f32>,
    pub gaps: Option<bool>,
}

impl TagSettings {
    fn or(&self, fallback: &TagSettings) -> TagSettings {
        TagSettings {
            layout: self.layout.or(fallback.layout),
            master_count: self.master_count.or(fallback.master_count),
            master_fraction: self.master_fraction.or(fallback.master_fraction),
            gaps: self.gaps.or(fallback.gaps),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub settings: Settings,
    pub tags: BTreeMap<u32, TagSettings>,
}

/// The parsed layout/appearance document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub defaults: Settings,
    pub tags: BTreeMap<u32, TagSettings>,
    pub monitors: BTreeMap<usize, MonitorConfig>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&self, monitor: usize) -> &Settings {
        self.monitors
            .get(&monitor)
            .map(|m| &m.settings)
            .unwrap_or(&self.defaults)
    }

    /// Overrides for one tag on one monitor, monitor-specific entries first.
    pub fn tag_settings(&self, monitor: usize, tag: u32) -> TagSettings {
        let global = self.tags.get(&tag).cloned().unwrap_or_default();
        match self.monitors.get(&monitor).and_then(|m| m.tags.get(&tag)) {
            Some(local) => local.or(&global),
            None => global,
        }
    }

    pub fn parse(text: &str) -> Result<(Config, Vec<ConfigError>), ConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        let Value::Object(root) = value else {
            return Err(ConfigError::Malformed(
                "layout document must be an object".to_string(),
            ));
        };
        let mut warnings = Vec::new();
        let config = Self::from_object(&root, &mut warnings);
        Ok((config, warnings))
    }

    /// Read the document at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<(Config, Vec<ConfigError>)> {
        if !path.exists() {
            tracing::info!("No layout file at {:?}, using defaults", path);
            return Ok((Config::new(), vec![]));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout file {:?}", path))?;
        let parsed = Self::parse(&text).with_context(|| format!("Invalid layout file {:?}", path))?;
        Ok(parsed)
    }

    fn from_object(root: &Map<String, Value>, warnings: &mut Vec<ConfigError>) -> Config {
        let mut config = Config::new();

        // Defaults first so per-monitor objects inherit them regardless of key order.
        if let Some(defaults) = root.get("defaults") {
            match defaults.as_object() {
                Some(obj) => apply_settings(&mut config.defaults, obj, "defaults", warnings),
                None => warnings.push(ConfigError::WrongType {
                    key: "defaults".to_string(),
                    expected: "object",
                }),
            }
        }

        for (key, value) in root {
            match key.as_str() {
                "defaults" => {}
                "tags" => {
                    config.tags = parse_tags(value, "tags", config.defaults.tag_count, warnings)
                }
                "monitors" => {
                    let Some(obj) = value.as_object() else {
                        warnings.push(ConfigError::WrongType {
                            key: "monitors".to_string(),
                            expected: "object",
                        });
                        continue;
                    };
                    for (index, body) in obj {
                        let path = format!("monitors.{}", index);
                        let Ok(index) = index.parse::<usize>() else {
                            warnings.push(ConfigError::InvalidValue {
                                key: path,
                                message: "monitor key must be an index".to_string(),
                            });
                            continue;
                        };
                        let Some(body) = body.as_object() else {
                            warnings.push(ConfigError::WrongType {
                                key: path,
                                expected: "object",
                            });
                            continue;
                        };
                        let mut settings = config.defaults.clone();
                        let mut tags = BTreeMap::new();
                        for (k, v) in body {
                            if k == "tags" {
                                tags = parse_tags(v, &format!("{}.tags", path), MAX_TAGS, warnings);
                            } else {
                                apply_setting(&mut settings, k, v, &path, warnings);
                            }
                        }
                        config.monitors.insert(index, MonitorConfig { settings, tags });
                    }
                }
                "comment" => {}
                other => warnings.push(ConfigError::UnknownKey(other.to_string())),
            }
        }
        config
    }
}

fn apply_settings(
    settings: &mut Settings,
    obj: &Map<String, Value>,
    path: &str,
    warnings: &mut Vec<ConfigError>,
) {
    for (key, value) in obj {
        apply_setting(settings, key, value, path, warnings);
    }
}

fn apply_setting(
    settings: &mut Settings,
    key: &str,
    value: &Value,
    path: &str,
    warnings: &mut Vec<ConfigError>,
) {
    let full = format!("{}.{}", path, key);
    match key {
        "layout" => {
            if let Some(kind) = layout_value(value, &full, warnings) {
                settings.layout = kind;
            }
        }
        "master-count" => {
            if let Some(n) = uint_value(value, &full, warnings) {
                settings.master_count = n;
            }
        }
        "master-fraction" => {
            if let Some(f) = fraction_value(value, &full, warnings) {
                settings.master_fraction = f;
            }
        }
        "gaps" => {
            if let Some(b) = bool_value(value, &full, warnings) {
                settings.gaps = b;
            }
        }
        "gap-size" => {
            if let Some(n) = uint_value(value, &full, warnings) {
                settings.gap_size = n;
            }
        }
        "border-width" => {
            if let Some(n) = uint_value(value, &full, warnings) {
                settings.border_width = n;
            }
        }
        "bar-height" => {
            if let Some(n) = uint_value(value, &full, warnings) {
                settings.bar_height = n;
            }
        }
        "show-bar" => {
            if let Some(b) = bool_value(value, &full, warnings) {
                settings.show_bar = b;
            }
        }
        "class-grouping" => {
            if let Some(b) = bool_value(value, &full, warnings) {
                settings.class_grouping = b;
            }
        }
        "tag-count" => {
            if let Some(n) = uint_value(value, &full, warnings) {
                if (1..=MAX_TAGS).contains(&n) {
                    settings.tag_count = n;
                } else {
                    warnings.push(ConfigError::InvalidValue {
                        key: full,
                        message: format!("must be between 1 and {}", MAX_TAGS),
                    });
                }
            }
        }
        "attach-below" => {
            if let Some(b) = bool_value(value, &full, warnings) {
                settings.attach_below = b;
            }
        }
        "border-focus" | "border-normal" | "border-urgent" => {
            if let Some(color) = color_value(value, &full, warnings) {
                match key {
                    "border-focus" => settings.border_focus = color,
                    "border-normal" => settings.border_normal = color,
                    _ => settings.border_urgent = color,
                }
            }
        }
        "snap-distance" => {
            if let Some(n) = uint_value(value, &full, warnings) {
                settings.snap_distance = n;
            }
        }
        "comment" => {}
        _ => warnings.push(ConfigError::UnknownKey(full)),
    }
}

fn parse_tags(
    value: &Value,
    path: &str,
    tag_count: u32,
    warnings: &mut Vec<ConfigError>,
) -> BTreeMap<u32, TagSettings> {
    let mut out = BTreeMap::new();
    let Some(obj) = value.as_object() else {
        warnings.push(ConfigError::WrongType {
            key: path.to_string(),
            expected: "object",
        });
        return out;
    };
    for (tag, body) in obj {
        let tag_path = format!("{}.{}", path, tag);
        let tag = match tag.parse::<u32>() {
            Ok(n) if n >= 1 && n <= tag_count.max(1) => n,
            _ => {
                warnings.push(ConfigError::InvalidValue {
                    key: tag_path,
                    message: format!("tag must be a number between 1 and {}", tag_count),
                });
                continue;
            }
        };
        let Some(body) = body.as_object() else {
            warnings.push(ConfigError::WrongType {
                key: tag_path,
                expected: "object",
            });
            continue;
        };
        let mut settings = TagSettings::default();
        for (key, value) in body {
            let full = format!("{}.{}", tag_path, key);
            match key.as_str() {
                "layout" => settings.layout = layout_value(value, &full, warnings),
                "master-count" => settings.master_count = uint_value(value, &full, warnings),
                "master-fraction" => {
                    settings.master_fraction = fraction_value(value, &full, warnings)
                }
                "gaps" => settings.gaps = bool_value(value, &full, warnings),
                "comment" => {}
                _ => warnings.push(ConfigError::UnknownKey(full)),
            }
        }
        out.insert(tag, settings);
    }
    out
}

pub(crate) fn bool_value(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<bool> {
    let b = value.as_bool();
    if b.is_none() {
        warnings.push(ConfigError::WrongType {
            key: key.to_string(),
            expected: "boolean",
        });
    }
    b
}

pub(crate) fn uint_value(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<u32> {
    let n = value.as_u64().and_then(|n| u32::try_from(n).ok());
    if n.is_none() {
        warnings.push(ConfigError::WrongType {
            key: key.to_string(),
            expected: "non-negative integer",
        });
    }
    n
}

pub(crate) fn int_value(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<i32> {
    let n = value.as_i64().and_then(|n| i32::try_from(n).ok());
    if n.is_none() {
        warnings.push(ConfigError::WrongType {
            key: key.to_string(),
            expected: "integer",
        });
    }
    n
}

pub(crate) fn float_value(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<f32> {
    let f = value.as_f64().map(|f| f as f32);
    if f.is_none() {
        warnings.push(ConfigError::WrongType {
            key: key.to_string(),
            expected: "number",
        });
    }
    f
}

fn fraction_value(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<f32> {
    let f = float_value(value, key, warnings)?;
    if !(0.05..=0.95).contains(&f) {
        warnings.push(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be between 0.05 and 0.95".to_string(),
        });
        return None;
    }
    Some(f)
}

fn layout_value(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<LayoutKind> {
    let Some(name) = value.as_str() else {
        warnings.push(ConfigError::WrongType {
            key: key.to_string(),
            expected: "layout name",
        });
        return None;
    };
    let kind = LayoutKind::from_name(name);
    if kind.is_none() {
        warnings.push(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("unknown layout '{}'", name),
        });
    }
    kind
}

fn color_value(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let hex = s.strip_prefix('#').unwrap_or(s);
            if hex.len() == 6 {
                u32::from_str_radix(hex, 16).ok()
            } else {
                None
            }
        }
        _ => None,
    };
    if parsed.is_none() {
        warnings.push(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "expected a color like \"#rrggbb\"".to_string(),
        });
    }
    parsed
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fusuma")
}

pub fn default_layout_path() -> PathBuf {
    config_dir().join("layout.json")
}

pub fn default_rules_path() -> PathBuf {
    config_dir().join("rules.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_yields_defaults() {
        let (config, warnings) = Config::parse("{}").unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config, Config::new());
        assert_eq!(config.settings(3).tag_count, 9);
    }

    #[test]
    fn test_defaults_and_overrides() {
        let text = r##"{
            "monitors": { "1": { "layout": "monocle", "tags": { "2": { "gaps": true } } } },
            "defaults": { "layout": "grid", "border-width": 3, "border-focus": "#ff8800" },
            "tags": { "2": { "layout": "deck", "master-count": 2 } }
        }"##;
        let (config, warnings) = Config::parse(text).unwrap();
        assert!(warnings.is_empty(), "{:?}", warnings);
        assert_eq!(config.defaults.layout, LayoutKind::Grid);
        assert_eq!(config.defaults.border_focus, 0xff8800);

        // Monitor 1 inherits defaults even though "monitors" came first.
        let mon = config.settings(1);
        assert_eq!(mon.layout, LayoutKind::Monocle);
        assert_eq!(mon.border_width, 3);

        let tag = config.tag_settings(1, 2);
        assert_eq!(tag.gaps, Some(true));
        assert_eq!(tag.layout, Some(LayoutKind::Deck));
        assert_eq!(tag.master_count, Some(2));
        assert_eq!(config.tag_settings(0, 2).gaps, None);
    }

    #[test]
    fn test_bad_keys_are_warnings() {
        let text = r#"{
            "defaults": { "layout": "spiral", "gaps": "yes", "colour": 1, "master-count": 2 },
            "tags": { "40": {} },
            "extra": true
        }"#;
        let (config, warnings) = Config::parse(text).unwrap();
        assert_eq!(config.defaults.layout, LayoutKind::Tile);
        assert!(!config.defaults.gaps);
        assert_eq!(config.defaults.master_count, 2);
        assert!(warnings.contains(&ConfigError::UnknownKey("defaults.colour".to_string())));
        assert!(warnings.contains(&ConfigError::UnknownKey("extra".to_string())));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigError::WrongType { key, .. } if key == "defaults.gaps")));
        assert_eq!(warnings.len(), 5);
    }

    #[test]
    fn test_fraction_out_of_range_is_rejected() {
        let (config, warnings) =
            Config::parse(r#"{"defaults": {"master-fraction": 1.5}}"#).unwrap();
        assert_eq!(config.defaults.master_fraction, 0.55);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_malformed_document_is_error() {
        assert!(matches!(
            Config::parse("[1, 2"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(Config::parse("[]"), Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"defaults": {{"tag-count": 5, "show-bar": false}}}}"#).unwrap();
        let (config, warnings) = Config::load(file.path()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.defaults.tag_count, 5);
        assert!(!config.defaults.show_bar);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
    }
}
