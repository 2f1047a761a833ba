use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::CameraConfig;
use crate::leaving::DEFAULT_DESK_LEVEL;
use crate::posture::{PosturePolicy, DEFAULT_HEIGHT_THRESHOLD_PX};
use crate::tracker::{SlotAssignment, DEFAULT_MAX_MISSES, DEFAULT_MIN_IOU};

const DEFAULT_FRAME_INTERVAL_MS: u64 = 20;
const DEFAULT_PERSON_CLASS_ID: i64 = 0;
const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_MODEL_PATH: &str = "models/yolov7-tiny.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_NMS_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DeskwatchConfigFile {
    desk_level: Option<i64>,
    posture_height_threshold: Option<u32>,
    posture_policy: Option<String>,
    frame_interval_ms: Option<u64>,
    person_class_id: Option<i64>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    tracking: Option<TrackingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackingConfigFile {
    assignment: Option<String>,
    min_iou: Option<f32>,
    max_misses: Option<u32>,
    reset_on_restart: Option<bool>,
}

/// Which detector backend the session registers as default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorKind {
    /// ONNX model through tract (feature: backend-tract).
    Tract,
    /// Replays a JSON detection script.
    Scripted,
}

impl std::str::FromStr for DetectorKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tract" | "onnx" => Ok(DetectorKind::Tract),
            "scripted" | "script" => Ok(DetectorKind::Scripted),
            other => Err(anyhow!("unknown detector backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeskwatchConfig {
    /// Pixel row of the desk edge. Only the leaving check and the
    /// desk-level posture policy read it.
    pub desk_level: i64,
    pub posture_height_threshold: u32,
    pub posture_policy: PosturePolicy,
    pub frame_interval: Duration,
    pub person_class_id: i64,
    pub source: CameraConfig,
    pub detector: DetectorSettings,
    pub tracking: TrackingSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: DetectorKind,
    pub model_path: PathBuf,
    pub script_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub assignment: SlotAssignment,
    /// IoU matching parameters, kept even while index assignment is active
    /// so switching to IoU later picks them up.
    pub min_iou: f32,
    pub max_misses: u32,
    /// Clear tracked slots whenever the camera is restarted.
    pub reset_on_restart: bool,
}

impl Default for DeskwatchConfig {
    fn default() -> Self {
        Self {
            desk_level: DEFAULT_DESK_LEVEL,
            posture_height_threshold: DEFAULT_HEIGHT_THRESHOLD_PX,
            posture_policy: PosturePolicy::HeightThreshold,
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            person_class_id: DEFAULT_PERSON_CLASS_ID,
            source: CameraConfig {
                device: DEFAULT_DEVICE.to_string(),
                width: DEFAULT_FRAME_WIDTH,
                height: DEFAULT_FRAME_HEIGHT,
            },
            detector: DetectorSettings {
                backend: DetectorKind::Tract,
                model_path: PathBuf::from(DEFAULT_MODEL_PATH),
                script_path: None,
                input_width: DEFAULT_MODEL_INPUT,
                input_height: DEFAULT_MODEL_INPUT,
                confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
                iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
            },
            tracking: TrackingSettings {
                assignment: SlotAssignment::ByIndex,
                min_iou: DEFAULT_MIN_IOU,
                max_misses: DEFAULT_MAX_MISSES,
                reset_on_restart: true,
            },
        }
    }
}

impl DeskwatchConfig {
    /// Load from the file named by `DESKWATCH_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DESKWATCH_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => DeskwatchConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DeskwatchConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let posture_policy = match file.posture_policy.as_deref() {
            Some(policy) => policy.parse()?,
            None => defaults.posture_policy,
        };
        let source = file.source.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let tracking = file.tracking.unwrap_or_default();
        let backend = match detector.backend.as_deref() {
            Some(backend) => backend.parse()?,
            None => defaults.detector.backend,
        };
        let min_iou = tracking.min_iou.unwrap_or(defaults.tracking.min_iou);
        let max_misses = tracking.max_misses.unwrap_or(defaults.tracking.max_misses);
        let assignment = parse_assignment(
            tracking.assignment.as_deref().unwrap_or("index"),
            min_iou,
            max_misses,
        )?;

        Ok(Self {
            desk_level: file.desk_level.unwrap_or(defaults.desk_level),
            posture_height_threshold: file
                .posture_height_threshold
                .unwrap_or(defaults.posture_height_threshold),
            posture_policy,
            frame_interval: file
                .frame_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.frame_interval),
            person_class_id: file.person_class_id.unwrap_or(defaults.person_class_id),
            source: CameraConfig {
                device: source.device.unwrap_or(defaults.source.device),
                width: source.width.unwrap_or(defaults.source.width),
                height: source.height.unwrap_or(defaults.source.height),
            },
            detector: DetectorSettings {
                backend,
                model_path: detector.model_path.unwrap_or(defaults.detector.model_path),
                script_path: detector.script_path,
                input_width: detector
                    .input_width
                    .unwrap_or(defaults.detector.input_width),
                input_height: detector
                    .input_height
                    .unwrap_or(defaults.detector.input_height),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.detector.confidence_threshold),
                iou_threshold: detector
                    .iou_threshold
                    .unwrap_or(defaults.detector.iou_threshold),
            },
            tracking: TrackingSettings {
                assignment,
                min_iou,
                max_misses,
                reset_on_restart: tracking
                    .reset_on_restart
                    .unwrap_or(defaults.tracking.reset_on_restart),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(level) = env_number::<i64>("DESKWATCH_DESK_LEVEL")? {
            self.desk_level = level;
        }
        if let Some(threshold) = env_number::<u32>("DESKWATCH_HEIGHT_THRESHOLD")? {
            self.posture_height_threshold = threshold;
        }
        if let Some(interval) = env_number::<u64>("DESKWATCH_FRAME_INTERVAL_MS")? {
            self.frame_interval = Duration::from_millis(interval);
        }
        if let Some(class_id) = env_number::<i64>("DESKWATCH_PERSON_CLASS_ID")? {
            self.person_class_id = class_id;
        }
        if let Ok(policy) = std::env::var("DESKWATCH_POSTURE_POLICY") {
            if !policy.trim().is_empty() {
                self.posture_policy = policy.parse()?;
            }
        }
        if let Ok(device) = std::env::var("DESKWATCH_SOURCE") {
            if !device.trim().is_empty() {
                self.source.device = device;
            }
        }
        if let Ok(path) = std::env::var("DESKWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = PathBuf::from(path);
            }
        }
        Ok(())
    }

    /// Switch slot assignment by name, keeping the configured IoU parameters.
    pub fn set_assignment(&mut self, name: &str) -> Result<()> {
        self.tracking.assignment =
            parse_assignment(name, self.tracking.min_iou, self.tracking.max_misses)?;
        Ok(())
    }

    /// Check cross-field constraints. `load` calls this; callers that patch
    /// the config afterwards should call it again.
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval.is_zero() {
            return Err(anyhow!("frame_interval_ms must be greater than zero"));
        }
        if self.posture_height_threshold == 0 {
            return Err(anyhow!("posture_height_threshold must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        let min_iou = match self.tracking.assignment {
            SlotAssignment::GreedyIou { min_iou, .. } => min_iou,
            SlotAssignment::ByIndex => self.tracking.min_iou,
        };
        if !(min_iou > 0.0 && min_iou <= 1.0) {
            return Err(anyhow!("tracking.min_iou must be in (0, 1], got {}", min_iou));
        }
        match self.detector.backend {
            DetectorKind::Tract => {
                if self.detector.model_path.as_os_str().is_empty() {
                    return Err(anyhow!("detector.model_path is required for the tract backend"));
                }
                if self.detector.input_width == 0 || self.detector.input_height == 0 {
                    return Err(anyhow!("detector input size must be greater than zero"));
                }
            }
            DetectorKind::Scripted => {
                if self.detector.script_path.is_none() {
                    return Err(anyhow!(
                        "detector.script_path is required for the scripted backend"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Parse `"index"` or `"iou"` into a slot assignment strategy.
pub fn parse_assignment(value: &str, min_iou: f32, max_misses: u32) -> Result<SlotAssignment> {
    match value.trim().to_ascii_lowercase().as_str() {
        "index" | "by_index" => Ok(SlotAssignment::ByIndex),
        "iou" | "greedy_iou" => Ok(SlotAssignment::GreedyIou {
            min_iou,
            max_misses,
        }),
        other => Err(anyhow!("unknown slot assignment '{}'", other)),
    }
}

fn read_config_file(path: &Path) -> Result<DeskwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be an integer", key)),
        _ => Ok(None),
    }
}
