use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use deskwatch::config::DeskwatchConfig;
use deskwatch::{DetectorKind, PosturePolicy, SlotAssignment};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DESKWATCH_CONFIG",
        "DESKWATCH_DESK_LEVEL",
        "DESKWATCH_HEIGHT_THRESHOLD",
        "DESKWATCH_FRAME_INTERVAL_MS",
        "DESKWATCH_PERSON_CLASS_ID",
        "DESKWATCH_POSTURE_POLICY",
        "DESKWATCH_SOURCE",
        "DESKWATCH_MODEL_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "desk_level": 280,
        "posture_height_threshold": 420,
        "frame_interval_ms": 40,
        "source": {
            "device": "stub://desk",
            "width": 320,
            "height": 240
        },
        "detector": {
            "backend": "scripted",
            "script_path": "scripts/morning.json"
        },
        "tracking": {
            "assignment": "iou",
            "min_iou": 0.4,
            "max_misses": 25,
            "reset_on_restart": false
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("DESKWATCH_CONFIG", file.path());
    std::env::set_var("DESKWATCH_DESK_LEVEL", "310");
    std::env::set_var("DESKWATCH_FRAME_INTERVAL_MS", "25");

    let cfg = DeskwatchConfig::load().expect("load config");
    assert_eq!(cfg.desk_level, 310);
    assert_eq!(cfg.posture_height_threshold, 420);
    assert_eq!(cfg.frame_interval, Duration::from_millis(25));
    assert_eq!(cfg.source.device, "stub://desk");
    assert_eq!((cfg.source.width, cfg.source.height), (320, 240));
    assert_eq!(cfg.detector.backend, DetectorKind::Scripted);
    assert_eq!(
        cfg.detector.script_path.as_deref(),
        Some(std::path::Path::new("scripts/morning.json"))
    );
    assert_eq!(
        cfg.tracking.assignment,
        SlotAssignment::GreedyIou {
            min_iou: 0.4,
            max_misses: 25
        }
    );
    assert!(!cfg.tracking.reset_on_restart);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
desk_level = 250
posture_policy = "desk_level"

[source]
device = "stub://toml"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = DeskwatchConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.desk_level, 250);
    assert_eq!(cfg.posture_policy, PosturePolicy::DeskLevel);
    assert_eq!(cfg.source.device, "stub://toml");
    assert_eq!(cfg.posture_height_threshold, 400);
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DeskwatchConfig::load().expect("load defaults");
    assert_eq!(cfg, DeskwatchConfig::default());
    assert_eq!(cfg.desk_level, 300);
    assert_eq!(cfg.posture_height_threshold, 400);
    assert_eq!(cfg.person_class_id, 0);
    assert_eq!(cfg.posture_policy, PosturePolicy::HeightThreshold);
    assert!(cfg.tracking.reset_on_restart);
}

#[test]
fn rejects_unknown_fields_and_bad_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"desk_levle": 300}"#).expect("write config");
    assert!(DeskwatchConfig::load_from(Some(file.path())).is_err());

    std::env::set_var("DESKWATCH_HEIGHT_THRESHOLD", "tall");
    let err = DeskwatchConfig::load_from(None).unwrap_err();
    assert!(err.to_string().contains("DESKWATCH_HEIGHT_THRESHOLD"));

    std::env::set_var("DESKWATCH_HEIGHT_THRESHOLD", "0");
    assert!(DeskwatchConfig::load_from(None).is_err());

    clear_env();
}
