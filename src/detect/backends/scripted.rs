use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// One frame's worth of scripted detector output.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    Fail { error: String },
    Detections(Vec<Detection>),
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    frames: Vec<ScriptStep>,
    #[serde(default)]
    looping: bool,
}

/// Scripted backend for tests and replays.
///
/// Ignores pixel content and returns the next scripted step for every call.
/// Once the script runs out it reports no detections, unless looping.
pub struct ScriptedBackend {
    script: Vec<ScriptStep>,
    pending: VecDeque<ScriptStep>,
    looping: bool,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            pending: steps.iter().cloned().collect(),
            script: steps,
            looping: false,
        }
    }

    /// Script that succeeds on every frame.
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self::new(frames.into_iter().map(ScriptStep::Detections).collect())
    }

    /// Load a script from a JSON file of the form
    /// `{"frames": [[{..detection..}], {"error": "..."}], "looping": false}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        let file: ScriptFile = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid detection script {}: {}", path.display(), e))?;
        Ok(Self::new(file.frames).with_looping(file.looping))
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Steps not yet consumed in the current pass.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        if self.pending.is_empty() && self.looping {
            self.pending = self.script.iter().cloned().collect();
        }

        match self.pending.pop_front() {
            Some(ScriptStep::Detections(detections)) => Ok(detections),
            Some(ScriptStep::Fail { error }) => Err(anyhow!("scripted detector failure: {}", error)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_steps_then_runs_dry() {
        let mut backend = ScriptedBackend::new(vec![
            ScriptStep::Detections(vec![Detection::person(0.0, 0.0, 10.0, 10.0)]),
            ScriptStep::Fail {
                error: "model crashed".to_string(),
            },
        ]);

        assert_eq!(backend.detect(b"frame", 1, 1).unwrap().len(), 1);
        assert!(backend.detect(b"frame", 1, 1).is_err());
        assert!(backend.detect(b"frame", 1, 1).unwrap().is_empty());
        assert_eq!(backend.remaining(), 0);
    }

    #[test]
    fn looping_script_restarts() {
        let mut backend =
            ScriptedBackend::from_frames(vec![vec![Detection::person(0.0, 0.0, 1.0, 1.0)]])
                .with_looping(true);

        for _ in 0..3 {
            assert_eq!(backend.detect(b"", 0, 0).unwrap().len(), 1);
        }
    }

    #[test]
    fn parses_json_script() -> Result<()> {
        let raw = r#"{
            "frames": [
                [{"x1": 0, "y1": 100, "x2": 50, "y2": 300, "confidence": 0.9, "class_id": 0}],
                {"error": "camera glitch"},
                []
            ]
        }"#;
        let file: ScriptFile = serde_json::from_str(raw)?;
        assert_eq!(file.frames.len(), 3);
        assert!(!file.looping);
        match &file.frames[0] {
            ScriptStep::Detections(dets) => assert_eq!(dets[0].bbox.height(), 200.0),
            other => panic!("unexpected step {:?}", other),
        }
        assert!(matches!(file.frames[1], ScriptStep::Fail { .. }));
        Ok(())
    }
}
