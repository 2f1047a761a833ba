use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::detect::result::Detection;

use super::backend::DetectorBackend;

/// Registry of named detector backends with one active default.
///
/// Owned by the single frame-processing thread, so backends are held by
/// value rather than behind locks.
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn DetectorBackend>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Get backend by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn DetectorBackend + 'static)> {
        self.backends.get_mut(name).map(|backend| backend.as_mut())
    }

    /// Get default backend.
    pub fn default_backend(&mut self) -> Result<&mut (dyn DetectorBackend + 'static)> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        self.get_mut(&name)
            .ok_or_else(|| anyhow!("default backend '{}' missing", name))
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Warm up every registered backend.
    pub fn warm_up_all(&mut self) -> Result<()> {
        for (name, backend) in self.backends.iter_mut() {
            backend
                .warm_up()
                .map_err(|e| anyhow!("backend '{}' warm-up failed: {}", name, e))?;
        }
        Ok(())
    }

    /// Run detection with the default backend.
    pub fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        self.default_backend()?.detect(pixels, width, height)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::ScriptedBackend;

    struct EmptyBackend;

    impl DetectorBackend for EmptyBackend {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn detect(&mut self, _pixels: &[u8], _w: u32, _h: u32) -> Result<Vec<Detection>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn first_registered_backend_is_default() -> Result<()> {
        let mut registry = BackendRegistry::new();
        assert!(registry.default_backend().is_err());

        registry.register(ScriptedBackend::from_frames(vec![vec![Detection::person(
            0.0, 0.0, 1.0, 1.0,
        )]]));
        registry.register(EmptyBackend);

        assert_eq!(registry.default_name(), Some("scripted"));
        assert_eq!(registry.list(), vec!["empty", "scripted"]);
        assert_eq!(registry.detect(b"", 0, 0)?.len(), 1);

        registry.set_default("empty")?;
        assert!(registry.detect(b"", 0, 0)?.is_empty());
        assert!(registry.set_default("tract").is_err());
        Ok(())
    }
}
