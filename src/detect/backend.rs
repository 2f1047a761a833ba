use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend is the detection oracle: it receives one RGB frame and returns
/// every object it found, in whatever order the model produced them. Callers
/// treat the result as opaque and do their own class filtering.
///
/// Calls are blocking and synchronous. The frame loop applies no timeout.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// `pixels` is tightly packed RGB24, `width * height * 3` bytes.
    /// Implementations must not keep the slice beyond the call.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
