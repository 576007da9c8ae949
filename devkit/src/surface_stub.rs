/*!
Render surface stub

Paints a flat frame whose colour depends on the displayed state, records
every capture and can be told to fail captures or hand back a frame the
encoder will reject.
*/

use kitchen_kernel::models::{DisplayState, Version};
use kitchen_kernel::render::{FrameSize, RawFrame, RenderError, RenderSurface, Scene};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Script {
    captured: Vec<Version>,
    last_status: Option<String>,
    fail_next: usize,
    corrupt_next: usize,
}

#[derive(Debug, Default)]
pub struct StubSurface {
    script: Mutex<Script>,
}

impl StubSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` captures return [`RenderError::Capture`].
    pub fn fail_next(&self, n: usize) {
        self.script.lock().fail_next = n;
    }

    /// The next `n` captures return a short buffer, so encoding fails.
    pub fn corrupt_next(&self, n: usize) {
        self.script.lock().corrupt_next = n;
    }

    /// Versions of every successful capture, oldest first.
    pub fn captured(&self) -> Vec<Version> {
        self.script.lock().captured.clone()
    }

    pub fn capture_count(&self) -> usize {
        self.script.lock().captured.len()
    }

    /// Status footer text of the most recent capture.
    pub fn last_status(&self) -> Option<String> {
        self.script.lock().last_status.clone()
    }
}

/// FNV-1a over the serialized state, folded into an RGB triple.
pub fn state_colour(state: &DisplayState) -> [u8; 3] {
    let bytes = serde_json::to_vec(state).unwrap_or_default();
    let hash = bytes
        .iter()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(*b)).wrapping_mul(0x100_0000_01b3));
    [(hash >> 16) as u8, (hash >> 8) as u8, hash as u8]
}

impl RenderSurface for StubSurface {
    fn capture(&self, scene: &Scene<'_>, size: FrameSize) -> Result<RawFrame, RenderError> {
        let mut script = self.script.lock();
        if script.fail_next > 0 {
            script.fail_next -= 1;
            return Err(RenderError::Capture("stub surface told to fail".into()));
        }
        script.captured.push(scene.state.version);
        script.last_status = Some(scene.status.to_string());

        let [r, g, b] = state_colour(scene.state);
        let mut rgba: Vec<u8> = std::iter::repeat([r, g, b, 0xff])
            .take(size.width as usize * size.height as usize)
            .flatten()
            .collect();
        if script.corrupt_next > 0 {
            script.corrupt_next -= 1;
            rgba.truncate(rgba.len() / 2);
        }
        Ok(RawFrame { width: size.width, height: size.height, rgba })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitchen_kernel::encode::encode_png;

    fn scene_of(state: &DisplayState) -> Scene<'_> {
        Scene { state, status: "" }
    }

    #[test]
    fn test_capture_matches_requested_size() {
        let stub = StubSurface::new();
        let state = DisplayState::default();
        let frame = stub.capture(&scene_of(&state), FrameSize::new(8, 4)).unwrap();
        assert_eq!(frame.size(), FrameSize::new(8, 4));
        assert_eq!(frame.rgba.len(), FrameSize::new(8, 4).rgba_len());
        assert_eq!(stub.captured(), vec![Version::NEVER]);
    }

    #[test]
    fn test_colour_follows_state() {
        let a = DisplayState::default();
        let mut b = DisplayState::default();
        b.needs_raingear = true;
        assert_eq!(state_colour(&a), state_colour(&a.clone()));
        assert_ne!(state_colour(&a), state_colour(&b));
    }

    #[test]
    fn test_fail_next_counts_down() {
        let stub = StubSurface::new();
        let state = DisplayState::default();
        stub.fail_next(2);
        assert!(stub.capture(&scene_of(&state), FrameSize::new(2, 2)).is_err());
        assert!(stub.capture(&scene_of(&state), FrameSize::new(2, 2)).is_err());
        assert!(stub.capture(&scene_of(&state), FrameSize::new(2, 2)).is_ok());
        assert_eq!(stub.capture_count(), 1);
    }

    #[test]
    fn test_corrupt_frame_is_rejected_by_encoder() {
        let stub = StubSurface::new();
        let state = DisplayState::default();
        stub.corrupt_next(1);
        let bad = stub.capture(&scene_of(&state), FrameSize::new(4, 4)).unwrap();
        assert!(encode_png(&bad).is_err());
        let good = stub.capture(&scene_of(&state), FrameSize::new(4, 4)).unwrap();
        assert!(encode_png(&good).is_ok());
    }
}
