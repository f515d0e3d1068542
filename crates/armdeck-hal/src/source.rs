//! Generic [`FrameSource`] trait and supporting types.

use std::path::PathBuf;

use armdeck_types::{ArmError, JointMap};

use crate::mock::MockArm;

/// A raw RGB24 image produced by a frame source.
#[derive(Debug, Clone)]
pub struct ArmImage {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data, `width * height * 3` bytes, row-major RGB.
    pub data: Vec<u8>,
}

impl ArmImage {
    /// Allocate a frame filled with a single colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Image shape as `[height, width, channels]`, the order used on the wire.
    pub fn shape(&self) -> [u32; 3] {
        [self.height, self.width, 3]
    }

    /// Set one pixel. Out-of-bounds coordinates are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }
}

/// A device (or simulation) that produces image + joint-position snapshots
/// on demand and accepts joint-space targets.
///
/// Methods are synchronous and expected to return quickly relative to the
/// streaming period; the coordinator guarantees at most one streaming task
/// and one behavior task call into the source at a time.
pub trait FrameSource: Send {
    /// Stable identifier, e.g. `"mock_arm"` or `"so100"`.
    fn id(&self) -> &str;

    /// Establish the connection. Calling `connect` on an already-connected
    /// source is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Hardware`] when the device cannot be reached.
    fn connect(&mut self) -> Result<(), ArmError>;

    /// Tear the connection down. Idempotent.
    fn disconnect(&mut self) -> Result<(), ArmError>;

    /// `true` once [`connect`][Self::connect] has succeeded.
    fn is_connected(&self) -> bool;

    /// Capture one observation: the current camera frame and a snapshot of
    /// the joint positions taken with it.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::NotConnected`] before `connect`, or
    /// [`ArmError::Hardware`] when the capture fails.
    fn get_observation(&mut self) -> Result<(ArmImage, JointMap), ArmError>;

    /// Send joint-space position targets. Unknown joint names are accepted
    /// and simply recorded by the mock backend.
    fn send_joint_targets(&mut self, targets: &JointMap) -> Result<(), ArmError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Selects which [`FrameSource`] backend [`make_frame_source`] builds.
#[derive(Debug, Clone, Default)]
pub struct FrameSourceConfig {
    /// Use the in-process mock instead of real hardware.
    pub use_mock: bool,
    /// Optional image file the mock serves instead of the synthetic scene.
    pub static_image_path: Option<PathBuf>,
}

/// Build the configured frame source.
///
/// The real SO-100 pass-through driver lives behind a vendor stack that is
/// not part of this demo; requesting it yields [`ArmError::Config`] rather
/// than a backend that pretends to move hardware.
pub fn make_frame_source(cfg: &FrameSourceConfig) -> Result<Box<dyn FrameSource>, ArmError> {
    if cfg.use_mock {
        let mut arm = MockArm::new();
        if let Some(path) = &cfg.static_image_path {
            arm = arm.with_static_image(path.clone());
        }
        return Ok(Box::new(arm));
    }
    Err(ArmError::Config(
        "real arm hardware is not wired into this demo; set use_mock = true".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_is_height_width_channels() {
        let img = ArmImage::filled(640, 480, [0, 0, 0]);
        assert_eq!(img.shape(), [480, 640, 3]);
        assert_eq!(img.data.len(), 640 * 480 * 3);
    }

    #[test]
    fn put_pixel_out_of_bounds_is_ignored() {
        let mut img = ArmImage::filled(2, 2, [0, 0, 0]);
        img.put_pixel(5, 5, [255, 0, 0]);
        assert!(img.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn factory_builds_mock() {
        let cfg = FrameSourceConfig {
            use_mock: true,
            static_image_path: None,
        };
        let src = make_frame_source(&cfg).unwrap();
        assert_eq!(src.id(), "mock_arm");
    }

    #[test]
    fn factory_rejects_real_hardware() {
        let cfg = FrameSourceConfig::default();
        let result = make_frame_source(&cfg);
        assert!(matches!(result, Err(ArmError::Config(_))));
    }
}
