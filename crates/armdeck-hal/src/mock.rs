//! [`MockArm`] – in-process frame source used to run the demo without
//! hardware.
//!
//! Returns either a configured static image or a synthetic tabletop scene
//! (red cup, blue block, green ball appearing over time), and maintains a
//! fake joint map updated by `send_joint_targets`. This lets the full demo
//! stack run in headless tests and on any laptop.

use std::path::PathBuf;

use armdeck_types::{ArmError, JointMap};
use tracing::{error, info};

use crate::source::{ArmImage, FrameSource};

/// Synthetic scene dimensions, matching a 640×480 webcam.
const SCENE_WIDTH: u32 = 640;
const SCENE_HEIGHT: u32 = 480;

/// In-process mock of the SO-100 arm + wrist camera.
pub struct MockArm {
    joints: JointMap,
    static_image_path: Option<PathBuf>,
    static_image: Option<ArmImage>,
    frame_index: u64,
    connected: bool,
}

impl Default for MockArm {
    fn default() -> Self {
        let mut joints = JointMap::new();
        for i in 0..3 {
            joints.insert(format!("joint_{i}"), 0.0);
        }
        Self {
            joints,
            static_image_path: None,
            static_image: None,
            frame_index: 0,
            connected: false,
        }
    }
}

impl MockArm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `path` instead of the synthetic scene (builder-style). The file
    /// is loaded lazily on [`connect`][FrameSource::connect]; load failures
    /// fall back to the synthetic scene.
    pub fn with_static_image(mut self, path: PathBuf) -> Self {
        self.static_image_path = Some(path);
        self
    }

    fn render_synthetic_scene(&mut self) -> ArmImage {
        let (w, h) = (SCENE_WIDTH, SCENE_HEIGHT);
        let mut img = ArmImage::filled(w, h, [40, 40, 40]);

        // Table surface.
        fill_rect(
            &mut img,
            (w as f32 * 0.1) as u32,
            (h as f32 * 0.6) as u32,
            (w as f32 * 0.9) as u32,
            (h as f32 * 0.8) as u32,
            [90, 90, 90],
        );

        // Objects appear in stages so a "search" sweep has something to find.
        self.frame_index += 1;
        let stage = (self.frame_index / 20) % 3;

        // Red cup, always present.
        fill_rect(
            &mut img,
            (w as f32 * 0.20) as u32,
            (h as f32 * 0.55) as u32,
            (w as f32 * 0.25) as u32,
            (h as f32 * 0.70) as u32,
            [255, 0, 0],
        );
        if stage >= 1 {
            // Blue block.
            fill_rect(
                &mut img,
                (w as f32 * 0.45) as u32,
                (h as f32 * 0.55) as u32,
                (w as f32 * 0.50) as u32,
                (h as f32 * 0.70) as u32,
                [0, 0, 255],
            );
        }
        if stage >= 2 {
            // Green ball.
            let cy = (h as f32 * 0.65) as i64;
            let cx = (w as f32 * 0.75) as i64;
            let r = (w.min(h) as f32 * 0.05) as i64;
            for y in (cy - r).max(0)..(cy + r).min(h as i64) {
                for x in (cx - r).max(0)..(cx + r).min(w as i64) {
                    if (y - cy) * (y - cy) + (x - cx) * (x - cx) <= r * r {
                        img.put_pixel(x as u32, y as u32, [0, 255, 0]);
                    }
                }
            }
        }

        img
    }
}

fn fill_rect(img: &mut ArmImage, x0: u32, y0: u32, x1: u32, y1: u32, rgb: [u8; 3]) {
    for y in y0..y1.min(img.height) {
        for x in x0..x1.min(img.width) {
            img.put_pixel(x, y, rgb);
        }
    }
}

impl FrameSource for MockArm {
    fn id(&self) -> &str {
        "mock_arm"
    }

    fn connect(&mut self) -> Result<(), ArmError> {
        if self.connected {
            return Ok(());
        }
        self.connected = true;
        info!("MockArm connected (mock mode)");

        if let Some(path) = self.static_image_path.clone() {
            match image::open(&path) {
                Ok(img) => {
                    let rgb = img.to_rgb8();
                    self.static_image = Some(ArmImage {
                        width: rgb.width(),
                        height: rgb.height(),
                        data: rgb.into_raw(),
                    });
                    info!(path = %path.display(), "loaded mock static image");
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to load mock static image; using synthetic scene");
                    self.static_image = None;
                }
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ArmError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        info!("MockArm disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn get_observation(&mut self) -> Result<(ArmImage, JointMap), ArmError> {
        if !self.connected {
            return Err(ArmError::NotConnected);
        }
        let frame = match &self.static_image {
            Some(img) => img.clone(),
            None => self.render_synthetic_scene(),
        };
        Ok((frame, self.joints.clone()))
    }

    fn send_joint_targets(&mut self, targets: &JointMap) -> Result<(), ArmError> {
        // Pure state update; nothing physical to fail.
        for (name, value) in targets {
            self.joints.insert(name.clone(), *value);
        }
        Ok(())
    }
}
