//! `armdeck-hal` – the frame-source hardware abstraction.
//!
//! The demo server never talks to a camera or servo bus directly; it holds a
//! `Box<dyn FrameSource>` and asks it for one observation at a time.
//!
//! # Modules
//!
//! - [`source`] – the [`FrameSource`][source::FrameSource] trait,
//!   [`ArmImage`][source::ArmImage], and the
//!   [`make_frame_source`][source::make_frame_source] factory that picks the
//!   mock or (unwired) real backend.
//! - [`mock`] – [`MockArm`][mock::MockArm]: a synthetic-scene generator plus
//!   a fake joint map, good enough to run the whole demo on a laptop.
//! - [`thumbnail`] – bounded-size JPEG thumbnail encoding for the `frame`
//!   wire event.

pub mod mock;
pub mod source;
pub mod thumbnail;

pub use mock::MockArm;
pub use source::{ArmImage, FrameSource, FrameSourceConfig, make_frame_source};
pub use thumbnail::{THUMBNAIL_MAX_HEIGHT, THUMBNAIL_MAX_WIDTH, encode_thumbnail};
