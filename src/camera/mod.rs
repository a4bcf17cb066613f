//! V4L2 lens focus control for Linux
//!
//! [`FocusDevice`] is the seam between the focus controller and the camera,
//! [`Camera`] implements it on top of a Video4Linux2 device node.

#[cfg(feature = "camera")]
mod device;

#[cfg(feature = "camera")]
pub use device::{Camera, CameraDevice, FocusRange, list_devices};

use crate::error::Result;

/// V4L2 camera class control base
pub const V4L2_CID_CAMERA_CLASS_BASE: u32 = 0x009a_0900;
/// Absolute lens focus position
pub const V4L2_CID_FOCUS_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 10;
/// Continuous automatic focus on/off
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;

/// A device whose lens focus can be driven manually
pub trait FocusDevice {
    /// Disable automatic focus so written values stick
    fn set_manual_focus_mode(&mut self) -> Result<()>;

    /// Move the lens to the given absolute focus value
    fn set_focus(&mut self, value: i32) -> Result<()>;
}
