//! OpenXR extension plumbing for little-cat.
//!
//! Two optional capabilities live here, both resolved at runtime through
//! `xrGetInstanceProcAddr`:
//! - articulated hand joints (`XR_EXT_hand_tracking`)
//! - camera passthrough compositing (`XR_FB_passthrough`)
//!
//! The host owns the instance, session and frame loop; this crate only borrows raw handles
//! and hands back data for the host's layer submission.

pub mod engine;
pub mod utils;

pub use engine::xr::{
    Hand, HandJoints, HandTracking, Passthrough, Xr, XrExtensionsConfig, XrFrameOutput,
};
pub use engine::{EngineError, EngineResult};
