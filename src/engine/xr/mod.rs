//! OpenXR extension capabilities the host can opt into.
//!
//! `Xr` owns whichever of hand tracking and passthrough the config enables. The host drives it
//! with raw handles from its own instance/session and feeds the results into its frame loop:
//!
//! - `initialize` once after the session exists
//! - `update` once per frame, after `xrWaitFrame`
//! - `dispose` (or drop) before the session is destroyed

pub mod config;
pub mod extension_resolver;
pub mod hand_tracking;
pub mod passthrough;

#[cfg(test)]
mod fake_runtime;

use log::info;
use openxr::sys;

pub use config::{HandTrackingConfig, LayerPurpose, PassthroughConfig, XrExtensionsConfig};
pub use extension_resolver::{InstanceProcAddr, RawInstance};
pub use hand_tracking::{HAND_JOINT_COUNT, Hand, HandJoints, HandTracking};
pub use passthrough::{Passthrough, PassthroughStatus};

use crate::engine::EngineResult;

/// What one `Xr::update` produced, borrowed from the modules that own it.
#[derive(Debug, Clone, Copy, Default)]
pub struct XrFrameOutput<'a> {
    pub left_hand: Option<&'a HandJoints>,
    pub right_hand: Option<&'a HandJoints>,
    /// `None` when passthrough is disabled or paused; otherwise the host adds it to the frame's layers.
    pub passthrough_layer: Option<&'a sys::CompositionLayerPassthroughFB>,
}

pub struct Xr {
    config: XrExtensionsConfig,
    hand_tracking: Option<HandTracking>,
    passthrough: Option<Passthrough>,
}

impl Xr {
    pub fn new(config: XrExtensionsConfig) -> Self {
        Self {
            config,
            hand_tracking: None,
            passthrough: None,
        }
    }

    pub fn config(&self) -> &XrExtensionsConfig {
        &self.config
    }

    /// Turn on the instance extensions the enabled capabilities need.
    pub fn enable_extensions(&self, extensions: &mut openxr::ExtensionSet) {
        if self.config.hand_tracking.enabled {
            extensions.ext_hand_tracking = true;
        }
        if self.config.passthrough.enabled {
            extensions.fb_passthrough = true;
        }
    }

    /// Names of the instance extensions `enable_extensions` turns on.
    pub fn required_extensions(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.config.hand_tracking.enabled {
            names.push(hand_tracking::EXTENSION_NAME);
        }
        if self.config.passthrough.enabled {
            names.push(passthrough::EXTENSION_NAME);
        }
        names
    }

    pub fn initialize(
        &mut self,
        binding: &(impl InstanceProcAddr + ?Sized),
        session: sys::Session,
        system_id: sys::SystemId,
    ) -> EngineResult<()> {
        if self.config.hand_tracking.enabled {
            let mut hands = HandTracking::new(self.config.hand_tracking.clone());
            hands.initialize(binding, session, system_id)?;
            self.hand_tracking = Some(hands);
        }
        if self.config.passthrough.enabled {
            let mut passthrough = Passthrough::new(self.config.passthrough.clone());
            passthrough.initialize(binding, session, system_id)?;
            self.passthrough = Some(passthrough);
        }
        info!("xr extensions ready: {:?}", self.required_extensions());
        Ok(())
    }

    pub fn update(
        &mut self,
        reference_space: sys::Space,
        frame_state: &openxr::FrameState,
    ) -> EngineResult<XrFrameOutput<'_>> {
        if let Some(hands) = self.hand_tracking.as_mut() {
            hands.update(reference_space, frame_state)?;
        }
        let passthrough_layer = match self.passthrough.as_mut() {
            Some(passthrough) => passthrough.update(reference_space, frame_state)?,
            None => None,
        };
        let hands = self.hand_tracking.as_ref();

        Ok(XrFrameOutput {
            left_hand: hands.map(|h| h.joints(Hand::Left)),
            right_hand: hands.map(|h| h.joints(Hand::Right)),
            passthrough_layer,
        })
    }

    pub fn hand_tracking(&self) -> Option<&HandTracking> {
        self.hand_tracking.as_ref()
    }

    pub fn passthrough(&self) -> Option<&Passthrough> {
        self.passthrough.as_ref()
    }

    pub fn passthrough_mut(&mut self) -> Option<&mut Passthrough> {
        self.passthrough.as_mut()
    }

    /// Tear down both capabilities, attempting each even if the other fails.
    pub fn dispose(&mut self) -> EngineResult<()> {
        let hands = self.hand_tracking.as_mut().map_or(Ok(()), HandTracking::dispose);
        let passthrough = self.passthrough.as_mut().map_or(Ok(()), Passthrough::dispose);
        hands.and(passthrough)
    }
}
