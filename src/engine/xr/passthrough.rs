//! `XR_FB_passthrough`: one camera feed, one layer bound to it, and a composition layer
//! descriptor the host can put in its per-frame layer list.

use std::ptr;

use log::{info, warn};
use openxr::sys;

use super::config::PassthroughConfig;
use super::extension_resolver::{
    CreatePassthrough, CreatePassthroughLayer, DestroyPassthrough, DestroyPassthroughLayer,
    ExtensionFn, InstanceProcAddr, PassthroughPause, PassthroughStart, resolve,
};
use crate::engine::{EngineError, EngineResult, check};

pub const EXTENSION_NAME: &str = "XR_FB_passthrough";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughState {
    Uninitialized,
    Running,
    Paused,
    Disposed,
}

/// Snapshot of what the module currently has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassthroughStatus {
    /// Every `XR_FB_passthrough` entry point resolved.
    pub extension_available: bool,
    /// A feed and layer exist.
    pub enabled: bool,
    /// The feed is running and `update` hands out a layer.
    pub running: bool,
}

#[derive(Debug, Clone, Copy)]
struct PassthroughFns {
    create_feed: CreatePassthrough,
    destroy_feed: DestroyPassthrough,
    start_feed: PassthroughStart,
    pause_feed: PassthroughPause,
    create_layer: CreatePassthroughLayer,
    destroy_layer: DestroyPassthroughLayer,
}

pub struct Passthrough {
    config: PassthroughConfig,
    state: PassthroughState,
    fns: Option<PassthroughFns>,
    feed: sys::PassthroughFB,
    layer: sys::PassthroughLayerFB,
    /// Boxed so its address stays put from `initialize` to `dispose`; hosts may cache it.
    composition_layer: Option<Box<sys::CompositionLayerPassthroughFB>>,
}

impl Passthrough {
    pub fn new(config: PassthroughConfig) -> Self {
        Self {
            config,
            state: PassthroughState::Uninitialized,
            fns: None,
            feed: sys::PassthroughFB::NULL,
            layer: sys::PassthroughLayerFB::NULL,
            composition_layer: None,
        }
    }

    pub fn state(&self) -> PassthroughState {
        self.state
    }

    pub fn status(&self) -> PassthroughStatus {
        PassthroughStatus {
            extension_available: self.fns.is_some(),
            enabled: matches!(
                self.state,
                PassthroughState::Running | PassthroughState::Paused
            ),
            running: self.state == PassthroughState::Running,
        }
    }

    /// Resolve the six passthrough functions, create the feed and its layer, and start the feed.
    ///
    /// With `enable_on_initialize` off the feed is created paused and the module ends up
    /// `Paused`. On failure everything created so far is destroyed and the module stays
    /// `Uninitialized`.
    pub fn initialize(
        &mut self,
        binding: &(impl InstanceProcAddr + ?Sized),
        session: sys::Session,
        _system_id: sys::SystemId,
    ) -> EngineResult<()> {
        if self.status().enabled {
            return Err(self.invalid_state("initialize"));
        }

        let result = self.try_initialize(binding, session);
        if result.is_err() {
            if let Err(e) = self.release() {
                warn!("passthrough: cleanup after failed initialize: {e}");
            }
            self.state = PassthroughState::Uninitialized;
        }
        result
    }

    fn try_initialize(
        &mut self,
        binding: &(impl InstanceProcAddr + ?Sized),
        session: sys::Session,
    ) -> EngineResult<()> {
        let fns = PassthroughFns {
            create_feed: resolve(binding)?,
            destroy_feed: resolve(binding)?,
            start_feed: resolve(binding)?,
            pause_feed: resolve(binding)?,
            create_layer: resolve(binding)?,
            destroy_layer: resolve(binding)?,
        };
        self.fns = Some(fns);

        let run_on_create = self.config.enable_on_initialize;
        let feed_flags = if run_on_create {
            sys::PassthroughFlagsFB::IS_RUNNING_AT_CREATION
        } else {
            sys::PassthroughFlagsFB::EMPTY
        };

        let feed_info = sys::PassthroughCreateInfoFB {
            ty: sys::PassthroughCreateInfoFB::TYPE,
            next: ptr::null(),
            flags: feed_flags,
        };
        let mut feed = sys::PassthroughFB::NULL;
        let result = unsafe { (fns.create_feed.0)(session, &feed_info, &mut feed) };
        check(result, CreatePassthrough::NAME)?;
        self.feed = feed;

        // The layer always runs; whether anything shows is driven by the feed alone.
        let layer_info = sys::PassthroughLayerCreateInfoFB {
            ty: sys::PassthroughLayerCreateInfoFB::TYPE,
            next: ptr::null(),
            passthrough: self.feed,
            flags: sys::PassthroughFlagsFB::IS_RUNNING_AT_CREATION,
            purpose: self.config.purpose.into(),
        };
        let mut layer = sys::PassthroughLayerFB::NULL;
        let result = unsafe { (fns.create_layer.0)(session, &layer_info, &mut layer) };
        check(result, CreatePassthroughLayer::NAME)?;
        self.layer = layer;

        if run_on_create {
            let result = unsafe { (fns.start_feed.0)(self.feed) };
            check(result, PassthroughStart::NAME)?;
        }

        self.composition_layer = Some(Box::new(sys::CompositionLayerPassthroughFB {
            ty: sys::CompositionLayerPassthroughFB::TYPE,
            next: ptr::null(),
            flags: sys::CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA,
            space: sys::Space::NULL,
            layer_handle: self.layer,
        }));

        self.state = if run_on_create {
            PassthroughState::Running
        } else {
            PassthroughState::Paused
        };
        info!("passthrough: feed and layer created ({:?})", self.state);
        Ok(())
    }

    /// Resume a paused feed. No-op when already running.
    pub fn start(&mut self) -> EngineResult<()> {
        match (self.state, self.fns) {
            (PassthroughState::Running, _) => Ok(()),
            (PassthroughState::Paused, Some(fns)) => {
                let result = unsafe { (fns.start_feed.0)(self.feed) };
                check(result, PassthroughStart::NAME)?;
                self.state = PassthroughState::Running;
                info!("passthrough: started");
                Ok(())
            }
            _ => Err(self.invalid_state("start")),
        }
    }

    /// Pause a running feed. No-op when already paused.
    pub fn pause(&mut self) -> EngineResult<()> {
        match (self.state, self.fns) {
            (PassthroughState::Paused, _) => Ok(()),
            (PassthroughState::Running, Some(fns)) => {
                let result = unsafe { (fns.pause_feed.0)(self.feed) };
                check(result, PassthroughPause::NAME)?;
                self.state = PassthroughState::Paused;
                info!("passthrough: paused");
                Ok(())
            }
            _ => Err(self.invalid_state("pause")),
        }
    }

    /// Refresh the composition layer descriptor in place for this frame.
    ///
    /// Returns `None` while paused so the host leaves passthrough out of the frame. The returned
    /// reference always points at the same storage until `dispose`.
    pub fn update(
        &mut self,
        reference_space: sys::Space,
        _frame_state: &openxr::FrameState,
    ) -> EngineResult<Option<&sys::CompositionLayerPassthroughFB>> {
        match self.state {
            PassthroughState::Running => {}
            PassthroughState::Paused => return Ok(None),
            _ => return Err(self.invalid_state("update")),
        }

        let layer_handle = self.layer;
        let Some(descriptor) = self.composition_layer.as_deref_mut() else {
            return Err(EngineError::InvalidState {
                module: "passthrough",
                operation: "update",
                state: "missing its composition layer".to_owned(),
            });
        };
        descriptor.ty = sys::CompositionLayerPassthroughFB::TYPE;
        descriptor.next = ptr::null();
        descriptor.flags = sys::CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA;
        descriptor.layer_handle = layer_handle;
        descriptor.space = reference_space;

        Ok(Some(&*descriptor))
    }

    /// The descriptor as a base header, for hosts that build their own `XrFrameEndInfo`.
    pub fn descriptor_ptr(&self) -> Option<*const sys::CompositionLayerBaseHeader> {
        self.composition_layer
            .as_deref()
            .map(|layer| (layer as *const sys::CompositionLayerPassthroughFB).cast())
    }

    /// Destroy the feed, then the layer, and free the descriptor. Safe to call more than once.
    pub fn dispose(&mut self) -> EngineResult<()> {
        if self.state == PassthroughState::Disposed {
            return Ok(());
        }
        let result = self.release();
        self.state = PassthroughState::Disposed;
        result
    }

    fn release(&mut self) -> EngineResult<()> {
        let mut first_error = None;

        if let Some(fns) = self.fns.take() {
            if self.feed != sys::PassthroughFB::NULL {
                let result = unsafe { (fns.destroy_feed.0)(self.feed) };
                if let Err(e) = check(result, DestroyPassthrough::NAME) {
                    warn!("passthrough: {e}");
                    first_error.get_or_insert(e);
                }
            }
            if self.layer != sys::PassthroughLayerFB::NULL {
                let result = unsafe { (fns.destroy_layer.0)(self.layer) };
                if let Err(e) = check(result, DestroyPassthroughLayer::NAME) {
                    warn!("passthrough: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        self.feed = sys::PassthroughFB::NULL;
        self.layer = sys::PassthroughLayerFB::NULL;
        self.composition_layer = None;

        first_error.map_or(Ok(()), Err)
    }

    fn invalid_state(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidState {
            module: "passthrough",
            operation,
            state: format!("{:?}", self.state),
        }
    }
}

impl Drop for Passthrough {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!("passthrough: dispose on drop failed: {e}");
        }
    }
}
