//! `XR_EXT_hand_tracking`: one tracker per hand, 26 joint poses per hand, refreshed every frame.

use std::ptr;

use log::{info, warn};
use openxr::sys;

use super::config::HandTrackingConfig;
use super::extension_resolver::{
    CreateHandTracker, DestroyHandTracker, ExtensionFn, GetSystemProperties, InstanceProcAddr,
    LocateHandJoints, resolve,
};
use crate::engine::{EngineError, EngineResult, check};

pub const EXTENSION_NAME: &str = "XR_EXT_hand_tracking";

/// `XR_HAND_JOINT_COUNT_EXT` for the default joint set.
pub const HAND_JOINT_COUNT: usize = 26;

const UNTRACKED_JOINT: sys::HandJointLocationEXT = sys::HandJointLocationEXT {
    location_flags: sys::SpaceLocationFlags::EMPTY,
    pose: sys::Posef {
        orientation: sys::Quaternionf {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        },
        position: sys::Vector3f {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        },
    },
    radius: 0.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn as_raw(self) -> sys::HandEXT {
        match self {
            Hand::Left => sys::HandEXT::LEFT,
            Hand::Right => sys::HandEXT::RIGHT,
        }
    }
}

/// Joint locations for one hand, overwritten in place on every `update`.
///
/// Always holds `HAND_JOINT_COUNT` entries. A hand can be active while individual joints are
/// untracked, so check each joint's `location_flags` (or use `tracked_pose`) before trusting a pose.
#[derive(Debug, Clone, Copy)]
pub struct HandJoints {
    locations: [sys::HandJointLocationEXT; HAND_JOINT_COUNT],
    is_active: bool,
}

impl HandJoints {
    fn new() -> Self {
        Self {
            locations: [UNTRACKED_JOINT; HAND_JOINT_COUNT],
            is_active: false,
        }
    }

    pub fn locations(&self) -> &[sys::HandJointLocationEXT; HAND_JOINT_COUNT] {
        &self.locations
    }

    /// Whether the runtime reported the hand as tracked on the last `update`.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn joint(&self, joint: sys::HandJointEXT) -> Option<&sys::HandJointLocationEXT> {
        usize::try_from(joint.into_raw())
            .ok()
            .and_then(|index| self.locations.get(index))
    }

    /// The joint's pose, only if both position and orientation are valid.
    pub fn tracked_pose(&self, joint: sys::HandJointEXT) -> Option<sys::Posef> {
        let location = self.joint(joint)?;
        let flags = location.location_flags;
        (flags.contains(sys::SpaceLocationFlags::POSITION_VALID)
            && flags.contains(sys::SpaceLocationFlags::ORIENTATION_VALID))
        .then_some(location.pose)
    }
}

impl Default for HandJoints {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandTrackingState {
    Uninitialized,
    Ready,
    Disposed,
}

#[derive(Debug, Clone, Copy)]
struct HandTrackingFns {
    create: CreateHandTracker,
    locate: LocateHandJoints,
    destroy: DestroyHandTracker,
}

pub struct HandTracking {
    config: HandTrackingConfig,
    state: HandTrackingState,
    supports_hand_tracking: bool,
    fns: Option<HandTrackingFns>,
    trackers: [sys::HandTrackerEXT; 2],
    joints: [HandJoints; 2],
}

impl HandTracking {
    pub fn new(config: HandTrackingConfig) -> Self {
        Self {
            config,
            state: HandTrackingState::Uninitialized,
            supports_hand_tracking: false,
            fns: None,
            trackers: [sys::HandTrackerEXT::NULL; 2],
            joints: [HandJoints::new(); 2],
        }
    }

    pub fn state(&self) -> HandTrackingState {
        self.state
    }

    /// What the system reported during the last `initialize`.
    pub fn supports_hand_tracking(&self) -> bool {
        self.supports_hand_tracking
    }

    pub fn joints(&self, hand: Hand) -> &HandJoints {
        &self.joints[hand.index()]
    }

    /// Query support, resolve the tracker functions and create one tracker per hand.
    ///
    /// Every entry point is resolved before any tracker exists, so a runtime missing the
    /// extension fails here without creating anything. If creating a tracker fails, trackers
    /// already created are destroyed and the module stays `Uninitialized`.
    pub fn initialize(
        &mut self,
        binding: &(impl InstanceProcAddr + ?Sized),
        session: sys::Session,
        system_id: sys::SystemId,
    ) -> EngineResult<()> {
        if self.state == HandTrackingState::Ready {
            return Err(self.invalid_state("initialize"));
        }

        let result = self.try_initialize(binding, session, system_id);
        if result.is_err() {
            if let Err(e) = self.release() {
                warn!("hand tracking: cleanup after failed initialize: {e}");
            }
            self.state = HandTrackingState::Uninitialized;
        }
        result
    }

    fn try_initialize(
        &mut self,
        binding: &(impl InstanceProcAddr + ?Sized),
        session: sys::Session,
        system_id: sys::SystemId,
    ) -> EngineResult<()> {
        self.supports_hand_tracking = query_hand_tracking_support(binding, system_id)?;
        info!("Supports hand tracking: {}", self.supports_hand_tracking);
        if !self.supports_hand_tracking {
            if self.config.require_support {
                return Err(EngineError::UnsupportedExtension {
                    function: EXTENSION_NAME,
                    code: sys::Result::ERROR_FEATURE_UNSUPPORTED,
                });
            }
            warn!("hand tracking: system reports no support, creating trackers anyway");
        }

        let fns = HandTrackingFns {
            create: resolve(binding)?,
            locate: resolve(binding)?,
            destroy: resolve(binding)?,
        };
        self.fns = Some(fns);

        for hand in Hand::BOTH {
            let create_info = sys::HandTrackerCreateInfoEXT {
                ty: sys::HandTrackerCreateInfoEXT::TYPE,
                next: ptr::null(),
                hand: hand.as_raw(),
                hand_joint_set: sys::HandJointSetEXT::DEFAULT,
            };
            let mut tracker = sys::HandTrackerEXT::NULL;
            let result = unsafe { (fns.create.0)(session, &create_info, &mut tracker) };
            check(result, CreateHandTracker::NAME)?;
            self.trackers[hand.index()] = tracker;
        }

        self.joints = [HandJoints::new(); 2];
        self.state = HandTrackingState::Ready;
        info!("hand tracking: trackers created");
        Ok(())
    }

    /// Locate every joint of both hands in `reference_space` at the frame's predicted display time.
    pub fn update(
        &mut self,
        reference_space: sys::Space,
        frame_state: &openxr::FrameState,
    ) -> EngineResult<()> {
        let fns = match (self.state, self.fns) {
            (HandTrackingState::Ready, Some(fns)) => fns,
            _ => return Err(self.invalid_state("update")),
        };

        let locate_info = sys::HandJointsLocateInfoEXT {
            ty: sys::HandJointsLocateInfoEXT::TYPE,
            next: ptr::null(),
            base_space: reference_space,
            time: frame_state.predicted_display_time,
        };

        for hand in Hand::BOTH {
            let tracker = self.trackers[hand.index()];
            let joints = &mut self.joints[hand.index()];
            let mut locations = sys::HandJointLocationsEXT {
                ty: sys::HandJointLocationsEXT::TYPE,
                next: ptr::null_mut(),
                is_active: sys::FALSE,
                joint_count: HAND_JOINT_COUNT as u32,
                joint_locations: joints.locations.as_mut_ptr(),
            };
            let result = unsafe { (fns.locate.0)(tracker, &locate_info, &mut locations) };
            check(result, LocateHandJoints::NAME)?;
            joints.is_active = locations.is_active.into();
        }

        Ok(())
    }

    /// Destroy both trackers. Safe to call more than once.
    pub fn dispose(&mut self) -> EngineResult<()> {
        if self.state == HandTrackingState::Disposed {
            return Ok(());
        }
        let result = self.release();
        self.state = HandTrackingState::Disposed;
        result
    }

    /// Destroys every live tracker even if one fails; returns the first failure.
    fn release(&mut self) -> EngineResult<()> {
        let mut first_error = None;

        if let Some(fns) = self.fns.take() {
            for tracker in self.trackers.iter_mut() {
                if *tracker == sys::HandTrackerEXT::NULL {
                    continue;
                }
                let result = unsafe { (fns.destroy.0)(*tracker) };
                *tracker = sys::HandTrackerEXT::NULL;
                if let Err(e) = check(result, DestroyHandTracker::NAME) {
                    warn!("hand tracking: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn invalid_state(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidState {
            module: "hand tracking",
            operation,
            state: format!("{:?}", self.state),
        }
    }
}

impl Drop for HandTracking {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!("hand tracking: dispose on drop failed: {e}");
        }
    }
}

fn query_hand_tracking_support(
    binding: &(impl InstanceProcAddr + ?Sized),
    system_id: sys::SystemId,
) -> EngineResult<bool> {
    let get_system_properties: GetSystemProperties = resolve(binding)?;

    let mut hand_tracking = sys::SystemHandTrackingPropertiesEXT {
        ty: sys::SystemHandTrackingPropertiesEXT::TYPE,
        next: ptr::null_mut(),
        supports_hand_tracking: sys::FALSE,
    };
    let mut system_properties = sys::SystemProperties::out(
        (&mut hand_tracking as *mut sys::SystemHandTrackingPropertiesEXT).cast(),
    );
    let result = unsafe {
        (get_system_properties.0)(binding.instance(), system_id, system_properties.as_mut_ptr())
    };
    check(result, GetSystemProperties::NAME)?;

    Ok(hand_tracking.supports_hand_tracking.into())
}
