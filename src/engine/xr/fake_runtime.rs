//! In-process stand-in for an OpenXR runtime, used by tests.
//!
//! Entry points are real `extern "system"` functions handed out through a fake
//! `xrGetInstanceProcAddr`, so tests go through the same casts and calls as a real runtime.
//! State is thread-local; each test thread gets its own runtime.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::{CStr, c_char};
use std::mem;

use openxr::sys::{self, pfn};

use super::extension_resolver::RawInstance;

#[derive(Debug, Clone, Copy)]
pub struct FakeLayer {
    pub layer: sys::PassthroughLayerFB,
    pub feed: sys::PassthroughFB,
    pub purpose: sys::PassthroughLayerPurposeFB,
    pub flags: sys::PassthroughFlagsFB,
}

pub struct FakeRuntime {
    pub missing: HashSet<&'static str>,
    pub null_with_success: HashSet<&'static str>,
    pub lookup_error: Option<sys::Result>,
    /// Fail with the given code on every call.
    pub failures: HashMap<&'static str, sys::Result>,
    /// Succeed this many times, then fail with `ERROR_RUNTIME_FAILURE`.
    pub fail_after: HashMap<&'static str, usize>,

    pub supports_hand_tracking: bool,
    pub hands_in_view: bool,
    pub feed_running: bool,

    pub lookups: Vec<String>,
    pub calls: Vec<&'static str>,
    pub live: HashSet<u64>,
    pub hand_trackers: Vec<(sys::HandTrackerEXT, sys::HandEXT)>,
    pub located_joint_counts: Vec<u32>,
    pub last_locate_time: Option<sys::Time>,
    pub last_locate_space: Option<sys::Space>,
    pub feed_flags: Vec<sys::PassthroughFlagsFB>,
    pub layers: Vec<FakeLayer>,

    next_handle: u64,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            missing: HashSet::new(),
            null_with_success: HashSet::new(),
            lookup_error: None,
            failures: HashMap::new(),
            fail_after: HashMap::new(),
            supports_hand_tracking: true,
            hands_in_view: false,
            feed_running: false,
            lookups: Vec::new(),
            calls: Vec::new(),
            live: HashSet::new(),
            hand_trackers: Vec::new(),
            located_joint_counts: Vec::new(),
            last_locate_time: None,
            last_locate_space: None,
            feed_flags: Vec::new(),
            layers: Vec::new(),
            next_handle: 100,
        }
    }
}

impl FakeRuntime {
    pub fn live_hand_trackers(&self) -> Vec<sys::HandTrackerEXT> {
        self.hand_trackers
            .iter()
            .map(|(tracker, _)| *tracker)
            .filter(|tracker| self.live.contains(&tracker.into_raw()))
            .collect()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.iter().filter(|call| **call == name).count()
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.live.insert(handle);
        handle
    }

    /// Record the call; `Some(code)` when it should fail.
    fn enter(&mut self, name: &'static str) -> Option<sys::Result> {
        self.calls.push(name);
        if let Some(code) = self.failures.get(name) {
            return Some(*code);
        }
        if let Some(remaining) = self.fail_after.get_mut(name) {
            if *remaining == 0 {
                return Some(sys::Result::ERROR_RUNTIME_FAILURE);
            }
            *remaining -= 1;
        }
        None
    }

    fn destroy(&mut self, name: &'static str, handle: u64) -> sys::Result {
        if let Some(code) = self.enter(name) {
            return code;
        }
        if self.live.remove(&handle) {
            sys::Result::SUCCESS
        } else {
            sys::Result::ERROR_HANDLE_INVALID
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<FakeRuntime> = RefCell::new(FakeRuntime::default());
}

pub fn with<R>(f: impl FnOnce(&mut FakeRuntime) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

pub fn reset() {
    with(|rt| *rt = FakeRuntime::default());
}

pub fn binding() -> RawInstance {
    RawInstance::new(sys::Instance::from_raw(1), get_instance_proc_addr)
}

pub fn session() -> sys::Session {
    sys::Session::from_raw(7)
}

pub fn system_id() -> sys::SystemId {
    sys::SystemId::from_raw(3)
}

pub fn space() -> sys::Space {
    sys::Space::from_raw(42)
}

pub fn frame_state() -> openxr::FrameState {
    openxr::FrameState {
        predicted_display_time: sys::Time::from_nanos(1_000_000),
        predicted_display_period: sys::Duration::from_nanos(11_111_111),
        should_render: true,
    }
}

macro_rules! erase {
    ($f:expr, $pfn:ty) => {
        unsafe { mem::transmute::<$pfn, pfn::VoidFunction>($f) }
    };
}

fn entry_point(name: &str) -> Option<pfn::VoidFunction> {
    let function = match name {
        "xrGetSystemProperties" => erase!(get_system_properties, pfn::GetSystemProperties),
        "xrCreateHandTrackerEXT" => erase!(create_hand_tracker, pfn::CreateHandTrackerEXT),
        "xrLocateHandJointsEXT" => erase!(locate_hand_joints, pfn::LocateHandJointsEXT),
        "xrDestroyHandTrackerEXT" => erase!(destroy_hand_tracker, pfn::DestroyHandTrackerEXT),
        "xrCreatePassthroughFB" => erase!(create_passthrough, pfn::CreatePassthroughFB),
        "xrDestroyPassthroughFB" => erase!(destroy_passthrough, pfn::DestroyPassthroughFB),
        "xrPassthroughStartFB" => erase!(passthrough_start, pfn::PassthroughStartFB),
        "xrPassthroughPauseFB" => erase!(passthrough_pause, pfn::PassthroughPauseFB),
        "xrCreatePassthroughLayerFB" => {
            erase!(create_passthrough_layer, pfn::CreatePassthroughLayerFB)
        }
        "xrDestroyPassthroughLayerFB" => {
            erase!(destroy_passthrough_layer, pfn::DestroyPassthroughLayerFB)
        }
        _ => return None,
    };
    Some(function)
}

unsafe extern "system" fn get_instance_proc_addr(
    _instance: sys::Instance,
    name: *const c_char,
    function: *mut Option<pfn::VoidFunction>,
) -> sys::Result {
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    let (found, code) = with(|rt| {
        rt.lookups.push(name.clone());
        if let Some(code) = rt.lookup_error {
            return (None, code);
        }
        if rt.null_with_success.iter().any(|n| *n == name) {
            return (None, sys::Result::SUCCESS);
        }
        if rt.missing.iter().any(|n| *n == name) {
            return (None, sys::Result::ERROR_FUNCTION_UNSUPPORTED);
        }
        match entry_point(&name) {
            Some(f) => (Some(f), sys::Result::SUCCESS),
            None => (None, sys::Result::ERROR_FUNCTION_UNSUPPORTED),
        }
    });
    unsafe { *function = found };
    code
}

unsafe extern "system" fn get_system_properties(
    _instance: sys::Instance,
    _system_id: sys::SystemId,
    properties: *mut sys::SystemProperties,
) -> sys::Result {
    if let Some(code) = with(|rt| rt.enter("xrGetSystemProperties")) {
        return code;
    }
    let supported = with(|rt| rt.supports_hand_tracking);
    let next = unsafe { (*properties).next } as *mut sys::SystemHandTrackingPropertiesEXT;
    if !next.is_null() {
        unsafe {
            (*next).supports_hand_tracking = if supported { sys::TRUE } else { sys::FALSE };
        }
    }
    sys::Result::SUCCESS
}

unsafe extern "system" fn create_hand_tracker(
    _session: sys::Session,
    create_info: *const sys::HandTrackerCreateInfoEXT,
    hand_tracker: *mut sys::HandTrackerEXT,
) -> sys::Result {
    let hand = unsafe { (*create_info).hand };
    let created = with(|rt| {
        if let Some(code) = rt.enter("xrCreateHandTrackerEXT") {
            return Err(code);
        }
        let tracker = sys::HandTrackerEXT::from_raw(rt.allocate());
        rt.hand_trackers.push((tracker, hand));
        Ok(tracker)
    });
    match created {
        Ok(tracker) => {
            unsafe { *hand_tracker = tracker };
            sys::Result::SUCCESS
        }
        Err(code) => code,
    }
}

unsafe extern "system" fn locate_hand_joints(
    hand_tracker: sys::HandTrackerEXT,
    locate_info: *const sys::HandJointsLocateInfoEXT,
    locations: *mut sys::HandJointLocationsEXT,
) -> sys::Result {
    let (base_space, time) = unsafe { ((*locate_info).base_space, (*locate_info).time) };
    let joint_count = unsafe { (*locations).joint_count };
    let in_view = with(|rt| {
        if let Some(code) = rt.enter("xrLocateHandJointsEXT") {
            return Err(code);
        }
        if !rt.live.contains(&hand_tracker.into_raw()) {
            return Err(sys::Result::ERROR_HANDLE_INVALID);
        }
        rt.located_joint_counts.push(joint_count);
        rt.last_locate_time = Some(time);
        rt.last_locate_space = Some(base_space);
        Ok(rt.hands_in_view)
    });
    let in_view = match in_view {
        Ok(in_view) => in_view,
        Err(code) => return code,
    };
    if joint_count != 26 {
        return sys::Result::ERROR_VALIDATION_FAILURE;
    }

    let joints =
        unsafe { std::slice::from_raw_parts_mut((*locations).joint_locations, joint_count as usize) };
    for (index, joint) in joints.iter_mut().enumerate() {
        if in_view {
            joint.location_flags = sys::SpaceLocationFlags::POSITION_VALID
                | sys::SpaceLocationFlags::ORIENTATION_VALID
                | sys::SpaceLocationFlags::POSITION_TRACKED
                | sys::SpaceLocationFlags::ORIENTATION_TRACKED;
            joint.pose.position.x = index as f32 * 0.01;
            joint.radius = 0.005;
        } else {
            joint.location_flags = sys::SpaceLocationFlags::EMPTY;
        }
    }
    unsafe {
        (*locations).is_active = if in_view { sys::TRUE } else { sys::FALSE };
    }
    sys::Result::SUCCESS
}

unsafe extern "system" fn destroy_hand_tracker(hand_tracker: sys::HandTrackerEXT) -> sys::Result {
    with(|rt| rt.destroy("xrDestroyHandTrackerEXT", hand_tracker.into_raw()))
}

unsafe extern "system" fn create_passthrough(
    _session: sys::Session,
    create_info: *const sys::PassthroughCreateInfoFB,
    out_passthrough: *mut sys::PassthroughFB,
) -> sys::Result {
    let flags = unsafe { (*create_info).flags };
    let created = with(|rt| {
        if let Some(code) = rt.enter("xrCreatePassthroughFB") {
            return Err(code);
        }
        rt.feed_flags.push(flags);
        rt.feed_running = flags.contains(sys::PassthroughFlagsFB::IS_RUNNING_AT_CREATION);
        Ok(sys::PassthroughFB::from_raw(rt.allocate()))
    });
    match created {
        Ok(feed) => {
            unsafe { *out_passthrough = feed };
            sys::Result::SUCCESS
        }
        Err(code) => code,
    }
}

unsafe extern "system" fn destroy_passthrough(passthrough: sys::PassthroughFB) -> sys::Result {
    with(|rt| rt.destroy("xrDestroyPassthroughFB", passthrough.into_raw()))
}

unsafe extern "system" fn passthrough_start(passthrough: sys::PassthroughFB) -> sys::Result {
    with(|rt| {
        if let Some(code) = rt.enter("xrPassthroughStartFB") {
            return code;
        }
        if !rt.live.contains(&passthrough.into_raw()) {
            return sys::Result::ERROR_HANDLE_INVALID;
        }
        rt.feed_running = true;
        sys::Result::SUCCESS
    })
}

unsafe extern "system" fn passthrough_pause(passthrough: sys::PassthroughFB) -> sys::Result {
    with(|rt| {
        if let Some(code) = rt.enter("xrPassthroughPauseFB") {
            return code;
        }
        if !rt.live.contains(&passthrough.into_raw()) {
            return sys::Result::ERROR_HANDLE_INVALID;
        }
        rt.feed_running = false;
        sys::Result::SUCCESS
    })
}

unsafe extern "system" fn create_passthrough_layer(
    _session: sys::Session,
    create_info: *const sys::PassthroughLayerCreateInfoFB,
    out_layer: *mut sys::PassthroughLayerFB,
) -> sys::Result {
    let info = unsafe { *create_info };
    let created = with(|rt| {
        if let Some(code) = rt.enter("xrCreatePassthroughLayerFB") {
            return Err(code);
        }
        if !rt.live.contains(&info.passthrough.into_raw()) {
            return Err(sys::Result::ERROR_HANDLE_INVALID);
        }
        let layer = sys::PassthroughLayerFB::from_raw(rt.allocate());
        rt.layers.push(FakeLayer {
            layer,
            feed: info.passthrough,
            purpose: info.purpose,
            flags: info.flags,
        });
        Ok(layer)
    });
    match created {
        Ok(layer) => {
            unsafe { *out_layer = layer };
            sys::Result::SUCCESS
        }
        Err(code) => code,
    }
}

unsafe extern "system" fn destroy_passthrough_layer(layer: sys::PassthroughLayerFB) -> sys::Result {
    with(|rt| rt.destroy("xrDestroyPassthroughLayerFB", layer.into_raw()))
}
