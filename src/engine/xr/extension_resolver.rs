//! Typed lookup of OpenXR entry points that are not part of the core loader surface.
//!
//! Every entry point gets its own newtype pairing the symbol name with the exact
//! `PFN_xr*` signature from `openxr::sys::pfn`. `resolve::<F>()` is the only place an opaque
//! `PFN_xrVoidFunction` gets cast, so a module can't ask for one name and call it with
//! another signature.

use std::ffi::{CStr, c_char};

use log::debug;
use openxr::sys::{self, pfn};

use crate::engine::{EngineError, EngineResult};

/// The host binding's "look up a symbol by name" capability.
pub trait InstanceProcAddr {
    /// Raw instance handle lookups (and instance-level calls) run against.
    fn instance(&self) -> sys::Instance;

    /// Look up `name` on the instance.
    ///
    /// `Ok(None)` means the runtime reported success but handed back a null pointer.
    fn proc_addr(&self, name: &CStr) -> Result<Option<pfn::VoidFunction>, sys::Result>;
}

impl InstanceProcAddr for openxr::Instance {
    fn instance(&self) -> sys::Instance {
        self.as_raw()
    }

    fn proc_addr(&self, name: &CStr) -> Result<Option<pfn::VoidFunction>, sys::Result> {
        RawInstance::new(self.as_raw(), self.entry().fp().get_instance_proc_addr).proc_addr(name)
    }
}

/// A raw instance handle plus the loader's `xrGetInstanceProcAddr`.
///
/// Useful for hosts that drive OpenXR through their own bindings rather than `openxr::Instance`.
#[derive(Clone, Copy)]
pub struct RawInstance {
    pub instance: sys::Instance,
    pub get_instance_proc_addr: pfn::GetInstanceProcAddr,
}

impl RawInstance {
    pub fn new(instance: sys::Instance, get_instance_proc_addr: pfn::GetInstanceProcAddr) -> Self {
        Self {
            instance,
            get_instance_proc_addr,
        }
    }
}

impl InstanceProcAddr for RawInstance {
    fn instance(&self) -> sys::Instance {
        self.instance
    }

    fn proc_addr(&self, name: &CStr) -> Result<Option<pfn::VoidFunction>, sys::Result> {
        let mut function = None;
        let name: *const c_char = name.as_ptr();
        let result = unsafe { (self.get_instance_proc_addr)(self.instance, name, &mut function) };
        if result.into_raw() < 0 {
            return Err(result);
        }
        Ok(function)
    }
}

/// A strongly-typed slot for one named entry point.
pub trait ExtensionFn: Copy {
    /// Symbol name, exactly as the runtime spells it.
    const NAME: &'static str;
    const C_NAME: &'static CStr;

    /// Cast an opaque pointer into this slot's signature.
    ///
    /// # Safety
    /// `function` must be what the runtime returned when asked for `Self::C_NAME`.
    unsafe fn from_void(function: pfn::VoidFunction) -> Self;
}

macro_rules! extension_fns {
    ($($(#[$meta:meta])* $ty:ident => $name:literal as $pfn:ty;)*) => {$(
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $ty(pub $pfn);

        impl ExtensionFn for $ty {
            const NAME: &'static str = $name;
            const C_NAME: &'static CStr = match CStr::from_bytes_with_nul(concat!($name, "\0").as_bytes()) {
                Ok(name) => name,
                Err(_) => panic!("extension function names must not contain NUL"),
            };

            unsafe fn from_void(function: pfn::VoidFunction) -> Self {
                Self(unsafe { std::mem::transmute::<pfn::VoidFunction, $pfn>(function) })
            }
        }

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&(self.0 as *const ())).finish()
            }
        }
    )*};
}

extension_fns! {
    /// Core, but resolved the same way so system queries don't need the host's dispatch table.
    GetSystemProperties => "xrGetSystemProperties" as pfn::GetSystemProperties;

    CreateHandTracker => "xrCreateHandTrackerEXT" as pfn::CreateHandTrackerEXT;
    LocateHandJoints => "xrLocateHandJointsEXT" as pfn::LocateHandJointsEXT;
    DestroyHandTracker => "xrDestroyHandTrackerEXT" as pfn::DestroyHandTrackerEXT;

    CreatePassthrough => "xrCreatePassthroughFB" as pfn::CreatePassthroughFB;
    DestroyPassthrough => "xrDestroyPassthroughFB" as pfn::DestroyPassthroughFB;
    PassthroughStart => "xrPassthroughStartFB" as pfn::PassthroughStartFB;
    PassthroughPause => "xrPassthroughPauseFB" as pfn::PassthroughPauseFB;
    CreatePassthroughLayer => "xrCreatePassthroughLayerFB" as pfn::CreatePassthroughLayerFB;
    DestroyPassthroughLayer => "xrDestroyPassthroughLayerFB" as pfn::DestroyPassthroughLayerFB;
}

/// Resolve `F` against the binding's instance.
///
/// A missing entry point is `UnsupportedExtension`; any other failure from the loader is a
/// `RuntimeOperation` error naming the lookup.
pub fn resolve<F: ExtensionFn>(binding: &(impl InstanceProcAddr + ?Sized)) -> EngineResult<F> {
    match binding.proc_addr(F::C_NAME) {
        Ok(Some(function)) => {
            debug!("resolved {}", F::NAME);
            // SAFETY: the pointer came from the runtime for exactly `F::C_NAME`.
            Ok(unsafe { F::from_void(function) })
        }
        Ok(None) => Err(EngineError::UnsupportedExtension {
            function: F::NAME,
            code: sys::Result::ERROR_FUNCTION_UNSUPPORTED,
        }),
        Err(code) if code == sys::Result::ERROR_FUNCTION_UNSUPPORTED => {
            Err(EngineError::UnsupportedExtension {
                function: F::NAME,
                code,
            })
        }
        Err(code) => Err(EngineError::RuntimeOperation {
            function: format!("xrGetInstanceProcAddr::{}", F::NAME),
            code,
        }),
    }
}
