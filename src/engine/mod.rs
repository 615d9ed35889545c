pub mod xr;

use openxr::sys;

/// Engine-level error type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An extension entry point could not be resolved on this runtime.
    #[error(
        "OpenXR function `{function}` is not available ({code:?}). \
         Make sure the runtime supports the extension and that it was enabled on the instance"
    )]
    UnsupportedExtension {
        function: &'static str,
        code: sys::Result,
    },

    /// A resolved call came back with a negative result code.
    #[error(
        "OpenXR error! Make sure a OpenXR runtime is set & running (like SteamVR). \
         Code: {code:?} ({raw:#x}) in {function}",
        raw = .code.into_raw()
    )]
    RuntimeOperation { function: String, code: sys::Result },

    #[error("{module} cannot {operation} while {state}")]
    InvalidState {
        module: &'static str,
        operation: &'static str,
        state: String,
    },

    #[error("invalid xr config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Turn a negative OpenXR result into `EngineError::RuntimeOperation`.
///
/// Non-negative codes (including qualified successes like `SESSION_LOSS_PENDING`) pass through.
pub fn check(result: sys::Result, function: &str) -> EngineResult<sys::Result> {
    if result.into_raw() < 0 {
        return Err(EngineError::RuntimeOperation {
            function: function.to_owned(),
            code: result,
        });
    }
    Ok(result)
}
