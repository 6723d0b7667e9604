//! Status codes and the typed error every component returns.
//!
//! Native calls report an [`HResult`]. Components convert those at the
//! boundary into [`InteropError`], whose variants follow the four failure
//! categories the layer distinguishes: creation failures disable the feature,
//! native call failures drop a frame, not-ready conditions skip interop work,
//! and engine failures only disable generation for the current frame.

use std::fmt;

use thiserror::Error;

/// A native status code (`HRESULT` on Windows).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    pub const OK: Self = Self(0);
    pub const FALSE: Self = Self(1);
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    pub const E_NOINTERFACE: Self = Self(0x8000_4002_u32 as i32);
    pub const E_POINTER: Self = Self(0x8000_4003_u32 as i32);
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    pub const E_ACCESSDENIED: Self = Self(0x8007_0005_u32 as i32);
    pub const DXGI_ERROR_INVALID_CALL: Self = Self(0x887A_0001_u32 as i32);
    pub const DXGI_ERROR_NOT_FOUND: Self = Self(0x887A_0002_u32 as i32);
    pub const DXGI_ERROR_MORE_DATA: Self = Self(0x887A_0003_u32 as i32);
    pub const DXGI_ERROR_DEVICE_REMOVED: Self = Self(0x887A_0005_u32 as i32);
    pub const DXGI_ERROR_WAIT_TIMEOUT: Self = Self(0x887A_0027_u32 as i32);
    pub const DXGI_STATUS_OCCLUDED: Self = Self(0x087A_0001);

    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub fn is_err(self) -> bool {
        self.0 < 0
    }

    /// `Ok(())` for success codes, `Err(self)` otherwise.
    pub fn ok(self) -> NativeResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({:#010X})", self.0 as u32)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0 as u32)
    }
}

/// Result of a single native call.
pub type NativeResult<T> = Result<T, HResult>;

/// Status code returned by the frame-generation engine. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EngineStatus(pub u32);

impl EngineStatus {
    pub const OK: Self = Self(0);
    pub const ERROR: Self = Self(1);
    pub const RUNTIME_ERROR: Self = Self(3);
    pub const NO_PROVIDER: Self = Self(4);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

/// Which native view of a [`SharedResource`](crate::SharedResource) was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InteropError {
    /// Creating a device object, fence, shared surface or swap chain failed.
    #[error("failed to create {what}: {code}")]
    Creation { what: &'static str, code: HResult },

    /// A native call failed mid-frame.
    #[error("{call} failed: {code}")]
    Native { call: &'static str, code: HResult },

    /// Interop resources are missing or the GPU is too far behind.
    #[error("interop resources are not ready")]
    NotReady,

    /// The frame-generation engine rejected a call.
    #[error("frame generation engine call {call} returned {status}")]
    Engine {
        call: &'static str,
        status: EngineStatus,
    },

    /// A view was requested that the surface was not created for.
    #[error("{0:?} view was not requested for this surface")]
    ViewNotRequested(ViewKind),

    /// A fence signal would not advance the counter.
    #[error("fence value {value} does not advance past {last}")]
    FenceRegression { value: u64, last: u64 },
}

impl InteropError {
    /// The status code to hand back to the host for this error.
    pub fn code(&self) -> HResult {
        match self {
            Self::Creation { code, .. } | Self::Native { code, .. } => *code,
            Self::NotReady => HResult::DXGI_ERROR_WAIT_TIMEOUT,
            Self::Engine { .. } | Self::FenceRegression { .. } => HResult::E_FAIL,
            Self::ViewNotRequested(_) => HResult::E_INVALIDARG,
        }
    }
}

/// Attach the failing call or object to a raw native result.
pub trait NativeResultExt<T> {
    /// Map a failure to [`InteropError::Native`].
    fn during(self, call: &'static str) -> Result<T, InteropError>;

    /// Map a failure to [`InteropError::Creation`].
    fn creating(self, what: &'static str) -> Result<T, InteropError>;
}

impl<T> NativeResultExt<T> for NativeResult<T> {
    fn during(self, call: &'static str) -> Result<T, InteropError> {
        self.map_err(|code| InteropError::Native { call, code })
    }

    fn creating(self, what: &'static str) -> Result<T, InteropError> {
        self.map_err(|code| InteropError::Creation { what, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_codes_include_positive_status() {
        assert!(HResult::OK.is_ok());
        assert!(HResult::DXGI_STATUS_OCCLUDED.is_ok());
        assert!(HResult::E_FAIL.is_err());
        assert_eq!(HResult::E_FAIL.ok(), Err(HResult::E_FAIL));
    }

    #[test]
    fn error_code_survives_conversion() {
        let err = Err::<(), _>(HResult::DXGI_ERROR_DEVICE_REMOVED)
            .during("Present")
            .unwrap_err();
        assert_eq!(err.code(), HResult::DXGI_ERROR_DEVICE_REMOVED);
        assert_eq!(err.to_string(), "Present failed: 0x887A0005");
    }
}
