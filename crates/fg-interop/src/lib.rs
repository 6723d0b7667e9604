//! Cross-API swap-chain interop for frame generation.
//!
//! The host renders with an immediate-context API (API-A, D3D11). The
//! frame-generation engine only accepts an explicit command-list API (API-B,
//! D3D12) and owns the real swap chain. This crate sits between the two:
//!
//! - [`SharedResource`] is one API-B allocation with an API-A view of it.
//! - [`CrossApiFence`] orders work between the API-A immediate context and
//!   the API-B direct queue with one monotonically increasing counter.
//! - [`InteropDevice`] keeps a three-slot ring of API-B command allocators.
//! - [`SwapChainBridge`] wraps the engine-created swap chain and the surface
//!   the host actually renders into.
//! - [`SwapChainFacade`] is what the host holds instead of its swap chain.
//! - [`FrameOrchestrator`] runs the per-present algorithm.
//! - [`InteropContext`] owns all of the above for one host device.
//!
//! Everything talks to the GPU through the [`Backend`] trait. On Windows,
//! [`dx`] implements it with D3D11/D3D12 and exposes the facade as a COM
//! object; the [`sim`] backend runs the same logic in software for tests.

pub mod backend;
pub mod bridge;
pub mod context;
pub mod device;
pub mod engine;
pub mod error;
pub mod facade;
pub mod fence;
pub mod iid;
pub mod inputs;
pub mod orchestrator;
pub mod shared;
pub mod surfaces;
pub mod swapchain;
pub mod types;

// Re-export primary types at crate root for convenience.
pub use backend::{Api, Backend, SharedHandle};
pub use bridge::{BridgeState, SwapChainBridge};
pub use context::InteropContext;
pub use device::{InteropDevice, RING_SIZE};
pub use engine::{
    ConfigureFrameGeneration, EngineEffects, FrameGenEngine, FramePacingTuning,
    PrepareFrameGeneration, UpscaleDispatch,
};
pub use error::{EngineStatus, HResult, InteropError, NativeResult, ViewKind};
pub use facade::SwapChainFacade;
pub use fence::CrossApiFence;
pub use inputs::{CameraPose, FrameInputs, FrameOptions, FrameSource};
pub use orchestrator::{FrameOrchestrator, PresentTarget, ResetDetector};
pub use shared::SharedResource;
pub use surfaces::{HostSurfaceDescs, HostSurfaces};
pub use swapchain::{DeviceRef, HostSwapChain, NativeSwapChain, Queried};
pub use types::{
    Extent, Format, ImageDesc, PresentFlags, Rect, ResourceFlags, ResourceState, SurfaceUsage,
    SwapChainDesc, SwapChainFlags, WindowHandle,
};

// Platform-specific implementations.

#[cfg(target_os = "windows")]
pub mod dx;

#[cfg(any(test, feature = "sim"))]
pub mod sim;
