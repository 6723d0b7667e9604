//! Minimal bindings to the FidelityFX frame-generation and upscaler API.
//!
//! [`ffi`] holds the descriptor-chain ABI as hardcoded `#[repr(C)]` structs
//! and constants. [`loader`] finds the engine DLLs and resolves the entry
//! points. Nothing here touches the GPU.

pub mod ffi;
pub mod loader;

pub use ffi::ReturnCode;
pub use loader::search_order;

#[cfg(target_os = "windows")]
pub use loader::FfxFunctions;
