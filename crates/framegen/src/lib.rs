//! Frame generation for D3D11 games.
//!
//! [`fg_interop`] does the cross-API work. This crate wires it to the
//! outside world:
//!
//! - [`settings`] reads `framegen.toml` beside the host executable.
//! - [`logging`] sends `tracing` output to `framegen.log`.
//! - [`gate`] decides whether a swap chain is worth substituting.
//! - [`limiter`] and [`paced`] cap the present rate below the refresh rate.
//! - [`jitter`] provides the sub-pixel camera jitter sequence.
//! - [`install`] builds the facade the host receives instead of its swap
//!   chain.
//!
//! On Windows, `ffx` drives the FidelityFX runtime through the
//! [`FrameGenEngine`](fg_interop::FrameGenEngine) trait and `display` queries
//! the monitor refresh rate.

pub mod gate;
pub mod install;
pub mod jitter;
pub mod limiter;
pub mod logging;
pub mod paced;
pub mod settings;

#[cfg(target_os = "windows")]
pub mod display;
#[cfg(target_os = "windows")]
pub mod ffx;

pub use gate::{should_proxy, DeclineReason, DisplayInfo, ProxyDecision};
pub use install::build_facade;
pub use limiter::FrameLimiter;
pub use paced::PacedSwapChain;
pub use settings::{FrameLimit, Settings};

#[cfg(target_os = "windows")]
pub use ffx::FfxEngine;
#[cfg(target_os = "windows")]
pub use install::substitute_swap_chain;
