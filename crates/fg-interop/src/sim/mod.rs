//! Software implementation of [`Backend`](crate::Backend), the swap chain
//! and the frame-generation engine.
//!
//! The simulated GPU has one queue per API. Work enqueued on a queue runs as
//! soon as nothing blocks it: a stalled queue runs nothing, and a fence wait
//! holds back everything behind it until the fence reaches the value.
//! Every signal, wait, allocator reset, barrier and copy is appended to an
//! event log in submission order.

mod engine;
mod gpu;
mod swapchain;

pub use engine::{EngineCall, SimEngine};
pub use gpu::{
    Readback, SimAllocator, SimCommandList, SimDevice, SimEvent, SimFence, SimGpu, SimImage,
    SimImported, SimView,
};
pub use swapchain::{SimObject, SimOutput, SimSwapChain};
