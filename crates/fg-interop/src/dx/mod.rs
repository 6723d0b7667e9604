//! Windows backend: D3D11 as API-A, D3D12 as API-B, DXGI swap chains.

pub mod backend;
pub mod com;
pub mod convert;
pub mod device;
pub mod swapchain;

pub use com::{into_com, ComHost};
pub use device::DxBackend;
pub use swapchain::DxSwapChain;
