//! The D3D11/D3D12 device pair behind [`DxBackend`].
//!
//! The D3D12 device is always created on the adapter of the D3D11 device so
//! that shared handles open on both sides.

use windows::core::{Interface, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::{IDXGIAdapter, IDXGIDevice};
use windows::Win32::System::Threading::CreateEventW;

use tracing::{debug, error};

use super::convert::hresult;
use crate::error::{HResult, InteropError, NativeResultExt};

/// API-A and API-B devices on one adapter, plus the API-B direct queue.
pub struct DxBackend {
    pub(crate) d3d11: ID3D11Device,
    /// `OpenSharedResource1`.
    pub(crate) d3d11_1: ID3D11Device1,
    /// `OpenSharedFence`.
    pub(crate) d3d11_5: ID3D11Device5,
    /// Immediate context with fence support.
    pub(crate) context: ID3D11DeviceContext4,
    pub(crate) d3d12: ID3D12Device,
    pub(crate) queue: ID3D12CommandQueue,
    /// Reused for every CPU-side fence wait.
    pub(crate) fence_event: HANDLE,
}

impl DxBackend {
    /// Bridge the host's D3D11 device to a new D3D12 device on the same
    /// adapter.
    pub fn from_host(device: &ID3D11Device) -> Result<Self, InteropError> {
        let adapter = unsafe { device.cast::<IDXGIDevice>().and_then(|d| d.GetAdapter()) }
            .map_err(hresult)
            .creating("DXGI adapter of the host device")?;
        let context = unsafe { device.GetImmediateContext() }
            .map_err(hresult)
            .creating("immediate context")?;
        Self::assemble(device.clone(), context, &adapter)
    }

    fn assemble(
        d3d11: ID3D11Device,
        context: ID3D11DeviceContext,
        adapter: &IDXGIAdapter,
    ) -> Result<Self, InteropError> {
        let d3d11_1 = d3d11
            .cast::<ID3D11Device1>()
            .map_err(hresult)
            .creating("ID3D11Device1")?;
        let d3d11_5 = d3d11
            .cast::<ID3D11Device5>()
            .map_err(hresult)
            .creating("ID3D11Device5")?;
        let context = context
            .cast::<ID3D11DeviceContext4>()
            .map_err(hresult)
            .creating("ID3D11DeviceContext4")?;

        let mut d3d12: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(adapter, D3D_FEATURE_LEVEL_11_0, &mut d3d12) }
            .map_err(hresult)
            .creating("D3D12 device")?;
        let d3d12 = d3d12.ok_or(InteropError::Creation {
            what: "D3D12 device",
            code: HResult::E_FAIL,
        })?;

        let queue: ID3D12CommandQueue = unsafe {
            d3d12.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                ..Default::default()
            })
        }
        .map_err(hresult)
        .creating("D3D12 direct queue")?;

        let fence_event = unsafe { CreateEventW(None, false, false, PCWSTR::null()) }
            .map_err(hresult)
            .creating("fence event")?;

        debug!("D3D12 device and direct queue created on the host adapter");
        Ok(Self {
            d3d11,
            d3d11_1,
            d3d11_5,
            context,
            d3d12,
            queue,
            fence_event,
        })
    }

    pub fn d3d11(&self) -> &ID3D11Device {
        &self.d3d11
    }

    pub fn d3d12(&self) -> &ID3D12Device {
        &self.d3d12
    }

    /// The queue the engine's swap chain presents on.
    pub fn queue(&self) -> &ID3D12CommandQueue {
        &self.queue
    }
}

impl Drop for DxBackend {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseHandle(self.fence_event) } {
            error!("CloseHandle on the fence event failed: {e}");
        }
    }
}
