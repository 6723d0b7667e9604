//! [`Backend`] on D3D11 (immediate context) and D3D12 (direct queue).

use std::mem::ManuallyDrop;
use std::time::{Duration, Instant};

use windows::core::{Interface, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, GENERIC_ALL, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::Graphics::Direct3D::D3D_SRV_DIMENSION_TEXTURE2D;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_SAMPLE_DESC;
use windows::Win32::System::Threading::WaitForSingleObject;

use tracing::warn;

use super::convert::{dxgi_format, hresult, resource_state};
use super::device::DxBackend;
use crate::backend::{Backend, SharedHandle};
use crate::error::{HResult, NativeResult};
use crate::types::{Format, ImageDesc, ResourceFlags, Transition};

fn open(handle: SharedHandle) -> HANDLE {
    HANDLE(handle.0 as *mut _)
}

impl Backend for DxBackend {
    type Image = ID3D12Resource;
    type Allocator = ID3D12CommandAllocator;
    type CommandList = ID3D12GraphicsCommandList;
    type FenceB = ID3D12Fence;

    type Device = ID3D11Device;
    type ImportedImage = ID3D11Texture2D;
    type ShaderView = ID3D11ShaderResourceView;
    type UnorderedView = ID3D11UnorderedAccessView;
    type TargetView = ID3D11RenderTargetView;
    type FenceA = ID3D11Fence;

    // -----------------------------------------------------------------------
    // API-B
    // -----------------------------------------------------------------------

    fn create_shared_image(
        &self,
        desc: &ImageDesc,
        flags: ResourceFlags,
    ) -> NativeResult<ID3D12Resource> {
        let heap = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
            MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
            CreationNodeMask: 1,
            VisibleNodeMask: 1,
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Alignment: 0,
            Width: u64::from(desc.width),
            Height: desc.height,
            DepthOrArraySize: desc.array_size,
            MipLevels: desc.mip_levels,
            Format: dxgi_format(desc.format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: D3D12_RESOURCE_FLAGS(flags.bits() as i32),
        };

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.d3d12.CreateCommittedResource(
                &heap,
                D3D12_HEAP_FLAG_SHARED,
                &resource_desc,
                D3D12_RESOURCE_STATE_COMMON,
                None,
                &mut resource,
            )
        }
        .map_err(hresult)?;
        resource.ok_or(HResult::E_FAIL)
    }

    fn export_image(&self, image: &ID3D12Resource) -> NativeResult<SharedHandle> {
        let handle = unsafe {
            self.d3d12
                .CreateSharedHandle(image, None, GENERIC_ALL.0, PCWSTR::null())
        }
        .map_err(hresult)?;
        Ok(SharedHandle(handle.0 as isize))
    }

    fn create_shared_fence(&self, initial_value: u64) -> NativeResult<ID3D12Fence> {
        unsafe { self.d3d12.CreateFence(initial_value, D3D12_FENCE_FLAG_SHARED) }.map_err(hresult)
    }

    fn export_fence(&self, fence: &ID3D12Fence) -> NativeResult<SharedHandle> {
        let handle = unsafe {
            self.d3d12
                .CreateSharedHandle(fence, None, GENERIC_ALL.0, PCWSTR::null())
        }
        .map_err(hresult)?;
        Ok(SharedHandle(handle.0 as isize))
    }

    fn close_handle(&self, handle: SharedHandle) {
        if let Err(e) = unsafe { CloseHandle(open(handle)) } {
            warn!("CloseHandle on a shared handle failed: {e}");
        }
    }

    fn create_command_allocator(&self) -> NativeResult<ID3D12CommandAllocator> {
        unsafe {
            self.d3d12
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
        }
        .map_err(hresult)
    }

    fn create_command_list(
        &self,
        allocator: &ID3D12CommandAllocator,
    ) -> NativeResult<ID3D12GraphicsCommandList> {
        let list: ID3D12GraphicsCommandList = unsafe {
            self.d3d12
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, allocator, None)
        }
        .map_err(hresult)?;
        // Lists are created open; the ring expects them closed.
        unsafe { list.Close() }.map_err(hresult)?;
        Ok(list)
    }

    fn reset_command_allocator(&self, allocator: &ID3D12CommandAllocator) -> NativeResult<()> {
        unsafe { allocator.Reset() }.map_err(hresult)
    }

    fn reset_command_list(
        &self,
        list: &ID3D12GraphicsCommandList,
        allocator: &ID3D12CommandAllocator,
    ) -> NativeResult<()> {
        unsafe { list.Reset(allocator, None) }.map_err(hresult)
    }

    fn close_command_list(&self, list: &ID3D12GraphicsCommandList) -> NativeResult<()> {
        unsafe { list.Close() }.map_err(hresult)
    }

    fn transition(
        &self,
        list: &ID3D12GraphicsCommandList,
        barriers: &[Transition<'_, ID3D12Resource>],
    ) {
        if barriers.is_empty() {
            return;
        }
        let barriers: Vec<D3D12_RESOURCE_BARRIER> = barriers
            .iter()
            .map(|t| D3D12_RESOURCE_BARRIER {
                Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
                Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
                Anonymous: D3D12_RESOURCE_BARRIER_0 {
                    Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                        // Borrowed without AddRef; ManuallyDrop keeps the
                        // count balanced.
                        pResource: unsafe { std::mem::transmute_copy(t.image) },
                        Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                        StateBefore: resource_state(t.before),
                        StateAfter: resource_state(t.after),
                    }),
                },
            })
            .collect();
        unsafe { list.ResourceBarrier(&barriers) };
    }

    fn copy_image(
        &self,
        list: &ID3D12GraphicsCommandList,
        dst: &ID3D12Resource,
        src: &ID3D12Resource,
    ) {
        unsafe { list.CopyResource(dst, src) };
    }

    fn execute(&self, list: &ID3D12GraphicsCommandList) -> NativeResult<()> {
        let list: ID3D12CommandList = list.cast().map_err(hresult)?;
        unsafe { self.queue.ExecuteCommandLists(&[Some(list)]) };
        Ok(())
    }

    fn queue_signal(&self, fence: &ID3D12Fence, value: u64) -> NativeResult<()> {
        unsafe { self.queue.Signal(fence, value) }.map_err(hresult)
    }

    fn queue_wait(&self, fence: &ID3D12Fence, value: u64) -> NativeResult<()> {
        unsafe { self.queue.Wait(fence, value) }.map_err(hresult)
    }

    fn completed_value(&self, fence: &ID3D12Fence) -> u64 {
        unsafe { fence.GetCompletedValue() }
    }

    fn wait_for_value(
        &self,
        fence: &ID3D12Fence,
        value: u64,
        timeout: Duration,
    ) -> NativeResult<bool> {
        let deadline = Instant::now() + timeout;
        // The event may still be set by an earlier wait that timed out, so a
        // wake only counts once the fence has really reached `value`.
        loop {
            if unsafe { fence.GetCompletedValue() } >= value {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            unsafe { fence.SetEventOnCompletion(value, self.fence_event) }.map_err(hresult)?;
            let millis = u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX);
            let status = unsafe { WaitForSingleObject(self.fence_event, millis) };
            if status == WAIT_TIMEOUT {
                return Ok(unsafe { fence.GetCompletedValue() } >= value);
            } else if status != WAIT_OBJECT_0 {
                return Err(HResult::E_FAIL);
            }
        }
    }

    // -----------------------------------------------------------------------
    // API-A
    // -----------------------------------------------------------------------

    fn device(&self) -> ID3D11Device {
        self.d3d11.clone()
    }

    fn open_image(&self, handle: SharedHandle) -> NativeResult<ID3D11Texture2D> {
        unsafe { self.d3d11_1.OpenSharedResource1(open(handle)) }.map_err(hresult)
    }

    fn create_shader_view(
        &self,
        image: &ID3D11Texture2D,
        format: Format,
    ) -> NativeResult<ID3D11ShaderResourceView> {
        let desc = D3D11_SHADER_RESOURCE_VIEW_DESC {
            Format: dxgi_format(format),
            ViewDimension: D3D_SRV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_SHADER_RESOURCE_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_SRV {
                    MostDetailedMip: 0,
                    MipLevels: 1,
                },
            },
        };
        let mut view = None;
        unsafe {
            self.d3d11
                .CreateShaderResourceView(image, Some(&desc as *const _), Some(&mut view as *mut _))
        }
        .map_err(hresult)?;
        view.ok_or(HResult::E_FAIL)
    }

    fn create_unordered_view(
        &self,
        image: &ID3D11Texture2D,
        format: Format,
    ) -> NativeResult<ID3D11UnorderedAccessView> {
        let desc = D3D11_UNORDERED_ACCESS_VIEW_DESC {
            Format: dxgi_format(format),
            ViewDimension: D3D11_UAV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_UNORDERED_ACCESS_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_UAV { MipSlice: 0 },
            },
        };
        let mut view = None;
        unsafe {
            self.d3d11
                .CreateUnorderedAccessView(image, Some(&desc as *const _), Some(&mut view as *mut _))
        }
        .map_err(hresult)?;
        view.ok_or(HResult::E_FAIL)
    }

    fn create_target_view(
        &self,
        image: &ID3D11Texture2D,
        format: Format,
    ) -> NativeResult<ID3D11RenderTargetView> {
        let desc = D3D11_RENDER_TARGET_VIEW_DESC {
            Format: dxgi_format(format),
            ViewDimension: D3D11_RTV_DIMENSION_TEXTURE2D,
            Anonymous: D3D11_RENDER_TARGET_VIEW_DESC_0 {
                Texture2D: D3D11_TEX2D_RTV { MipSlice: 0 },
            },
        };
        let mut view = None;
        unsafe {
            self.d3d11
                .CreateRenderTargetView(image, Some(&desc as *const _), Some(&mut view as *mut _))
        }
        .map_err(hresult)?;
        view.ok_or(HResult::E_FAIL)
    }

    fn open_fence(&self, handle: SharedHandle) -> NativeResult<ID3D11Fence> {
        unsafe { self.d3d11_5.OpenSharedFence(open(handle)) }.map_err(hresult)
    }

    fn context_signal(&self, fence: &ID3D11Fence, value: u64) -> NativeResult<()> {
        unsafe { self.context.Signal(fence, value) }.map_err(hresult)
    }

    fn context_wait(&self, fence: &ID3D11Fence, value: u64) -> NativeResult<()> {
        unsafe { self.context.Wait(fence, value) }.map_err(hresult)
    }

    fn context_flush(&self) {
        unsafe { self.context.Flush() };
    }
}
