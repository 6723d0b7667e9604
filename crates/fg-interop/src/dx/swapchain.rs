//! The engine-created DXGI swap chain behind [`NativeSwapChain`].

use std::ffi::c_void;

use windows::core::{Interface, IUnknown, BOOL};
use windows::Win32::Graphics::Direct3D12::ID3D12Resource;
use windows::Win32::Graphics::Dxgi::*;

use super::convert::{dxgi_format, frame_statistics, guid, hresult, mode_desc, swap_chain_desc};
use crate::error::{HResult, NativeResult};
use crate::iid::Guid;
use crate::swapchain::NativeSwapChain;
use crate::types::{Format, FrameStatistics, ModeDesc, PresentFlags, SwapChainDesc, SwapChainFlags};

#[derive(Clone)]
pub struct DxSwapChain(pub IDXGISwapChain4);

impl DxSwapChain {
    pub fn raw(&self) -> &IDXGISwapChain4 {
        &self.0
    }
}

/// Query `object` for `iid`, keeping the returned pointer as-is.
///
/// The result is typed as `IUnknown` but points at the requested interface,
/// so handing its raw pointer back across COM is correct.
fn query(object: &IUnknown, iid: &Guid) -> NativeResult<IUnknown> {
    let iid = guid(iid);
    let mut out: *mut c_void = std::ptr::null_mut();
    let hr = unsafe { object.query(&iid, &mut out) };
    if hr.is_err() {
        return Err(HResult(hr.0));
    }
    if out.is_null() {
        return Err(HResult::E_NOINTERFACE);
    }
    Ok(unsafe { IUnknown::from_raw(out) })
}

impl NativeSwapChain for DxSwapChain {
    type Buffer = ID3D12Resource;
    type Object = IUnknown;
    type Output = IDXGIOutput;

    fn query_interface(&self, iid: &Guid) -> NativeResult<IUnknown> {
        let unknown: IUnknown = self.0.cast().map_err(hresult)?;
        query(&unknown, iid)
    }

    fn set_private_data(&self, name: &Guid, data: &[u8]) -> NativeResult<()> {
        unsafe {
            self.0
                .SetPrivateData(&guid(name), data.len() as u32, data.as_ptr().cast())
        }
        .map_err(hresult)
    }

    fn set_private_data_interface(
        &self,
        name: &Guid,
        object: Option<&IUnknown>,
    ) -> NativeResult<()> {
        unsafe { self.0.SetPrivateDataInterface(&guid(name), object) }.map_err(hresult)
    }

    fn get_private_data(&self, name: &Guid, data: &mut [u8]) -> NativeResult<u32> {
        let mut size = data.len() as u32;
        unsafe {
            self.0
                .GetPrivateData(&guid(name), &mut size, data.as_mut_ptr().cast())
        }
        .map_err(hresult)?;
        Ok(size)
    }

    fn get_parent(&self, iid: &Guid) -> NativeResult<IUnknown> {
        let parent: IUnknown = unsafe { self.0.GetParent() }.map_err(hresult)?;
        query(&parent, iid)
    }

    fn get_device(&self, iid: &Guid) -> NativeResult<IUnknown> {
        let device: IUnknown = unsafe { self.0.GetDevice() }.map_err(hresult)?;
        query(&device, iid)
    }

    fn present(&self, sync_interval: u32, flags: PresentFlags) -> HResult {
        let hr = unsafe { self.0.Present(sync_interval, DXGI_PRESENT(flags.bits())) };
        HResult(hr.0)
    }

    fn get_buffer(&self, index: u32) -> NativeResult<ID3D12Resource> {
        unsafe { self.0.GetBuffer(index) }.map_err(hresult)
    }

    fn set_fullscreen_state(
        &self,
        fullscreen: bool,
        target: Option<&IDXGIOutput>,
    ) -> NativeResult<()> {
        unsafe { self.0.SetFullscreenState(fullscreen.into(), target) }.map_err(hresult)
    }

    fn get_fullscreen_state(&self) -> NativeResult<(bool, Option<IDXGIOutput>)> {
        let mut fullscreen = BOOL::default();
        let mut output: Option<IDXGIOutput> = None;
        unsafe {
            self.0
                .GetFullscreenState(Some(&mut fullscreen), Some(&mut output))
        }
        .map_err(hresult)?;
        Ok((fullscreen.as_bool(), output))
    }

    fn get_desc(&self) -> NativeResult<SwapChainDesc> {
        let desc = unsafe { self.0.GetDesc() }.map_err(hresult)?;
        Ok(swap_chain_desc(&desc))
    }

    fn resize_buffers(
        &self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> NativeResult<()> {
        unsafe {
            self.0.ResizeBuffers(
                buffer_count,
                width,
                height,
                dxgi_format(format),
                DXGI_SWAP_CHAIN_FLAG(flags.bits() as i32),
            )
        }
        .map_err(hresult)
    }

    fn resize_target(&self, mode: &ModeDesc) -> NativeResult<()> {
        unsafe { self.0.ResizeTarget(&mode_desc(mode)) }.map_err(hresult)
    }

    fn get_containing_output(&self) -> NativeResult<IDXGIOutput> {
        unsafe { self.0.GetContainingOutput() }.map_err(hresult)
    }

    fn get_frame_statistics(&self) -> NativeResult<FrameStatistics> {
        let mut stats = DXGI_FRAME_STATISTICS::default();
        unsafe { self.0.GetFrameStatistics(&mut stats) }.map_err(hresult)?;
        Ok(frame_statistics(&stats))
    }

    fn get_last_present_count(&self) -> NativeResult<u32> {
        unsafe { self.0.GetLastPresentCount() }.map_err(hresult)
    }

    fn current_back_buffer_index(&self) -> u32 {
        unsafe { self.0.GetCurrentBackBufferIndex() }
    }
}
