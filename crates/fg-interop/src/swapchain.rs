//! The swap-chain interface, in its native and host-facing forms.

use crate::error::{HResult, NativeResult};
use crate::iid::Guid;
use crate::types::{Format, FrameStatistics, ModeDesc, PresentFlags, SwapChainDesc, SwapChainFlags};

/// The real API-B swap chain, as created by the frame-generation engine.
///
/// Methods map one-to-one onto `IDXGISwapChain4`; interface-returning
/// methods hand back an opaque [`Object`](Self::Object).
pub trait NativeSwapChain {
    /// Back-buffer image type.
    type Buffer;
    /// Any COM object handed across the interface.
    type Object: Clone;
    /// `IDXGIOutput`.
    type Output: Clone;

    fn query_interface(&self, iid: &Guid) -> NativeResult<Self::Object>;

    fn set_private_data(&self, name: &Guid, data: &[u8]) -> NativeResult<()>;
    fn set_private_data_interface(&self, name: &Guid, object: Option<&Self::Object>)
        -> NativeResult<()>;
    /// Copies into `data` and returns the stored size.
    fn get_private_data(&self, name: &Guid, data: &mut [u8]) -> NativeResult<u32>;
    fn get_parent(&self, iid: &Guid) -> NativeResult<Self::Object>;
    fn get_device(&self, iid: &Guid) -> NativeResult<Self::Object>;

    fn present(&self, sync_interval: u32, flags: PresentFlags) -> HResult;
    fn get_buffer(&self, index: u32) -> NativeResult<Self::Buffer>;
    fn set_fullscreen_state(&self, fullscreen: bool, target: Option<&Self::Output>)
        -> NativeResult<()>;
    fn get_fullscreen_state(&self) -> NativeResult<(bool, Option<Self::Output>)>;
    fn get_desc(&self) -> NativeResult<SwapChainDesc>;
    fn resize_buffers(
        &self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> NativeResult<()>;
    fn resize_target(&self, mode: &ModeDesc) -> NativeResult<()>;
    fn get_containing_output(&self) -> NativeResult<Self::Output>;
    fn get_frame_statistics(&self) -> NativeResult<FrameStatistics>;
    fn get_last_present_count(&self) -> NativeResult<u32>;

    fn current_back_buffer_index(&self) -> u32;
}

/// Result of a facade identity query.
#[derive(Debug, Clone, PartialEq)]
pub enum Queried<O> {
    /// The facade itself answers for the interface.
    Facade,
    /// Forwarded to the native swap chain.
    Native(O),
}

/// Result of a facade `GetDevice`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceRef<D, O> {
    /// The host's own API-A device.
    Bridged(D),
    /// Whatever the native swap chain returned.
    Native(O),
}

/// The swap-chain interface exactly as the host sees it.
///
/// [`SwapChainFacade`](crate::SwapChainFacade) implements it over the
/// interop context; on Windows a COM object forwards `IDXGISwapChain` calls
/// into any implementor.
pub trait HostSwapChain {
    type Texture;
    type Device;
    type Object: Clone;
    type Output: Clone;

    fn query_interface(&self, iid: &Guid) -> NativeResult<Queried<Self::Object>>;

    fn set_private_data(&self, name: &Guid, data: &[u8]) -> NativeResult<()>;
    fn set_private_data_interface(&self, name: &Guid, object: Option<&Self::Object>)
        -> NativeResult<()>;
    fn get_private_data(&self, name: &Guid, data: &mut [u8]) -> NativeResult<u32>;
    fn get_parent(&self, iid: &Guid) -> NativeResult<Self::Object>;
    fn get_device(&self, iid: &Guid) -> NativeResult<DeviceRef<Self::Device, Self::Object>>;

    fn present(&mut self, sync_interval: u32, flags: PresentFlags) -> HResult;
    fn get_buffer(&self, index: u32, iid: &Guid) -> NativeResult<Self::Texture>;
    fn set_fullscreen_state(&self, fullscreen: bool, target: Option<&Self::Output>)
        -> NativeResult<()>;
    fn get_fullscreen_state(&self) -> NativeResult<(bool, Option<Self::Output>)>;
    fn get_desc(&self) -> NativeResult<SwapChainDesc>;
    fn resize_buffers(
        &mut self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> HResult;
    fn resize_target(&self, mode: &ModeDesc) -> NativeResult<()>;
    fn get_containing_output(&self) -> NativeResult<Self::Output>;
    fn get_frame_statistics(&self) -> NativeResult<FrameStatistics>;
    fn get_last_present_count(&self) -> NativeResult<u32>;
}
