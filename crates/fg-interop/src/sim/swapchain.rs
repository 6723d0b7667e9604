use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::gpu::{SimGpu, SimImage};
use crate::error::{HResult, NativeResult};
use crate::iid::{self, Guid};
use crate::swapchain::NativeSwapChain;
use crate::types::{
    Format, FrameStatistics, ImageDesc, ModeDesc, PresentFlags, ResourceFlags, SwapChainDesc,
    SwapChainFlags,
};

/// Any object the simulated swap chain hands out through an `iid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimObject {
    /// The native swap chain itself, answered for the given interface.
    SwapChain(Guid),
    /// The factory returned from `GetParent`.
    Factory(Guid),
    /// The command queue returned from `GetDevice`.
    Queue(Guid),
    /// A caller-supplied object stored as private data.
    User(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimOutput(pub u32);

struct SwapState {
    desc: SwapChainDesc,
    buffers: Vec<SimImage>,
    current: u32,
    present_count: u32,
    present_result: HResult,
    presents: Vec<(u32, PresentFlags)>,
    fullscreen: Option<SimOutput>,
    private_data: HashMap<Guid, Vec<u8>>,
    private_objects: HashMap<Guid, Option<SimObject>>,
    resize_failure: Option<HResult>,
    target: Option<ModeDesc>,
    calls: Vec<&'static str>,
}

/// A flip-model swap chain whose back buffers are [`SimGpu`] images.
///
/// Clones share state, so tests keep a handle to inspect what the layer
/// under test did with it.
#[derive(Clone)]
pub struct SimSwapChain {
    gpu: SimGpu,
    state: Arc<Mutex<SwapState>>,
}

impl SimSwapChain {
    /// `desc.buffer_count` buffers are allocated and reported.
    pub fn new(gpu: SimGpu, desc: SwapChainDesc) -> Self {
        let buffers = allocate_buffers(&gpu, &desc);
        Self {
            gpu,
            state: Arc::new(Mutex::new(SwapState {
                desc,
                buffers,
                current: 0,
                present_count: 0,
                present_result: HResult::OK,
                presents: Vec::new(),
                fullscreen: None,
                private_data: HashMap::new(),
                private_objects: HashMap::new(),
                resize_failure: None,
                target: None,
                calls: Vec::new(),
            })),
        }
    }

    /// Status every following present returns.
    pub fn set_present_result(&self, result: HResult) {
        self.state.lock().present_result = result;
    }

    pub fn fail_next_resize(&self, code: HResult) {
        self.state.lock().resize_failure = Some(code);
    }

    /// References to back buffers held outside the swap chain.
    pub fn outstanding_buffer_refs(&self) -> usize {
        self.state
            .lock()
            .buffers
            .iter()
            .map(|b| b.ref_count() - 1)
            .sum()
    }

    /// Sync interval and flags of every present, in order.
    pub fn presents(&self) -> Vec<(u32, PresentFlags)> {
        self.state.lock().presents.clone()
    }

    /// Names of the methods called, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn buffer(&self, index: u32) -> Option<SimImage> {
        self.state.lock().buffers.get(index as usize).cloned()
    }

    pub fn resize_target_mode(&self) -> Option<ModeDesc> {
        self.state.lock().target
    }

    fn record(&self, call: &'static str) -> parking_lot::MutexGuard<'_, SwapState> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }
}

fn allocate_buffers(gpu: &SimGpu, desc: &SwapChainDesc) -> Vec<SimImage> {
    let image = ImageDesc::new(desc.width, desc.height, desc.format);
    (0..desc.buffer_count)
        .map(|_| gpu.allocate(image, ResourceFlags::ALLOW_RENDER_TARGET))
        .collect()
}

impl NativeSwapChain for SimSwapChain {
    type Buffer = SimImage;
    type Object = SimObject;
    type Output = SimOutput;

    fn query_interface(&self, iid: &Guid) -> NativeResult<SimObject> {
        self.record("QueryInterface");
        if iid::is_swap_chain_family(iid) {
            Ok(SimObject::SwapChain(*iid))
        } else {
            Err(HResult::E_NOINTERFACE)
        }
    }

    fn set_private_data(&self, name: &Guid, data: &[u8]) -> NativeResult<()> {
        self.record("SetPrivateData")
            .private_data
            .insert(*name, data.to_vec());
        Ok(())
    }

    fn set_private_data_interface(
        &self,
        name: &Guid,
        object: Option<&SimObject>,
    ) -> NativeResult<()> {
        self.record("SetPrivateDataInterface")
            .private_objects
            .insert(*name, object.cloned());
        Ok(())
    }

    fn get_private_data(&self, name: &Guid, data: &mut [u8]) -> NativeResult<u32> {
        let state = self.record("GetPrivateData");
        let stored = state
            .private_data
            .get(name)
            .ok_or(HResult::DXGI_ERROR_NOT_FOUND)?;
        if data.len() < stored.len() {
            return Err(HResult::DXGI_ERROR_MORE_DATA);
        }
        data[..stored.len()].copy_from_slice(stored);
        Ok(stored.len() as u32)
    }

    fn get_parent(&self, iid: &Guid) -> NativeResult<SimObject> {
        self.record("GetParent");
        Ok(SimObject::Factory(*iid))
    }

    fn get_device(&self, iid: &Guid) -> NativeResult<SimObject> {
        self.record("GetDevice");
        Ok(SimObject::Queue(*iid))
    }

    fn present(&self, sync_interval: u32, flags: PresentFlags) -> HResult {
        let mut state = self.record("Present");
        state.presents.push((sync_interval, flags));
        let result = state.present_result;
        if result.is_ok() && !state.buffers.is_empty() {
            state.present_count += 1;
            state.current = (state.current + 1) % state.buffers.len() as u32;
        }
        result
    }

    fn get_buffer(&self, index: u32) -> NativeResult<SimImage> {
        self.record("GetBuffer")
            .buffers
            .get(index as usize)
            .cloned()
            .ok_or(HResult::DXGI_ERROR_INVALID_CALL)
    }

    fn set_fullscreen_state(&self, fullscreen: bool, target: Option<&SimOutput>) -> NativeResult<()> {
        let mut state = self.record("SetFullscreenState");
        state.fullscreen = fullscreen.then(|| target.copied().unwrap_or(SimOutput(0)));
        state.desc.windowed = !fullscreen;
        Ok(())
    }

    fn get_fullscreen_state(&self) -> NativeResult<(bool, Option<SimOutput>)> {
        let state = self.record("GetFullscreenState");
        Ok((state.fullscreen.is_some(), state.fullscreen))
    }

    fn get_desc(&self) -> NativeResult<SwapChainDesc> {
        let state = self.record("GetDesc");
        Ok(SwapChainDesc {
            buffer_count: state.buffers.len() as u32,
            ..state.desc
        })
    }

    fn resize_buffers(
        &self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> NativeResult<()> {
        let mut state = self.record("ResizeBuffers");
        if let Some(code) = state.resize_failure.take() {
            return Err(code);
        }
        // DXGI refuses to resize while any back-buffer reference is alive.
        if state.buffers.iter().any(|b| b.ref_count() > 1) {
            return Err(HResult::DXGI_ERROR_INVALID_CALL);
        }

        let reported = state.buffers.len() as u32;
        let desc = SwapChainDesc {
            buffer_count: if buffer_count == 0 { reported } else { buffer_count.min(reported) },
            width,
            height,
            format: if format == Format::UNKNOWN { state.desc.format } else { format },
            flags,
            ..state.desc
        };
        state.buffers = allocate_buffers(&self.gpu, &desc);
        state.desc = desc;
        state.current = 0;
        Ok(())
    }

    fn resize_target(&self, mode: &ModeDesc) -> NativeResult<()> {
        self.record("ResizeTarget").target = Some(*mode);
        Ok(())
    }

    fn get_containing_output(&self) -> NativeResult<SimOutput> {
        self.record("GetContainingOutput");
        Ok(SimOutput(0))
    }

    fn get_frame_statistics(&self) -> NativeResult<FrameStatistics> {
        let state = self.record("GetFrameStatistics");
        Ok(FrameStatistics {
            present_count: state.present_count,
            present_refresh_count: state.present_count,
            sync_refresh_count: state.present_count,
            ..FrameStatistics::default()
        })
    }

    fn get_last_present_count(&self) -> NativeResult<u32> {
        Ok(self.record("GetLastPresentCount").present_count)
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.state.lock().current
    }
}
