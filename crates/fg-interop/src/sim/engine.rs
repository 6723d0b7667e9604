use std::sync::Arc;

use parking_lot::Mutex;

use super::gpu::{SimCommandList, SimGpu, SimImage};
use super::swapchain::SimSwapChain;
use crate::engine::{
    ConfigureFrameGeneration, EngineEffects, FrameGenEngine, FramePacingTuning,
    PrepareFrameGeneration, UpscaleDispatch,
};
use crate::error::EngineStatus;
use crate::types::{Extent, Format, SwapChainDesc};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    CreateSwapChain(SwapChainDesc),
    CreateEffects { display: Extent, format: Format },
    Configure {
        frame_id: u64,
        enabled: bool,
        hudless: Option<u64>,
        allow_async_workloads: bool,
    },
    FramePacing(FramePacingTuning),
    Upscale { sharpness: f32, reset: bool },
    Prepare {
        frame_id: u64,
        reset: bool,
        jitter_offset: [f32; 2],
        motion_vector_scale: [f32; 2],
        frame_time_delta_ms: f32,
    },
    Jitter { index: i32, phase_count: i32 },
}

struct EngineState {
    calls: Vec<EngineCall>,
    reported_buffer_count: u32,
    swap_chain: Option<SimSwapChain>,
    swap_chain_failure: Option<EngineStatus>,
    configure_status: EngineStatus,
    effects: EngineEffects,
}

/// Frame-generation engine that records what it is asked to do.
#[derive(Clone)]
pub struct SimEngine {
    gpu: SimGpu,
    state: Arc<Mutex<EngineState>>,
}

impl SimEngine {
    pub fn new(gpu: SimGpu) -> Self {
        Self {
            gpu,
            state: Arc::new(Mutex::new(EngineState {
                calls: Vec::new(),
                reported_buffer_count: 3,
                swap_chain: None,
                swap_chain_failure: None,
                configure_status: EngineStatus::OK,
                effects: EngineEffects {
                    frame_generation: true,
                    upscale: true,
                },
            })),
        }
    }

    /// Create swap chains with `count` buffers regardless of the request.
    pub fn with_reported_buffer_count(self, count: u32) -> Self {
        self.state.lock().reported_buffer_count = count;
        self
    }

    /// Effect contexts `create_effects` reports.
    pub fn with_effects(self, effects: EngineEffects) -> Self {
        self.state.lock().effects = effects;
        self
    }

    pub fn fail_swap_chain_creation(&self, status: EngineStatus) {
        self.state.lock().swap_chain_failure = Some(status);
    }

    /// Status every following configure returns.
    pub fn set_configure_status(&self, status: EngineStatus) {
        self.state.lock().configure_status = status;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn created_swap_chain_desc(&self) -> Option<SwapChainDesc> {
        self.state.lock().calls.iter().find_map(|call| match call {
            EngineCall::CreateSwapChain(desc) => Some(*desc),
            _ => None,
        })
    }

    /// The most recently created swap chain.
    pub fn swap_chain(&self) -> Option<SimSwapChain> {
        self.state.lock().swap_chain.clone()
    }

    /// Frame ids of every prepare call, in order.
    pub fn prepared_frames(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Prepare { frame_id, .. } => Some(frame_id),
                _ => None,
            })
            .collect()
    }

    /// Prepare calls that asked the engine to drop its history.
    pub fn resets(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Prepare { reset: true, .. }))
            .count()
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().calls.push(call);
    }
}

impl FrameGenEngine<SimGpu> for SimEngine {
    type SwapChain = SimSwapChain;
    type SwapChainContext = ();

    fn create_swap_chain(
        &mut self,
        _backend: &SimGpu,
        desc: &SwapChainDesc,
    ) -> Result<((), SimSwapChain), EngineStatus> {
        self.record(EngineCall::CreateSwapChain(*desc));
        let mut state = self.state.lock();
        if let Some(status) = state.swap_chain_failure.take() {
            return Err(status);
        }
        let swap_chain = SimSwapChain::new(
            self.gpu.clone(),
            SwapChainDesc {
                buffer_count: state.reported_buffer_count,
                ..*desc
            },
        );
        state.swap_chain = Some(swap_chain.clone());
        Ok(((), swap_chain))
    }

    fn create_effects(&mut self, _backend: &SimGpu, display: Extent, format: Format) -> EngineEffects {
        self.record(EngineCall::CreateEffects { display, format });
        self.state.lock().effects
    }

    fn configure(
        &mut self,
        _swap_chain: &SimSwapChain,
        params: &ConfigureFrameGeneration<'_, SimImage>,
    ) -> EngineStatus {
        self.record(EngineCall::Configure {
            frame_id: params.frame_id,
            enabled: params.enabled,
            hudless: params.hudless.map(SimImage::id),
            allow_async_workloads: params.allow_async_workloads,
        });
        self.state.lock().configure_status
    }

    fn configure_frame_pacing(&mut self, _context: &(), tuning: &FramePacingTuning) -> EngineStatus {
        self.record(EngineCall::FramePacing(*tuning));
        EngineStatus::OK
    }

    fn upscale(
        &mut self,
        _list: &SimCommandList,
        params: &UpscaleDispatch<'_, SimImage>,
    ) -> EngineStatus {
        self.record(EngineCall::Upscale {
            sharpness: params.sharpness,
            reset: params.reset,
        });
        EngineStatus::OK
    }

    fn prepare(
        &mut self,
        _list: &SimCommandList,
        params: &PrepareFrameGeneration<'_, SimImage>,
    ) -> EngineStatus {
        self.record(EngineCall::Prepare {
            frame_id: params.frame_id,
            reset: params.reset,
            jitter_offset: params.jitter_offset,
            motion_vector_scale: params.motion_vector_scale,
            frame_time_delta_ms: params.frame_time_delta_ms,
        });
        EngineStatus::OK
    }

    fn jitter_offset(&mut self, index: i32, phase_count: i32) -> Result<[f32; 2], EngineStatus> {
        self.record(EngineCall::Jitter { index, phase_count });
        if phase_count <= 0 {
            return Err(EngineStatus::ERROR);
        }
        Ok([0.0, 0.0])
    }
}
