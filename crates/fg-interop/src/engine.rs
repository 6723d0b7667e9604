//! Contract with the external frame-generation engine.
//!
//! The engine is opaque: it owns the real swap chain, paces presentation,
//! and synthesizes interpolated frames. This layer only hands it correctly
//! ordered, correctly stated API-B resources and a frame identifier that
//! advances by one per present.

use crate::backend::Backend;
use crate::error::EngineStatus;
use crate::inputs::CameraPose;
use crate::swapchain::NativeSwapChain;
use crate::types::{Extent, Format, Rect, SwapChainDesc};

/// Which effect contexts the engine managed to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineEffects {
    pub frame_generation: bool,
    pub upscale: bool,
}

/// Per-frame configure call. Sent every present, whether or not generation
/// is enabled, so the engine never loses track of the frame identifier.
#[derive(Debug, Clone, Copy)]
pub struct ConfigureFrameGeneration<'a, I> {
    pub enabled: bool,
    /// The pre-UI colour surface, present only when generation is enabled.
    pub hudless: Option<&'a I>,
    pub generation_rect: Rect,
    pub frame_id: u64,
    pub allow_async_workloads: bool,
    pub only_present_generated: bool,
}

impl<I> ConfigureFrameGeneration<'_, I> {
    /// Generation off with no callback installed.
    pub fn disabled(generation_rect: Rect, frame_id: u64) -> Self {
        Self {
            enabled: false,
            hudless: None,
            generation_rect,
            frame_id,
            allow_async_workloads: false,
            only_present_generated: false,
        }
    }
}

/// Per-frame prepare dispatch, recorded into the frame's command list.
#[derive(Debug, Clone, Copy)]
pub struct PrepareFrameGeneration<'a, I> {
    pub frame_id: u64,
    pub render_size: Extent,
    pub jitter_offset: [f32; 2],
    pub motion_vector_scale: [f32; 2],
    pub frame_time_delta_ms: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub fov_vertical: f32,
    pub view_space_to_meters: f32,
    pub camera: CameraPose,
    pub depth: &'a I,
    pub motion_vectors: &'a I,
    /// History must be discarded for this frame.
    pub reset: bool,
}

/// 1:1 upscaler dispatch used as native anti-aliasing with sharpening.
#[derive(Debug, Clone, Copy)]
pub struct UpscaleDispatch<'a, I> {
    pub color: &'a I,
    pub depth: &'a I,
    pub motion_vectors: &'a I,
    pub output: &'a I,
    pub jitter_offset: [f32; 2],
    pub motion_vector_scale: [f32; 2],
    pub render_size: Extent,
    pub upscale_size: Extent,
    pub frame_time_delta_ms: f32,
    pub camera_near: f32,
    pub camera_far: f32,
    pub fov_vertical: f32,
    pub view_space_to_meters: f32,
    pub sharpness: f32,
    pub pre_exposure: f32,
    pub reset: bool,
}

/// Swap-chain frame pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacingTuning {
    pub safety_margin_ms: f32,
    pub variance_factor: f32,
    pub allow_hybrid_spin: bool,
    pub hybrid_spin_time: u32,
    pub allow_wait_for_single_object_on_fence: bool,
}

impl Default for FramePacingTuning {
    fn default() -> Self {
        Self {
            safety_margin_ms: 0.1,
            variance_factor: 0.1,
            allow_hybrid_spin: true,
            hybrid_spin_time: 2,
            allow_wait_for_single_object_on_fence: false,
        }
    }
}

pub trait FrameGenEngine<B: Backend> {
    /// The swap chain the engine creates and presents through.
    type SwapChain: NativeSwapChain<Buffer = B::Image>;
    /// Opaque handle of the engine's swap-chain context.
    type SwapChainContext;

    /// Create the engine-owned swap chain.
    fn create_swap_chain(
        &mut self,
        backend: &B,
        desc: &SwapChainDesc,
    ) -> Result<(Self::SwapChainContext, Self::SwapChain), EngineStatus>;

    /// Create the frame-generation and upscale contexts for a display size.
    fn create_effects(&mut self, backend: &B, display: Extent, format: Format) -> EngineEffects;

    fn configure(
        &mut self,
        swap_chain: &Self::SwapChain,
        params: &ConfigureFrameGeneration<'_, B::Image>,
    ) -> EngineStatus;

    fn configure_frame_pacing(
        &mut self,
        context: &Self::SwapChainContext,
        tuning: &FramePacingTuning,
    ) -> EngineStatus;

    fn upscale(
        &mut self,
        list: &B::CommandList,
        params: &UpscaleDispatch<'_, B::Image>,
    ) -> EngineStatus;

    fn prepare(
        &mut self,
        list: &B::CommandList,
        params: &PrepareFrameGeneration<'_, B::Image>,
    ) -> EngineStatus;

    /// Sub-pixel jitter for `index` within a sequence of `phase_count`.
    fn jitter_offset(&mut self, index: i32, phase_count: i32) -> Result<[f32; 2], EngineStatus>;
}
