//! Owner of every interop component for one host device.
//!
//! Built once when the host creates its device and swap chain, and handed by
//! reference to whatever needs it. Dropping it drains both queues before
//! anything is released.

use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::bridge::SwapChainBridge;
use crate::device::InteropDevice;
use crate::engine::{ConfigureFrameGeneration, EngineEffects, FrameGenEngine};
use crate::error::{HResult, InteropError};
use crate::inputs::{FrameOptions, FrameSource};
use crate::orchestrator::{FrameOrchestrator, PresentTarget};
use crate::shared::SharedResource;
use crate::surfaces::{HostSurfaceDescs, HostSurfaces};
use crate::types::{Format, PresentFlags, Rect, SwapChainDesc, SwapChainFlags};

pub struct InteropContext<B: Backend, E: FrameGenEngine<B>> {
    // Drop order: host surfaces, then the swap chain and its buffers, then
    // the device ring, then the engine.
    surfaces: Option<HostSurfaces<B>>,
    bridge: SwapChainBridge<B, E>,
    device: InteropDevice<B>,
    orchestrator: FrameOrchestrator,
    engine: E,
    effects: EngineEffects,
    source: Box<dyn FrameSource>,
    options: FrameOptions,
    /// Set once the host asked for surfaces; they are rebuilt after resizes.
    motion_vector_format: Option<Format>,
}

impl<B: Backend, E: FrameGenEngine<B>> InteropContext<B, E> {
    /// Create the device ring, the engine swap chain and the interop
    /// resources.
    ///
    /// Failing to create the device or swap chain is an error; the caller
    /// keeps the host's own swap chain. Failing to create the interop
    /// resources is not: presents then go straight to the native swap chain.
    pub fn create(
        backend: B,
        mut engine: E,
        requested: &SwapChainDesc,
        options: FrameOptions,
        source: Box<dyn FrameSource>,
    ) -> Result<Self, InteropError> {
        let device = InteropDevice::new(backend)?;
        let mut bridge = SwapChainBridge::create(device.backend(), &mut engine, requested)?;

        let effects = engine.create_effects(
            device.backend(),
            bridge.desc().extent(),
            bridge.desc().format,
        );
        if !effects.frame_generation {
            warn!("Frame generation context unavailable, presenting real frames only");
        }

        if let Err(e) = bridge.create_interop(device.backend()) {
            warn!("Interop unavailable, presenting without it: {e}");
        }

        info!(
            "Interop context ready ({}x{}, generation {}, upscaler {})",
            requested.width, requested.height, effects.frame_generation, effects.upscale
        );

        Ok(Self {
            surfaces: None,
            bridge,
            device,
            orchestrator: FrameOrchestrator::new(&options),
            engine,
            effects,
            source,
            options,
            motion_vector_format: None,
        })
    }

    pub fn present(&mut self, sync_interval: u32, flags: PresentFlags) -> HResult {
        let target = PresentTarget {
            device: &self.device,
            bridge: &mut self.bridge,
            engine: &mut self.engine,
            effects: self.effects,
            surfaces: self.surfaces.as_ref(),
            source: self.source.as_mut(),
            options: &self.options,
        };
        self.orchestrator.present(target, sync_interval, flags)
    }

    /// Resize the swap chain and everything sized to it.
    ///
    /// The host's buffer count is ignored; the engine needs three.
    pub fn resize(
        &mut self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> HResult {
        debug!(buffer_count, width, height, ?format, "Resizing swap chain");
        let backend = self.device.backend();

        // The generation context is rebuilt below; the engine swap chain must
        // not keep calling back into the old one.
        if self.effects.frame_generation {
            let detach = ConfigureFrameGeneration::disabled(
                Rect::covering(self.bridge.desc().extent()),
                self.orchestrator.frame_id(),
            );
            let status = self.engine.configure(self.bridge.swap_chain(), &detach);
            if !status.is_ok() {
                warn!(%status, "Could not detach frame generation before resize");
            }
        }

        self.bridge.begin_resize(backend);
        self.surfaces = None;
        let hr = self.bridge.finish_resize(backend, width, height, format, flags);
        if hr.is_err() {
            return hr;
        }

        let desc = *self.bridge.desc();
        self.effects = self.engine.create_effects(backend, desc.extent(), desc.format);
        self.orchestrator.restart_warmup(self.options.warmup_frames);

        if let Some(format) = self.motion_vector_format {
            let descs = HostSurfaceDescs::new(desc.extent(), format);
            match HostSurfaces::create(backend, &descs) {
                Ok(surfaces) => self.surfaces = Some(surfaces),
                Err(e) => warn!("Host surfaces not rebuilt after resize: {e}"),
            }
        }
        hr
    }

    /// Create the surfaces the host copies its pre-UI colour, depth and
    /// motion vectors into, at the swap chain's size.
    pub fn create_host_surfaces(
        &mut self,
        motion_vector_format: Format,
    ) -> Result<&HostSurfaces<B>, InteropError> {
        if self.surfaces.take().is_some() {
            self.bridge.drain(self.device.backend());
        }
        self.motion_vector_format = Some(motion_vector_format);

        let descs = HostSurfaceDescs::new(self.bridge.desc().extent(), motion_vector_format);
        let surfaces = HostSurfaces::create(self.device.backend(), &descs)?;
        Ok(&*self.surfaces.insert(surfaces))
    }

    /// Discard the engine's frame history on the next generated frame.
    pub fn request_reset(&mut self) {
        self.orchestrator.request_reset();
    }

    pub fn set_options(&mut self, options: FrameOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &FrameOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        self.device.backend()
    }

    pub fn device(&self) -> &InteropDevice<B> {
        &self.device
    }

    pub fn bridge(&self) -> &SwapChainBridge<B, E> {
        &self.bridge
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn effects(&self) -> EngineEffects {
        self.effects
    }

    pub fn orchestrator(&self) -> &FrameOrchestrator {
        &self.orchestrator
    }

    /// The surface the host renders the final image into; `None` while
    /// interop is not ready.
    pub fn surface(&self) -> Option<&SharedResource<B>> {
        self.bridge.surface()
    }

    pub fn host_surfaces(&self) -> Option<&HostSurfaces<B>> {
        self.surfaces.as_ref()
    }
}

impl<B: Backend, E: FrameGenEngine<B>> Drop for InteropContext<B, E> {
    fn drop(&mut self) {
        self.bridge.drain(self.device.backend());
        debug!("Interop context destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeState;
    use crate::error::EngineStatus;
    use crate::inputs::FrameInputs;
    use crate::sim::{EngineCall, SimEngine, SimGpu};
    use crate::types::Extent;

    fn requested() -> SwapChainDesc {
        SwapChainDesc {
            width: 256,
            height: 144,
            format: Format::R8G8B8A8_UNORM_SRGB,
            buffer_count: 2,
            windowed: true,
            ..SwapChainDesc::default()
        }
    }

    fn context(gpu: &SimGpu, engine: SimEngine) -> InteropContext<SimGpu, SimEngine> {
        InteropContext::create(
            gpu.clone(),
            engine,
            &requested(),
            FrameOptions::default(),
            Box::new(FrameInputs::default),
        )
        .unwrap()
    }

    #[test]
    fn creation_reaches_interop_ready() {
        let gpu = SimGpu::new();
        let ctx = context(&gpu, SimEngine::new(gpu.clone()));

        assert_eq!(ctx.bridge().state(), BridgeState::InteropReady);
        assert!(ctx.surface().is_some());
        assert_eq!(ctx.effects(), EngineEffects { frame_generation: true, upscale: true });
    }

    #[test]
    fn interop_failure_degrades_to_native_presents() {
        let gpu = SimGpu::new();
        let engine = SimEngine::new(gpu.clone());
        // The fence is the first interop object created.
        gpu.fail_next("OpenSharedFence", HResult::E_FAIL);
        let mut ctx = context(&gpu, engine.clone());

        assert_eq!(ctx.bridge().state(), BridgeState::Created);
        assert_eq!(ctx.present(1, PresentFlags::empty()), HResult::OK);
        assert!(!engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::Configure { .. })));
    }

    #[test]
    fn swap_chain_failure_is_an_error() {
        let gpu = SimGpu::new();
        let engine = SimEngine::new(gpu.clone());
        engine.fail_swap_chain_creation(EngineStatus::NO_PROVIDER);

        let result = InteropContext::create(
            gpu.clone(),
            engine,
            &requested(),
            FrameOptions::default(),
            Box::new(FrameInputs::default),
        );
        assert!(matches!(result, Err(InteropError::Engine { .. })));
    }

    #[test]
    fn resize_rebuilds_host_surfaces_and_restarts_warmup() {
        let gpu = SimGpu::new();
        let engine = SimEngine::new(gpu.clone());
        let mut ctx = context(&gpu, engine.clone());
        ctx.create_host_surfaces(Format::R16G16_FLOAT).unwrap();
        for _ in 0..5 {
            ctx.present(0, PresentFlags::empty());
        }

        let hr = ctx.resize(2, 512, 288, Format::UNKNOWN, SwapChainFlags::empty());
        assert_eq!(hr, HResult::OK);
        assert_eq!(ctx.host_surfaces().unwrap().extent(), Extent::new(512, 288));
        assert_eq!(ctx.surface().unwrap().desc().extent(), Extent::new(512, 288));
        assert_eq!(ctx.bridge().swap_chain().outstanding_buffer_refs(), 3);

        let prepared = engine.prepared_frames().len();
        for _ in 0..3 {
            ctx.present(0, PresentFlags::empty());
        }
        assert_eq!(engine.prepared_frames().len(), prepared);
        ctx.present(0, PresentFlags::empty());
        assert_eq!(engine.prepared_frames().len(), prepared + 1);
    }

    #[test]
    fn resize_detaches_generation_before_rebuilding_effects() {
        let gpu = SimGpu::new();
        let engine = SimEngine::new(gpu.clone());
        let mut ctx = context(&gpu, engine.clone());
        ctx.create_host_surfaces(Format::R16G16_FLOAT).unwrap();
        for _ in 0..5 {
            ctx.present(0, PresentFlags::empty());
        }

        ctx.resize(3, 512, 288, Format::UNKNOWN, SwapChainFlags::empty());

        let calls = engine.calls();
        let rebuilt = calls
            .iter()
            .rposition(|c| matches!(c, EngineCall::CreateEffects { .. }))
            .unwrap();
        assert!(matches!(
            calls[rebuilt - 1],
            EngineCall::Configure {
                enabled: false,
                hudless: None,
                frame_id: 5,
                ..
            }
        ));
    }

    #[test]
    fn failed_resize_keeps_presenting_natively() {
        let gpu = SimGpu::new();
        let mut ctx = context(&gpu, SimEngine::new(gpu.clone()));
        ctx.create_host_surfaces(Format::R16G16_FLOAT).unwrap();

        ctx.bridge()
            .swap_chain()
            .fail_next_resize(HResult::DXGI_ERROR_INVALID_CALL);
        let hr = ctx.resize(3, 800, 600, Format::R8G8B8A8_UNORM, SwapChainFlags::empty());

        assert_eq!(hr, HResult::DXGI_ERROR_INVALID_CALL);
        assert!(ctx.host_surfaces().is_none());
        assert!(ctx.surface().is_none());
        assert_eq!(ctx.present(0, PresentFlags::empty()), HResult::OK);
    }

    #[test]
    fn dropping_the_context_releases_everything() {
        let gpu = SimGpu::new();
        {
            let mut ctx = context(&gpu, SimEngine::new(gpu.clone()));
            ctx.create_host_surfaces(Format::R16G16_FLOAT).unwrap();
            ctx.present(0, PresentFlags::empty());
        }
        assert_eq!(gpu.live_imports(), 0);
        assert_eq!(gpu.open_handles(), 0);
    }
}
