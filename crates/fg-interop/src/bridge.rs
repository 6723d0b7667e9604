//! Owner of the real API-B swap chain.
//!
//! The swap chain is created through the frame-generation engine so the
//! engine can inject interpolated frames. The bridge holds its back buffers,
//! the shared surface the host renders into, and the cross-API fence.
//!
//! State machine: `Created -> InteropReady -> (Resizing -> InteropReady)*`.
//! A bridge that does not exist yet is uninitialized; dropping it destroys it.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backend::{Api, Backend};
use crate::device::RING_SIZE;
use crate::engine::FrameGenEngine;
use crate::error::{HResult, InteropError, NativeResultExt};
use crate::fence::CrossApiFence;
use crate::shared::SharedResource;
use crate::swapchain::NativeSwapChain;
use crate::types::{Format, ImageDesc, SurfaceUsage, SwapChainDesc, SwapChainFlags};

/// Bound on each CPU wait while draining the queues for resize or teardown.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Swap chain and back buffers exist; interop resources do not.
    Created,
    /// Fence and shared surface exist; presents go through interop.
    InteropReady,
    /// A resize released the resources and has not yet rebuilt them.
    Resizing,
}

pub struct SwapChainBridge<B: Backend, E: FrameGenEngine<B>> {
    // Interop resources and buffers are released before the swap chain.
    pub(crate) surface: Option<SharedResource<B>>,
    pub(crate) fence: Option<CrossApiFence<B>>,
    pub(crate) back_buffers: [Option<B::Image>; RING_SIZE],
    pub(crate) swap_chain: E::SwapChain,
    pub(crate) context: E::SwapChainContext,
    desc: SwapChainDesc,
    state: BridgeState,
}

impl<B: Backend, E: FrameGenEngine<B>> SwapChainBridge<B, E> {
    /// Create the engine-owned swap chain for the host's request.
    ///
    /// The buffer count is forced to three, flip-discard with tearing
    /// allowed, whatever the host asked for.
    pub fn create(
        backend: &B,
        engine: &mut E,
        requested: &SwapChainDesc,
    ) -> Result<Self, InteropError> {
        let desc = SwapChainDesc {
            buffer_count: RING_SIZE as u32,
            swap_effect: SwapChainDesc::SWAP_EFFECT_FLIP_DISCARD,
            buffer_usage: requested.buffer_usage | SwapChainDesc::USAGE_RENDER_TARGET_OUTPUT,
            sample_count: 1,
            flags: requested.flags | SwapChainFlags::ALLOW_TEARING,
            ..*requested
        };

        let (context, swap_chain) = engine
            .create_swap_chain(backend, &desc)
            .map_err(|status| InteropError::Engine {
                call: "create frame generation swap chain",
                status,
            })
            .inspect_err(|e| error!("{e}"))?;

        let mut bridge = Self {
            surface: None,
            fence: None,
            back_buffers: [None, None, None],
            swap_chain,
            context,
            desc,
            state: BridgeState::Created,
        };
        bridge.acquire_buffers()?;

        info!(
            "Frame generation swap chain created: {}x{} {:?}",
            bridge.desc.width, bridge.desc.height, bridge.desc.format
        );
        Ok(bridge)
    }

    /// Create the fence pair and the shared surface the host renders into.
    ///
    /// The fence survives resizes so its counter keeps increasing; only the
    /// surface is rebuilt.
    pub fn create_interop(&mut self, backend: &B) -> Result<(), InteropError> {
        if self.fence.is_none() {
            self.fence = Some(CrossApiFence::create(backend)?);
        }

        let wanted = self.surface_desc();
        if self.surface.as_ref().map(|s| *s.desc()) != Some(wanted) {
            self.surface = None;
            self.surface = Some(SharedResource::create(
                backend,
                &wanted,
                SurfaceUsage::SHADER_RESOURCE | SurfaceUsage::RENDER_TARGET,
            )?);
        }

        self.state = BridgeState::InteropReady;
        debug!("Swap chain interop ready");
        Ok(())
    }

    /// Resize the native swap chain, rebuilding everything that depends on
    /// its size.
    ///
    /// Both queues are drained and every buffer reference is released before
    /// the native call. On native failure the bridge stays in
    /// [`BridgeState::Resizing`] with no resources until a later resize
    /// succeeds.
    pub fn resize(
        &mut self,
        backend: &B,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> HResult {
        self.begin_resize(backend);
        self.finish_resize(backend, width, height, format, flags)
    }

    /// First half of [`resize`](Self::resize): drain and release. Callers
    /// holding their own surfaces drop them between the two halves.
    pub fn begin_resize(&mut self, backend: &B) {
        self.state = BridgeState::Resizing;
        self.drain(backend);
        self.release_buffers();
    }

    /// Second half of [`resize`](Self::resize): the native call and rebuild.
    pub fn finish_resize(
        &mut self,
        backend: &B,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> HResult {
        let result = self.swap_chain.resize_buffers(
            RING_SIZE as u32,
            width,
            height,
            format,
            flags | SwapChainFlags::ALLOW_TEARING,
        );
        if let Err(code) = result {
            error!("ResizeBuffers({width}x{height} {format:?}) failed: {code}");
            return code;
        }

        if let Err(e) = self.acquire_buffers() {
            error!("Reacquiring back buffers after resize failed: {e}");
            return e.code();
        }
        if let Err(e) = self.create_interop(backend) {
            // The native swap chain is fine; presents fall back to direct.
            error!("Rebuilding interop after resize failed: {e}");
            self.state = BridgeState::Created;
        }

        HResult::OK
    }

    /// Drain both queues so no GPU work references the resources.
    pub fn drain(&mut self, backend: &B) {
        backend.context_flush();
        let Some(fence) = self.fence.as_mut() else {
            return;
        };
        for api in [Api::A, Api::B] {
            match fence.flush(backend, api, FLUSH_TIMEOUT) {
                Ok(true) => {}
                Ok(false) => warn!("{api:?} queue did not drain within {FLUSH_TIMEOUT:?}"),
                Err(e) => error!("Draining {api:?} queue failed: {e}"),
            }
        }
    }

    fn release_buffers(&mut self) {
        self.back_buffers = [None, None, None];
        self.surface = None;
    }

    fn acquire_buffers(&mut self) -> Result<(), InteropError> {
        self.desc = self.swap_chain.get_desc().during("IDXGISwapChain::GetDesc")?;
        let count = (self.desc.buffer_count as usize).min(RING_SIZE);
        if count < RING_SIZE {
            warn!("Swap chain reports {count} buffers, expected {RING_SIZE}");
        }
        for index in 0..count {
            let buffer = self
                .swap_chain
                .get_buffer(index as u32)
                .during("IDXGISwapChain::GetBuffer")
                .inspect_err(|e| error!(index, "{e}"))?;
            self.back_buffers[index] = Some(buffer);
        }
        Ok(())
    }

    fn surface_desc(&self) -> ImageDesc {
        ImageDesc::new(self.desc.width, self.desc.height, self.desc.format.linear())
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Fence and shared surface both exist.
    pub fn is_interop_ready(&self) -> bool {
        self.fence.is_some() && self.surface.is_some()
    }

    pub fn desc(&self) -> &SwapChainDesc {
        &self.desc
    }

    pub fn swap_chain(&self) -> &E::SwapChain {
        &self.swap_chain
    }

    pub fn context(&self) -> &E::SwapChainContext {
        &self.context
    }

    /// The surface the host renders into; `None` while not ready.
    pub fn surface(&self) -> Option<&SharedResource<B>> {
        self.surface.as_ref()
    }

    pub fn fence(&self) -> Option<&CrossApiFence<B>> {
        self.fence.as_ref()
    }

    pub fn back_buffer(&self, index: usize) -> Option<&B::Image> {
        self.back_buffers.get(index).and_then(Option::as_ref)
    }

    pub fn back_buffer_count(&self) -> usize {
        self.back_buffers.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEngine, SimGpu};

    fn requested() -> SwapChainDesc {
        SwapChainDesc {
            width: 1280,
            height: 720,
            format: Format::R8G8B8A8_UNORM_SRGB,
            buffer_count: 2,
            windowed: true,
            ..SwapChainDesc::default()
        }
    }

    #[test]
    fn creation_forces_three_flip_buffers() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu.clone());
        let bridge = SwapChainBridge::create(&gpu, &mut engine, &requested()).unwrap();

        let created = engine.created_swap_chain_desc().unwrap();
        assert_eq!(created.buffer_count, 3);
        assert_eq!(created.swap_effect, SwapChainDesc::SWAP_EFFECT_FLIP_DISCARD);
        assert!(created.flags.contains(SwapChainFlags::ALLOW_TEARING));

        assert_eq!(bridge.state(), BridgeState::Created);
        assert_eq!(bridge.back_buffer_count(), 3);
        assert!(!bridge.is_interop_ready());
    }

    #[test]
    fn fewer_buffers_than_requested_are_tolerated() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu.clone()).with_reported_buffer_count(2);
        let bridge = SwapChainBridge::create(&gpu, &mut engine, &requested()).unwrap();

        assert_eq!(bridge.back_buffer_count(), 2);
        assert!(bridge.back_buffer(2).is_none());
    }

    #[test]
    fn interop_surface_is_linear_and_sized_to_the_swap_chain() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu.clone());
        let mut bridge = SwapChainBridge::create(&gpu, &mut engine, &requested()).unwrap();
        bridge.create_interop(&gpu).unwrap();

        let surface = bridge.surface().unwrap();
        assert_eq!(surface.desc().format, Format::R8G8B8A8_UNORM);
        assert_eq!(surface.desc().extent(), bridge.desc().extent());
        assert_eq!(bridge.state(), BridgeState::InteropReady);

        // Re-entry keeps the same resources.
        let allocations = gpu.live_allocations();
        bridge.create_interop(&gpu).unwrap();
        assert_eq!(gpu.live_allocations(), allocations);
    }

    #[test]
    fn resize_twice_matches_resize_once() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu.clone());
        let mut bridge = SwapChainBridge::create(&gpu, &mut engine, &requested()).unwrap();
        bridge.create_interop(&gpu).unwrap();

        let hr = bridge.resize(&gpu, 1920, 1080, Format::R8G8B8A8_UNORM_SRGB, SwapChainFlags::empty());
        assert_eq!(hr, HResult::OK);
        let once = (
            gpu.live_allocations(),
            gpu.live_imports(),
            gpu.open_handles(),
            bridge.swap_chain().outstanding_buffer_refs(),
            *bridge.desc(),
            bridge.surface().map(|s| *s.desc()),
        );

        let hr = bridge.resize(&gpu, 1920, 1080, Format::R8G8B8A8_UNORM_SRGB, SwapChainFlags::empty());
        assert_eq!(hr, HResult::OK);
        let twice = (
            gpu.live_allocations(),
            gpu.live_imports(),
            gpu.open_handles(),
            bridge.swap_chain().outstanding_buffer_refs(),
            *bridge.desc(),
            bridge.surface().map(|s| *s.desc()),
        );

        assert_eq!(once, twice);
        assert_eq!(twice.2, 0);
        // Three back buffers held by the bridge, nothing else.
        assert_eq!(twice.3, 3);
        assert_eq!(bridge.state(), BridgeState::InteropReady);
        assert_eq!(bridge.desc().width, 1920);
    }

    #[test]
    fn resize_drains_both_queues_first() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu.clone());
        let mut bridge = SwapChainBridge::create(&gpu, &mut engine, &requested()).unwrap();
        bridge.create_interop(&gpu).unwrap();

        bridge.resize(&gpu, 800, 600, Format::R8G8B8A8_UNORM, SwapChainFlags::empty());

        let events = gpu.fence_events();
        assert_eq!(
            events,
            vec![
                crate::sim::SimEvent::Signal { api: Api::A, value: 1 },
                crate::sim::SimEvent::Signal { api: Api::B, value: 2 },
            ]
        );
        assert_eq!(gpu.context_flushes(), 1);
    }

    #[test]
    fn failed_native_resize_leaves_null_resources() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu.clone());
        let mut bridge = SwapChainBridge::create(&gpu, &mut engine, &requested()).unwrap();
        bridge.create_interop(&gpu).unwrap();

        bridge
            .swap_chain()
            .fail_next_resize(HResult::DXGI_ERROR_INVALID_CALL);
        let hr = bridge.resize(&gpu, 800, 600, Format::R8G8B8A8_UNORM, SwapChainFlags::empty());

        assert_eq!(hr, HResult::DXGI_ERROR_INVALID_CALL);
        assert_eq!(bridge.state(), BridgeState::Resizing);
        assert!(bridge.surface().is_none());
        assert_eq!(bridge.back_buffer_count(), 0);

        let hr = bridge.resize(&gpu, 800, 600, Format::R8G8B8A8_UNORM, SwapChainFlags::empty());
        assert_eq!(hr, HResult::OK);
        assert_eq!(bridge.state(), BridgeState::InteropReady);
        assert_eq!(bridge.back_buffer_count(), 3);
    }
}
