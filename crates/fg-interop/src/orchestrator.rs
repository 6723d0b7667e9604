//! Per-present sequencing of the interop work.
//!
//! Each host present hands the API-A image to API-B, copies it into the
//! real back buffer, feeds the frame-generation engine and presents. The
//! orchestrator owns only the per-frame counters; every GPU object it
//! touches belongs to the [`InteropContext`](crate::InteropContext).

use tracing::{debug, error, info, warn};

use crate::backend::{Api, Backend};
use crate::bridge::SwapChainBridge;
use crate::device::{InteropDevice, RING_SIZE};
use crate::engine::{
    ConfigureFrameGeneration, EngineEffects, FrameGenEngine, FramePacingTuning,
    PrepareFrameGeneration, UpscaleDispatch,
};
use crate::error::{EngineStatus, HResult, InteropError};
use crate::inputs::{CameraPose, FrameInputs, FrameOptions, FrameSource};
use crate::surfaces::HostSurfaces;
use crate::swapchain::NativeSwapChain;
use crate::types::{Extent, PresentFlags, Rect, ResourceState, Transition};

// ---------------------------------------------------------------------------
// Reset detection
// ---------------------------------------------------------------------------

/// Tracks whether the engine must discard its frame history.
///
/// A reset is raised by a camera jump larger than the cut distance or by an
/// explicit request, and stays pending until a prepare call delivers it.
#[derive(Debug, Default)]
pub struct ResetDetector {
    last_camera: Option<CameraPose>,
    pending: bool,
}

impl ResetDetector {
    /// Compare against the previous frame's camera. Returns whether this
    /// frame is a cut.
    pub fn observe(&mut self, camera: &CameraPose, cut_distance: f32) -> bool {
        let distance = self.last_camera.map(|last| last.distance_to(camera));
        self.last_camera = Some(*camera);
        let cut = distance.is_some_and(|d| d > cut_distance);
        if cut {
            debug!(?distance, cut_distance, "Camera cut detected");
            self.pending = true;
        }
        cut
    }

    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending reset.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Everything one present needs, borrowed from the owning context.
pub struct PresentTarget<'a, B: Backend, E: FrameGenEngine<B>> {
    pub device: &'a InteropDevice<B>,
    pub bridge: &'a mut SwapChainBridge<B, E>,
    pub engine: &'a mut E,
    pub effects: EngineEffects,
    pub surfaces: Option<&'a HostSurfaces<B>>,
    pub source: &'a mut dyn FrameSource,
    pub options: &'a FrameOptions,
}

#[derive(Debug)]
pub struct FrameOrchestrator {
    /// Identifier of the last present. Advances by one on every call.
    frame_id: u64,
    /// Command-list slot for the next present. Independent of the
    /// back-buffer index the copy targets.
    ring_slot: usize,
    warmup_remaining: u32,
    reset: ResetDetector,
    pacing_configured: bool,
    last_configure_status: EngineStatus,
}

impl FrameOrchestrator {
    pub fn new(options: &FrameOptions) -> Self {
        Self {
            frame_id: 0,
            ring_slot: 0,
            warmup_remaining: options.warmup_frames,
            reset: ResetDetector::default(),
            pacing_configured: false,
            last_configure_status: EngineStatus::OK,
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn ring_slot(&self) -> usize {
        self.ring_slot
    }

    /// Discard the engine's history on the next generated frame.
    pub fn request_reset(&mut self) {
        self.reset.request();
    }

    pub fn reset_pending(&self) -> bool {
        self.reset.is_pending()
    }

    /// Keep generation off for the next `frames` interop presents.
    pub fn restart_warmup(&mut self, frames: u32) {
        self.warmup_remaining = frames;
    }

    /// Frame pacing is configured once per engine swap-chain context.
    pub fn forget_frame_pacing(&mut self) {
        self.pacing_configured = false;
    }

    /// Run one host present through the interop path.
    ///
    /// Returns the native present's status, or the code of the first native
    /// failure after the hand-off started.
    pub fn present<B: Backend, E: FrameGenEngine<B>>(
        &mut self,
        target: PresentTarget<'_, B, E>,
        sync_interval: u32,
        flags: PresentFlags,
    ) -> HResult {
        self.frame_id += 1;
        let frame_id = self.frame_id;

        let PresentTarget {
            device,
            bridge,
            engine,
            effects,
            surfaces,
            source,
            options,
        } = target;
        let backend = device.backend();

        if sync_interval != 0 {
            debug!(sync_interval, "Sync interval overridden, the engine paces presents");
        }
        let flags = present_flags(&bridge.swap_chain, flags);

        let hr = 'present: {
            if !bridge.is_interop_ready() {
                break 'present bridge.swap_chain.present(0, flags);
            }
            let extent = bridge.desc().extent();
            let (Some(fence), Some(surface)) = (bridge.fence.as_mut(), bridge.surface.as_ref()) else {
                break 'present bridge.swap_chain.present(0, flags);
            };

            // API-A finished rendering into the shared surface.
            if let Err(e) = fence.handoff(backend, Api::A) {
                break 'present e.code();
            }

            let slot = self.ring_slot;
            let list = match device.acquire_command_list(slot, fence) {
                Ok(list) => list,
                Err(InteropError::NotReady) => {
                    // The API-B wait queued by the hand-off is left in place.
                    // It resolves when API-A's signal lands and the next
                    // hand-off orders after it.
                    warn!(slot, frame_id, "Frame slot not retired, presenting directly");
                    break 'present bridge.swap_chain.present(0, flags);
                }
                Err(e) => break 'present e.code(),
            };

            let back_index = bridge.swap_chain.current_back_buffer_index();
            match bridge.back_buffers.get(back_index as usize).and_then(Option::as_ref) {
                Some(back_buffer) => {
                    let from_common = |image, after| Transition::new(image, ResourceState::Common, after);
                    let barriers = [
                        from_common(surface.image(), ResourceState::CopySource),
                        from_common(back_buffer, ResourceState::CopyDest),
                    ];
                    backend.transition(list, &barriers);
                    backend.copy_image(list, back_buffer, surface.image());
                    backend.transition(list, &barriers.map(|b| b.reversed()));
                }
                None => warn!(back_index, "No back buffer at the current index, copy skipped"),
            }

            let inputs = source.frame_inputs();
            self.reset.observe(&inputs.camera, options.camera_cut_distance);
            let bypass = self.warmup_remaining > 0;
            self.warmup_remaining = self.warmup_remaining.saturating_sub(1);

            if !self.pacing_configured {
                let status = engine.configure_frame_pacing(&bridge.context, &FramePacingTuning::default());
                if !status.is_ok() {
                    warn!(%status, "Frame pacing configuration rejected");
                }
                self.pacing_configured = true;
            }

            if effects.frame_generation {
                let host = surfaces.filter(|_| options.frame_generation && !bypass);
                let status = engine.configure(
                    &bridge.swap_chain,
                    &ConfigureFrameGeneration {
                        enabled: host.is_some(),
                        hudless: host.map(|s| s.hudless.image()),
                        generation_rect: Rect::covering(extent),
                        frame_id,
                        allow_async_workloads: options.allow_async_workloads,
                        only_present_generated: false,
                    },
                );
                self.note_configure_status(status, frame_id);

                if let Some(host) = host.filter(|_| status.is_ok()) {
                    self.dispatch(backend, engine, list, host, effects, &inputs, options, extent, frame_id);
                }
            }

            if let Err(e) = device.submit(slot) {
                break 'present e.code();
            }

            let hr = bridge.swap_chain.present(0, flags);
            if hr.is_err() {
                error!(code = %hr, frame_id, "Present failed");
            }

            // API-B finished reading; API-A may write the surface again.
            // The list is on the queue, so its slot needs a signal behind it
            // whatever the hand-off returns.
            let signaled_before = fence.last_signaled();
            let handoff = fence.handoff(backend, Api::B);
            if fence.last_signaled() > signaled_before {
                fence.set_retire_value(slot, fence.last_signaled());
            } else {
                fence.mark_unsignaled(slot);
            }
            match handoff {
                Err(e) if hr.is_ok() => e.code(),
                _ => hr,
            }
        };

        self.ring_slot = bridge.swap_chain.current_back_buffer_index() as usize % RING_SIZE;
        hr
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch<B: Backend, E: FrameGenEngine<B>>(
        &mut self,
        backend: &B,
        engine: &mut E,
        list: &B::CommandList,
        host: &HostSurfaces<B>,
        effects: EngineEffects,
        inputs: &FrameInputs,
        options: &FrameOptions,
        extent: Extent,
        frame_id: u64,
    ) {
        let from_common = |image, after| Transition::new(image, ResourceState::Common, after);
        let barriers = [
            from_common(host.hudless.image(), ResourceState::NonPixelShaderResource),
            from_common(host.depth.image(), ResourceState::NonPixelShaderResource),
            from_common(host.motion_vectors.image(), ResourceState::NonPixelShaderResource),
            from_common(host.upscaled.image(), ResourceState::UnorderedAccess),
        ];
        backend.transition(list, &barriers);

        let reset = self.reset.take();
        let jitter_offset = [-inputs.jitter[0], inputs.jitter[1]];
        let motion_vector_scale = [extent.width as f32, extent.height as f32];
        let frame_time_delta_ms = inputs.effective_frame_time();

        if effects.upscale && options.sharpness > 0.0 {
            let status = engine.upscale(
                list,
                &UpscaleDispatch {
                    color: host.hudless.image(),
                    depth: host.depth.image(),
                    motion_vectors: host.motion_vectors.image(),
                    output: host.upscaled.image(),
                    jitter_offset,
                    motion_vector_scale,
                    render_size: extent,
                    upscale_size: extent,
                    frame_time_delta_ms,
                    camera_near: inputs.camera_near,
                    camera_far: inputs.camera_far,
                    fov_vertical: inputs.fov_vertical,
                    view_space_to_meters: inputs.view_space_to_meters,
                    sharpness: options.sharpness.clamp(0.0, 1.0),
                    pre_exposure: 1.0,
                    reset,
                },
            );
            if !status.is_ok() {
                warn!(%status, frame_id, "Native anti-aliasing dispatch failed");
            }
        }

        let status = engine.prepare(
            list,
            &PrepareFrameGeneration {
                frame_id,
                render_size: extent,
                jitter_offset,
                motion_vector_scale,
                frame_time_delta_ms,
                camera_near: inputs.camera_near,
                camera_far: inputs.camera_far,
                fov_vertical: inputs.fov_vertical,
                view_space_to_meters: inputs.view_space_to_meters,
                camera: inputs.camera,
                depth: host.depth.image(),
                motion_vectors: host.motion_vectors.image(),
                reset,
            },
        );
        if !status.is_ok() {
            warn!(%status, frame_id, "Frame generation prepare failed");
        }

        backend.transition(list, &barriers.map(|b| b.reversed()));
    }

    fn note_configure_status(&mut self, status: EngineStatus, frame_id: u64) {
        if status == self.last_configure_status {
            return;
        }
        if status.is_ok() {
            info!(frame_id, "Frame generation configure recovered");
        } else {
            warn!(%status, frame_id, "Frame generation configure failed, generation off for now");
        }
        self.last_configure_status = status;
    }
}

/// The engine paces presentation itself, so the host's sync interval is
/// dropped. Tearing is only legal outside exclusive fullscreen.
fn present_flags<S: NativeSwapChain>(swap_chain: &S, flags: PresentFlags) -> PresentFlags {
    let fullscreen = swap_chain
        .get_fullscreen_state()
        .map(|(fullscreen, _)| fullscreen)
        .unwrap_or(false);
    if fullscreen {
        flags - PresentFlags::ALLOW_TEARING
    } else {
        flags | PresentFlags::ALLOW_TEARING
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::sim::{EngineCall, SimEngine, SimEvent, SimGpu, SimSwapChain};
    use crate::surfaces::HostSurfaceDescs;
    use crate::types::{Format, SwapChainDesc};

    struct Rig {
        gpu: SimGpu,
        device: InteropDevice<SimGpu>,
        bridge: SwapChainBridge<SimGpu, SimEngine>,
        engine: SimEngine,
        surfaces: Option<HostSurfaces<SimGpu>>,
        options: FrameOptions,
        orchestrator: FrameOrchestrator,
    }

    impl Rig {
        fn new(options: FrameOptions) -> Self {
            let gpu = SimGpu::new();
            let mut engine = SimEngine::new(gpu.clone());
            let device = InteropDevice::new(gpu.clone()).unwrap();
            let desc = SwapChainDesc {
                width: 320,
                height: 180,
                format: Format::R8G8B8A8_UNORM,
                buffer_count: 3,
                windowed: true,
                ..SwapChainDesc::default()
            };
            let mut bridge = SwapChainBridge::create(&gpu, &mut engine, &desc).unwrap();
            bridge.create_interop(&gpu).unwrap();
            let surfaces = HostSurfaces::create(
                &gpu,
                &HostSurfaceDescs::new(desc.extent(), Format::R16G16_FLOAT),
            )
            .unwrap();
            Self {
                gpu,
                device,
                bridge,
                engine,
                surfaces: Some(surfaces),
                orchestrator: FrameOrchestrator::new(&options),
                options,
            }
        }

        fn swap_chain(&self) -> SimSwapChain {
            self.bridge.swap_chain().clone()
        }

        fn present_with(&mut self, source: &mut dyn FrameSource) -> HResult {
            let target = PresentTarget {
                device: &self.device,
                bridge: &mut self.bridge,
                engine: &mut self.engine,
                effects: EngineEffects {
                    frame_generation: true,
                    upscale: true,
                },
                surfaces: self.surfaces.as_ref(),
                source,
                options: &self.options,
            };
            self.orchestrator.present(target, 1, PresentFlags::empty())
        }

        fn present(&mut self) -> HResult {
            self.present_with(&mut FrameInputs::default)
        }
    }

    fn no_warmup() -> FrameOptions {
        FrameOptions {
            warmup_frames: 0,
            ..FrameOptions::default()
        }
    }

    #[test]
    fn fence_values_increase_and_every_wait_follows_its_signal() {
        let mut rig = Rig::new(no_warmup());
        for _ in 0..20 {
            assert_eq!(rig.present(), HResult::OK);
        }

        let mut last = 0;
        let mut signaled = Vec::new();
        for event in rig.gpu.fence_events() {
            match event {
                SimEvent::Signal { api, value } => {
                    assert!(value > last, "signal {value} after {last}");
                    last = value;
                    signaled.push((api, value));
                }
                SimEvent::Wait { api, value } => {
                    assert!(signaled.contains(&(api.other(), value)));
                }
                _ => unreachable!(),
            }
        }
        assert_eq!(signaled.len(), 40);
    }

    #[test]
    fn sync_interval_is_dropped_and_tearing_allowed_in_a_window() {
        let mut rig = Rig::new(no_warmup());
        rig.present();
        assert_eq!(
            rig.swap_chain().presents(),
            vec![(0, PresentFlags::ALLOW_TEARING)]
        );
    }

    #[test]
    fn surface_is_copied_into_the_current_back_buffer() {
        let mut rig = Rig::new(no_warmup());
        let swap_chain = rig.swap_chain();
        rig.present();
        rig.present();

        let surface = rig.bridge.surface().unwrap().image().id();
        let copies: Vec<_> = rig
            .gpu
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::Copy { dst, src } => Some((dst, src)),
                _ => None,
            })
            .collect();
        assert_eq!(
            copies,
            vec![
                (swap_chain.buffer(0).unwrap().id(), surface),
                (swap_chain.buffer(1).unwrap().id(), surface),
            ]
        );
    }

    #[test]
    fn ring_slot_stays_in_range() {
        let mut rig = Rig::new(no_warmup());
        for _ in 0..10 {
            rig.present();
            assert!(rig.orchestrator.ring_slot() < RING_SIZE);
        }
    }

    #[test]
    fn stalled_consumer_blocks_the_producer() {
        let mut rig = Rig::new(no_warmup());
        rig.gpu.stall(Api::B, true);
        for _ in 0..RING_SIZE {
            assert_eq!(rig.present(), HResult::OK);
        }

        let gpu = rig.gpu.clone();
        let release = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gpu.stall(Api::B, false);
        });
        // Slot 0 comes round again and must wait for the queue.
        assert_eq!(rig.present(), HResult::OK);
        release.join().unwrap();

        let events = rig.gpu.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, SimEvent::AllocatorResetInFlight { .. })));
        let resets: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::ResetAllocator { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(resets.len(), RING_SIZE + 1);
        assert!(resets[RING_SIZE] >= rig.bridge.fence().unwrap().retire_value(1));
    }

    #[test]
    fn slot_timeout_presents_directly() {
        let mut rig = Rig::new(no_warmup());
        rig.device = InteropDevice::new(rig.gpu.clone())
            .unwrap()
            .with_slot_timeout(Duration::from_millis(5));
        rig.gpu.stall(Api::B, true);
        for _ in 0..RING_SIZE {
            rig.present();
        }
        let prepared = rig.engine.prepared_frames().len();

        assert_eq!(rig.present(), HResult::OK);
        assert_eq!(rig.swap_chain().presents().len(), RING_SIZE + 1);
        assert_eq!(rig.engine.prepared_frames().len(), prepared);
        assert!(!rig
            .gpu
            .events()
            .iter()
            .any(|e| matches!(e, SimEvent::AllocatorResetInFlight { .. })));
    }

    #[test]
    fn frame_ids_are_contiguous_and_a_teleport_resets_once() {
        let mut rig = Rig::new(FrameOptions::default());
        let mut frame = 0u32;
        let mut source = || {
            frame += 1;
            let x = if frame > 500 { 50_000.0 } else { frame as f32 };
            FrameInputs {
                camera: CameraPose::at([x, 0.0, 0.0]),
                ..FrameInputs::default()
            }
        };
        for _ in 0..1000 {
            rig.present_with(&mut source);
        }

        let configured: Vec<u64> = rig
            .engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Configure { frame_id, .. } => Some(frame_id),
                _ => None,
            })
            .collect();
        assert_eq!(configured, (1..=1000).collect::<Vec<_>>());

        let resets: Vec<u64> = rig
            .engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Prepare {
                    frame_id,
                    reset: true,
                    ..
                } => Some(frame_id),
                _ => None,
            })
            .collect();
        assert_eq!(resets, vec![501]);
    }

    #[test]
    fn warmup_frames_run_without_generation() {
        let mut rig = Rig::new(FrameOptions::default());
        for _ in 0..5 {
            rig.present();
        }
        let enabled: Vec<bool> = rig
            .engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Configure { enabled, .. } => Some(enabled),
                _ => None,
            })
            .collect();
        assert_eq!(enabled, vec![false, false, false, true, true]);
        assert_eq!(rig.engine.prepared_frames(), vec![4, 5]);
    }

    #[test]
    fn requested_reset_survives_warmup() {
        let mut rig = Rig::new(FrameOptions::default());
        rig.orchestrator.request_reset();
        for _ in 0..5 {
            rig.present();
        }
        assert_eq!(rig.engine.resets(), 1);
        assert!(!rig.orchestrator.reset_pending());
    }

    #[test]
    fn degraded_start_forwards_without_engine_calls() {
        let gpu = SimGpu::new();
        let mut engine = SimEngine::new(gpu.clone());
        let device = InteropDevice::new(gpu.clone()).unwrap();
        let mut bridge = SwapChainBridge::create(&gpu, &mut engine, &SwapChainDesc {
            width: 64,
            height: 64,
            format: Format::R8G8B8A8_UNORM,
            ..SwapChainDesc::default()
        })
        .unwrap();
        bridge.swap_chain().set_present_result(HResult::DXGI_STATUS_OCCLUDED);
        let before = engine.calls();

        let options = FrameOptions::default();
        let mut orchestrator = FrameOrchestrator::new(&options);
        let hr = orchestrator.present(
            PresentTarget {
                device: &device,
                bridge: &mut bridge,
                engine: &mut engine,
                effects: EngineEffects {
                    frame_generation: true,
                    upscale: true,
                },
                surfaces: None,
                source: &mut FrameInputs::default,
                options: &options,
            },
            1,
            PresentFlags::empty(),
        );

        assert_eq!(hr, HResult::DXGI_STATUS_OCCLUDED);
        assert_eq!(engine.calls(), before);
        assert!(gpu.fence_events().is_empty());
    }

    #[test]
    fn configure_failure_disables_generation_for_that_frame_only() {
        let mut rig = Rig::new(no_warmup());
        rig.engine.set_configure_status(EngineStatus::RUNTIME_ERROR);
        rig.present();
        rig.present();
        rig.engine.set_configure_status(EngineStatus::OK);
        rig.present();

        assert_eq!(rig.engine.prepared_frames(), vec![3]);
        assert_eq!(rig.orchestrator.last_configure_status, EngineStatus::OK);
    }

    #[test]
    fn failed_present_is_returned_and_fence_still_advances() {
        let mut rig = Rig::new(no_warmup());
        rig.swap_chain().set_present_result(HResult::DXGI_ERROR_DEVICE_REMOVED);

        assert_eq!(rig.present(), HResult::DXGI_ERROR_DEVICE_REMOVED);
        let fence = rig.bridge.fence().unwrap();
        assert_eq!(fence.value(), 3);
        assert_eq!(fence.retire_value(0), 2);
    }

    fn signaled_values(gpu: &SimGpu) -> Vec<u64> {
        gpu.fence_events()
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::Signal { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    fn in_flight_resets(gpu: &SimGpu) -> usize {
        gpu.events()
            .iter()
            .filter(|e| matches!(e, SimEvent::AllocatorResetInFlight { .. }))
            .count()
    }

    #[test]
    fn failed_queue_wait_drops_one_frame() {
        let mut rig = Rig::new(no_warmup());
        rig.gpu.fail_next("ID3D12CommandQueue::Wait", HResult::E_FAIL);

        assert_eq!(rig.present(), HResult::E_FAIL);
        for _ in 0..5 {
            assert_eq!(rig.present(), HResult::OK);
        }

        assert_eq!(rig.swap_chain().presents().len(), 5);
        assert_eq!(signaled_values(&rig.gpu), (1..=11).collect::<Vec<_>>());
        assert_eq!(in_flight_resets(&rig.gpu), 0);
    }

    #[test]
    fn failed_execute_drops_one_frame() {
        let mut rig = Rig::new(no_warmup());
        rig.gpu.fail_next("ExecuteCommandLists", HResult::E_FAIL);

        assert_eq!(rig.present(), HResult::E_FAIL);
        for _ in 0..5 {
            assert_eq!(rig.present(), HResult::OK);
        }

        assert_eq!(rig.swap_chain().presents().len(), 5);
        assert_eq!(signaled_values(&rig.gpu), (1..=11).collect::<Vec<_>>());
        assert_eq!(in_flight_resets(&rig.gpu), 0);
    }

    #[test]
    fn failed_queue_signal_keeps_the_slot_until_it_retires() {
        let mut rig = Rig::new(no_warmup());
        rig.device = InteropDevice::new(rig.gpu.clone())
            .unwrap()
            .with_slot_timeout(Duration::from_millis(5));
        rig.gpu.stall(Api::B, true);
        rig.gpu.fail_next("ID3D12CommandQueue::Signal", HResult::E_FAIL);

        // The frame is shown; only the hand-off back to API-A failed.
        assert_eq!(rig.present(), HResult::E_FAIL);
        assert!(rig.bridge.fence().unwrap().is_unsignaled(0));
        for _ in 0..RING_SIZE {
            assert_eq!(rig.present(), HResult::OK);
        }
        assert_eq!(rig.swap_chain().presents().len(), RING_SIZE + 1);
        assert_eq!(in_flight_resets(&rig.gpu), 0);

        rig.gpu.stall(Api::B, false);
        for _ in 0..6 {
            assert_eq!(rig.present(), HResult::OK);
        }
        assert_eq!(in_flight_resets(&rig.gpu), 0);

        let signaled = signaled_values(&rig.gpu);
        assert!(signaled.windows(2).all(|pair| pair[1] == pair[0] + 1));
    }

    #[test]
    fn zero_sharpness_skips_the_upscaler() {
        let mut rig = Rig::new(FrameOptions {
            sharpness: 0.0,
            ..no_warmup()
        });
        rig.present();
        assert!(!rig
            .engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::Upscale { .. })));
        assert_eq!(rig.engine.prepared_frames(), vec![1]);
    }

    #[test]
    fn frame_pacing_is_configured_once() {
        let mut rig = Rig::new(no_warmup());
        for _ in 0..4 {
            rig.present();
        }
        let pacing = rig
            .engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::FramePacing(_)))
            .count();
        assert_eq!(pacing, 1);
    }

    #[test]
    fn camera_cut_needs_a_previous_frame() {
        let mut detector = ResetDetector::default();
        assert!(!detector.observe(&CameraPose::at([1e6, 0.0, 0.0]), 10.0));
        assert!(!detector.observe(&CameraPose::at([1e6 + 5.0, 0.0, 0.0]), 10.0));
        assert!(detector.observe(&CameraPose::default(), 10.0));
        assert!(detector.take());
        assert!(!detector.take());
    }
}
