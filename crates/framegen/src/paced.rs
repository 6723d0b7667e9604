//! A [`HostSwapChain`] that runs the frame limiter before every present.

use fg_interop::iid::Guid;
use fg_interop::types::{FrameStatistics, ModeDesc};
use fg_interop::{
    DeviceRef, Format, HResult, HostSwapChain, NativeResult, PresentFlags, Queried, SwapChainDesc,
    SwapChainFlags,
};

use crate::limiter::FrameLimiter;

pub struct PacedSwapChain<H> {
    inner: H,
    limiter: FrameLimiter,
    frame_generation: bool,
}

impl<H: HostSwapChain> PacedSwapChain<H> {
    pub fn new(inner: H, limiter: FrameLimiter, frame_generation: bool) -> Self {
        Self {
            inner,
            limiter,
            frame_generation,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Whether the limiter budgets for a generated frame after every real
    /// one.
    pub fn frame_generation(&self) -> bool {
        self.frame_generation
    }

    pub fn limiter_mut(&mut self) -> &mut FrameLimiter {
        &mut self.limiter
    }
}

impl<H: HostSwapChain> HostSwapChain for PacedSwapChain<H> {
    type Texture = H::Texture;
    type Device = H::Device;
    type Object = H::Object;
    type Output = H::Output;

    fn query_interface(&self, iid: &Guid) -> NativeResult<Queried<H::Object>> {
        self.inner.query_interface(iid)
    }

    fn set_private_data(&self, name: &Guid, data: &[u8]) -> NativeResult<()> {
        self.inner.set_private_data(name, data)
    }

    fn set_private_data_interface(
        &self,
        name: &Guid,
        object: Option<&H::Object>,
    ) -> NativeResult<()> {
        self.inner.set_private_data_interface(name, object)
    }

    fn get_private_data(&self, name: &Guid, data: &mut [u8]) -> NativeResult<u32> {
        self.inner.get_private_data(name, data)
    }

    fn get_parent(&self, iid: &Guid) -> NativeResult<H::Object> {
        self.inner.get_parent(iid)
    }

    fn get_device(&self, iid: &Guid) -> NativeResult<DeviceRef<H::Device, H::Object>> {
        self.inner.get_device(iid)
    }

    fn present(&mut self, sync_interval: u32, flags: PresentFlags) -> HResult {
        // Test presents don't display anything; pacing them would only stall
        // the host's occlusion polling.
        if !flags.contains(PresentFlags::TEST) {
            self.limiter.wait(self.frame_generation);
        }
        self.inner.present(sync_interval, flags)
    }

    fn get_buffer(&self, index: u32, iid: &Guid) -> NativeResult<H::Texture> {
        self.inner.get_buffer(index, iid)
    }

    fn set_fullscreen_state(
        &self,
        fullscreen: bool,
        target: Option<&H::Output>,
    ) -> NativeResult<()> {
        self.inner.set_fullscreen_state(fullscreen, target)
    }

    fn get_fullscreen_state(&self) -> NativeResult<(bool, Option<H::Output>)> {
        self.inner.get_fullscreen_state()
    }

    fn get_desc(&self) -> NativeResult<SwapChainDesc> {
        self.inner.get_desc()
    }

    fn resize_buffers(
        &mut self,
        buffer_count: u32,
        width: u32,
        height: u32,
        format: Format,
        flags: SwapChainFlags,
    ) -> HResult {
        self.inner
            .resize_buffers(buffer_count, width, height, format, flags)
    }

    fn resize_target(&self, mode: &ModeDesc) -> NativeResult<()> {
        self.inner.resize_target(mode)
    }

    fn get_containing_output(&self) -> NativeResult<H::Output> {
        self.inner.get_containing_output()
    }

    fn get_frame_statistics(&self) -> NativeResult<FrameStatistics> {
        self.inner.get_frame_statistics()
    }

    fn get_last_present_count(&self) -> NativeResult<u32> {
        self.inner.get_last_present_count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use fg_interop::sim::{SimEngine, SimGpu};
    use fg_interop::{FrameInputs, FrameOptions, InteropContext, SwapChainFacade};

    type Paced = PacedSwapChain<SwapChainFacade<SimGpu, SimEngine>>;

    fn paced(refresh_hz: f64, limit: bool) -> (SimEngine, Paced) {
        let gpu = SimGpu::new();
        let engine = SimEngine::new(gpu.clone());
        let desc = SwapChainDesc {
            width: 64,
            height: 64,
            format: Format::R8G8B8A8_UNORM,
            buffer_count: 2,
            windowed: true,
            ..SwapChainDesc::default()
        };
        let context = InteropContext::create(
            gpu,
            engine.clone(),
            &desc,
            FrameOptions::default(),
            Box::new(FrameInputs::default),
        )
        .unwrap();
        let facade = SwapChainFacade::new(context);
        (engine, PacedSwapChain::new(facade, FrameLimiter::new(refresh_hz, limit), false))
    }

    #[test]
    fn presents_are_spaced_and_still_reach_the_engine() {
        let (engine, mut paced) = paced(500.0, true);
        let interval = paced.limiter_mut().target_interval(false).unwrap();

        let start = Instant::now();
        for _ in 0..4 {
            assert_eq!(paced.present(0, PresentFlags::empty()), HResult::OK);
        }
        assert!(start.elapsed() >= interval * 3);
        assert_eq!(engine.swap_chain().unwrap().presents().len(), 4);
    }

    #[test]
    fn test_presents_skip_the_limiter() {
        // Half a second between real frames.
        let (_, mut paced) = paced(2.0, true);
        paced.present(0, PresentFlags::empty());

        let start = Instant::now();
        paced.present(0, PresentFlags::TEST);
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[test]
    fn other_calls_are_delegated() {
        let (_, paced) = paced(60.0, false);
        assert_eq!(paced.get_desc(), paced.inner().get_desc());
        assert_eq!(
            paced.query_interface(&fg_interop::iid::IUNKNOWN),
            Ok(Queried::Facade)
        );
    }
}
