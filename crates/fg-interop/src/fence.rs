//! Cross-API GPU fence.
//!
//! One fence created by API-B with the shared flag, exported, and opened in
//! API-A. Both handles name the same GPU fence. A single counter orders
//! every hand-off: the producing API signals `N`, the consuming API waits for
//! `N`, and the counter moves to `N + 1`. Nothing here blocks the CPU except
//! [`CrossApiFence::block_until`].

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::backend::{Api, Backend};
use crate::device::RING_SIZE;
use crate::error::{InteropError, NativeResultExt};

/// First value handed out by the counter. Zero is the fence's initial
/// completed value and never signals anything.
pub const FIRST_FENCE_VALUE: u64 = 1;

pub struct CrossApiFence<B: Backend> {
    // The import is released before the exporting fence.
    fence_a: B::FenceA,
    fence_b: B::FenceB,
    next_value: u64,
    last_signaled: u64,
    /// Value that must complete before each ring slot's allocator is reused.
    retire: [u64; RING_SIZE],
    /// Slots whose list was executed with no API-B signal queued behind it.
    unsignaled: [bool; RING_SIZE],
}

impl<B: Backend> CrossApiFence<B> {
    pub fn create(backend: &B) -> Result<Self, InteropError> {
        let fence_b = backend
            .create_shared_fence(0)
            .creating("shared fence")
            .inspect_err(|e| error!("{e}"))?;
        let handle = backend
            .export_fence(&fence_b)
            .creating("shared fence handle")
            .inspect_err(|e| error!("{e}"))?;
        let fence_a = backend.open_fence(handle);
        backend.close_handle(handle);
        let fence_a = fence_a
            .creating("API-A import of shared fence")
            .inspect_err(|e| error!("{e}"))?;

        debug!("Cross-API fence created");

        Ok(Self {
            fence_a,
            fence_b,
            next_value: FIRST_FENCE_VALUE,
            last_signaled: 0,
            retire: [0; RING_SIZE],
            unsignaled: [false; RING_SIZE],
        })
    }

    /// The value the next hand-off will signal.
    pub fn value(&self) -> u64 {
        self.next_value
    }

    /// Enqueue a GPU-side signal on the producing API.
    pub fn signal(&mut self, backend: &B, producer: Api, value: u64) -> Result<(), InteropError> {
        if value <= self.last_signaled {
            return Err(InteropError::FenceRegression {
                value,
                last: self.last_signaled,
            });
        }
        let signaled = match producer {
            Api::A => backend
                .context_signal(&self.fence_a, value)
                .during("ID3D11DeviceContext4::Signal"),
            Api::B => backend
                .queue_signal(&self.fence_b, value)
                .during("ID3D12CommandQueue::Signal"),
        };
        signaled.inspect_err(|e| error!("{e}"))?;
        self.last_signaled = value;
        Ok(())
    }

    /// Enqueue a GPU-side wait on the consuming API. Does not block the CPU.
    pub fn wait(&self, backend: &B, consumer: Api, value: u64) -> Result<(), InteropError> {
        let waited = match consumer {
            Api::A => backend
                .context_wait(&self.fence_a, value)
                .during("ID3D11DeviceContext4::Wait"),
            Api::B => backend
                .queue_wait(&self.fence_b, value)
                .during("ID3D12CommandQueue::Wait"),
        };
        waited.inspect_err(|e| error!("{e}"))
    }

    /// Signal the current counter value and advance past it.
    ///
    /// The counter only moves once the signal is queued, so a failed signal
    /// leaves no gap and an enqueued one is never reused.
    pub fn signal_next(&mut self, backend: &B, producer: Api) -> Result<u64, InteropError> {
        let value = self.next_value;
        self.signal(backend, producer, value)?;
        self.next_value += 1;
        Ok(value)
    }

    /// Signal from `producer`, make the other API wait, advance the counter.
    ///
    /// Returns the value that was signaled. A failed wait still consumes the
    /// value.
    pub fn handoff(&mut self, backend: &B, producer: Api) -> Result<u64, InteropError> {
        let value = self.signal_next(backend, producer)?;
        self.wait(backend, producer.other(), value)?;
        Ok(value)
    }

    pub fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    pub fn completed(&self, backend: &B) -> u64 {
        backend.completed_value(&self.fence_b)
    }

    /// CPU-side wait for `value`. Returns `Ok(false)` on timeout.
    pub fn block_until(
        &self,
        backend: &B,
        value: u64,
        timeout: Duration,
    ) -> Result<bool, InteropError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.completed(backend) >= value {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    value,
                    completed = self.completed(backend),
                    "Timed out after {timeout:?} waiting for the shared fence"
                );
                return Ok(false);
            }
            // A wake is only a hint; the completed value decides.
            backend
                .wait_for_value(&self.fence_b, value, remaining)
                .during("ID3D12Fence::SetEventOnCompletion")
                .inspect_err(|e| error!("{e}"))?;
        }
    }

    /// Signal from `producer` and block the CPU until the GPU reaches it.
    /// Used to drain a queue before resize and teardown.
    pub fn flush(
        &mut self,
        backend: &B,
        producer: Api,
        timeout: Duration,
    ) -> Result<bool, InteropError> {
        let value = self.signal_next(backend, producer)?;
        self.block_until(backend, value, timeout)
    }

    pub fn retire_value(&self, slot: usize) -> u64 {
        self.retire[slot % RING_SIZE]
    }

    pub fn set_retire_value(&mut self, slot: usize, value: u64) {
        self.retire[slot % RING_SIZE] = value;
        self.unsignaled[slot % RING_SIZE] = false;
    }

    /// Record that `slot`'s list is on the queue but no signal follows it.
    /// Its next acquire signals before waiting.
    pub fn mark_unsignaled(&mut self, slot: usize) {
        self.unsignaled[slot % RING_SIZE] = true;
    }

    pub fn is_unsignaled(&self, slot: usize) -> bool {
        self.unsignaled[slot % RING_SIZE]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HResult;
    use crate::sim::{SimEvent, SimGpu};

    #[test]
    fn handoff_signals_then_waits_on_the_other_api() {
        let gpu = SimGpu::new();
        let mut fence = CrossApiFence::create(&gpu).unwrap();
        assert_eq!(fence.value(), FIRST_FENCE_VALUE);

        assert_eq!(fence.handoff(&gpu, Api::A).unwrap(), 1);
        assert_eq!(fence.handoff(&gpu, Api::B).unwrap(), 2);
        assert_eq!(fence.value(), 3);

        assert_eq!(
            gpu.fence_events(),
            vec![
                SimEvent::Signal { api: Api::A, value: 1 },
                SimEvent::Wait { api: Api::B, value: 1 },
                SimEvent::Signal { api: Api::B, value: 2 },
                SimEvent::Wait { api: Api::A, value: 2 },
            ]
        );
        assert_eq!(fence.completed(&gpu), 2);
    }

    #[test]
    fn signaling_an_old_value_is_rejected() {
        let gpu = SimGpu::new();
        let mut fence = CrossApiFence::create(&gpu).unwrap();
        fence.handoff(&gpu, Api::A).unwrap();

        assert_eq!(
            fence.signal(&gpu, Api::B, 1),
            Err(InteropError::FenceRegression { value: 1, last: 1 })
        );
    }

    #[test]
    fn failed_wait_still_consumes_the_value() {
        let gpu = SimGpu::new();
        let mut fence = CrossApiFence::create(&gpu).unwrap();

        gpu.fail_next("ID3D12CommandQueue::Wait", HResult::E_FAIL);
        assert_eq!(
            fence.handoff(&gpu, Api::A).err().map(|e| e.code()),
            Some(HResult::E_FAIL)
        );
        assert_eq!(fence.value(), 2);
        assert_eq!(fence.handoff(&gpu, Api::A).unwrap(), 2);
    }

    #[test]
    fn failed_signal_leaves_the_counter() {
        let gpu = SimGpu::new();
        let mut fence = CrossApiFence::create(&gpu).unwrap();

        gpu.fail_next("ID3D12CommandQueue::Signal", HResult::E_FAIL);
        assert!(fence.handoff(&gpu, Api::B).is_err());
        assert_eq!(fence.value(), FIRST_FENCE_VALUE);
        assert_eq!(fence.last_signaled(), 0);

        assert_eq!(fence.handoff(&gpu, Api::B).unwrap(), 1);
        assert_eq!(
            gpu.fence_events(),
            vec![
                SimEvent::Signal { api: Api::B, value: 1 },
                SimEvent::Wait { api: Api::A, value: 1 },
            ]
        );
    }

    #[test]
    fn retire_value_clears_unsignaled_mark() {
        let gpu = SimGpu::new();
        let mut fence = CrossApiFence::create(&gpu).unwrap();

        fence.mark_unsignaled(1);
        assert!(fence.is_unsignaled(1));
        fence.set_retire_value(1, 7);
        assert!(!fence.is_unsignaled(1));
        assert_eq!(fence.retire_value(1), 7);
    }

    #[test]
    fn block_until_times_out_on_a_stalled_queue() {
        let gpu = SimGpu::new();
        let mut fence = CrossApiFence::create(&gpu).unwrap();
        gpu.stall(Api::B, true);

        let reached = fence.flush(&gpu, Api::B, Duration::from_millis(5)).unwrap();
        assert!(!reached);

        gpu.stall(Api::B, false);
        assert!(fence.block_until(&gpu, 1, Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn stale_wake_does_not_count_as_completion() {
        let gpu = SimGpu::new();
        let mut fence = CrossApiFence::create(&gpu).unwrap();
        gpu.stall(Api::B, true);
        let value = fence.signal_next(&gpu, Api::B).unwrap();

        gpu.stale_wake();
        assert!(!fence.block_until(&gpu, value, Duration::from_millis(5)).unwrap());
        assert!(fence.completed(&gpu) < value);
    }

    #[test]
    fn import_failure_closes_handle() {
        let gpu = SimGpu::new();
        gpu.fail_next("OpenSharedFence", HResult::E_FAIL);

        assert!(CrossApiFence::create(&gpu).is_err());
        assert_eq!(gpu.open_handles(), 0);
    }
}
