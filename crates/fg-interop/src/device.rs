//! API-B device wrapper with a ring of per-frame command lists.
//!
//! Holds the backend (both devices and the API-B direct queue) and one
//! allocator/list pair per in-flight frame. An allocator is only reset once
//! the fence value recorded for its slot's previous use has completed.

use std::time::Duration;

use tracing::{debug, error, warn};

use crate::backend::{Api, Backend};
use crate::error::{InteropError, NativeResultExt};
use crate::fence::CrossApiFence;

/// Frames in flight. The frame-generation swap chain requires three buffers,
/// and the ring mirrors them.
pub const RING_SIZE: usize = 3;

/// Default bound on the CPU wait for a ring slot to retire.
pub const DEFAULT_SLOT_TIMEOUT: Duration = Duration::from_secs(1);

struct FrameSlot<B: Backend> {
    // Released before the allocator it records into.
    list: B::CommandList,
    allocator: B::Allocator,
}

/// The API-B side of the interop layer.
pub struct InteropDevice<B: Backend> {
    ring: Vec<FrameSlot<B>>,
    slot_timeout: Duration,
    backend: B,
}

impl<B: Backend> InteropDevice<B> {
    /// Create the ring of allocator/list pairs. Lists start closed.
    pub fn new(backend: B) -> Result<Self, InteropError> {
        let mut ring = Vec::with_capacity(RING_SIZE);
        for slot in 0..RING_SIZE {
            let allocator = backend
                .create_command_allocator()
                .creating("command allocator")
                .inspect_err(|e| error!(slot, "{e}"))?;
            let list = backend
                .create_command_list(&allocator)
                .creating("command list")
                .inspect_err(|e| error!(slot, "{e}"))?;
            ring.push(FrameSlot { list, allocator });
        }
        debug!("Interop device created with {RING_SIZE} frame slots");

        Ok(Self {
            ring,
            slot_timeout: DEFAULT_SLOT_TIMEOUT,
            backend,
        })
    }

    /// Bound on the CPU wait in [`acquire_command_list`](Self::acquire_command_list).
    pub fn with_slot_timeout(mut self, timeout: Duration) -> Self {
        self.slot_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reset and open the command list of `slot`.
    ///
    /// If the slot's previous work has not retired the CPU blocks for it.
    /// Reaching this wait means the GPU is a full ring behind, which is
    /// reported as a performance warning. A wait that times out returns
    /// [`InteropError::NotReady`] without touching the allocator.
    ///
    /// A slot whose last submission has no signal behind it gets one queued
    /// first, so the wait cannot be satisfied by an unrelated API-A signal.
    pub fn acquire_command_list(
        &self,
        slot: usize,
        fence: &mut CrossApiFence<B>,
    ) -> Result<&B::CommandList, InteropError> {
        let slot = slot % RING_SIZE;
        let frame = &self.ring[slot];

        if fence.is_unsignaled(slot) {
            let value = fence.signal_next(&self.backend, Api::B)?;
            debug!(slot, value, "Signaled behind an unretired submission");
            fence.set_retire_value(slot, value);
        }

        let required = fence.retire_value(slot);
        let completed = fence.completed(&self.backend);
        if completed < required {
            warn!(
                slot,
                required,
                completed,
                "GPU is a full frame ring behind, blocking until the slot retires"
            );
            if !fence.block_until(&self.backend, required, self.slot_timeout)? {
                return Err(InteropError::NotReady);
            }
        }

        self.backend
            .reset_command_allocator(&frame.allocator)
            .during("ID3D12CommandAllocator::Reset")
            .inspect_err(|e| error!(slot, "{e}"))?;
        self.backend
            .reset_command_list(&frame.list, &frame.allocator)
            .during("ID3D12GraphicsCommandList::Reset")
            .inspect_err(|e| error!(slot, "{e}"))?;

        Ok(&frame.list)
    }

    /// Close the slot's list and execute it on the direct queue.
    pub fn submit(&self, slot: usize) -> Result<(), InteropError> {
        let frame = &self.ring[slot % RING_SIZE];
        self.backend
            .close_command_list(&frame.list)
            .during("ID3D12GraphicsCommandList::Close")
            .inspect_err(|e| error!(slot, "{e}"))?;
        self.backend
            .execute(&frame.list)
            .during("ID3D12CommandQueue::ExecuteCommandLists")
            .inspect_err(|e| error!(slot, "{e}"))
    }

    pub fn slot_timeout(&self) -> Duration {
        self.slot_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HResult;
    use crate::sim::{SimEvent, SimGpu};

    #[test]
    fn ring_has_three_closed_lists() {
        let gpu = SimGpu::new();
        let _device = InteropDevice::new(gpu.clone()).unwrap();
        assert_eq!(gpu.command_lists(), RING_SIZE);
        assert_eq!(gpu.open_command_lists(), 0);
    }

    #[test]
    fn retired_slot_is_reset_without_blocking() {
        let gpu = SimGpu::new();
        let device = InteropDevice::new(gpu.clone()).unwrap();
        let mut fence = CrossApiFence::create(&gpu).unwrap();

        let value = fence.handoff(&gpu, Api::B).unwrap();
        fence.set_retire_value(1, value);
        device.acquire_command_list(1, &mut fence).unwrap();
        device.submit(1).unwrap();

        let resets: Vec<_> = gpu
            .events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::ResetAllocator { .. }))
            .collect();
        assert_eq!(resets.len(), 1);
        assert!(matches!(
            resets[0],
            SimEvent::ResetAllocator { completed, .. } if completed >= value
        ));
    }

    #[test]
    fn stalled_slot_times_out_without_reset() {
        let gpu = SimGpu::new();
        let device = InteropDevice::new(gpu.clone())
            .unwrap()
            .with_slot_timeout(Duration::from_millis(5));
        let mut fence = CrossApiFence::create(&gpu).unwrap();

        gpu.stall(Api::B, true);
        let value = fence.handoff(&gpu, Api::B).unwrap();
        fence.set_retire_value(0, value);

        assert_eq!(
            device.acquire_command_list(0, &mut fence).err(),
            Some(InteropError::NotReady)
        );
        assert!(!gpu
            .events()
            .iter()
            .any(|e| matches!(e, SimEvent::ResetAllocator { .. })));
    }

    #[test]
    fn submission_failure_is_reported() {
        let gpu = SimGpu::new();
        let device = InteropDevice::new(gpu.clone()).unwrap();
        let mut fence = CrossApiFence::create(&gpu).unwrap();

        device.acquire_command_list(2, &mut fence).unwrap();
        gpu.fail_next("ExecuteCommandLists", HResult::DXGI_ERROR_DEVICE_REMOVED);
        assert_eq!(
            device.submit(2).err().map(|e| e.code()),
            Some(HResult::DXGI_ERROR_DEVICE_REMOVED)
        );
    }

    #[test]
    fn unsignaled_slot_is_signaled_before_reuse() {
        let gpu = SimGpu::new();
        let device = InteropDevice::new(gpu.clone())
            .unwrap()
            .with_slot_timeout(Duration::from_millis(5));
        let mut fence = CrossApiFence::create(&gpu).unwrap();

        gpu.stall(Api::B, true);
        device.acquire_command_list(0, &mut fence).unwrap();
        device.submit(0).unwrap();
        fence.mark_unsignaled(0);

        // An API-A signal reaching the next value does not retire the slot.
        fence.signal_next(&gpu, Api::A).unwrap();
        assert_eq!(
            device.acquire_command_list(0, &mut fence).err(),
            Some(InteropError::NotReady)
        );
        assert_eq!(fence.retire_value(0), 2);
        assert!(!fence.is_unsignaled(0));

        gpu.stall(Api::B, false);
        device.acquire_command_list(0, &mut fence).unwrap();
        assert!(!gpu
            .events()
            .iter()
            .any(|e| matches!(e, SimEvent::AllocatorResetInFlight { .. })));
    }
}
