use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::backend::{Api, Backend, SharedHandle};
use crate::error::{HResult, NativeResult};
use crate::types::{Format, ImageDesc, ResourceFlags, ResourceState, Transition};

// ---------------------------------------------------------------------------
// Public handle types
// ---------------------------------------------------------------------------

/// One physical allocation. Counted live until the last reference drops,
/// including references held by queued GPU work.
struct Allocation {
    id: u64,
    desc: ImageDesc,
    flags: ResourceFlags,
    bytes: Mutex<Vec<u8>>,
    live: Arc<AtomicUsize>,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// API-B image.
#[derive(Clone)]
pub struct SimImage {
    alloc: Arc<Allocation>,
}

impl SimImage {
    pub fn id(&self) -> u64 {
        self.alloc.id
    }

    /// References to the allocation, this one included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.alloc)
    }
}

impl std::fmt::Debug for SimImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimImage({})", self.alloc.id)
    }
}

struct ImportToken {
    live: Arc<AtomicUsize>,
}

impl Drop for ImportToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// API-A import of an API-B allocation.
#[derive(Clone)]
pub struct SimImported {
    alloc: Arc<Allocation>,
    _token: Arc<ImportToken>,
}

impl SimImported {
    pub fn id(&self) -> u64 {
        self.alloc.id
    }
}

impl std::fmt::Debug for SimImported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimImported({})", self.alloc.id)
    }
}

impl PartialEq for SimImported {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.alloc, &other.alloc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimView {
    pub image: u64,
    pub format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimFence {
    id: u64,
}

#[derive(Debug)]
pub struct SimAllocator {
    id: u64,
}

#[derive(Debug)]
pub struct SimCommandList {
    id: u64,
}

/// The API-A device handed out by [`Backend::device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimDevice(pub u64);

/// Receives bytes once a queued read executes.
#[derive(Clone, Default)]
pub struct Readback(Arc<Mutex<Option<Vec<u8>>>>);

impl Readback {
    pub fn take(&self) -> Option<Vec<u8>> {
        self.0.lock().take()
    }
}

/// Submission-order log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Signal { api: Api, value: u64 },
    Wait { api: Api, value: u64 },
    /// An allocator reset, with the highest completed fence value at the time.
    ResetAllocator { allocator: u64, completed: u64 },
    /// An allocator reset while lists recorded on it were still executing.
    AllocatorResetInFlight { allocator: u64 },
    Barrier { image: u64, before: ResourceState, after: ResourceState },
    Copy { dst: u64, src: u64 },
    Execute { allocator: u64 },
}

// ---------------------------------------------------------------------------
// Simulated GPU state
// ---------------------------------------------------------------------------

enum HandleTarget {
    Image(Arc<Allocation>),
    Fence(u64),
}

enum ListOp {
    Copy { dst: Arc<Allocation>, src: Arc<Allocation> },
}

enum QueueOp {
    Signal { fence: u64, value: u64 },
    Wait { fence: u64, value: u64 },
    Execute { allocator: u64, ops: Vec<ListOp> },
    Write { dst: Arc<Allocation>, bytes: Vec<u8> },
    Read { src: Arc<Allocation>, into: Readback },
}

struct ListState {
    allocator: u64,
    open: bool,
    ops: Vec<ListOp>,
}

#[derive(Default)]
struct SimQueue {
    ops: VecDeque<QueueOp>,
    stalled: bool,
}

#[derive(Default)]
struct SimState {
    next_id: u64,
    next_handle: isize,
    handles: HashMap<isize, HandleTarget>,
    fences: HashMap<u64, u64>,
    queues: [SimQueue; 2],
    lists: HashMap<u64, ListState>,
    in_flight: HashMap<u64, usize>,
    events: Vec<SimEvent>,
    failures: HashMap<&'static str, HResult>,
    views_created: usize,
    context_flushes: usize,
    stale_wakes: usize,
}

impl SimState {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&mut self, call: &'static str) -> NativeResult<()> {
        match self.failures.remove(call) {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn completed(&self) -> u64 {
        self.fences.values().copied().max().unwrap_or(0)
    }

    /// Run queued work until every queue is stalled, blocked or empty.
    fn pump(&mut self) {
        loop {
            let mut progressed = false;
            for queue in 0..2 {
                loop {
                    if self.queues[queue].stalled {
                        break;
                    }
                    let blocked = match self.queues[queue].ops.front() {
                        None => break,
                        Some(QueueOp::Wait { fence, value }) => {
                            self.fences.get(fence).copied().unwrap_or(0) < *value
                        }
                        Some(_) => false,
                    };
                    if blocked {
                        break;
                    }
                    if let Some(op) = self.queues[queue].ops.pop_front() {
                        self.run(op);
                        progressed = true;
                    }
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn run(&mut self, op: QueueOp) {
        match op {
            QueueOp::Signal { fence, value } => {
                self.fences.insert(fence, value);
            }
            QueueOp::Wait { .. } => {}
            QueueOp::Execute { allocator, ops } => {
                for op in ops {
                    match op {
                        ListOp::Copy { dst, src } => {
                            let bytes = src.bytes.lock().clone();
                            *dst.bytes.lock() = bytes;
                        }
                    }
                }
                if let Some(count) = self.in_flight.get_mut(&allocator) {
                    *count = count.saturating_sub(1);
                }
            }
            QueueOp::Write { dst, bytes } => {
                let mut target = dst.bytes.lock();
                let len = bytes.len().min(target.len());
                target[..len].copy_from_slice(&bytes[..len]);
            }
            QueueOp::Read { src, into } => {
                *into.0.lock() = Some(src.bytes.lock().clone());
            }
        }
    }

    fn enqueue(&mut self, api: Api, op: QueueOp) {
        self.queues[queue_index(api)].ops.push_back(op);
        self.pump();
    }
}

fn queue_index(api: Api) -> usize {
    match api {
        Api::A => 0,
        Api::B => 1,
    }
}

struct Shared {
    state: Mutex<SimState>,
    progress: Condvar,
    live_allocations: Arc<AtomicUsize>,
    live_imports: Arc<AtomicUsize>,
    device_id: u64,
}

/// A simulated adapter with an API-A context and an API-B direct queue.
#[derive(Clone)]
pub struct SimGpu {
    inner: Arc<Shared>,
}

impl Default for SimGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl SimGpu {
    pub fn new() -> Self {
        static DEVICES: AtomicUsize = AtomicUsize::new(1);
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(SimState::default()),
                progress: Condvar::new(),
                live_allocations: Arc::new(AtomicUsize::new(0)),
                live_imports: Arc::new(AtomicUsize::new(0)),
                device_id: DEVICES.fetch_add(1, Ordering::Relaxed) as u64,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let result = f(&mut self.inner.state.lock());
        self.inner.progress.notify_all();
        result
    }

    // -- Fault and scheduling control ----------------------------------------

    /// Make the next call named `call` fail with `code`.
    pub fn fail_next(&self, call: &'static str, code: HResult) {
        self.with_state(|s| {
            s.failures.insert(call, code);
        });
    }

    /// Make the next CPU fence wait wake at once, as a completion event left
    /// set by an earlier timed-out wait would.
    pub fn stale_wake(&self) {
        self.with_state(|s| s.stale_wakes += 1);
    }

    /// Stop or resume executing an API's queue.
    pub fn stall(&self, api: Api, stalled: bool) {
        self.with_state(|s| {
            s.queues[queue_index(api)].stalled = stalled;
            s.pump();
        });
    }

    // -- Data access ---------------------------------------------------------

    /// Queue a write of `bytes` through the API-A context.
    pub fn write_imported(&self, image: &SimImported, bytes: &[u8]) {
        let op = QueueOp::Write {
            dst: image.alloc.clone(),
            bytes: bytes.to_vec(),
        };
        self.with_state(|s| s.enqueue(Api::A, op));
    }

    /// Queue a read through the API-A context.
    pub fn read_imported(&self, image: &SimImported) -> Readback {
        let into = Readback::default();
        let op = QueueOp::Read {
            src: image.alloc.clone(),
            into: into.clone(),
        };
        self.with_state(|s| s.enqueue(Api::A, op));
        into
    }

    /// Queue a write on the API-B queue.
    pub fn write_image_on_queue(&self, image: &SimImage, bytes: &[u8]) {
        let op = QueueOp::Write {
            dst: image.alloc.clone(),
            bytes: bytes.to_vec(),
        };
        self.with_state(|s| s.enqueue(Api::B, op));
    }

    /// Queue a read on the API-B queue.
    pub fn read_image_on_queue(&self, image: &SimImage) -> Readback {
        let into = Readback::default();
        let op = QueueOp::Read {
            src: image.alloc.clone(),
            into: into.clone(),
        };
        self.with_state(|s| s.enqueue(Api::B, op));
        into
    }

    // -- Inspection ----------------------------------------------------------

    pub fn events(&self) -> Vec<SimEvent> {
        self.inner.state.lock().events.clone()
    }

    /// Only the signal and wait entries of the event log.
    pub fn fence_events(&self) -> Vec<SimEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::Signal { .. } | SimEvent::Wait { .. }))
            .collect()
    }

    pub fn live_allocations(&self) -> usize {
        self.inner.live_allocations.load(Ordering::SeqCst)
    }

    pub fn live_imports(&self) -> usize {
        self.inner.live_imports.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.inner.state.lock().handles.len()
    }

    pub fn views_created(&self) -> usize {
        self.inner.state.lock().views_created
    }

    pub fn context_flushes(&self) -> usize {
        self.inner.state.lock().context_flushes
    }

    pub fn command_lists(&self) -> usize {
        self.inner.state.lock().lists.len()
    }

    pub fn open_command_lists(&self) -> usize {
        self.inner.state.lock().lists.values().filter(|l| l.open).count()
    }

    pub fn image_desc(&self, image: &SimImage) -> ImageDesc {
        image.alloc.desc
    }

    pub fn image_flags(&self, image: &SimImage) -> ResourceFlags {
        image.alloc.flags
    }

    pub fn same_allocation(&self, image: &SimImage, imported: &SimImported) -> bool {
        Arc::ptr_eq(&image.alloc, &imported.alloc)
    }

    /// Current contents of an allocation, ignoring queue ordering.
    pub fn contents(&self, image: &SimImage) -> Vec<u8> {
        image.alloc.bytes.lock().clone()
    }

    /// Allocate an image outside any shared heap, as a swap chain does.
    pub(crate) fn allocate(&self, desc: ImageDesc, flags: ResourceFlags) -> SimImage {
        let id = self.with_state(|s| s.id());
        self.inner.live_allocations.fetch_add(1, Ordering::SeqCst);
        let size = desc.width as usize
            * desc.height as usize
            * desc.format.bytes_per_pixel().unwrap_or(4) as usize;
        SimImage {
            alloc: Arc::new(Allocation {
                id,
                desc,
                flags,
                bytes: Mutex::new(vec![0; size]),
                live: self.inner.live_allocations.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

impl Backend for SimGpu {
    type Image = SimImage;
    type Allocator = SimAllocator;
    type CommandList = SimCommandList;
    type FenceB = SimFence;

    type Device = SimDevice;
    type ImportedImage = SimImported;
    type ShaderView = SimView;
    type UnorderedView = SimView;
    type TargetView = SimView;
    type FenceA = SimFence;

    fn create_shared_image(
        &self,
        desc: &ImageDesc,
        flags: ResourceFlags,
    ) -> NativeResult<SimImage> {
        self.with_state(|s| s.check("CreateCommittedResource"))?;
        if desc.format.bytes_per_pixel().is_none() || desc.width == 0 || desc.height == 0 {
            return Err(HResult::E_INVALIDARG);
        }
        Ok(self.allocate(*desc, flags))
    }

    fn export_image(&self, image: &SimImage) -> NativeResult<SharedHandle> {
        self.with_state(|s| {
            s.check("CreateSharedHandle")?;
            s.next_handle += 1;
            s.handles
                .insert(s.next_handle, HandleTarget::Image(image.alloc.clone()));
            Ok(SharedHandle(s.next_handle))
        })
    }

    fn create_shared_fence(&self, initial_value: u64) -> NativeResult<SimFence> {
        self.with_state(|s| {
            s.check("CreateFence")?;
            let id = s.id();
            s.fences.insert(id, initial_value);
            Ok(SimFence { id })
        })
    }

    fn export_fence(&self, fence: &SimFence) -> NativeResult<SharedHandle> {
        self.with_state(|s| {
            s.check("CreateSharedHandle")?;
            s.next_handle += 1;
            s.handles.insert(s.next_handle, HandleTarget::Fence(fence.id));
            Ok(SharedHandle(s.next_handle))
        })
    }

    fn close_handle(&self, handle: SharedHandle) {
        self.with_state(|s| {
            s.handles.remove(&handle.0);
        });
    }

    fn create_command_allocator(&self) -> NativeResult<SimAllocator> {
        self.with_state(|s| {
            s.check("CreateCommandAllocator")?;
            let id = s.id();
            s.in_flight.insert(id, 0);
            Ok(SimAllocator { id })
        })
    }

    fn create_command_list(&self, allocator: &SimAllocator) -> NativeResult<SimCommandList> {
        self.with_state(|s| {
            s.check("CreateCommandList")?;
            let id = s.id();
            s.lists.insert(
                id,
                ListState {
                    allocator: allocator.id,
                    open: false,
                    ops: Vec::new(),
                },
            );
            Ok(SimCommandList { id })
        })
    }

    fn reset_command_allocator(&self, allocator: &SimAllocator) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ID3D12CommandAllocator::Reset")?;
            if s.in_flight.get(&allocator.id).copied().unwrap_or(0) > 0 {
                s.events.push(SimEvent::AllocatorResetInFlight {
                    allocator: allocator.id,
                });
                return Err(HResult::E_FAIL);
            }
            let completed = s.completed();
            s.events.push(SimEvent::ResetAllocator {
                allocator: allocator.id,
                completed,
            });
            Ok(())
        })
    }

    fn reset_command_list(&self, list: &SimCommandList, allocator: &SimAllocator) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ID3D12GraphicsCommandList::Reset")?;
            let state = s.lists.get_mut(&list.id).ok_or(HResult::E_INVALIDARG)?;
            if state.open {
                return Err(HResult::E_FAIL);
            }
            state.open = true;
            state.allocator = allocator.id;
            state.ops.clear();
            Ok(())
        })
    }

    fn close_command_list(&self, list: &SimCommandList) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ID3D12GraphicsCommandList::Close")?;
            let state = s.lists.get_mut(&list.id).ok_or(HResult::E_INVALIDARG)?;
            if !state.open {
                return Err(HResult::E_FAIL);
            }
            state.open = false;
            Ok(())
        })
    }

    fn transition(&self, list: &SimCommandList, barriers: &[Transition<'_, SimImage>]) {
        self.with_state(|s| {
            if !s.lists.get(&list.id).is_some_and(|l| l.open) {
                return;
            }
            for barrier in barriers {
                s.events.push(SimEvent::Barrier {
                    image: barrier.image.id(),
                    before: barrier.before,
                    after: barrier.after,
                });
            }
        });
    }

    fn copy_image(&self, list: &SimCommandList, dst: &SimImage, src: &SimImage) {
        self.with_state(|s| {
            let Some(state) = s.lists.get_mut(&list.id).filter(|l| l.open) else {
                return;
            };
            state.ops.push(ListOp::Copy {
                dst: dst.alloc.clone(),
                src: src.alloc.clone(),
            });
            s.events.push(SimEvent::Copy {
                dst: dst.id(),
                src: src.id(),
            });
        });
    }

    fn execute(&self, list: &SimCommandList) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ExecuteCommandLists")?;
            let state = s.lists.get_mut(&list.id).ok_or(HResult::E_INVALIDARG)?;
            if state.open {
                return Err(HResult::E_FAIL);
            }
            let allocator = state.allocator;
            let ops = std::mem::take(&mut state.ops);
            *s.in_flight.entry(allocator).or_insert(0) += 1;
            s.events.push(SimEvent::Execute { allocator });
            s.enqueue(Api::B, QueueOp::Execute { allocator, ops });
            Ok(())
        })
    }

    fn queue_signal(&self, fence: &SimFence, value: u64) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ID3D12CommandQueue::Signal")?;
            s.events.push(SimEvent::Signal { api: Api::B, value });
            s.enqueue(Api::B, QueueOp::Signal { fence: fence.id, value });
            Ok(())
        })
    }

    fn queue_wait(&self, fence: &SimFence, value: u64) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ID3D12CommandQueue::Wait")?;
            s.events.push(SimEvent::Wait { api: Api::B, value });
            s.enqueue(Api::B, QueueOp::Wait { fence: fence.id, value });
            Ok(())
        })
    }

    fn completed_value(&self, fence: &SimFence) -> u64 {
        self.inner
            .state
            .lock()
            .fences
            .get(&fence.id)
            .copied()
            .unwrap_or(0)
    }

    fn wait_for_value(&self, fence: &SimFence, value: u64, timeout: Duration) -> NativeResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        state.check("SetEventOnCompletion")?;
        if state.stale_wakes > 0 {
            state.stale_wakes -= 1;
            return Ok(true);
        }
        loop {
            if state.fences.get(&fence.id).copied().unwrap_or(0) >= value {
                return Ok(true);
            }
            if self
                .inner
                .progress
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Ok(state.fences.get(&fence.id).copied().unwrap_or(0) >= value);
            }
        }
    }

    fn device(&self) -> SimDevice {
        SimDevice(self.inner.device_id)
    }

    fn open_image(&self, handle: SharedHandle) -> NativeResult<SimImported> {
        let alloc = self.with_state(|s| {
            s.check("OpenSharedResource1")?;
            match s.handles.get(&handle.0) {
                Some(HandleTarget::Image(alloc)) => Ok(alloc.clone()),
                _ => Err(HResult::E_INVALIDARG),
            }
        })?;
        self.inner.live_imports.fetch_add(1, Ordering::SeqCst);
        Ok(SimImported {
            alloc,
            _token: Arc::new(ImportToken {
                live: self.inner.live_imports.clone(),
            }),
        })
    }

    fn create_shader_view(&self, image: &SimImported, format: Format) -> NativeResult<SimView> {
        self.create_view("CreateShaderResourceView", image, format)
    }

    fn create_unordered_view(&self, image: &SimImported, format: Format) -> NativeResult<SimView> {
        self.create_view("CreateUnorderedAccessView", image, format)
    }

    fn create_target_view(&self, image: &SimImported, format: Format) -> NativeResult<SimView> {
        self.create_view("CreateRenderTargetView", image, format)
    }

    fn open_fence(&self, handle: SharedHandle) -> NativeResult<SimFence> {
        self.with_state(|s| {
            s.check("OpenSharedFence")?;
            match s.handles.get(&handle.0) {
                Some(HandleTarget::Fence(id)) => Ok(SimFence { id: *id }),
                _ => Err(HResult::E_INVALIDARG),
            }
        })
    }

    fn context_signal(&self, fence: &SimFence, value: u64) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ID3D11DeviceContext4::Signal")?;
            s.events.push(SimEvent::Signal { api: Api::A, value });
            s.enqueue(Api::A, QueueOp::Signal { fence: fence.id, value });
            Ok(())
        })
    }

    fn context_wait(&self, fence: &SimFence, value: u64) -> NativeResult<()> {
        self.with_state(|s| {
            s.check("ID3D11DeviceContext4::Wait")?;
            s.events.push(SimEvent::Wait { api: Api::A, value });
            s.enqueue(Api::A, QueueOp::Wait { fence: fence.id, value });
            Ok(())
        })
    }

    fn context_flush(&self) {
        self.with_state(|s| s.context_flushes += 1);
    }
}

impl SimGpu {
    fn create_view(
        &self,
        call: &'static str,
        image: &SimImported,
        format: Format,
    ) -> NativeResult<SimView> {
        self.with_state(|s| {
            s.check(call)?;
            s.views_created += 1;
            Ok(SimView {
                image: image.id(),
                format,
            })
        })
    }
}
