//! Common interface over the two native graphics APIs.
//!
//! A [`Backend`] is one API-A device/immediate-context pair and one API-B
//! device/direct-queue pair living on the same adapter. Every component of
//! this crate reaches the GPU only through this trait, which keeps the
//! ordering logic testable against the software backend in [`crate::sim`].
//!
//! API-B (explicit command lists) owns every physical allocation. API-A
//! (immediate context) only ever holds imported views of them.

use std::time::Duration;

use crate::error::NativeResult;
use crate::types::{Format, ImageDesc, ResourceFlags, Transition};

/// An OS-level handle to an exported GPU object. Closed by the importer
/// as soon as the import succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub isize);

/// The two command streams bridged by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    /// The host's immediate-context API.
    A,
    /// The explicit command-list API owning the swap chain.
    B,
}

impl Api {
    pub fn other(self) -> Self {
        match self {
            Api::A => Api::B,
            Api::B => Api::A,
        }
    }
}

pub trait Backend {
    /// API-B image; sole owner of its physical allocation.
    type Image: Clone;
    type Allocator;
    type CommandList;
    type FenceB;

    /// The host's API-A device, handed back from the facade's `GetDevice`.
    type Device: Clone;
    /// API-A view over an API-B allocation.
    type ImportedImage: Clone;
    type ShaderView;
    type UnorderedView;
    type TargetView;
    type FenceA;

    // -- API-B objects ------------------------------------------------------

    /// Allocate a committed 2D image on a shared heap.
    fn create_shared_image(&self, desc: &ImageDesc, flags: ResourceFlags)
        -> NativeResult<Self::Image>;

    fn export_image(&self, image: &Self::Image) -> NativeResult<SharedHandle>;

    fn create_shared_fence(&self, initial_value: u64) -> NativeResult<Self::FenceB>;

    fn export_fence(&self, fence: &Self::FenceB) -> NativeResult<SharedHandle>;

    fn close_handle(&self, handle: SharedHandle);

    fn create_command_allocator(&self) -> NativeResult<Self::Allocator>;

    /// Create a direct command list on `allocator`. The list is returned closed.
    fn create_command_list(&self, allocator: &Self::Allocator) -> NativeResult<Self::CommandList>;

    fn reset_command_allocator(&self, allocator: &Self::Allocator) -> NativeResult<()>;

    fn reset_command_list(
        &self,
        list: &Self::CommandList,
        allocator: &Self::Allocator,
    ) -> NativeResult<()>;

    fn close_command_list(&self, list: &Self::CommandList) -> NativeResult<()>;

    fn transition(&self, list: &Self::CommandList, barriers: &[Transition<'_, Self::Image>]);

    fn copy_image(&self, list: &Self::CommandList, dst: &Self::Image, src: &Self::Image);

    /// Submit a closed list to the direct queue.
    fn execute(&self, list: &Self::CommandList) -> NativeResult<()>;

    fn queue_signal(&self, fence: &Self::FenceB, value: u64) -> NativeResult<()>;

    fn queue_wait(&self, fence: &Self::FenceB, value: u64) -> NativeResult<()>;

    fn completed_value(&self, fence: &Self::FenceB) -> u64;

    /// Block the calling thread until `fence` reaches `value`.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first.
    fn wait_for_value(&self, fence: &Self::FenceB, value: u64, timeout: Duration)
        -> NativeResult<bool>;

    // -- API-A objects ------------------------------------------------------

    fn device(&self) -> Self::Device;

    fn open_image(&self, handle: SharedHandle) -> NativeResult<Self::ImportedImage>;

    fn create_shader_view(
        &self,
        image: &Self::ImportedImage,
        format: Format,
    ) -> NativeResult<Self::ShaderView>;

    fn create_unordered_view(
        &self,
        image: &Self::ImportedImage,
        format: Format,
    ) -> NativeResult<Self::UnorderedView>;

    fn create_target_view(
        &self,
        image: &Self::ImportedImage,
        format: Format,
    ) -> NativeResult<Self::TargetView>;

    fn open_fence(&self, handle: SharedHandle) -> NativeResult<Self::FenceA>;

    fn context_signal(&self, fence: &Self::FenceA, value: u64) -> NativeResult<()>;

    fn context_wait(&self, fence: &Self::FenceA, value: u64) -> NativeResult<()>;

    /// Push all queued immediate-context work to the GPU.
    fn context_flush(&self);
}
