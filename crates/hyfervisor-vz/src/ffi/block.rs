//! Objective-C Block handling for completion handlers.
//!
//! Virtualization.framework reports the outcome of asynchronous operations
//! through completion-handler blocks. The blocks built here capture a boxed
//! `tokio::sync::oneshot::Sender`, so that an `async fn` can simply await the
//! matching receiver.
//!
//! # Block ABI
//!
//! Blocks in Objective-C have a specific ABI. A block with captured variables
//! has the following layout:
//!
//! ```text
//! struct Block {
//!     isa: *const c_void,           // Class pointer (_NSConcreteStackBlock or _NSConcreteMallocBlock)
//!     flags: i32,                   // Block flags
//!     reserved: i32,                // Reserved
//!     invoke: fn(*const Block, ...), // Invoke function
//!     descriptor: *const Descriptor, // Block descriptor
//!     // Captured variables follow...
//! }
//! ```
//!
//! Two handler shapes are supported:
//!
//! - `^(NSError *error)`: start/stop/pause/resume, macOS installation.
//! - `^(id object, NSError *error)`: restore image loading and fetching.

use objc2::runtime::AnyObject;
use std::ffi::c_void;
use std::ptr;
use tokio::sync::oneshot;

use super::foundation::{retain, ObjectPtr};
use super::nserror_parts;
use crate::error::{VZError, VZResult};

// ============================================================================
// Block Flags
// ============================================================================

/// Block has copy/dispose helpers.
const BLOCK_HAS_COPY_DISPOSE: i32 = 1 << 25;

// ============================================================================
// Block ABI Structures
// ============================================================================

/// Block descriptor structure with copy/dispose helpers.
#[repr(C)]
pub struct BlockDescriptorWithHelpers {
    /// Reserved field.
    pub reserved: u64,
    /// Size of the block.
    pub size: u64,
    /// Copy helper function.
    pub copy_helper: unsafe extern "C" fn(*mut c_void, *const c_void),
    /// Dispose helper function.
    pub dispose_helper: unsafe extern "C" fn(*mut c_void),
}

/// Block for `^(NSError *)` handlers carrying a result sender.
#[repr(C)]
pub struct ErrorContextBlock {
    /// ISA pointer.
    pub isa: *const c_void,
    /// Block flags.
    pub flags: i32,
    /// Reserved.
    pub reserved: i32,
    /// Invoke function pointer.
    pub invoke: unsafe extern "C" fn(*mut ErrorContextBlock, *mut AnyObject),
    /// Block descriptor.
    pub descriptor: *const BlockDescriptorWithHelpers,
    /// Captured context: raw pointer to `Box<oneshot::Sender<VZResult<()>>>`.
    pub sender_ptr: *mut c_void,
}

/// Block for `^(id, NSError *)` handlers carrying a result sender.
#[repr(C)]
pub struct ObjectContextBlock {
    /// ISA pointer.
    pub isa: *const c_void,
    /// Block flags.
    pub flags: i32,
    /// Reserved.
    pub reserved: i32,
    /// Invoke function pointer.
    pub invoke: unsafe extern "C" fn(*mut ObjectContextBlock, *mut AnyObject, *mut AnyObject),
    /// Block descriptor.
    pub descriptor: *const BlockDescriptorWithHelpers,
    /// Captured context: raw pointer to `Box<oneshot::Sender<VZResult<ObjectPtr>>>`.
    pub sender_ptr: *mut c_void,
}

/// Sender type captured by [`ErrorContextBlock`].
pub type CompletionSender = oneshot::Sender<VZResult<()>>;

/// Sender type captured by [`ObjectContextBlock`].
pub type ObjectSender = oneshot::Sender<VZResult<ObjectPtr>>;

// ============================================================================
// Error-only completion
// ============================================================================

static ERROR_CONTEXT_BLOCK_DESCRIPTOR: BlockDescriptorWithHelpers = BlockDescriptorWithHelpers {
    reserved: 0,
    size: std::mem::size_of::<ErrorContextBlock>() as u64,
    copy_helper: block_copy_noop,
    dispose_helper: error_block_dispose,
};

/// Copy helper shared by both block shapes.
///
/// The captured sender is a raw pointer; ownership moves with the block.
unsafe extern "C" fn block_copy_noop(_dst: *mut c_void, _src: *const c_void) {}

unsafe extern "C" fn error_block_dispose(block: *mut c_void) {
    unsafe {
        let block = block as *mut ErrorContextBlock;
        let sender_ptr = (*block).sender_ptr;
        if !sender_ptr.is_null() {
            drop(Box::from_raw(sender_ptr as *mut CompletionSender));
        }
    }
}

unsafe extern "C" fn error_block_invoke(block: *mut ErrorContextBlock, error: *mut AnyObject) {
    unsafe {
        let sender_ptr = (*block).sender_ptr;
        if sender_ptr.is_null() {
            tracing::warn!("completion handler invoked more than once");
            return;
        }
        let sender = Box::from_raw(sender_ptr as *mut CompletionSender);
        (*block).sender_ptr = ptr::null_mut();

        let result = if error.is_null() {
            Ok(())
        } else {
            let (code, message) = nserror_parts(error);
            tracing::debug!("completion handler reported error {}: {}", code, message);
            Err(VZError::Internal { code, message })
        };

        // Receiver may be gone if the caller stopped waiting.
        let _ = sender.send(result);
    }
}

/// Creates a heap `^(NSError *)` block that reports through `sender`.
///
/// The caller owns one reference to the returned block and must pass it to
/// [`release_block`] after handing it to the framework.
pub fn create_completion_block(sender: CompletionSender) -> *const c_void {
    let sender_ptr = Box::into_raw(Box::new(sender)) as *mut c_void;

    unsafe {
        let stack_block = ErrorContextBlock {
            isa: _NSConcreteStackBlock,
            flags: BLOCK_HAS_COPY_DISPOSE,
            reserved: 0,
            invoke: error_block_invoke,
            descriptor: &ERROR_CONTEXT_BLOCK_DESCRIPTOR,
            sender_ptr,
        };

        _Block_copy(&stack_block as *const ErrorContextBlock as *const c_void)
    }
}

// ============================================================================
// Object + error completion
// ============================================================================

static OBJECT_CONTEXT_BLOCK_DESCRIPTOR: BlockDescriptorWithHelpers = BlockDescriptorWithHelpers {
    reserved: 0,
    size: std::mem::size_of::<ObjectContextBlock>() as u64,
    copy_helper: block_copy_noop,
    dispose_helper: object_block_dispose,
};

unsafe extern "C" fn object_block_dispose(block: *mut c_void) {
    unsafe {
        let block = block as *mut ObjectContextBlock;
        let sender_ptr = (*block).sender_ptr;
        if !sender_ptr.is_null() {
            drop(Box::from_raw(sender_ptr as *mut ObjectSender));
        }
    }
}

unsafe extern "C" fn object_block_invoke(
    block: *mut ObjectContextBlock,
    object: *mut AnyObject,
    error: *mut AnyObject,
) {
    unsafe {
        let sender_ptr = (*block).sender_ptr;
        if sender_ptr.is_null() {
            tracing::warn!("completion handler invoked more than once");
            return;
        }
        let sender = Box::from_raw(sender_ptr as *mut ObjectSender);
        (*block).sender_ptr = ptr::null_mut();

        let result = if !error.is_null() {
            let (code, message) = nserror_parts(error);
            tracing::debug!("completion handler reported error {}: {}", code, message);
            Err(VZError::Internal { code, message })
        } else if object.is_null() {
            Err(VZError::internal("completion handler returned neither object nor error"))
        } else {
            // The framework only guarantees the object for the handler's duration.
            Ok(ObjectPtr::from_retained(retain(object)))
        };

        let _ = sender.send(result);
    }
}

/// Creates a heap `^(id, NSError *)` block that reports through `sender`.
///
/// The caller owns one reference to the returned block and must pass it to
/// [`release_block`] after handing it to the framework.
pub fn create_object_completion_block(sender: ObjectSender) -> *const c_void {
    let sender_ptr = Box::into_raw(Box::new(sender)) as *mut c_void;

    unsafe {
        let stack_block = ObjectContextBlock {
            isa: _NSConcreteStackBlock,
            flags: BLOCK_HAS_COPY_DISPOSE,
            reserved: 0,
            invoke: object_block_invoke,
            descriptor: &OBJECT_CONTEXT_BLOCK_DESCRIPTOR,
            sender_ptr,
        };

        _Block_copy(&stack_block as *const ObjectContextBlock as *const c_void)
    }
}

/// Awaits a completion receiver, mapping a dropped sender to `Cancelled`.
pub async fn await_completion<T>(
    rx: oneshot::Receiver<VZResult<T>>,
    operation: &str,
) -> VZResult<T> {
    rx.await
        .map_err(|_| VZError::Cancelled(format!("{operation} completion handler was dropped")))?
}

// ============================================================================
// Block Runtime FFI
// ============================================================================

unsafe extern "C" {
    /// Global block ISA for stack blocks.
    pub static _NSConcreteStackBlock: *const c_void;

    /// Copy a block to the heap.
    pub fn _Block_copy(block: *const c_void) -> *const c_void;

    /// Release a block.
    pub fn _Block_release(block: *const c_void);
}

/// Drops the caller's reference to a heap block.
pub fn release_block(block: *const c_void) {
    if !block.is_null() {
        unsafe { _Block_release(block) }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Calls the block's invoke pointer the way the framework would.
    unsafe fn invoke_error_block(block: *const c_void, error: *mut AnyObject) {
        unsafe {
            let block = block as *mut ErrorContextBlock;
            ((*block).invoke)(block, error);
        }
    }

    #[tokio::test]
    async fn test_completion_block_success() {
        let (tx, rx) = oneshot::channel();
        let block = create_completion_block(tx);
        unsafe { invoke_error_block(block, ptr::null_mut()) };
        release_block(block);

        assert_eq!(await_completion(rx, "test").await, Ok(()));
    }

    #[tokio::test]
    async fn test_completion_block_dropped_without_invoke() {
        let (tx, rx) = oneshot::channel();
        let block = create_completion_block(tx);
        release_block(block);

        let result = await_completion(rx, "start").await;
        assert!(matches!(result, Err(VZError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_object_block_nil_object() {
        let (tx, rx) = oneshot::channel();
        let block = create_object_completion_block(tx);
        unsafe {
            let b = block as *mut ObjectContextBlock;
            ((*b).invoke)(b, ptr::null_mut(), ptr::null_mut());
        }
        release_block(block);

        let result = await_completion(rx, "load").await;
        assert!(matches!(result, Err(VZError::Internal { code: -1, .. })));
    }
}
