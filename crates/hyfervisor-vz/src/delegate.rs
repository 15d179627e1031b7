//! VZVirtualMachineDelegate implementation.
//!
//! The framework reports guest shutdown, unexpected stops and network
//! attachment loss through a delegate object. This module registers a
//! dynamically created Objective-C class whose instances forward those
//! callbacks into a `tokio` channel looked up by handle.

use objc2::runtime::{AnyClass, AnyObject, Bool, Sel};
use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_void};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tokio::sync::mpsc;

use crate::error::{VZError, VZResult};
use crate::event::VirtualMachineEvent;
use crate::ffi::{nserror_parts, release};
use crate::msg_send;

// ============================================================================
// FFI Declarations
// ============================================================================

unsafe extern "C" {
    fn objc_getClass(name: *const c_char) -> *const AnyClass;
    fn objc_getProtocol(name: *const c_char) -> *const c_void;
    fn objc_allocateClassPair(
        superclass: *const AnyClass,
        name: *const c_char,
        extra_bytes: usize,
    ) -> *mut AnyClass;
    fn objc_registerClassPair(cls: *mut AnyClass);
    fn class_addMethod(
        cls: *mut AnyClass,
        sel: Sel,
        imp: *const c_void,
        types: *const c_char,
    ) -> Bool;
    fn class_addIvar(
        cls: *mut AnyClass,
        name: *const c_char,
        size: usize,
        alignment: u8,
        types: *const c_char,
    ) -> Bool;
    fn class_addProtocol(cls: *mut AnyClass, protocol: *const c_void) -> Bool;
    fn object_getInstanceVariable(
        obj: *mut AnyObject,
        name: *const c_char,
        out_value: *mut *mut c_void,
    ) -> *mut c_void;
    fn object_setInstanceVariable(
        obj: *mut AnyObject,
        name: *const c_char,
        value: *mut c_void,
    ) -> *mut c_void;
}

// ============================================================================
// Event Registry
// ============================================================================

/// Handle identifying one delegate's event channel.
pub type DelegateHandle = u64;

static EVENT_REGISTRY: OnceLock<Mutex<HashMap<DelegateHandle, mpsc::UnboundedSender<VirtualMachineEvent>>>> =
    OnceLock::new();

/// Handle 0 marks a delegate without a channel.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn registry() -> MutexGuard<'static, HashMap<DelegateHandle, mpsc::UnboundedSender<VirtualMachineEvent>>> {
    EVENT_REGISTRY
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn register_channel(sender: mpsc::UnboundedSender<VirtualMachineEvent>) -> DelegateHandle {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    registry().insert(handle, sender);
    handle
}

fn unregister_channel(handle: DelegateHandle) {
    registry().remove(&handle);
}

fn dispatch_event(handle: DelegateHandle, event: VirtualMachineEvent) {
    let registry = registry();
    match registry.get(&handle) {
        Some(sender) => {
            if sender.send(event).is_err() {
                tracing::debug!("event receiver for delegate {} is gone", handle);
            }
        }
        None => tracing::warn!("delegate handle {} not found in registry", handle),
    }
}

// ============================================================================
// Delegate Class
// ============================================================================

struct ClassPtr(*const AnyClass);

// Safety: the class is registered once and never modified afterwards.
unsafe impl Send for ClassPtr {}
unsafe impl Sync for ClassPtr {}

static DELEGATE_CLASS: OnceLock<Option<ClassPtr>> = OnceLock::new();

const CLASS_NAME: &CStr = c"HyfervisorDelegate";
const HANDLE_IVAR: &CStr = c"_eventHandle";

fn delegate_class() -> VZResult<*const AnyClass> {
    DELEGATE_CLASS
        .get_or_init(|| unsafe { create_delegate_class() }.map(ClassPtr))
        .as_ref()
        .map(|cls| cls.0)
        .ok_or_else(|| VZError::internal("Failed to register HyfervisorDelegate class"))
}

unsafe fn create_delegate_class() -> Option<*const AnyClass> {
    unsafe {
        let superclass = objc_getClass(c"NSObject".as_ptr());
        if superclass.is_null() {
            return None;
        }

        let new_class = objc_allocateClassPair(superclass, CLASS_NAME.as_ptr(), 0);
        if new_class.is_null() {
            // Already registered, e.g. by another copy of this library.
            let existing = objc_getClass(CLASS_NAME.as_ptr());
            if existing.is_null() {
                tracing::error!("failed to allocate delegate class");
                return None;
            }
            tracing::debug!("delegate class already exists, reusing");
            return Some(existing);
        }

        let added = class_addIvar(
            new_class,
            HANDLE_IVAR.as_ptr(),
            std::mem::size_of::<DelegateHandle>(),
            std::mem::align_of::<DelegateHandle>().trailing_zeros() as u8,
            c"Q".as_ptr(),
        );
        if !added.as_bool() {
            tracing::error!("failed to add handle ivar to delegate class");
            return None;
        }

        let methods: [(Sel, *const c_void, &CStr); 3] = [
            (
                objc2::sel!(guestDidStopVirtualMachine:),
                guest_did_stop as *const c_void,
                c"v@:@",
            ),
            (
                objc2::sel!(virtualMachine:didStopWithError:),
                did_stop_with_error as *const c_void,
                c"v@:@@",
            ),
            (
                objc2::sel!(virtualMachine:networkDevice:attachmentWasDisconnectedWithError:),
                attachment_was_disconnected as *const c_void,
                c"v@:@@@",
            ),
        ];
        for (sel, imp, types) in methods {
            if !class_addMethod(new_class, sel, imp, types.as_ptr()).as_bool() {
                tracing::error!("failed to add delegate method {:?}", sel);
                return None;
            }
        }

        let protocol = objc_getProtocol(c"VZVirtualMachineDelegate".as_ptr());
        if !protocol.is_null() {
            class_addProtocol(new_class, protocol);
        }

        objc_registerClassPair(new_class);
        tracing::debug!("registered delegate class HyfervisorDelegate");

        Some(new_class as *const AnyClass)
    }
}

unsafe fn handle_of(this: *mut AnyObject) -> DelegateHandle {
    let mut value: *mut c_void = std::ptr::null_mut();
    unsafe {
        object_getInstanceVariable(this, HANDLE_IVAR.as_ptr(), &mut value);
    }
    value as DelegateHandle
}

unsafe extern "C" fn guest_did_stop(this: *mut AnyObject, _cmd: Sel, _vm: *mut AnyObject) {
    let handle = unsafe { handle_of(this) };
    tracing::info!("guest did stop virtual machine");
    dispatch_event(handle, VirtualMachineEvent::GuestStopped);
}

unsafe extern "C" fn did_stop_with_error(
    this: *mut AnyObject,
    _cmd: Sel,
    _vm: *mut AnyObject,
    error: *mut AnyObject,
) {
    let handle = unsafe { handle_of(this) };
    let (code, message) = nserror_parts(error);
    tracing::error!("virtual machine did stop with error {}: {}", code, message);
    dispatch_event(handle, VirtualMachineEvent::StoppedWithError { code, message });
}

unsafe extern "C" fn attachment_was_disconnected(
    this: *mut AnyObject,
    _cmd: Sel,
    _vm: *mut AnyObject,
    _device: *mut AnyObject,
    error: *mut AnyObject,
) {
    let handle = unsafe { handle_of(this) };
    let (code, message) = nserror_parts(error);
    tracing::warn!("network attachment was disconnected {}: {}", code, message);
    dispatch_event(
        handle,
        VirtualMachineEvent::NetworkAttachmentDisconnected { code, message },
    );
}

// ============================================================================
// Delegate Instance
// ============================================================================

/// A delegate instance bound to an event channel.
///
/// Dropping it unregisters the channel and releases the object. The VM must
/// no longer reference the delegate by then.
pub(crate) struct Delegate {
    handle: DelegateHandle,
    object: *mut AnyObject,
}

unsafe impl Send for Delegate {}

impl Delegate {
    /// Creates a delegate that forwards callbacks to `sender`.
    pub(crate) fn new(sender: mpsc::UnboundedSender<VirtualMachineEvent>) -> VZResult<Self> {
        let cls = delegate_class()?;
        let object = unsafe {
            let alloc = msg_send!(cls, alloc);
            msg_send!(alloc, init)
        };
        if object.is_null() {
            return Err(VZError::internal("Failed to create delegate instance"));
        }

        let handle = register_channel(sender);
        unsafe {
            object_setInstanceVariable(object, HANDLE_IVAR.as_ptr(), handle as *mut c_void);
        }
        tracing::debug!("created delegate {:?} with handle {}", object, handle);

        Ok(Self { handle, object })
    }

    pub(crate) fn as_ptr(&self) -> *mut AnyObject {
        self.object
    }
}

impl Drop for Delegate {
    fn drop(&mut self) {
        unregister_channel(self.handle);
        release(self.object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_routes_events_by_handle() {
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = register_channel(tx_a);
        let b = register_channel(tx_b);
        assert_ne!(a, b);

        dispatch_event(a, VirtualMachineEvent::GuestStopped);
        assert_eq!(rx_a.try_recv().ok(), Some(VirtualMachineEvent::GuestStopped));
        assert!(rx_b.try_recv().is_err());

        unregister_channel(a);
        dispatch_event(a, VirtualMachineEvent::GuestStopped);
        assert!(rx_a.try_recv().is_err());

        unregister_channel(b);
    }

    #[test]
    fn test_delegate_instance() {
        if !crate::is_supported() {
            return;
        }
        let (tx, _rx) = mpsc::unbounded_channel();
        let delegate = Delegate::new(tx).unwrap();
        assert!(!delegate.as_ptr().is_null());
        assert_eq!(unsafe { handle_of(delegate.as_ptr()) }, delegate.handle);
    }
}
