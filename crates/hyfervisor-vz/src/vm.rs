//! Virtual machine runtime.

use crate::delegate::Delegate;
use crate::error::{VZError, VZResult};
use crate::event::{VirtualMachineEvent, VirtualMachineState};
use crate::ffi::{
    DispatchQueue, await_completion, create_completion_block, extract_nserror, release,
    release_block,
};
use crate::{msg_send_bool, msg_send_i64, msg_send_void};
use objc2::runtime::{AnyObject, Sel};
use std::ffi::c_void;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

// ============================================================================
// Virtual Machine
// ============================================================================

/// A virtual machine created from a `VirtualMachineConfiguration`.
///
/// Every message to the underlying `VZVirtualMachine` is sent on the serial
/// queue the machine was created with. Use the async methods to control the
/// VM lifecycle and [`VirtualMachine::events`] to observe it.
pub struct VirtualMachine {
    inner: *mut AnyObject,
    queue: DispatchQueue,
    delegate: Mutex<Option<Delegate>>,
}

// Safety: the VZ handle is only messaged through the dispatch queue.
unsafe impl Send for VirtualMachine {}
unsafe impl Sync for VirtualMachine {}

impl VirtualMachine {
    /// Creates a VirtualMachine from raw pointers.
    ///
    /// This is called internally by `VirtualMachineConfiguration::build()`.
    pub(crate) fn from_raw(ptr: *mut AnyObject, queue: DispatchQueue) -> Self {
        Self {
            inner: ptr,
            queue,
            delegate: Mutex::new(None),
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut AnyObject {
        self.inner
    }

    pub(crate) fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Returns the current state of the VM.
    pub fn state(&self) -> VirtualMachineState {
        let inner = self.inner;
        let raw = self.queue.sync(|| unsafe { msg_send_i64!(inner, state) });
        VirtualMachineState::from(raw)
    }

    /// Returns whether the VM can be started.
    pub fn can_start(&self) -> bool {
        self.query_bool(objc2::sel!(canStart))
    }

    /// Returns whether the VM can be stopped.
    pub fn can_stop(&self) -> bool {
        self.query_bool(objc2::sel!(canStop))
    }

    /// Returns whether the VM can be paused.
    pub fn can_pause(&self) -> bool {
        self.query_bool(objc2::sel!(canPause))
    }

    /// Returns whether the VM can be resumed.
    pub fn can_resume(&self) -> bool {
        self.query_bool(objc2::sel!(canResume))
    }

    /// Returns whether a stop can be requested.
    pub fn can_request_stop(&self) -> bool {
        self.query_bool(objc2::sel!(canRequestStop))
    }

    fn query_bool(&self, sel: Sel) -> bool {
        let inner = self.inner;
        self.queue.sync(|| unsafe {
            let func: unsafe extern "C" fn(*const AnyObject, Sel) -> objc2::runtime::Bool =
                std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);
            func(inner, sel).as_bool()
        })
    }

    fn require(&self, allowed: bool, expected: &str) -> VZResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(VZError::InvalidState {
                expected: expected.into(),
                actual: format!("state={:?}", self.state()),
            })
        }
    }

    /// Sends a `...WithCompletionHandler:` message on the queue and awaits it.
    async fn run_with_completion(&self, sel: Sel, operation: &str) -> VZResult<()> {
        let (tx, rx) = oneshot::channel();
        let block = create_completion_block(tx);

        let inner = self.inner;
        self.queue.sync(|| unsafe {
            let func: unsafe extern "C" fn(*const AnyObject, Sel, *const c_void) =
                std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);
            func(inner, sel, block);
        });
        release_block(block);

        await_completion(rx, operation).await
    }

    /// Starts the virtual machine.
    ///
    /// Completes when the framework reports the VM running, or with the
    /// error it reported.
    pub async fn start(&self) -> VZResult<()> {
        self.require(self.can_start(), "can_start=true")?;
        tracing::debug!("starting virtual machine");
        self.run_with_completion(objc2::sel!(startWithCompletionHandler:), "start")
            .await
    }

    /// Stops the virtual machine.
    ///
    /// **Warning**: This is a destructive operation. It stops the VM without
    /// giving the guest a chance to stop cleanly. Use `request_stop()` for
    /// a graceful shutdown.
    pub async fn stop(&self) -> VZResult<()> {
        self.require(self.can_stop(), "can_stop=true")?;
        tracing::debug!("stopping virtual machine");
        self.run_with_completion(objc2::sel!(stopWithCompletionHandler:), "stop")
            .await
    }

    /// Pauses the virtual machine.
    pub async fn pause(&self) -> VZResult<()> {
        self.require(self.can_pause(), "can_pause=true")?;
        self.run_with_completion(objc2::sel!(pauseWithCompletionHandler:), "pause")
            .await
    }

    /// Resumes a paused virtual machine.
    pub async fn resume(&self) -> VZResult<()> {
        self.require(self.can_resume(), "can_resume=true")?;
        self.run_with_completion(objc2::sel!(resumeWithCompletionHandler:), "resume")
            .await
    }

    /// Asks the guest OS to shut down.
    ///
    /// The guest may ignore the request. When it complies, a
    /// [`VirtualMachineEvent::GuestStopped`] event is delivered.
    pub fn request_stop(&self) -> VZResult<()> {
        self.require(self.can_request_stop(), "can_request_stop=true")?;

        let inner = self.inner;
        self.queue.sync(|| unsafe {
            let mut error: *mut AnyObject = std::ptr::null_mut();
            let result = msg_send_bool!(inner, requestStopWithError: &mut error);
            if result.as_bool() {
                Ok(())
            } else {
                Err(extract_nserror(error))
            }
        })
    }

    /// Installs a delegate and returns the stream of lifecycle events.
    ///
    /// Calling this again replaces the previous delegate; the earlier
    /// receiver then yields `None`.
    pub fn events(&self) -> VZResult<mpsc::UnboundedReceiver<VirtualMachineEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let delegate = Delegate::new(tx)?;

        let inner = self.inner;
        let object = delegate.as_ptr();
        self.queue.sync(|| unsafe {
            msg_send_void!(inner, setDelegate: object);
        });

        // The VM holds its delegate weakly.
        let mut slot = self
            .delegate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(delegate);

        Ok(rx)
    }
}

impl Drop for VirtualMachine {
    fn drop(&mut self) {
        if self.inner.is_null() {
            return;
        }

        let inner = self.inner;
        let delegate = self
            .delegate
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if delegate.is_some() {
            self.queue.sync(|| unsafe {
                msg_send_void!(inner, setDelegate: std::ptr::null_mut::<AnyObject>());
            });
        }
        drop(delegate);

        release(self.inner);
    }
}
