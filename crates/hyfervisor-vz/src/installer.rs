//! macOS installation through `VZMacOSInstaller`.

use crate::error::{VZError, VZResult};
use crate::ffi::{
    create_completion_block, nsurl_file_path, release, release_block, require_class,
};
use crate::vm::VirtualMachine;
use crate::{msg_send, msg_send_f64};
use objc2::runtime::{AnyObject, Sel};
use std::ffi::c_void;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Duration;
use tokio::sync::oneshot;

/// How often installation progress is sampled.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Installs macOS from a restore image onto a virtual machine.
///
/// The installer borrows the VM: the VM must be stopped when installation
/// starts and is stopped again when it finishes.
pub struct MacOSInstaller<'vm> {
    inner: *mut AnyObject,
    vm: &'vm VirtualMachine,
}

unsafe impl Send for MacOSInstaller<'_> {}
unsafe impl Sync for MacOSInstaller<'_> {}

impl<'vm> MacOSInstaller<'vm> {
    /// Creates an installer for `vm` using the local restore image at
    /// `restore_image_path`.
    pub fn new(vm: &'vm VirtualMachine, restore_image_path: impl AsRef<Path>) -> VZResult<Self> {
        let path = restore_image_path.as_ref();
        if !path.exists() {
            return Err(VZError::NotFound(format!(
                "restore image {}",
                path.display()
            )));
        }

        let cls = require_class("VZMacOSInstaller")?;
        let url = nsurl_file_path(path);
        let vm_ptr = vm.as_ptr();

        // The initializer raises if the VM configuration does not match the image.
        let created = vm.queue().sync(|| unsafe {
            objc2::exception::catch(AssertUnwindSafe(|| {
                let alloc = msg_send!(cls, alloc);
                msg_send!(alloc, initWithVirtualMachine: vm_ptr, restoreImageURL: url)
            }))
        });
        release(url);

        let inner = created.map_err(|exception| VZError::Internal {
            code: -2,
            message: format!("VZMacOSInstaller raised: {exception:?}"),
        })?;
        if inner.is_null() {
            return Err(VZError::internal("Failed to create VZMacOSInstaller"));
        }

        Ok(Self { inner, vm })
    }

    /// Returns the fraction of the installation completed, `0.0..=1.0`.
    pub fn fraction_completed(&self) -> f64 {
        let inner = self.inner;
        self.vm.queue().sync(|| unsafe {
            let progress = msg_send!(inner, progress);
            if progress.is_null() {
                0.0
            } else {
                msg_send_f64!(progress, fractionCompleted)
            }
        })
    }

    /// Runs the installation to completion.
    ///
    /// `on_progress` is called with the completed fraction roughly every
    /// 500ms while the install runs, and once more with the final value.
    pub async fn install<F>(&self, mut on_progress: F) -> VZResult<()>
    where
        F: FnMut(f64),
    {
        let (tx, mut rx) = oneshot::channel();
        let block = create_completion_block(tx);

        let inner = self.inner;
        self.vm.queue().sync(|| unsafe {
            let sel = objc2::sel!(installWithCompletionHandler:);
            let func: unsafe extern "C" fn(*const AnyObject, Sel, *const c_void) =
                std::mem::transmute(crate::ffi::runtime::objc_msgSend as *const c_void);
            func(inner, sel, block);
        });
        release_block(block);
        tracing::info!("macOS installation started");

        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        let mut last_reported = -1.0_f64;
        let result = loop {
            tokio::select! {
                result = &mut rx => {
                    break result
                        .map_err(|_| {
                            VZError::Cancelled("install completion handler was dropped".into())
                        })
                        .and_then(|outcome| outcome);
                }
                _ = ticker.tick() => {
                    let fraction = self.fraction_completed();
                    if fraction > last_reported {
                        last_reported = fraction;
                        on_progress(fraction);
                    }
                }
            }
        };

        if result.is_ok() {
            on_progress(self.fraction_completed().max(last_reported));
            tracing::info!("macOS installation finished");
        }
        result
    }
}

impl Drop for MacOSInstaller<'_> {
    fn drop(&mut self) {
        release(self.inner);
    }
}
