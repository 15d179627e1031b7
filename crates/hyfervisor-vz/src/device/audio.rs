//! Audio device configuration.

use crate::error::VZResult;
use crate::ffi::{new_object, nsarray, release};
use crate::msg_send_void;
use objc2::runtime::AnyObject;

/// Configuration for a VirtIO sound device.
pub struct AudioDeviceConfiguration {
    inner: *mut AnyObject,
}

unsafe impl Send for AudioDeviceConfiguration {}

impl AudioDeviceConfiguration {
    /// Creates a sound device wired to the host's default input and output.
    pub fn host_input_output() -> VZResult<Self> {
        let input_stream = new_object("VZVirtioSoundDeviceInputStreamConfiguration")?;
        let source = new_object("VZHostAudioInputStreamSource")?;
        let output_stream = new_object("VZVirtioSoundDeviceOutputStreamConfiguration")?;
        let sink = new_object("VZHostAudioOutputStreamSink")?;
        let obj = new_object("VZVirtioSoundDeviceConfiguration")?;

        unsafe {
            msg_send_void!(input_stream, setSource: source);
            msg_send_void!(output_stream, setSink: sink);
            let streams = nsarray(&[input_stream, output_stream]);
            msg_send_void!(obj, setStreams: streams);
        }

        for owned in [source, sink, input_stream, output_stream] {
            release(owned);
        }

        Ok(Self { inner: obj })
    }

    /// Consumes the configuration and returns the raw pointer.
    pub fn into_ptr(self) -> *mut AnyObject {
        let ptr = self.inner;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for AudioDeviceConfiguration {
    fn drop(&mut self) {
        if !self.inner.is_null() {
            release(self.inner);
        }
    }
}
