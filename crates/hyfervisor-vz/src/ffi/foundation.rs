//! Foundation framework helpers (NSString, NSURL, NSArray, NSData).

use objc2::runtime::{AnyClass, AnyObject, Sel};
use std::ffi::c_void;
use std::path::Path;

use super::runtime::get_class;
use crate::{msg_send, msg_send_u64};

/// `NSUTF8StringEncoding`.
const NS_UTF8_STRING_ENCODING: u64 = 4;

// ============================================================================
// NSString
// ============================================================================

/// Creates an NSString from a Rust string.
///
/// The returned object is owned (+1). Returns null if Foundation is unavailable.
pub fn nsstring(s: &str) -> *mut AnyObject {
    let Some(cls) = get_class("NSString") else {
        return std::ptr::null_mut();
    };
    unsafe {
        let alloc = msg_send!(cls, alloc);

        let sel = objc2::sel!(initWithBytes:length:encoding:);
        let func: unsafe extern "C" fn(*mut AnyObject, Sel, *const u8, usize, u64) -> *mut AnyObject =
            std::mem::transmute(super::runtime::objc_msgSend as *const c_void);
        func(alloc, sel, s.as_ptr(), s.len(), NS_UTF8_STRING_ENCODING)
    }
}

/// Gets NSString contents as a Rust String.
pub fn nsstring_to_string(obj: *mut AnyObject) -> String {
    if obj.is_null() {
        return String::new();
    }
    unsafe {
        let sel_utf8 = objc2::sel!(UTF8String);
        let func: unsafe extern "C" fn(*const AnyObject, Sel) -> *const std::ffi::c_char =
            std::mem::transmute(super::runtime::objc_msgSend as *const c_void);
        let cstr = func(obj as *const AnyObject, sel_utf8);
        if cstr.is_null() {
            String::new()
        } else {
            std::ffi::CStr::from_ptr(cstr).to_string_lossy().into_owned()
        }
    }
}

// ============================================================================
// NSURL
// ============================================================================

/// Creates a file NSURL from a path.
///
/// Relative paths are resolved against the current directory. The returned
/// URL is retained.
pub fn nsurl_file_path(path: impl AsRef<Path>) -> *mut AnyObject {
    let path = path.as_ref();
    let abs_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let Some(cls) = get_class("NSURL") else {
        return std::ptr::null_mut();
    };
    unsafe {
        let path_str = nsstring(&abs_path.to_string_lossy());
        let url: *mut AnyObject = msg_send!(cls, fileURLWithPath: path_str);
        release(path_str);
        retain(url)
    }
}

/// Returns the file-system path of a file NSURL.
pub fn nsurl_path(url: *mut AnyObject) -> String {
    if url.is_null() {
        return String::new();
    }
    unsafe { nsstring_to_string(msg_send!(url, path)) }
}

/// Returns the absolute string of an NSURL (e.g. `https://...`).
pub fn nsurl_absolute_string(url: *mut AnyObject) -> String {
    if url.is_null() {
        return String::new();
    }
    unsafe { nsstring_to_string(msg_send!(url, absoluteString)) }
}

// ============================================================================
// NSArray
// ============================================================================

/// Creates an autoreleased NSArray from raw pointers.
pub fn nsarray(objects: &[*mut AnyObject]) -> *mut AnyObject {
    let Some(cls) = get_class("NSArray") else {
        return std::ptr::null_mut();
    };
    unsafe {
        let sel = objc2::sel!(arrayWithObjects:count:);
        let func: unsafe extern "C" fn(
            *const AnyClass,
            Sel,
            *const *mut AnyObject,
            usize,
        ) -> *mut AnyObject = std::mem::transmute(super::runtime::objc_msgSend as *const c_void);
        func(cls, sel, objects.as_ptr(), objects.len())
    }
}

// ============================================================================
// NSData
// ============================================================================

/// Creates an autoreleased NSData holding a copy of `bytes`.
pub fn nsdata(bytes: &[u8]) -> *mut AnyObject {
    let Some(cls) = get_class("NSData") else {
        return std::ptr::null_mut();
    };
    unsafe {
        let sel = objc2::sel!(dataWithBytes:length:);
        let func: unsafe extern "C" fn(*const AnyClass, Sel, *const u8, usize) -> *mut AnyObject =
            std::mem::transmute(super::runtime::objc_msgSend as *const c_void);
        func(cls, sel, bytes.as_ptr(), bytes.len())
    }
}

/// Copies the contents of an NSData into a Vec.
pub fn nsdata_to_vec(data: *mut AnyObject) -> Vec<u8> {
    if data.is_null() {
        return Vec::new();
    }
    unsafe {
        let len = msg_send_u64!(data, length) as usize;
        if len == 0 {
            return Vec::new();
        }
        let sel = objc2::sel!(bytes);
        let func: unsafe extern "C" fn(*const AnyObject, Sel) -> *const u8 =
            std::mem::transmute(super::runtime::objc_msgSend as *const c_void);
        let ptr = func(data as *const AnyObject, sel);
        if ptr.is_null() {
            return Vec::new();
        }
        std::slice::from_raw_parts(ptr, len).to_vec()
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Retains an Objective-C object.
pub fn retain(obj: *mut AnyObject) -> *mut AnyObject {
    if obj.is_null() {
        return obj;
    }
    unsafe { msg_send!(obj, retain) }
}

/// Releases an Objective-C object.
pub fn release(obj: *mut AnyObject) {
    if !obj.is_null() {
        unsafe {
            let _: *mut AnyObject = msg_send!(obj, release);
        }
    }
}

/// Owned, retained Objective-C object pointer that can cross threads.
///
/// Released on drop.
pub struct ObjectPtr(*mut AnyObject);

// Safety: Virtualization.framework objects handed across threads here are
// only messaged on the queue that owns them.
unsafe impl Send for ObjectPtr {}

impl ObjectPtr {
    /// Takes ownership of an already retained object.
    pub fn from_retained(obj: *mut AnyObject) -> Self {
        Self(obj)
    }

    /// Returns the raw pointer without giving up ownership.
    pub fn as_ptr(&self) -> *mut AnyObject {
        self.0
    }

    /// Gives up ownership and returns the raw (still retained) pointer.
    pub fn into_raw(self) -> *mut AnyObject {
        let ptr = self.0;
        std::mem::forget(self);
        ptr
    }

    /// Returns true if the pointer is nil.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl Drop for ObjectPtr {
    fn drop(&mut self) {
        release(self.0);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nsstring_roundtrip() {
        let original = "Hello, 世界! 🌍";
        let ns = nsstring(original);
        assert!(!ns.is_null());
        let back = nsstring_to_string(ns);
        assert_eq!(original, back);
        release(ns);
    }

    #[test]
    fn test_nsarray() {
        let s1 = nsstring("one");
        let s2 = nsstring("two");
        let s3 = nsstring("three");
        let array = nsarray(&[s1, s2, s3]);
        assert!(!array.is_null());
        assert_eq!(unsafe { msg_send_u64!(array, count) }, 3);
    }

    #[test]
    fn test_nsdata() {
        let bytes = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];
        let data = nsdata(&bytes);
        assert!(!data.is_null());
        assert_eq!(nsdata_to_vec(data), bytes);

        let empty = nsdata(&[]);
        assert!(nsdata_to_vec(empty).is_empty());
    }

    #[test]
    fn test_file_url() {
        let url = nsurl_file_path("/tmp/VM.bundle/Disk.img");
        assert!(!url.is_null());
        assert_eq!(nsurl_path(url), "/tmp/VM.bundle/Disk.img");
        assert_eq!(
            nsurl_absolute_string(url),
            "file:///tmp/VM.bundle/Disk.img"
        );
        release(url);
    }
}
