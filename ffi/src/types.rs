//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Opaque handles wrap the core engine and request descriptor; everything the
//! C side reads directly is a tagged, C-compatible struct. Conversion
//! functions live here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use spider_core::{ErrorKind, HttpMethod, SpiderError};

/// Opaque handle to an engine plus the runtime its requests run on.
pub struct FfiSpider {
    pub(crate) runtime: tokio::runtime::Runtime,
    pub(crate) inner: spider_core::Spider,
}

/// Opaque handle to a validated request descriptor.
pub struct FfiRequest {
    pub(crate) inner: spider_core::HttpRequest,
}

// ---------------------------------------------------------------------------
// Request input
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
    Head = 5,
    Options = 6,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Patch => HttpMethod::Patch,
            FfiHttpMethod::Delete => HttpMethod::Delete,
            FfiHttpMethod::Head => HttpMethod::Head,
            FfiHttpMethod::Options => HttpMethod::Options,
        }
    }
}

/// A single header as a pair of caller-owned C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *const c_char,
    pub value: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiResult` and by `spider_request_new`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidUrl = 1,
    TransportFailure = 2,
    DecodingFailed = 3,
    NullArg = 4,
    Panic = 5,
}

impl From<ErrorKind> for FfiErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidUrl => FfiErrorCode::InvalidUrl,
            ErrorKind::TransportFailure => FfiErrorCode::TransportFailure,
            ErrorKind::DecodingFailed => FfiErrorCode::DecodingFailed,
        }
    }
}

/// Completion callback for `spider_perform_request`.
///
/// Invoked exactly once, on a runtime thread. The callee owns `result` and
/// must release it with `spider_free_result`.
pub type FfiCompletion = extern "C" fn(result: *mut FfiResult, user_data: *mut c_void);

/// Result envelope for every perform operation.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data` /
/// `data_len` hold the response body (`data` is null when the body is
/// empty). On failure `error_code` names the category, `error_message` is a
/// human-readable C string, `http_status` is set for non-2xx responses, and
/// `data` is null.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data: *mut u8,
    pub data_len: usize,
}

impl FfiResult {
    pub(crate) fn from_core(result: Result<impl AsRef<[u8]>, SpiderError>) -> *mut Self {
        match result {
            Ok(body) => Self::ok_bytes(body.as_ref()),
            Err(err) => Self::from_error(&err),
        }
    }

    /// Build a success result owning a copy of `body`.
    pub(crate) fn ok_bytes(body: &[u8]) -> *mut Self {
        let (data, data_len) = if body.is_empty() {
            (std::ptr::null_mut(), 0)
        } else {
            let boxed: Box<[u8]> = body.into();
            let len = boxed.len();
            (Box::into_raw(boxed) as *mut u8, len)
        };
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data,
            data_len,
        }))
    }

    pub(crate) fn from_error(err: &SpiderError) -> *mut Self {
        Self::error(
            err.kind().into(),
            &err.to_string(),
            err.status().unwrap_or(0),
        )
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, &format!("null argument: {name}"), 0)
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg, 0)
    }

    fn error(error_code: FfiErrorCode, msg: &str, http_status: u16) -> *mut Self {
        // Interior NULs cannot cross into C; drop them rather than lose the message.
        let message = CString::new(msg.replace('\0', "")).unwrap_or_default();
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message: message.into_raw(),
            http_status,
            data: std::ptr::null_mut(),
            data_len: 0,
        }))
    }
}

/// `user_data` travels to a runtime thread and back to the C callback.
/// The C caller guarantees it is safe to use from that thread.
pub(crate) struct UserData(pub(crate) *mut c_void);

unsafe impl Send for UserData {}

impl UserData {
    pub(crate) fn into_raw(self) -> *mut c_void {
        self.0
    }
}
