//! C-ABI wrapper around `spider-core`.
//!
//! # Overview
//! Exposes engine and request lifecycle plus both raw-bytes calling
//! conventions through `extern "C"` functions, so any language with a C FFI
//! can run requests without linking to Rust's async runtime directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Each `FfiSpider` owns a multi-threaded tokio runtime; the callback
//!   convention spawns onto it, the blocking convention drives the same
//!   pipeline to completion with `block_on`.
//! - A single `FfiResult` envelope conveys bodies and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `spider_*_free` function to release them. Performing a request consumes
//!   the `FfiRequest` handle.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use spider_core::{HttpRequest, Spider};

use types::*;

/// Read a nullable C string; null or invalid UTF-8 reads as empty.
unsafe fn c_str<'a>(s: *const c_char) -> &'a str {
    if s.is_null() {
        return "";
    }
    unsafe { CStr::from_ptr(s) }.to_str().unwrap_or("")
}

// ---------------------------------------------------------------------------
// Engine lifecycle
// ---------------------------------------------------------------------------

/// Create a new engine with its own runtime.
///
/// Returns null if the runtime cannot be started or an internal panic occurs.
/// The caller must free the returned pointer with `spider_engine_free`.
#[unsafe(no_mangle)]
pub extern "C" fn spider_engine_new() -> *mut FfiSpider {
    catch_unwind(|| {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(_) => return std::ptr::null_mut(),
        };
        let inner = Spider::new().with_runtime(runtime.handle().clone());
        Box::into_raw(Box::new(FfiSpider { runtime, inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free an engine created by `spider_engine_new`. Safe to call with null.
///
/// Requests still in flight are cancelled with the runtime. Each of their
/// callbacks still fires once, with `TransportFailure`, possibly after this
/// function returns.
#[unsafe(no_mangle)]
pub extern "C" fn spider_engine_free(engine: *mut FfiSpider) {
    if !engine.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let engine = unsafe { Box::from_raw(engine) };
            engine.runtime.shutdown_background();
        }));
    }
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Build a validated request.
///
/// `headers` may be null when `headers_len` is 0; `body` may be null for no
/// body. All inputs are copied. On failure returns null and, if `error` is
/// non-null, writes `InvalidUrl`, `NullArg` or `Panic` into it.
/// The caller must free the returned pointer with `spider_request_free`
/// unless it is passed to a perform function.
#[unsafe(no_mangle)]
pub extern "C" fn spider_request_new(
    url: *const c_char,
    method: FfiHttpMethod,
    headers: *const FfiHeader,
    headers_len: u32,
    body: *const u8,
    body_len: usize,
    error: *mut FfiErrorCode,
) -> *mut FfiRequest {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if url.is_null() || (headers.is_null() && headers_len > 0) {
            return Err(FfiErrorCode::NullArg);
        }
        let mut builder = HttpRequest::builder(unsafe { c_str(url) }).method(method.into());
        if headers_len > 0 {
            let headers = unsafe { std::slice::from_raw_parts(headers, headers_len as usize) };
            for header in headers {
                builder = builder.header(unsafe { c_str(header.key) }, unsafe {
                    c_str(header.value)
                });
            }
        }
        if !body.is_null() {
            let body = unsafe { std::slice::from_raw_parts(body, body_len) };
            builder = builder.body(body.to_vec());
        }
        builder
            .build()
            .map_err(|err| FfiErrorCode::from(err.kind()))
    }))
    .unwrap_or(Err(FfiErrorCode::Panic));

    let (request, code) = match outcome {
        Ok(inner) => (
            Box::into_raw(Box::new(FfiRequest { inner })),
            FfiErrorCode::Ok,
        ),
        Err(code) => (std::ptr::null_mut(), code),
    };
    if !error.is_null() {
        unsafe { *error = code };
    }
    request
}

/// Free a request created by `spider_request_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn spider_request_free(request: *mut FfiRequest) {
    if !request.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(request) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Perform
// ---------------------------------------------------------------------------

/// Run `request` and deliver the result to `callback` once it completes.
///
/// Returns immediately. Consumes `request` whenever `engine` and `callback`
/// are non-null; do not free it afterwards. Returns `NullArg` without
/// dispatching if any required argument is null.
#[unsafe(no_mangle)]
pub extern "C" fn spider_perform_request(
    engine: *const FfiSpider,
    request: *mut FfiRequest,
    logging: bool,
    callback: Option<FfiCompletion>,
    user_data: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(callback) = callback else {
            return FfiErrorCode::NullArg;
        };
        if engine.is_null() || request.is_null() {
            return FfiErrorCode::NullArg;
        }
        let engine = unsafe { &*engine };
        let request = unsafe { Box::from_raw(request) };
        let user_data = UserData(user_data);
        engine
            .inner
            .perform_request_with(request.inner, logging, move |result| {
                callback(FfiResult::from_core(result), user_data.into_raw());
            });
        FfiErrorCode::Ok
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Run `request` and block the calling thread until it completes.
///
/// Consumes `request` whenever `engine` is non-null. Must not be called from
/// inside a callback delivered by `spider_perform_request`.
/// The caller must free the result with `spider_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn spider_perform_request_blocking(
    engine: *const FfiSpider,
    request: *mut FfiRequest,
    logging: bool,
) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if engine.is_null() {
            return FfiResult::null_arg("engine");
        }
        if request.is_null() {
            return FfiResult::null_arg("request");
        }
        let engine = unsafe { &*engine };
        let request = unsafe { Box::from_raw(request) };
        let result = engine
            .runtime
            .block_on(engine.inner.perform_request(request.inner, logging));
        FfiResult::from_core(result)
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in spider_perform_request_blocking"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiResult` and everything it owns. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn spider_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { std::ffi::CString::from_raw(result.error_message) });
        }
        if !result.data.is_null() && result.data_len > 0 {
            drop(unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    result.data,
                    result.data_len,
                ))
            });
        }
    });
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
