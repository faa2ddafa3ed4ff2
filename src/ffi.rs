//! FFI bindings for Synheart Drowsiness
//!
//! This module provides C-compatible functions for calling the detector from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using
//! `drowsy_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::ProcessorConfig;
use crate::pipeline::{analyze_frames, DrowsinessProcessor};
use crate::schema::FrameAdapter;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Config from an optional TOML string; NULL means defaults
unsafe fn config_from_ptr(config_toml: *const c_char) -> Result<ProcessorConfig, String> {
    if config_toml.is_null() {
        return Ok(ProcessorConfig::default());
    }
    let raw = cstr_to_string(config_toml).ok_or("Invalid config string pointer")?;
    let config = ProcessorConfig::from_toml(&raw).map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze a batch of landmark frames (NDJSON) and return
/// `{"reports": [...], "summary": {...}}`.
///
/// # Safety
/// - `frames_ndjson` must be a valid null-terminated C string.
/// - `config_toml` may be NULL (defaults) or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `drowsy_free_string`.
/// - Returns NULL on error; call `drowsy_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn drowsy_analyze_frames(
    frames_ndjson: *const c_char,
    config_toml: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let input = match cstr_to_string(frames_ndjson) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frames string pointer");
            return ptr::null_mut();
        }
    };

    let config = match config_from_ptr(config_toml) {
        Ok(c) => c,
        Err(e) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
    };

    let result = FrameAdapter::parse_ndjson(&input)
        .and_then(|frames| analyze_frames(&frames, &config))
        .and_then(|(reports, summary)| {
            let payload = serde_json::json!({ "reports": reports, "summary": summary });
            Ok(serde_json::to_string(&payload)?)
        });

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a DrowsinessProcessor
pub struct DrowsyProcessorHandle {
    processor: DrowsinessProcessor,
}

/// Create a new processor.
///
/// # Safety
/// - `config_toml` may be NULL (defaults) or a valid null-terminated C string.
/// - Must be freed with `drowsy_processor_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn drowsy_processor_new(
    config_toml: *const c_char,
) -> *mut DrowsyProcessorHandle {
    clear_last_error();

    match config_from_ptr(config_toml) {
        Ok(config) => {
            let handle = Box::new(DrowsyProcessorHandle {
                processor: DrowsinessProcessor::from_config(&config),
            });
            Box::into_raw(handle)
        }
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `drowsy_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn drowsy_processor_free(processor: *mut DrowsyProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Process one landmark frame (JSON) and return the frame report as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `drowsy_processor_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `drowsy_free_string`.
/// - Returns NULL on error; call `drowsy_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn drowsy_processor_process_frame(
    processor: *mut DrowsyProcessorHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    let result = FrameAdapter::parse_frame(&json_str)
        .and_then(|frame| handle.processor.process_frame(&frame))
        .and_then(|report| Ok(serde_json::to_string(&report)?));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Session summary as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `drowsy_processor_new`.
/// - Returns a newly allocated string that must be freed with `drowsy_free_string`.
#[no_mangle]
pub unsafe extern "C" fn drowsy_processor_summary(
    processor: *mut DrowsyProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match serde_json::to_string(&handle.processor.summary()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save processor state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `drowsy_processor_new`.
/// - Returns a newly allocated string that must be freed with `drowsy_free_string`.
/// - Returns NULL on error; call `drowsy_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn drowsy_processor_save_state(
    processor: *mut DrowsyProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_state() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load processor state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `drowsy_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `drowsy_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn drowsy_processor_load_state(
    processor: *mut DrowsyProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_state(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by drowsy functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a drowsy function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn drowsy_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next drowsy function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn drowsy_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn drowsy_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(coords: &[(f64, f64)]) -> serde_json::Value {
        coords
            .iter()
            .map(|(x, y)| serde_json::json!({ "x": x, "y": y }))
            .collect()
    }

    fn open_frame(ts: f64) -> String {
        let eye = points(&[(0.0, 0.0), (3.0, -2.0), (7.0, -2.0), (10.0, 0.0), (7.0, 2.0), (3.0, 2.0)]);
        let mouth = points(&[(5.0, 0.0), (5.0, 2.0), (0.0, 1.0), (10.0, 1.0)]);
        serde_json::json!({
            "timestamp": ts,
            "frame_width": 640,
            "frame_height": 480,
            "face": {
                "left_eye": eye.clone(),
                "right_eye": eye,
                "mouth": mouth
            }
        })
        .to_string()
    }

    #[test]
    fn test_ffi_analyze_frames() {
        let ndjson = format!(
            "{}\n{}\n{{\"frame_width\":640,\"frame_height\":480}}\n",
            open_frame(1.0),
            open_frame(2.0)
        );
        let input = CString::new(ndjson).unwrap();

        unsafe {
            let result = drowsy_analyze_frames(input.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let payload: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(payload["reports"].as_array().unwrap().len(), 3);
            assert_eq!(payload["summary"]["frames_processed"], 2);
            assert_eq!(payload["summary"]["frames_skipped"], 1);

            drowsy_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let config = CString::new("[detector]\ndrowsy_frame_threshold = 10\n").unwrap();
            let processor = drowsy_processor_new(config.as_ptr());
            assert!(!processor.is_null());

            let frame = CString::new(open_frame(1.0)).unwrap();
            let report = drowsy_processor_process_frame(processor, frame.as_ptr());
            assert!(!report.is_null());
            let report_json: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(report).to_str().unwrap()).unwrap();
            assert_eq!(report_json["measurement_valid"], true);
            drowsy_free_string(report);

            let state = drowsy_processor_save_state(processor);
            assert!(!state.is_null());

            let processor2 = drowsy_processor_new(ptr::null());
            assert_eq!(drowsy_processor_load_state(processor2, state), 0);

            let summary = drowsy_processor_summary(processor2);
            let summary_json: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(summary).to_str().unwrap()).unwrap();
            assert_eq!(summary_json["frames_processed"], 1);

            drowsy_free_string(summary);
            drowsy_free_string(state);
            drowsy_processor_free(processor);
            drowsy_processor_free(processor2);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid = CString::new("not json").unwrap();
            let result = drowsy_analyze_frames(invalid.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = drowsy_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("line 1"));

            let bad_config = CString::new("[detector]\nblink_min_frames = 99\n").unwrap();
            assert!(drowsy_processor_new(bad_config.as_ptr()).is_null());
            assert!(!drowsy_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = drowsy_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
