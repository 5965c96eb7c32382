//! The call surface between the safe facade and the C ABI.
//!
//! [`NativeCodec`] is the seam: the facade only talks to an implementation of
//! it, which lets tests substitute the native library. [`X86Native`] and
//! [`X64Native`] call the matching `extern "C"` flavour, [`ProcessNative`]
//! picks one of them from the pointer width of the running process.
//!
//! The borrowed slices keep the buffers alive and in place for the whole
//! native call.

use std::ffi::CStr;
use std::ptr;

use log::debug;

use crate::error::JpegLsError;
use crate::ffi;
use crate::parameters::JlsParameters;

/// The native entry points, in safe form.
///
/// Each method returns the raw native result code (0 on success).
pub trait NativeCodec {
    fn read_header(&self, source: &[u8]) -> (i32, JlsParameters);

    fn decode(&self, destination: &mut [u8], source: &[u8], parameters: Option<&JlsParameters>) -> i32;

    /// Returns the result code and the number of bytes written.
    fn encode(&self, destination: &mut [u8], source: &[u8], parameters: &JlsParameters) -> (i32, usize);

    fn error_message(&self, code: i32) -> String;
}

fn error_message(code: i32) -> String {
    // SAFETY: the native message table hands out static NUL terminated strings.
    unsafe { CStr::from_ptr(ffi::charls_get_error_message(code)) }
        .to_string_lossy()
        .into_owned()
}

fn optional_pointer(parameters: Option<&JlsParameters>) -> *const JlsParameters {
    parameters.map_or(ptr::null(), |parameters| parameters as *const JlsParameters)
}

/// The flavour with 32 bit buffer lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct X86Native;

impl NativeCodec for X86Native {
    fn read_header(&self, source: &[u8]) -> (i32, JlsParameters) {
        let mut parameters = JlsParameters::default();
        let Ok(source_length) = i32::try_from(source.len()) else {
            return (JpegLsError::InvalidArgument.code(), parameters);
        };

        // SAFETY: `source` and `parameters` are valid for the whole call.
        let code =
            unsafe { ffi::jpegls_read_header_x86(source.as_ptr(), source_length, &mut parameters, ptr::null_mut()) };
        (code, parameters)
    }

    fn decode(&self, destination: &mut [u8], source: &[u8], parameters: Option<&JlsParameters>) -> i32 {
        let (Ok(destination_length), Ok(source_length)) =
            (i32::try_from(destination.len()), i32::try_from(source.len()))
        else {
            return JpegLsError::InvalidArgument.code();
        };

        // SAFETY: the slices are valid and distinct for the whole call.
        unsafe {
            ffi::jpegls_decode_x86(
                destination.as_mut_ptr(),
                destination_length,
                source.as_ptr(),
                source_length,
                optional_pointer(parameters),
                ptr::null_mut(),
            )
        }
    }

    fn encode(&self, destination: &mut [u8], source: &[u8], parameters: &JlsParameters) -> (i32, usize) {
        let (Ok(destination_length), Ok(source_length)) =
            (i32::try_from(destination.len()), i32::try_from(source.len()))
        else {
            return (JpegLsError::InvalidArgument.code(), 0);
        };

        let mut bytes_written = 0i32;
        // SAFETY: the slices, the descriptor and `bytes_written` are valid for the whole call.
        let code = unsafe {
            ffi::jpegls_encode_x86(
                destination.as_mut_ptr(),
                destination_length,
                &mut bytes_written,
                source.as_ptr(),
                source_length,
                parameters,
                ptr::null_mut(),
            )
        };
        (code, usize::try_from(bytes_written).unwrap_or(0))
    }

    fn error_message(&self, code: i32) -> String {
        error_message(code)
    }
}

/// The flavour with 64 bit buffer lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct X64Native;

impl NativeCodec for X64Native {
    fn read_header(&self, source: &[u8]) -> (i32, JlsParameters) {
        let mut parameters = JlsParameters::default();
        let Ok(source_length) = i64::try_from(source.len()) else {
            return (JpegLsError::InvalidArgument.code(), parameters);
        };

        // SAFETY: `source` and `parameters` are valid for the whole call.
        let code =
            unsafe { ffi::jpegls_read_header_x64(source.as_ptr(), source_length, &mut parameters, ptr::null_mut()) };
        (code, parameters)
    }

    fn decode(&self, destination: &mut [u8], source: &[u8], parameters: Option<&JlsParameters>) -> i32 {
        let (Ok(destination_length), Ok(source_length)) =
            (i64::try_from(destination.len()), i64::try_from(source.len()))
        else {
            return JpegLsError::InvalidArgument.code();
        };

        // SAFETY: the slices are valid and distinct for the whole call.
        unsafe {
            ffi::jpegls_decode_x64(
                destination.as_mut_ptr(),
                destination_length,
                source.as_ptr(),
                source_length,
                optional_pointer(parameters),
                ptr::null_mut(),
            )
        }
    }

    fn encode(&self, destination: &mut [u8], source: &[u8], parameters: &JlsParameters) -> (i32, usize) {
        let (Ok(destination_length), Ok(source_length)) =
            (i64::try_from(destination.len()), i64::try_from(source.len()))
        else {
            return (JpegLsError::InvalidArgument.code(), 0);
        };

        let mut bytes_written = 0i64;
        // SAFETY: the slices, the descriptor and `bytes_written` are valid for the whole call.
        let code = unsafe {
            ffi::jpegls_encode_x64(
                destination.as_mut_ptr(),
                destination_length,
                &mut bytes_written,
                source.as_ptr(),
                source_length,
                parameters,
                ptr::null_mut(),
            )
        };
        (code, usize::try_from(bytes_written).unwrap_or(0))
    }

    fn error_message(&self, code: i32) -> String {
        error_message(code)
    }
}

/// Chooses the flavour matching the pointer width of this process on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessNative;

impl ProcessNative {
    fn is_64_bit() -> bool {
        usize::BITS == 64
    }
}

impl NativeCodec for ProcessNative {
    fn read_header(&self, source: &[u8]) -> (i32, JlsParameters) {
        debug!("read_header: {} source bytes", source.len());
        if Self::is_64_bit() {
            X64Native.read_header(source)
        } else {
            X86Native.read_header(source)
        }
    }

    fn decode(&self, destination: &mut [u8], source: &[u8], parameters: Option<&JlsParameters>) -> i32 {
        debug!("decode: {} source bytes into {} bytes", source.len(), destination.len());
        if Self::is_64_bit() {
            X64Native.decode(destination, source, parameters)
        } else {
            X86Native.decode(destination, source, parameters)
        }
    }

    fn encode(&self, destination: &mut [u8], source: &[u8], parameters: &JlsParameters) -> (i32, usize) {
        debug!("encode: {} source bytes into {} bytes", source.len(), destination.len());
        if Self::is_64_bit() {
            X64Native.encode(destination, source, parameters)
        } else {
            X86Native.encode(destination, source, parameters)
        }
    }

    fn error_message(&self, code: i32) -> String {
        error_message(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(native: &impl NativeCodec) {
        let source: Vec<u8> = (0..48).map(|i| (i * 5) as u8).collect();
        let parameters = JlsParameters {
            width: 4,
            height: 4,
            bits_per_sample: 8,
            components: 3,
            interleave_mode: 2,
            ..Default::default()
        };

        let mut encoded = vec![0u8; 256];
        let (code, length) = native.encode(&mut encoded, &source, &parameters);
        assert_eq!(code, 0);

        let (code, header) = native.read_header(&encoded[..length]);
        assert_eq!(code, 0);
        assert_eq!((header.width, header.components, header.interleave_mode), (4, 3, 2));

        let mut decoded = vec![0u8; 48];
        assert_eq!(native.decode(&mut decoded, &encoded[..length], None), 0);
        assert_eq!(decoded, source);
    }

    #[test]
    fn both_flavours_round_trip() {
        round_trip(&X86Native);
        round_trip(&X64Native);
        round_trip(&ProcessNative);
    }

    #[test]
    fn failures_report_the_native_code() {
        let (code, _) = ProcessNative.read_header(&[0x33, 0x33]);
        assert_eq!(code, JpegLsError::JpegMarkerStartByteNotFound.code());
        assert_eq!(
            ProcessNative.error_message(code),
            JpegLsError::JpegMarkerStartByteNotFound.to_string()
        );

        let mut destination = [0u8; 4];
        let parameters = JlsParameters {
            width: 16,
            height: 16,
            bits_per_sample: 8,
            components: 1,
            ..Default::default()
        };
        let (code, written) = X86Native.encode(&mut destination, &[0; 256], &parameters);
        assert_eq!((code, written), (JpegLsError::DestinationBufferTooSmall.code(), 0));
    }
}
