//! C Foreign Function Interface for the JPEG-LS codec.
//!
//! The entry points follow the CharLS C API: a flat [`JlsParameters`] record,
//! raw buffers with explicit lengths and an `i32` result code (see
//! [`JpegLsError`]). Every function exists in an `_x86` flavour taking `i32`
//! lengths and an `_x64` flavour taking `i64` lengths. The trailing
//! `reserved` argument is the CharLS error message buffer; it is ignored and
//! may be null.

use std::ffi::{CStr, CString, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use log::{debug, error};

use crate::error::JpegLsError;
use crate::jpegls::{JpeglsDecoder, JpeglsEncoder};
use crate::parameters::JlsParameters;

/// Read the header of a JPEG-LS stream into `parameters`.
///
/// # Safety
/// `source` must point to `source_length` readable bytes and `parameters` to
/// a writable `JlsParameters`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_read_header_x86(
    source: *const u8,
    source_length: i32,
    parameters: *mut JlsParameters,
    _reserved: *mut c_char,
) -> i32 {
    unsafe { read_header(source, i64::from(source_length), parameters) }
}

/// Read the header of a JPEG-LS stream into `parameters`.
///
/// # Safety
/// `source` must point to `source_length` readable bytes and `parameters` to
/// a writable `JlsParameters`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_read_header_x64(
    source: *const u8,
    source_length: i64,
    parameters: *mut JlsParameters,
    _reserved: *mut c_char,
) -> i32 {
    unsafe { read_header(source, source_length, parameters) }
}

/// Decode a JPEG-LS stream into `destination`.
///
/// `parameters` may be null; otherwise its `bytes_per_line` and `output_bgr`
/// fields select the destination layout.
///
/// # Safety
/// `destination` must point to `destination_length` writable bytes that do
/// not overlap the `source_length` readable bytes at `source`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_decode_x86(
    destination: *mut u8,
    destination_length: i32,
    source: *const u8,
    source_length: i32,
    parameters: *const JlsParameters,
    _reserved: *mut c_char,
) -> i32 {
    unsafe {
        decode(
            destination,
            i64::from(destination_length),
            source,
            i64::from(source_length),
            parameters,
        )
    }
}

/// Decode a JPEG-LS stream into `destination`.
///
/// # Safety
/// See [`jpegls_decode_x86`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_decode_x64(
    destination: *mut u8,
    destination_length: i64,
    source: *const u8,
    source_length: i64,
    parameters: *const JlsParameters,
    _reserved: *mut c_char,
) -> i32 {
    unsafe { decode(destination, destination_length, source, source_length, parameters) }
}

/// Encode the pixels at `source` and store the stream size in `bytes_written`.
///
/// # Safety
/// `destination` must point to `destination_length` writable bytes, `source`
/// to `source_length` readable bytes, `bytes_written` to a writable `i32` and
/// `parameters` to a valid `JlsParameters` whose JFIF thumbnail, when
/// announced, holds `3 * thumbnail_x * thumbnail_y` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_encode_x86(
    destination: *mut u8,
    destination_length: i32,
    bytes_written: *mut i32,
    source: *const u8,
    source_length: i32,
    parameters: *const JlsParameters,
    _reserved: *mut c_char,
) -> i32 {
    guarded(|| {
        if bytes_written.is_null() {
            return Err(JpegLsError::InvalidArgument);
        }
        let written = unsafe {
            encode(
                destination,
                i64::from(destination_length),
                source,
                i64::from(source_length),
                parameters,
            )?
        };
        let written = i32::try_from(written).map_err(|_| JpegLsError::UnexpectedFailure)?;
        unsafe { bytes_written.write(written) };
        Ok(())
    })
}

/// Encode the pixels at `source` and store the stream size in `bytes_written`.
///
/// # Safety
/// See [`jpegls_encode_x86`]; `bytes_written` must point to a writable `i64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_encode_x64(
    destination: *mut u8,
    destination_length: i64,
    bytes_written: *mut i64,
    source: *const u8,
    source_length: i64,
    parameters: *const JlsParameters,
    _reserved: *mut c_char,
) -> i32 {
    guarded(|| {
        if bytes_written.is_null() {
            return Err(JpegLsError::InvalidArgument);
        }
        let written = unsafe { encode(destination, destination_length, source, source_length, parameters)? };
        let written = i64::try_from(written).map_err(|_| JpegLsError::UnexpectedFailure)?;
        unsafe { bytes_written.write(written) };
        Ok(())
    })
}

/// The message for a result code as a static, NUL terminated string.
#[unsafe(no_mangle)]
pub extern "C" fn charls_get_error_message(error_value: i32) -> *const c_char {
    static MESSAGES: OnceLock<Vec<(i32, CString)>> = OnceLock::new();
    const UNKNOWN: &CStr = c"Unknown error code";

    let messages = MESSAGES.get_or_init(|| {
        (0..=255)
            .filter_map(|code| JpegLsError::try_from(code).ok())
            .filter_map(|error| CString::new(error.to_string()).ok().map(|message| (error.code(), message)))
            .collect()
    });

    messages
        .iter()
        .find(|(code, _)| *code == error_value)
        .map_or(UNKNOWN.as_ptr(), |(_, message)| message.as_ptr())
}

/// Runs `operation` and turns its outcome, panics included, into a result code.
fn guarded(operation: impl FnOnce() -> Result<(), JpegLsError>) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(Ok(())) => JpegLsError::None.code(),
        Ok(Err(error)) => {
            debug!("native call failed: {error} ({})", error.code());
            error.code()
        }
        Err(_) => {
            error!("panic inside the JPEG-LS codec");
            JpegLsError::UnexpectedFailure.code()
        }
    }
}

unsafe fn source_slice<'a>(source: *const u8, length: i64) -> Result<&'a [u8], JpegLsError> {
    let length = usize::try_from(length).map_err(|_| JpegLsError::InvalidArgumentSource)?;
    if source.is_null() {
        return Err(JpegLsError::InvalidArgumentSource);
    }
    Ok(unsafe { std::slice::from_raw_parts(source, length) })
}

unsafe fn destination_slice<'a>(destination: *mut u8, length: i64) -> Result<&'a mut [u8], JpegLsError> {
    let length = usize::try_from(length).map_err(|_| JpegLsError::InvalidArgumentDestination)?;
    if destination.is_null() {
        return Err(JpegLsError::InvalidArgumentDestination);
    }
    Ok(unsafe { std::slice::from_raw_parts_mut(destination, length) })
}

unsafe fn read_header(source: *const u8, source_length: i64, parameters: *mut JlsParameters) -> i32 {
    guarded(|| {
        let source = unsafe { source_slice(source, source_length)? };
        if parameters.is_null() {
            return Err(JpegLsError::InvalidArgument);
        }

        let mut decoder = JpeglsDecoder::new(source);
        decoder.read_header()?;
        let header = decoder.parameters()?;
        unsafe { parameters.write(header) };
        Ok(())
    })
}

unsafe fn decode(
    destination: *mut u8,
    destination_length: i64,
    source: *const u8,
    source_length: i64,
    parameters: *const JlsParameters,
) -> i32 {
    guarded(|| {
        let destination = unsafe { destination_slice(destination, destination_length)? };
        let source = unsafe { source_slice(source, source_length)? };
        let parameters = unsafe { parameters.as_ref() };

        JpeglsDecoder::new(source).decode(destination, parameters)
    })
}

unsafe fn encode(
    destination: *mut u8,
    destination_length: i64,
    source: *const u8,
    source_length: i64,
    parameters: *const JlsParameters,
) -> Result<usize, JpegLsError> {
    let destination = unsafe { destination_slice(destination, destination_length)? };
    let source = unsafe { source_slice(source, source_length)? };
    let parameters = unsafe { parameters.as_ref() }.ok_or(JpegLsError::InvalidArgument)?;
    let thumbnail = unsafe { thumbnail_slice(parameters)? };

    let mut encoder = JpeglsEncoder::new(destination);
    encoder.set_thumbnail(thumbnail);
    encoder.encode(source, parameters)
}

unsafe fn thumbnail_slice<'a>(parameters: &JlsParameters) -> Result<&'a [u8], JpegLsError> {
    let jfif = &parameters.jfif;
    if !jfif.is_present() || jfif.thumbnail_x == 0 || jfif.thumbnail_y == 0 {
        return Ok(&[]);
    }
    if !(0..=255).contains(&jfif.thumbnail_x) || !(0..=255).contains(&jfif.thumbnail_y) || jfif.thumbnail.is_null() {
        return Err(JpegLsError::InvalidArgumentThumbnail);
    }

    let length = 3 * jfif.thumbnail_x as usize * jfif.thumbnail_y as usize;
    Ok(unsafe { std::slice::from_raw_parts(jfif.thumbnail.cast::<u8>(), length) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn gray_parameters(width: i32, height: i32) -> JlsParameters {
        JlsParameters {
            width,
            height,
            bits_per_sample: 8,
            components: 1,
            ..Default::default()
        }
    }

    #[test]
    fn encode_read_header_decode() {
        let source: Vec<u8> = (0..64).map(|i| (i * 3) as u8).collect();
        let parameters = gray_parameters(8, 8);
        let mut encoded = vec![0u8; 512];
        let mut written = 0i64;
        let code = unsafe {
            jpegls_encode_x64(
                encoded.as_mut_ptr(),
                encoded.len() as i64,
                &mut written,
                source.as_ptr(),
                source.len() as i64,
                &parameters,
                ptr::null_mut(),
            )
        };
        assert_eq!(code, 0);
        assert!(written > 0);

        let mut header = JlsParameters::default();
        let code = unsafe { jpegls_read_header_x86(encoded.as_ptr(), written as i32, &mut header, ptr::null_mut()) };
        assert_eq!(code, 0);
        assert_eq!((header.width, header.height, header.components), (8, 8, 1));

        let mut decoded = vec![0u8; 64];
        let code = unsafe {
            jpegls_decode_x86(
                decoded.as_mut_ptr(),
                64,
                encoded.as_ptr(),
                written as i32,
                ptr::null(),
                ptr::null_mut(),
            )
        };
        assert_eq!(code, 0);
        assert_eq!(decoded, source);
    }

    #[test]
    fn null_pointers_and_negative_lengths() {
        let mut header = JlsParameters::default();
        let code = unsafe { jpegls_read_header_x64(ptr::null(), 10, &mut header, ptr::null_mut()) };
        assert_eq!(code, JpegLsError::InvalidArgumentSource.code());

        let data = [0xFFu8, 0xD8];
        let code = unsafe { jpegls_read_header_x86(data.as_ptr(), -1, &mut header, ptr::null_mut()) };
        assert_eq!(code, JpegLsError::InvalidArgumentSource.code());

        let code = unsafe { jpegls_read_header_x86(data.as_ptr(), 2, ptr::null_mut(), ptr::null_mut()) };
        assert_eq!(code, JpegLsError::InvalidArgument.code());

        let code = unsafe { jpegls_decode_x64(ptr::null_mut(), 4, data.as_ptr(), 2, ptr::null(), ptr::null_mut()) };
        assert_eq!(code, JpegLsError::InvalidArgumentDestination.code());

        let mut destination = [0u8; 16];
        let code = unsafe {
            jpegls_encode_x86(
                destination.as_mut_ptr(),
                16,
                ptr::null_mut(),
                data.as_ptr(),
                2,
                &gray_parameters(1, 1),
                ptr::null_mut(),
            )
        };
        assert_eq!(code, JpegLsError::InvalidArgument.code());
    }

    #[test]
    fn announced_thumbnail_needs_pixels() {
        let mut parameters = gray_parameters(1, 1);
        parameters.jfif.version = 0x102;
        parameters.jfif.thumbnail_x = 1;
        parameters.jfif.thumbnail_y = 1;

        let source = [0u8; 1];
        let mut destination = [0u8; 64];
        let mut written = 0;
        let code = unsafe {
            jpegls_encode_x86(
                destination.as_mut_ptr(),
                64,
                &mut written,
                source.as_ptr(),
                1,
                &parameters,
                ptr::null_mut(),
            )
        };
        assert_eq!(code, JpegLsError::InvalidArgumentThumbnail.code());
    }

    fn message(code: i32) -> String {
        unsafe { CStr::from_ptr(charls_get_error_message(code)) }
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn error_messages() {
        assert_eq!(message(0), "Success");
        assert_eq!(message(3), JpegLsError::DestinationBufferTooSmall.to_string());
        assert_eq!(message(12), "JPEG marker start byte (0xFF) not found");
        assert_eq!(message(-5), "Unknown error code");
        assert_eq!(charls_get_error_message(4), charls_get_error_message(4));
    }
}
