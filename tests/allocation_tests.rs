//! Decoding must not allocate more than the output image, whatever size the
//! frame header claims. Kept in its own test binary for the global allocator.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use jpegls_bridge::{FailureKind, JpegLsCodec, MetadataInfo};

static LARGEST_ALLOCATION: AtomicUsize = AtomicUsize::new(0);

struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        LARGEST_ALLOCATION.fetch_max(layout.size(), Ordering::Relaxed);
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        LARGEST_ALLOCATION.fetch_max(layout.size(), Ordering::Relaxed);
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        LARGEST_ALLOCATION.fetch_max(new_size, Ordering::Relaxed);
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator;

#[test]
fn oversized_frame_with_a_truncated_scan() {
    let mut stream = jpegls_bridge::compress(&MetadataInfo::new(1, 1, 8, 1), &[77], false).unwrap();

    // Rewrite the SOF55 dimensions to 4096x4096.
    let sof = stream.windows(2).position(|marker| marker == [0xFF, 0xF7]).unwrap();
    stream[sof + 5..sof + 7].copy_from_slice(&4096u16.to_be_bytes());
    stream[sof + 7..sof + 9].copy_from_slice(&4096u16.to_be_bytes());

    let codec = JpegLsCodec::new();
    let image_size = codec.get_metadata_info(&stream).unwrap().uncompressed_size().unwrap();
    assert_eq!(image_size, 4096 * 4096);

    LARGEST_ALLOCATION.store(0, Ordering::Relaxed);
    let error = codec.decompress(&stream).unwrap_err();
    assert_eq!(error.kind(), FailureKind::MalformedStream);
    assert!(LARGEST_ALLOCATION.load(Ordering::Relaxed) <= image_size);
}
