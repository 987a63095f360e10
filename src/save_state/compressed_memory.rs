//! XOR-RLE compression of dynamic memory
//!
//! Memory is XORed with the pristine story image, then runs of zero bytes
//! (unchanged memory) are encoded as `0, run_length - 1`.

use log::debug;

use crate::error::{ZError, ZResult};

/// Compress dynamic memory against the original image
pub fn compress_memory(current: &[u8], original: &[u8]) -> Vec<u8> {
    let xor_at = |i: usize| current[i] ^ original.get(i).copied().unwrap_or(0);
    let mut compressed = Vec::new();
    let mut i = 0;

    while i < current.len() {
        let xor_byte = xor_at(i);
        if xor_byte != 0 {
            compressed.push(xor_byte);
            i += 1;
            continue;
        }

        let start = i;
        while i < current.len() && xor_at(i) == 0 {
            i += 1;
        }
        let mut remaining = i - start;
        while remaining > 0 {
            let run = remaining.min(256);
            compressed.push(0);
            compressed.push((run - 1) as u8);
            remaining -= run;
        }
    }

    debug!("Compressed {} bytes to {} bytes", current.len(), compressed.len());
    compressed
}

/// Expand compressed memory back to exactly `original.len()` bytes
pub fn decompress_memory(compressed: &[u8], original: &[u8]) -> ZResult<Vec<u8>> {
    let mut decompressed = Vec::with_capacity(original.len());
    let mut iter = compressed.iter();

    while let Some(&byte) = iter.next() {
        if byte == 0 {
            let run = *iter
                .next()
                .ok_or_else(|| ZError::SaveState("incomplete RLE sequence".to_string()))?
                as usize
                + 1;
            let from = decompressed.len();
            if from + run > original.len() {
                return Err(ZError::SaveState("RLE run extends beyond memory".to_string()));
            }
            decompressed.extend_from_slice(&original[from..from + run]);
        } else {
            let at = decompressed.len();
            let base = original.get(at).ok_or_else(|| {
                ZError::SaveState("compressed data extends beyond memory".to_string())
            })?;
            decompressed.push(base ^ byte);
        }
    }

    // Trailing unchanged bytes may be omitted
    let filled = decompressed.len();
    decompressed.extend_from_slice(&original[filled..]);
    Ok(decompressed)
}
