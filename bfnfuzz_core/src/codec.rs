use crate::error::BfnError;

/// Largest byte width an unsigned field may be encoded with.
pub const MAX_UINT_WIDTH: usize = 8;

/// Returns the largest value representable in `width` bytes.
pub fn max_for_width(width: usize) -> u64 {
    if width >= MAX_UINT_WIDTH {
        u64::MAX
    } else {
        (1u64 << (8 * width)) - 1
    }
}

/// Encodes `value` big-endian into exactly `width` bytes.
///
/// Values that do not fit are rejected with [`BfnError::OutOfRange`] unless
/// `wrap` is set, in which case the value is reduced modulo `2^(8*width)`.
pub fn encode_uint(value: u64, width: usize, wrap: bool) -> Result<Vec<u8>, BfnError> {
    if width == 0 || width > MAX_UINT_WIDTH {
        return Err(BfnError::InvalidWidth {
            expected: MAX_UINT_WIDTH,
            actual: width,
        });
    }
    let max = max_for_width(width);
    let value = if value > max {
        if !wrap {
            return Err(BfnError::OutOfRange { value, width });
        }
        value & max
    } else {
        value
    };
    Ok(value.to_be_bytes()[MAX_UINT_WIDTH - width..].to_vec())
}

/// Checks that `value` fits in `width` bytes without encoding it.
pub fn check_range(value: u64, width: usize) -> Result<(), BfnError> {
    if value > max_for_width(width) {
        return Err(BfnError::OutOfRange { value, width });
    }
    Ok(())
}

/// Decodes a big-endian unsigned integer of up to eight bytes.
pub fn decode_uint(bytes: &[u8]) -> Result<u64, BfnError> {
    if bytes.is_empty() || bytes.len() > MAX_UINT_WIDTH {
        return Err(BfnError::InvalidWidth {
            expected: MAX_UINT_WIDTH,
            actual: bytes.len(),
        });
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Overwrites `original` starting at `offset` with `replacement`.
///
/// The replaced window is `replacement.len()` bytes wide and may run past the
/// end of `original`, in which case the result grows.
pub fn splice(original: &[u8], replacement: &[u8], offset: usize) -> Result<Vec<u8>, BfnError> {
    if offset > original.len() {
        return Err(BfnError::SpliceOffset {
            offset,
            len: original.len(),
        });
    }
    let tail_start = (offset + replacement.len()).min(original.len());
    let mut out = Vec::with_capacity(original.len().max(offset + replacement.len()));
    out.extend_from_slice(&original[..offset]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&original[tail_start..]);
    Ok(out)
}
