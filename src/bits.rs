//! Byte-level shifts over 256-bit big-endian words.
//!
//! Every function here takes and returns exactly 32 bytes, with byte 0 the
//! most significant. Shift amounts of 256 bits or more saturate.

/// Number of bytes in a machine word.
pub const WORD_BYTES: usize = 32;

/// Number of bits in a machine word.
pub const WORD_BITS: usize = 8 * WORD_BYTES;

pub type Bytes32 = [u8; WORD_BYTES];

/// Whether the two's-complement sign bit is set.
pub fn is_negative(bytes: &Bytes32) -> bool {
    bytes[0] & 0x80 != 0
}

/// Logical shift left by `shift` bits.
pub fn shl(bytes: &Bytes32, shift: usize) -> Bytes32 {
    let mut out = [0u8; WORD_BYTES];
    if shift >= WORD_BITS {
        return out;
    }
    let byte_shift = shift / 8;
    let bit_shift = shift % 8;

    for i in 0..WORD_BYTES - byte_shift {
        let src = i + byte_shift;
        let mut b = bytes[src] << bit_shift;
        if bit_shift != 0 && src + 1 < WORD_BYTES {
            b |= bytes[src + 1] >> (8 - bit_shift);
        }
        out[i] = b;
    }
    out
}

/// Logical shift right by `shift` bits.
pub fn shr(bytes: &Bytes32, shift: usize) -> Bytes32 {
    shift_right(bytes, shift, 0x00)
}

/// Arithmetic shift right by `shift` bits, replicating the sign bit.
pub fn sar(bytes: &Bytes32, shift: usize) -> Bytes32 {
    let fill = if is_negative(bytes) { 0xFF } else { 0x00 };
    shift_right(bytes, shift, fill)
}

fn shift_right(bytes: &Bytes32, shift: usize, fill: u8) -> Bytes32 {
    let mut out = [fill; WORD_BYTES];
    if shift >= WORD_BITS {
        return out;
    }
    let byte_shift = shift / 8;
    let bit_shift = shift % 8;

    for i in byte_shift..WORD_BYTES {
        let src = i - byte_shift;
        let mut b = bytes[src] >> bit_shift;
        if bit_shift != 0 {
            // Bits carried in from the next more significant byte (or the fill).
            let above = if src > 0 { bytes[src - 1] } else { fill };
            b |= above << (8 - bit_shift);
        }
        out[i] = b;
    }
    out
}
