//! Reversible two-dimensional row filters applied to chunk buffers.
//!
//! A chunk is viewed as `rows` x `cols` cells in row-major order. Encoding
//! replaces every row after the first by its difference (or xor) with the
//! row above; decoding restores the rows by a running prefix pass. The
//! delta variant operates on `i16` cells, the xor variants on the raw bit
//! patterns of `f32`/`f64` cells. All buffers hold native-endian cells.

use crate::bitutil::Word;

/// Row-wise difference on `i16` cells, last row first so every
/// subtraction sees the original row above.
pub fn encode(rows: usize, cols: usize, buf: &mut [u8]) {
    for r in (1..rows).rev() {
        for c in 0..cols {
            let cur = u16::read_ne(&buf[(r * cols + c) * 2..]);
            let above = u16::read_ne(&buf[((r - 1) * cols + c) * 2..]);
            cur.wrapping_sub(above).write_ne(&mut buf[(r * cols + c) * 2..]);
        }
    }
}

/// Inverse of [`encode`]: running sum down the rows.
pub fn decode(rows: usize, cols: usize, buf: &mut [u8]) {
    for r in 1..rows {
        for c in 0..cols {
            let cur = u16::read_ne(&buf[(r * cols + c) * 2..]);
            let above = u16::read_ne(&buf[((r - 1) * cols + c) * 2..]);
            cur.wrapping_add(above).write_ne(&mut buf[(r * cols + c) * 2..]);
        }
    }
}

fn encode_xor_cells<T: Word>(rows: usize, cols: usize, buf: &mut [u8]) {
    for r in (1..rows).rev() {
        for c in 0..cols {
            let cur = T::read_ne(&buf[(r * cols + c) * T::BYTES..]);
            let above = T::read_ne(&buf[((r - 1) * cols + c) * T::BYTES..]);
            (cur ^ above).write_ne(&mut buf[(r * cols + c) * T::BYTES..]);
        }
    }
}

fn decode_xor_cells<T: Word>(rows: usize, cols: usize, buf: &mut [u8]) {
    for r in 1..rows {
        for c in 0..cols {
            let cur = T::read_ne(&buf[(r * cols + c) * T::BYTES..]);
            let above = T::read_ne(&buf[((r - 1) * cols + c) * T::BYTES..]);
            (cur ^ above).write_ne(&mut buf[(r * cols + c) * T::BYTES..]);
        }
    }
}

/// Row-wise xor on `f32` bit patterns.
pub fn encode_xor(rows: usize, cols: usize, buf: &mut [u8]) {
    encode_xor_cells::<u32>(rows, cols, buf)
}

pub fn decode_xor(rows: usize, cols: usize, buf: &mut [u8]) {
    decode_xor_cells::<u32>(rows, cols, buf)
}

/// Row-wise xor on `f64` bit patterns.
pub fn encode_xor_double(rows: usize, cols: usize, buf: &mut [u8]) {
    encode_xor_cells::<u64>(rows, cols, buf)
}

pub fn decode_xor_double(rows: usize, cols: usize, buf: &mut [u8]) {
    decode_xor_cells::<u64>(rows, cols, buf)
}
