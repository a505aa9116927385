//! Cell conversion between decoded chunk buffers and caller cubes.
//!
//! Every adapter copies `n` cells between two native-endian byte buffers,
//! converting the element type and applying the scale factor where the
//! codec is lossy. `NaN` maps to `i16::MAX` on the way in and back to
//! `NaN` on the way out.

use crate::bitutil::Word;

/// `fn(n, scale_factor, add_offset, src, dst)`
pub(crate) type CopyFn = fn(usize, f32, f32, &[u8], &mut [u8]);

pub(crate) fn copy_float_to_int16(n: usize, scale: f32, offset: f32, src: &[u8], dst: &mut [u8]) {
    for i in 0..n {
        let val = f32::from_bits(u32::read_ne(&src[i * 4..]));
        let cell = if val.is_nan() {
            i16::MAX
        } else {
            let scaled = (val * scale + offset).round();
            scaled.max(i16::MIN as f32).min(i16::MAX as f32) as i16
        };
        (cell as u16).write_ne(&mut dst[i * 2..]);
    }
}

pub(crate) fn copy_int16_to_float(n: usize, scale: f32, offset: f32, src: &[u8], dst: &mut [u8]) {
    for i in 0..n {
        let cell = u16::read_ne(&src[i * 2..]) as i16;
        let val = if cell == i16::MAX {
            f32::NAN
        } else {
            cell as f32 / scale - offset
        };
        val.to_bits().write_ne(&mut dst[i * 4..]);
    }
}

pub(crate) fn copy_float_to_int16_log10(
    n: usize,
    scale: f32,
    _offset: f32,
    src: &[u8],
    dst: &mut [u8],
) {
    for i in 0..n {
        let val = f32::from_bits(u32::read_ne(&src[i * 4..]));
        let cell = if val.is_nan() {
            i16::MAX
        } else {
            let scaled = ((1.0 + val).log10() * scale).round();
            scaled.max(i16::MIN as f32).min(i16::MAX as f32) as i16
        };
        (cell as u16).write_ne(&mut dst[i * 2..]);
    }
}

pub(crate) fn copy_int16_to_float_log10(
    n: usize,
    scale: f32,
    _offset: f32,
    src: &[u8],
    dst: &mut [u8],
) {
    for i in 0..n {
        let cell = u16::read_ne(&src[i * 2..]) as i16;
        let val = if cell == i16::MAX {
            f32::NAN
        } else {
            10f32.powf(cell as f32 / scale) - 1.0
        };
        val.to_bits().write_ne(&mut dst[i * 4..]);
    }
}

pub(crate) fn copy8(n: usize, _scale: f32, _offset: f32, src: &[u8], dst: &mut [u8]) {
    dst[..n].copy_from_slice(&src[..n]);
}

pub(crate) fn copy16(n: usize, _scale: f32, _offset: f32, src: &[u8], dst: &mut [u8]) {
    dst[..n * 2].copy_from_slice(&src[..n * 2]);
}

pub(crate) fn copy32(n: usize, _scale: f32, _offset: f32, src: &[u8], dst: &mut [u8]) {
    dst[..n * 4].copy_from_slice(&src[..n * 4]);
}

pub(crate) fn copy64(n: usize, _scale: f32, _offset: f32, src: &[u8], dst: &mut [u8]) {
    dst[..n * 8].copy_from_slice(&src[..n * 8]);
}

#[cfg(test)]
mod test {
    use super::*;

    fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
        let mut buf = vec![0u8; values.len() * 4];
        for (i, v) in values.iter().enumerate() {
            v.to_bits().write_ne(&mut buf[i * 4..]);
        }
        buf
    }

    fn bytes_to_floats(buf: &[u8]) -> Vec<f32> {
        buf.chunks_exact(4)
            .map(|c| f32::from_bits(u32::read_ne(c)))
            .collect()
    }

    #[test]
    fn test_scale_roundtrip_within_tolerance() {
        let values = [0.0f32, 1.05, -7.33, 20.2, 1638.0];
        let src = floats_to_bytes(&values);
        let mut cells = vec![0u8; values.len() * 2];
        copy_float_to_int16(values.len(), 20.0, 0.0, &src, &mut cells);
        let mut back = vec![0u8; values.len() * 4];
        copy_int16_to_float(values.len(), 20.0, 0.0, &cells, &mut back);
        for (got, want) in bytes_to_floats(&back).iter().zip(values.iter()) {
            assert!((got - want).abs() <= 1.0 / 40.0, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_nan_is_sentinel() {
        let src = floats_to_bytes(&[f32::NAN, 2.0]);
        let mut cells = vec![0u8; 4];
        copy_float_to_int16(2, 20.0, 0.0, &src, &mut cells);
        assert_eq!(u16::read_ne(&cells) as i16, i16::MAX);

        let mut back = vec![0u8; 8];
        copy_int16_to_float(2, 20.0, 0.0, &cells, &mut back);
        let floats = bytes_to_floats(&back);
        assert!(floats[0].is_nan());
        assert!((floats[1] - 2.0).abs() <= 0.025);
    }

    #[test]
    fn test_clamps_out_of_range() {
        let src = floats_to_bytes(&[1.0e9, -1.0e9]);
        let mut cells = vec![0u8; 4];
        copy_float_to_int16(2, 1.0, 0.0, &src, &mut cells);
        assert_eq!(u16::read_ne(&cells[0..]) as i16, i16::MAX);
        assert_eq!(u16::read_ne(&cells[2..]) as i16, i16::MIN);
    }

    #[test]
    fn test_log10_roundtrip() {
        let values = [0.0f32, 0.5, 3.0, 150.0];
        let src = floats_to_bytes(&values);
        let mut cells = vec![0u8; values.len() * 2];
        copy_float_to_int16_log10(values.len(), 1000.0, 0.0, &src, &mut cells);
        let mut back = vec![0u8; values.len() * 4];
        copy_int16_to_float_log10(values.len(), 1000.0, 0.0, &cells, &mut back);
        for (got, want) in bytes_to_floats(&back).iter().zip(values.iter()) {
            let rel = (got - want).abs() / (1.0 + want);
            assert!(rel < 0.01, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_plain_copies() {
        let src: Vec<u8> = (0..64).collect();
        let mut dst = vec![0u8; 64];
        copy32(16, 0.0, 0.0, &src, &mut dst);
        assert_eq!(src, dst);
    }
}
