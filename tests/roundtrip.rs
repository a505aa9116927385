use std::io::Cursor;

use omfile::{OmCompression, OmDataType, OmFileReader, OmFileWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Standard normal samples via Box-Muller over uniform draws.
fn normal_samples(rng: &mut StdRng, n: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        out.push((r * theta.cos()) as f32);
        if out.len() < n {
            out.push((r * theta.sin()) as f32);
        }
    }
    out
}

fn write_f32_array(
    data: &[f32],
    dims: &[u64],
    chunks: &[u64],
    compression: OmCompression,
    scale_factor: f32,
) -> Cursor<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = OmFileWriter::new(&mut buffer).unwrap();
    let root = writer
        .write_array(
            "data",
            OmDataType::FloatArray,
            compression,
            scale_factor,
            0.0,
            dims,
            chunks,
            data,
            &[],
        )
        .unwrap();
    writer.finalize(root).unwrap();
    buffer
}

#[test]
fn test_xor2d_lossless_roundtrip_random_normals() {
    let mut rng = StdRng::seed_from_u64(0x00f1_ce00);
    let data = normal_samples(&mut rng, 128 * 128);

    let buffer = write_f32_array(&data, &[128, 128], &[16, 128], OmCompression::FpxXor2d, 1.0);
    let mut reader = OmFileReader::new(buffer).unwrap();
    let decoded = reader.read_f32(&[0, 0], &[128, 128]).unwrap();

    // Bit exact for every cell.
    for (i, (g, w)) in decoded.iter().zip(data.iter()).enumerate() {
        assert_eq!(g.to_bits(), w.to_bits(), "cell {}", i);
    }
}

#[test]
fn test_xor2d_sub_window_lossless() {
    let mut rng = StdRng::seed_from_u64(42);
    let data = normal_samples(&mut rng, 64 * 64);

    let buffer = write_f32_array(&data, &[64, 64], &[8, 8], OmCompression::FpxXor2d, 1.0);
    let mut reader = OmFileReader::new(buffer).unwrap();
    let window = reader.read_f32(&[10, 20], &[13, 7]).unwrap();
    for r in 0..13usize {
        for c in 0..7usize {
            let want = data[(10 + r) * 64 + 20 + c];
            assert_eq!(window[r * 7 + c].to_bits(), want.to_bits());
        }
    }
}

#[test]
fn test_xor2d_double_roundtrip() {
    let mut rng = StdRng::seed_from_u64(7);
    let data: Vec<f64> = (0..96 * 32)
        .map(|i| (i as f64 * 0.01).sin() * rng.gen_range(0.5..2.0))
        .collect();

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = OmFileWriter::new(&mut buffer).unwrap();
    let root = writer
        .write_array(
            "data",
            OmDataType::DoubleArray,
            OmCompression::FpxXor2d,
            1.0,
            0.0,
            &[96, 32],
            &[12, 32],
            &data,
            &[],
        )
        .unwrap();
    writer.finalize(root).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    let decoded = reader.read_f64(&[0, 0], &[96, 32]).unwrap();
    for (g, w) in decoded.iter().zip(data.iter()) {
        assert_eq!(g.to_bits(), w.to_bits());
    }
}

#[test]
fn test_pfor_lossy_within_tolerance() {
    let mut rng = StdRng::seed_from_u64(99);
    let scale = 20.0f32;
    let data: Vec<f32> = (0..60 * 40)
        .map(|_| rng.gen_range(-100.0f32..100.0))
        .collect();

    let buffer = write_f32_array(&data, &[60, 40], &[10, 10], OmCompression::PforDelta2d, scale);
    let mut reader = OmFileReader::new(buffer).unwrap();
    let decoded = reader.read_f32(&[0, 0], &[60, 40]).unwrap();
    // Half a quantisation step, plus slack for the float multiply.
    let tolerance = 1.0 / (2.0 * scale) + 1.0e-3;
    for (i, (g, w)) in decoded.iter().zip(data.iter()).enumerate() {
        assert!((g - w).abs() <= tolerance, "cell {}: {} vs {}", i, g, w);
    }
}

#[test]
fn test_pfor_nan_cells_survive() {
    let mut data: Vec<f32> = (0..20 * 20).map(|i| i as f32 * 0.5).collect();
    data[0] = f32::NAN;
    data[157] = f32::NAN;
    data[399] = f32::NAN;

    let buffer = write_f32_array(&data, &[20, 20], &[4, 7], OmCompression::PforDelta2d, 20.0);
    let mut reader = OmFileReader::new(buffer).unwrap();
    let decoded = reader.read_f32(&[0, 0], &[20, 20]).unwrap();
    for (i, (g, w)) in decoded.iter().zip(data.iter()).enumerate() {
        if w.is_nan() {
            assert!(g.is_nan(), "cell {} should be NaN", i);
        } else {
            assert!((g - w).abs() <= 0.025, "cell {}", i);
        }
    }
}

#[test]
fn test_pfor_logarithmic_roundtrip() {
    // Precipitation style data: non-negative, mostly tiny.
    let mut rng = StdRng::seed_from_u64(3);
    let data: Vec<f32> = (0..50 * 20)
        .map(|_| {
            if rng.gen_bool(0.7) {
                0.0
            } else {
                rng.gen_range(0.0f32..30.0)
            }
        })
        .collect();

    let buffer = write_f32_array(
        &data,
        &[50, 20],
        &[10, 10],
        OmCompression::PforDelta2dLogarithmic,
        1000.0,
    );
    let mut reader = OmFileReader::new(buffer).unwrap();
    let decoded = reader.read_f32(&[0, 0], &[50, 20]).unwrap();
    for (i, (g, w)) in decoded.iter().zip(data.iter()).enumerate() {
        let rel = (g - w).abs() / (1.0 + w);
        assert!(rel < 0.01, "cell {}: {} vs {}", i, g, w);
    }
}

#[test]
fn test_three_dimensional_roundtrip() {
    let dims = [6u64, 11, 23];
    let chunks = [2u64, 4, 9];
    let n: u64 = dims.iter().product();
    let data: Vec<f32> = (0..n).map(|i| i as f32).collect();

    let buffer = write_f32_array(&data, &dims, &chunks, OmCompression::FpxXor2d, 1.0);
    let mut reader = OmFileReader::new(buffer).unwrap();

    let full = reader.read_f32(&[0, 0, 0], &dims).unwrap();
    assert_eq!(full.len(), data.len());
    for (g, w) in full.iter().zip(data.iter()) {
        assert_eq!(g.to_bits(), w.to_bits());
    }

    // A skewed inner window.
    let window = reader.read_f32(&[1, 3, 10], &[4, 5, 8]).unwrap();
    for i0 in 0..4u64 {
        for i1 in 0..5u64 {
            for i2 in 0..8u64 {
                let want = data[(((1 + i0) * 11 + 3 + i1) * 23 + 10 + i2) as usize];
                let got = window[((i0 * 5 + i1) * 8 + i2) as usize];
                assert_eq!(got.to_bits(), want.to_bits());
            }
        }
    }
}
