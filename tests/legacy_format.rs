use std::io::Cursor;

use omfile::{write_legacy, OmFileReader};

fn assert_close(got: &[f32], want: &[f32], tolerance: f32) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want.iter()).enumerate() {
        assert!(
            (g - w).abs() <= tolerance,
            "cell {}: {} vs {}",
            i,
            g,
            w
        );
    }
}

#[test]
fn test_legacy_5x5_full_read() {
    let data: Vec<f32> = (0..25).map(|i| i as f32).collect();
    let mut buffer = Cursor::new(Vec::new());
    write_legacy(&mut buffer, 20.0, [5, 5], [2, 2], &data).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    assert_eq!(reader.variable().dimensions(), vec![5, 5]);
    assert_eq!(reader.variable().chunk_dimensions(), vec![2, 2]);

    let decoded = reader.read_f32(&[0, 0], &[5, 5]).unwrap();
    assert_close(&decoded, &data, 0.025);
}

#[test]
fn test_legacy_5x5_sub_window() {
    let data: Vec<f32> = (0..25).map(|i| i as f32).collect();
    let mut buffer = Cursor::new(Vec::new());
    write_legacy(&mut buffer, 20.0, [5, 5], [2, 2], &data).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    // rows [1..4), cols [2..5)
    let decoded = reader.read_f32(&[1, 2], &[3, 3]).unwrap();
    let expected = [7.0f32, 8.0, 9.0, 12.0, 13.0, 14.0, 17.0, 18.0, 19.0];
    assert_close(&decoded, &expected, 0.025);
}

#[test]
fn test_legacy_single_cell_reads() {
    let data: Vec<f32> = (0..25).map(|i| i as f32).collect();
    let mut buffer = Cursor::new(Vec::new());
    write_legacy(&mut buffer, 20.0, [5, 5], [2, 2], &data).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    for row in 0..5u64 {
        for col in 0..5u64 {
            let cell = reader.read_f32(&[row, col], &[1, 1]).unwrap();
            assert_close(&cell, &[(row * 5 + col) as f32], 0.025);
        }
    }
}

#[test]
fn test_legacy_larger_grid_with_splits() {
    // Enough chunks that index and data reads split with tiny IO limits.
    let dims = [40u64, 40];
    let chunks = [8u64, 8];
    let data: Vec<f32> = (0..40 * 40).map(|i| (i % 997) as f32 * 0.25).collect();
    let mut buffer = Cursor::new(Vec::new());
    write_legacy(&mut buffer, 20.0, dims, chunks, &data).unwrap();

    let mut reader = OmFileReader::new(buffer).unwrap();
    let mut decoded = vec![f32::NAN; 40 * 40];
    reader
        .read_into_with_io_sizes(
            &mut decoded,
            &[0, 0],
            &dims,
            &[0, 0],
            &dims,
            1,
            16,  // io_size_merge
            128, // io_size_max forces many small reads
        )
        .unwrap();
    assert_close(&decoded, &data, 0.025);
}
