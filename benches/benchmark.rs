#[macro_use]
extern crate criterion;
extern crate omfile;

use std::io::Cursor;

use criterion::Criterion;

use omfile::{OmCompression, OmDataType, OmFileReader, OmFileWriter};

fn synthetic_cube(cells: usize) -> Vec<f32> {
    (0..cells)
        .map(|i| (i as f32 * 0.02).sin() * 25.0 + (i % 7) as f32 * 0.1)
        .collect()
}

fn write_file(data: &[f32], dims: &[u64], chunks: &[u64], compression: OmCompression) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = OmFileWriter::new(&mut buffer).unwrap();
    let root = writer
        .write_array(
            "data",
            OmDataType::FloatArray,
            compression,
            20.0,
            0.0,
            dims,
            chunks,
            data,
            &[],
        )
        .unwrap();
    writer.finalize(root).unwrap();
    buffer.into_inner()
}

fn compression_benchmark(c: &mut Criterion) {
    let dims = [256u64, 256];
    let chunks = [32u64, 256];
    let data = synthetic_cube((dims[0] * dims[1]) as usize);

    c.bench_function("write_pfor_256x256", |b| {
        b.iter(|| write_file(&data, &dims, &chunks, OmCompression::PforDelta2d))
    });
    c.bench_function("write_fpx_256x256", |b| {
        b.iter(|| write_file(&data, &dims, &chunks, OmCompression::FpxXor2d))
    });
}

fn decompression_benchmark(c: &mut Criterion) {
    let dims = [256u64, 256];
    let chunks = [32u64, 256];
    let data = synthetic_cube((dims[0] * dims[1]) as usize);

    let pfor = write_file(&data, &dims, &chunks, OmCompression::PforDelta2d);
    c.bench_function("read_pfor_full", |b| {
        b.iter(|| {
            let mut reader = OmFileReader::new(Cursor::new(pfor.clone())).unwrap();
            reader.read_f32(&[0, 0], &[256, 256]).unwrap()
        })
    });

    let fpx = write_file(&data, &dims, &chunks, OmCompression::FpxXor2d);
    c.bench_function("read_fpx_window", |b| {
        b.iter(|| {
            let mut reader = OmFileReader::new(Cursor::new(fpx.clone())).unwrap();
            reader.read_f32(&[100, 30], &[64, 100]).unwrap()
        })
    });
}

criterion_group!(benches, compression_benchmark, decompression_benchmark);
criterion_main!(benches);
