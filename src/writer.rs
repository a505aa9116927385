//! High level file writing: header, chunk streams, compressed look-up
//! tables, the variable tree and the trailer.
//!
//! Variables are serialised bottom-up: every child must be written before
//! its parent so the parent can reference it, and the root variable is
//! written last, right before [`OmFileWriter::finalize`] puts its
//! location into the trailer.

use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::byteslice::{as_bytes, OmCell};
use crate::encoder::OmEncoder;
use crate::errors::OmError;
use crate::om::{
    write_header_v3, write_numeric_array, write_scalar, write_trailer, OmCompression, OmDataType,
    OmHeaderV1, OmOffsetSize, OmScalarValue, HEADER_V3_SIZE,
};

/// Table entries per compressed look-up-table group written by default.
pub const DEFAULT_LUT_CHUNK_ELEMENT_COUNT: u64 = 256;

/// Writes one om file to a seekable destination.
pub struct OmFileWriter<W: Write + Seek> {
    dst: W,
    position: u64,
}

impl<W: Write + Seek> OmFileWriter<W> {
    /// Writes the 3 byte file header and positions the writer behind it.
    pub fn new(mut dst: W) -> Result<Self, OmError> {
        dst.seek(SeekFrom::Start(0))?;
        write_header_v3(&mut dst)?;
        Ok(Self {
            dst,
            position: HEADER_V3_SIZE as u64,
        })
    }

    /// Current absolute write position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Compresses and writes one numeric array with its look-up table and
    /// descriptor. `data` is the full cube in row-major order.
    #[allow(clippy::too_many_arguments)]
    pub fn write_array<T: OmCell>(
        &mut self,
        name: &str,
        data_type: OmDataType,
        compression: OmCompression,
        scale_factor: f32,
        add_offset: f32,
        dims: &[u64],
        chunks: &[u64],
        data: &[T],
        children: &[OmOffsetSize],
    ) -> Result<OmOffsetSize, OmError> {
        self.write_array_with_lut_granularity(
            name,
            data_type,
            compression,
            scale_factor,
            add_offset,
            dims,
            chunks,
            data,
            children,
            DEFAULT_LUT_CHUNK_ELEMENT_COUNT,
        )
    }

    /// As [`OmFileWriter::write_array`] with an explicit number of table
    /// entries per compressed group; readers must use the same value.
    #[allow(clippy::too_many_arguments)]
    pub fn write_array_with_lut_granularity<T: OmCell>(
        &mut self,
        name: &str,
        data_type: OmDataType,
        compression: OmCompression,
        scale_factor: f32,
        add_offset: f32,
        dims: &[u64],
        chunks: &[u64],
        data: &[T],
        children: &[OmOffsetSize],
        lut_chunk_element_count: u64,
    ) -> Result<OmOffsetSize, OmError> {
        let encoder = OmEncoder::new(
            data_type,
            compression,
            scale_factor,
            add_offset,
            dims,
            chunks,
            lut_chunk_element_count,
        )?;
        let n_chunks = encoder.number_of_chunks();
        let element_size = data_type
            .array_element_size()
            .ok_or(OmError::InvalidDataType(data_type as u8))?;
        let cell_count: u64 = dims.iter().product();
        if std::mem::size_of::<T>() != element_size || data.len() as u64 != cell_count {
            return Err(OmError::InvalidDataType(data_type as u8));
        }
        let array = as_bytes(data);
        let array_offset = vec![0u64; dims.len()];

        let mut lut = Vec::with_capacity(n_chunks as usize + 1);
        lut.push(self.position);

        self.compress_chunks(&encoder, array, dims, &array_offset, n_chunks, &mut lut)?;

        // Compress the table into fixed-stride groups and append it.
        let mut lut_buffer = vec![0u8; encoder.lut_buffer_size(&lut)];
        let lut_size = encoder.compress_lut(&lut, &mut lut_buffer) as u64;
        let lut_offset = self.position;
        self.write_all(&lut_buffer[..lut_size as usize])?;

        let offset = self.position;
        let size = write_numeric_array(
            &mut self.dst,
            name,
            data_type,
            compression,
            scale_factor,
            add_offset,
            dims,
            chunks,
            lut_offset,
            lut_size,
            children,
        )? as u64;
        self.position += size;
        Ok(OmOffsetSize::new(offset, size))
    }

    #[cfg(not(feature = "parallel"))]
    fn compress_chunks(
        &mut self,
        encoder: &OmEncoder,
        array: &[u8],
        dims: &[u64],
        array_offset: &[u64],
        n_chunks: u64,
        lut: &mut Vec<u64>,
    ) -> Result<(), OmError> {
        let mut chunk_buffer = vec![0u8; encoder.chunk_buffer_size()];
        let mut compressed = vec![0u8; encoder.compressed_chunk_buffer_size()];
        for chunk in 0..n_chunks {
            let size = encoder.compress_chunk(
                array,
                dims,
                array_offset,
                dims,
                chunk,
                chunk,
                &mut compressed,
                &mut chunk_buffer,
            );
            self.write_all(&compressed[..size])?;
            lut.push(self.position);
        }
        Ok(())
    }

    /// Chunks are independent, so they compress on the rayon pool and are
    /// appended in index order afterwards.
    #[cfg(feature = "parallel")]
    fn compress_chunks(
        &mut self,
        encoder: &OmEncoder,
        array: &[u8],
        dims: &[u64],
        array_offset: &[u64],
        n_chunks: u64,
        lut: &mut Vec<u64>,
    ) -> Result<(), OmError> {
        use rayon::prelude::*;

        let compressed: Vec<Vec<u8>> = (0..n_chunks)
            .into_par_iter()
            .map_init(
                || {
                    (
                        vec![0u8; encoder.chunk_buffer_size()],
                        vec![0u8; encoder.compressed_chunk_buffer_size()],
                    )
                },
                |state: &mut (Vec<u8>, Vec<u8>), chunk| {
                    let (chunk_buffer, out) = state;
                    let size = encoder.compress_chunk(
                        array,
                        dims,
                        array_offset,
                        dims,
                        chunk,
                        chunk,
                        out,
                        chunk_buffer,
                    );
                    out[..size].to_vec()
                },
            )
            .collect();
        for bytes in &compressed {
            self.write_all(bytes)?;
            lut.push(self.position);
        }
        Ok(())
    }

    /// Writes a scalar variable descriptor.
    pub fn write_scalar(
        &mut self,
        name: &str,
        value: &OmScalarValue,
        children: &[OmOffsetSize],
    ) -> Result<OmOffsetSize, OmError> {
        let offset = self.position;
        let size = write_scalar(&mut self.dst, name, value, children)? as u64;
        self.position += size;
        Ok(OmOffsetSize::new(offset, size))
    }

    /// Writes the trailer pointing at the root variable and returns the
    /// destination.
    pub fn finalize(mut self, root: OmOffsetSize) -> Result<W, OmError> {
        write_trailer(&mut self.dst, root)?;
        self.dst.flush()?;
        Ok(self.dst)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), OmError> {
        self.dst.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }
}

/// Writes a complete version 2 file: the 40 byte header, the raw table of
/// chunk end offsets and the compressed chunks of one 2D float array.
pub fn write_legacy<W: Write + Seek>(
    mut dst: W,
    scale_factor: f32,
    dims: [u64; 2],
    chunks: [u64; 2],
    data: &[f32],
) -> Result<(), OmError> {
    let encoder = OmEncoder::new(
        OmDataType::FloatArray,
        OmCompression::PforDelta2d,
        scale_factor,
        0.0,
        &dims,
        &chunks,
        1,
    )?;
    let n_chunks = encoder.number_of_chunks();
    let array = as_bytes(data);

    let mut chunk_buffer = vec![0u8; encoder.chunk_buffer_size()];
    let mut compressed = vec![0u8; encoder.compressed_chunk_buffer_size()];
    let mut body = Vec::new();
    let mut lut = Vec::with_capacity(n_chunks as usize);
    for chunk in 0..n_chunks {
        let size = encoder.compress_chunk(
            array,
            &dims,
            &[0, 0],
            &dims,
            chunk,
            chunk,
            &mut compressed,
            &mut chunk_buffer,
        );
        body.extend_from_slice(&compressed[..size]);
        lut.push(body.len() as u64);
    }

    let header = OmHeaderV1 {
        version: 2,
        compression_type: OmCompression::PforDelta2d as u8,
        scale_factor,
        dim0: dims[0],
        dim1: dims[1],
        chunk0: chunks[0],
        chunk1: chunks[1],
    };
    header.write_to(&mut dst)?;
    for &end in &lut {
        dst.write_u64::<LittleEndian>(end)?;
    }
    dst.write_all(&body)?;
    dst.flush()?;
    Ok(())
}
