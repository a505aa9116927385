//! The write path: gathers chunks out of a source cube, filters and
//! compresses them, and compresses the resulting look-up table.
//!
//! Chunks are produced in their linear order; the caller appends each
//! compressed chunk to the file and records the running byte offsets as
//! the look-up table, which [`OmEncoder::compress_lut`] then groups and
//! delta-compresses with a fixed per-group stride for random access.

use crate::delta2d;
use crate::errors::OmError;
use crate::fpx;
use crate::om::copy::{
    copy16, copy32, copy64, copy8, copy_float_to_int16, copy_float_to_int16_log10, CopyFn,
};
use crate::om::{divide_rounded_up, OmCompression, OmDataType, MAX_LUT_ELEMENTS};
use crate::pfor;
use crate::varbyte::MAX_VARBYTE_LEN;

type FilterFn = fn(usize, usize, &mut [u8]);
type CompressFn = fn(&[u8], usize, &mut [u8]) -> usize;

/// Chunk compressor for one array variable.
pub struct OmEncoder {
    scale_factor: f32,
    add_offset: f32,
    dims: Vec<u64>,
    chunks: Vec<u64>,
    lut_chunk_element_count: u64,
    bytes_per_element: usize,
    bytes_per_element_compressed: usize,
    copy_fn: CopyFn,
    filter_fn: FilterFn,
    compress_fn: CompressFn,
}

impl OmEncoder {
    pub fn new(
        data_type: OmDataType,
        compression: OmCompression,
        scale_factor: f32,
        add_offset: f32,
        dims: &[u64],
        chunks: &[u64],
        lut_chunk_element_count: u64,
    ) -> Result<Self, OmError> {
        if lut_chunk_element_count == 0 || lut_chunk_element_count > MAX_LUT_ELEMENTS {
            return Err(OmError::InvalidLutChunkLength(lut_chunk_element_count));
        }
        if dims.is_empty()
            || chunks.len() != dims.len()
            || chunks.iter().zip(dims.iter()).any(|(&c, &d)| c == 0 || c > d)
        {
            return Err(OmError::OutOfBoundRead);
        }

        let (mut bytes_per_element, mut bytes_per_element_compressed, mut copy_fn): (
            usize,
            usize,
            CopyFn,
        ) = match data_type {
            OmDataType::Int8Array | OmDataType::Uint8Array => (1, 1, copy8),
            OmDataType::Int16Array | OmDataType::Uint16Array => (2, 2, copy16),
            OmDataType::Int32Array | OmDataType::Uint32Array | OmDataType::FloatArray => {
                (4, 4, copy32)
            }
            OmDataType::Int64Array | OmDataType::Uint64Array | OmDataType::DoubleArray => {
                (8, 8, copy64)
            }
            other => return Err(OmError::InvalidDataType(other as u8)),
        };

        let (filter_fn, compress_fn): (FilterFn, CompressFn) = match compression {
            OmCompression::PforDelta2d => {
                if data_type != OmDataType::FloatArray {
                    return Err(OmError::InvalidDataType(data_type as u8));
                }
                bytes_per_element = 4;
                bytes_per_element_compressed = 2;
                copy_fn = copy_float_to_int16;
                (delta2d::encode as FilterFn, pfor::zigzag_encode16 as CompressFn)
            }
            OmCompression::FpxXor2d => match data_type {
                OmDataType::FloatArray => {
                    (delta2d::encode_xor as FilterFn, fpx::encode32 as CompressFn)
                }
                OmDataType::DoubleArray => (
                    delta2d::encode_xor_double as FilterFn,
                    fpx::encode64 as CompressFn,
                ),
                other => return Err(OmError::InvalidDataType(other as u8)),
            },
            OmCompression::PforDelta2dLogarithmic => {
                if data_type != OmDataType::FloatArray {
                    return Err(OmError::InvalidDataType(data_type as u8));
                }
                bytes_per_element = 4;
                bytes_per_element_compressed = 2;
                copy_fn = copy_float_to_int16_log10;
                (delta2d::encode as FilterFn, pfor::zigzag_encode16 as CompressFn)
            }
            OmCompression::None => {
                return Err(OmError::InvalidCompressionType(OmCompression::None as u8))
            }
        };

        Ok(Self {
            scale_factor,
            add_offset,
            dims: dims.to_vec(),
            chunks: chunks.to_vec(),
            lut_chunk_element_count,
            bytes_per_element,
            bytes_per_element_compressed,
            copy_fn,
            filter_fn,
            compress_fn,
        })
    }

    /// Total number of chunks of the array.
    pub fn number_of_chunks(&self) -> u64 {
        let mut n = 1u64;
        for i in 0..self.dims.len() {
            n *= divide_rounded_up(self.dims[i], self.chunks[i]);
        }
        n
    }

    /// Number of chunks covered by a source cube of shape `array_count`.
    pub fn number_of_chunks_in_array(&self, array_count: &[u64]) -> u64 {
        let mut n = 1u64;
        for i in 0..self.dims.len() {
            n *= divide_rounded_up(array_count[i], self.chunks[i]);
        }
        n
    }

    /// Size in bytes of the scratch buffer holding one gathered chunk.
    pub fn chunk_buffer_size(&self) -> usize {
        self.chunk_length() as usize * self.bytes_per_element_compressed
    }

    /// Size in bytes the compressed output buffer of one chunk must have;
    /// the codec may write ahead up to 32 extra integers.
    pub fn compressed_chunk_buffer_size(&self) -> usize {
        let n = self.chunk_length() as usize;
        (n + 255) / 256 + (n + 32) * self.bytes_per_element_compressed
    }

    fn chunk_length(&self) -> u64 {
        let mut len = 1u64;
        for &c in &self.chunks {
            len *= c;
        }
        len
    }

    /// Size in bytes of the buffer [`OmEncoder::compress_lut`] writes
    /// into: the largest compressed group decides a common stride.
    pub fn lut_buffer_size(&self, lut: &[u64]) -> usize {
        let lcec = self.lut_chunk_element_count as usize;
        let n_lut_chunks = divide_rounded_up(lut.len() as u64, lcec as u64) as usize;
        let mut scratch = [0u8; MAX_LUT_ELEMENTS as usize * MAX_VARBYTE_LEN + 64];
        let mut max_length = 0usize;
        for group in lut.chunks(lcec) {
            max_length = max_length.max(pfor::delta_encode64(group, &mut scratch));
        }
        max_length * n_lut_chunks + 32 * 8
    }

    /// Delta-compresses the look-up table into groups of a fixed byte
    /// stride. `out` must have [`OmEncoder::lut_buffer_size`] bytes;
    /// returns the meaningful length (the trailing write-ahead slack of
    /// the buffer is excluded).
    pub fn compress_lut(&self, lut: &[u64], out: &mut [u8]) -> usize {
        let lcec = self.lut_chunk_element_count as usize;
        let n_lut_chunks = divide_rounded_up(lut.len() as u64, lcec as u64) as usize;
        let lut_size = out.len() - 32 * 8;
        let stride = lut_size / n_lut_chunks;

        for (i, group) in lut.chunks(lcec).enumerate() {
            pfor::delta_encode64(group, &mut out[i * stride..]);
        }
        lut_size
    }

    /// Gathers, filters and compresses one chunk out of the source cube.
    ///
    /// `array` is the source cube of shape `array_dims` (native-endian
    /// cells of the decoded element type); `array_offset`/`array_count`
    /// select the part of the cube holding array data. `chunk_index` is
    /// the linear chunk number; `chunk_offset` positions the chunk within
    /// the cube's own chunk grid and equals `chunk_index` whenever the
    /// cube covers the whole array. Returns the compressed size.
    #[allow(clippy::too_many_arguments)]
    pub fn compress_chunk(
        &self,
        array: &[u8],
        array_dims: &[u64],
        array_offset: &[u64],
        array_count: &[u64],
        chunk_index: u64,
        chunk_offset: u64,
        out: &mut [u8],
        chunk_buffer: &mut [u8],
    ) -> usize {
        let dim_count = self.dims.len();
        let mut rolling_multiply = 1u64;
        let mut rolling_multiply_chunk_length = 1u64;
        let mut rolling_multiply_target_cube = 1u64;
        let mut read_coordinate = 0u64;
        let mut write_coordinate = 0u64;
        let mut linear_read_count = 1u64;
        let mut linear_read = true;
        let mut length_last = 0u64;

        for i in (0..dim_count).rev() {
            let n_chunks_in_this_dim = divide_rounded_up(self.dims[i], self.chunks[i]);
            let c0 = (chunk_index / rolling_multiply) % n_chunks_in_this_dim;
            let c0_offset = (chunk_offset / rolling_multiply) % n_chunks_in_this_dim;
            let length0 =
                ((c0 + 1) * self.chunks[i]).min(self.dims[i]) - c0 * self.chunks[i];

            if i == dim_count - 1 {
                length_last = length0;
            }
            read_coordinate +=
                rolling_multiply_target_cube * (c0_offset * self.chunks[i] + array_offset[i]);
            debug_assert!(length0 <= array_count[i]);
            debug_assert!(length0 <= array_dims[i]);

            let whole = array_count[i] == length0 && array_dims[i] == length0;
            if i == dim_count - 1 && !whole {
                linear_read_count = length0;
                linear_read = false;
            }
            if linear_read && whole {
                linear_read_count *= length0;
            } else {
                linear_read = false;
            }

            rolling_multiply *= n_chunks_in_this_dim;
            rolling_multiply_target_cube *= array_dims[i];
            rolling_multiply_chunk_length *= length0;
        }

        let length_in_chunk = rolling_multiply_chunk_length;

        loop {
            let src = &array[read_coordinate as usize * self.bytes_per_element..];
            let dst =
                &mut chunk_buffer[write_coordinate as usize * self.bytes_per_element_compressed..];
            (self.copy_fn)(
                linear_read_count as usize,
                self.scale_factor,
                self.add_offset,
                src,
                dst,
            );

            read_coordinate += linear_read_count - 1;
            write_coordinate += linear_read_count;

            rolling_multiply_target_cube = 1;
            linear_read = true;
            linear_read_count = 1;

            for i in (0..dim_count).rev() {
                let q_pos = ((read_coordinate / rolling_multiply_target_cube) % array_dims[i]
                    - array_offset[i])
                    / self.chunks[i];
                let length0 =
                    ((q_pos + 1) * self.chunks[i]).min(array_count[i]) - q_pos * self.chunks[i];
                read_coordinate += rolling_multiply_target_cube;

                let whole = array_count[i] == length0 && array_dims[i] == length0;
                if i == dim_count - 1 && !whole {
                    linear_read_count = length0;
                    linear_read = false;
                }
                if linear_read && whole {
                    linear_read_count *= length0;
                } else {
                    linear_read = false;
                }

                let q0 = ((read_coordinate / rolling_multiply_target_cube) % array_dims[i]
                    - array_offset[i])
                    % self.chunks[i];
                if q0 != 0 && q0 != length0 {
                    break;
                }
                read_coordinate -= length0 * rolling_multiply_target_cube;
                rolling_multiply_target_cube *= array_dims[i];

                if i == 0 {
                    let rows = (length_in_chunk / length_last) as usize;
                    (self.filter_fn)(
                        rows,
                        length_last as usize,
                        &mut chunk_buffer
                            [..length_in_chunk as usize * self.bytes_per_element_compressed],
                    );
                    return (self.compress_fn)(
                        chunk_buffer,
                        length_in_chunk as usize,
                        out,
                    );
                }
            }
        }
    }
}
