//! The read planner: turns an N-dimensional read request into a minimal
//! sequence of merged, size-bounded reads against the backing store.
//!
//! Reading happens in two rounds driven by caller iteration. First
//! [`OmDecoder::next_index_read`] yields byte ranges over the compressed
//! look-up table; the caller fetches each range and feeds it to
//! [`OmDecoder::next_data_read`], which decompresses the table groups it
//! needs and yields byte ranges over the chunk data. Each data range is
//! then handed to [`OmDecoder::decode_chunks`] together with the fetched
//! bytes, which decodes every covered chunk and projects its intersection
//! with the request window into the caller's output cube.
//!
//! Consecutive chunk ranges are merged while the gap between them stays
//! within `io_size_merge`; no emitted read exceeds `io_size_max` plus one
//! table group. The planner holds no I/O resources itself; waits happen
//! in the caller between the `next_*` calls.

use crate::delta2d;
use crate::errors::OmError;
use crate::fpx;
use crate::om::copy::{
    copy16, copy32, copy64, copy8, copy_int16_to_float, copy_int16_to_float_log10, CopyFn,
};
use crate::om::{divide_rounded_up, OmCompression, OmDataType, OmVariable, MAX_LUT_ELEMENTS};
use crate::pfor;

/// A half open `[lower, upper)` range of linear chunk indices.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct OmRange {
    pub lower: u64,
    pub upper: u64,
}

impl OmRange {
    pub fn new(lower: u64, upper: u64) -> Self {
        Self { lower, upper }
    }

    pub fn is_empty(&self) -> bool {
        self.lower >= self.upper
    }
}

/// One byte range to fetch from the compressed look-up table.
#[derive(Debug, Clone, Default)]
pub struct OmIndexRead {
    /// Absolute file offset to read from.
    pub offset: u64,
    /// Number of bytes to read.
    pub count: u64,
    /// Chunk indices whose table entries the fetched bytes cover.
    pub index_range: OmRange,
    /// Chunk range this read was planned for.
    pub chunk_index: OmRange,
    /// Where planning continues on the next call.
    pub next_chunk: OmRange,
}

/// One byte range to fetch from the chunk data region.
#[derive(Debug, Clone, Default)]
pub struct OmDataRead {
    pub offset: u64,
    pub count: u64,
    pub index_range: OmRange,
    /// Chunks covered by the fetched bytes, decoded by
    /// [`OmDecoder::decode_chunks`].
    pub chunk_index: OmRange,
    pub next_chunk: OmRange,
}

impl OmDataRead {
    /// Starts the data-read iteration for one fulfilled index read.
    pub fn new(index_read: &OmIndexRead) -> Self {
        Self {
            offset: 0,
            count: 0,
            index_range: index_read.index_range,
            chunk_index: OmRange::default(),
            next_chunk: index_read.chunk_index,
        }
    }
}

type FilterFn = fn(usize, usize, &mut [u8]);
type DecompressFn = fn(&[u8], usize, &mut [u8]) -> Option<usize>;

/// Planner and chunk decoder for one array variable.
///
/// The decoder is cheap to construct and single threaded; run one per
/// thread for parallel reads of the same file.
pub struct OmDecoder {
    number_of_chunks: u64,
    scale_factor: f32,
    add_offset: f32,
    dims: Vec<u64>,
    chunks: Vec<u64>,
    read_offset: Vec<u64>,
    read_count: Vec<u64>,
    cube_offset: Vec<u64>,
    cube_dims: Vec<u64>,
    lut_chunk_length: u64,
    lut_chunk_element_count: u64,
    lut_start: u64,
    io_size_merge: u64,
    io_size_max: u64,
    bytes_per_element: usize,
    bytes_per_element_compressed: usize,
    copy_fn: CopyFn,
    filter_fn: FilterFn,
    decompress_fn: DecompressFn,
}

impl OmDecoder {
    /// Plans reads of the window `read_offset + read_count` of `variable`
    /// into a cube of shape `cube_dims` at `cube_offset`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        variable: &OmVariable,
        read_offset: &[u64],
        read_count: &[u64],
        cube_offset: &[u64],
        cube_dims: &[u64],
        lut_chunk_element_count: u64,
        io_size_merge: u64,
        io_size_max: u64,
    ) -> Result<Self, OmError> {
        let (scale_factor, add_offset, data_type, compression, lut_size, lut_start, dims, chunks, lut_chunk_element_count) =
            match variable {
                OmVariable::Legacy(header) => {
                    let compression = if header.version == 1 {
                        OmCompression::PforDelta2d
                    } else {
                        OmCompression::from_u8(header.compression_type)?
                    };
                    (
                        header.scale_factor,
                        0.0,
                        OmDataType::FloatArray,
                        compression,
                        0u64,
                        crate::om::HEADER_READ_SIZE as u64,
                        vec![header.dim0, header.dim1],
                        vec![header.chunk0, header.chunk1],
                        1u64,
                    )
                }
                OmVariable::Array(array) => (
                    array.scale_factor,
                    array.add_offset,
                    array.data_type,
                    array.compression,
                    array.lut_size,
                    array.lut_offset,
                    variable.dimensions(),
                    variable.chunk_dimensions(),
                    lut_chunk_element_count,
                ),
                OmVariable::Scalar(scalar) => {
                    return Err(OmError::InvalidDataType(scalar.data_type as u8))
                }
            };

        if lut_chunk_element_count == 0 || lut_chunk_element_count > MAX_LUT_ELEMENTS {
            return Err(OmError::InvalidLutChunkLength(lut_chunk_element_count));
        }
        let dim_count = dims.len();
        if dim_count == 0
            || chunks.len() != dim_count
            || read_offset.len() != dim_count
            || read_count.len() != dim_count
            || cube_offset.len() != dim_count
            || cube_dims.len() != dim_count
        {
            return Err(OmError::OutOfBoundRead);
        }
        if chunks.iter().zip(dims.iter()).any(|(&c, &d)| c == 0 || c > d) {
            return Err(OmError::OutOfBoundRead);
        }

        let mut number_of_chunks = 1u64;
        for i in 0..dim_count {
            number_of_chunks *= divide_rounded_up(dims[i], chunks[i]);
        }
        let n_lut_chunks = divide_rounded_up(number_of_chunks + 1, lut_chunk_element_count);
        let lut_chunk_length = if lut_chunk_element_count == 1 {
            // Legacy files store the table as raw u64 entries.
            8
        } else {
            let length = lut_size / n_lut_chunks;
            if length == 0 {
                return Err(OmError::OutOfBoundRead);
            }
            length
        };

        // Element sizes per data type; the compression tag then overrides
        // them for the scaled 16-bit codecs.
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

        let (filter_fn, decompress_fn): (FilterFn, DecompressFn) = match compression {
            OmCompression::PforDelta2d => {
                if data_type != OmDataType::FloatArray {
                    return Err(OmError::InvalidDataType(data_type as u8));
                }
                bytes_per_element = 4;
                bytes_per_element_compressed = 2;
                copy_fn = copy_int16_to_float;
                (delta2d::decode as FilterFn, pfor::zigzag_decode16 as DecompressFn)
            }
            OmCompression::FpxXor2d => match data_type {
                OmDataType::FloatArray => {
                    (delta2d::decode_xor as FilterFn, fpx::decode32 as DecompressFn)
                }
                OmDataType::DoubleArray => (
                    delta2d::decode_xor_double as FilterFn,
                    fpx::decode64 as DecompressFn,
                ),
                other => return Err(OmError::InvalidDataType(other as u8)),
            },
            OmCompression::PforDelta2dLogarithmic => {
                if data_type != OmDataType::FloatArray {
                    return Err(OmError::InvalidDataType(data_type as u8));
                }
                bytes_per_element = 4;
                bytes_per_element_compressed = 2;
                copy_fn = copy_int16_to_float_log10;
                (delta2d::decode as FilterFn, pfor::zigzag_decode16 as DecompressFn)
            }
            OmCompression::None => {
                return Err(OmError::InvalidCompressionType(OmCompression::None as u8))
            }
        };

        Ok(Self {
            number_of_chunks,
            scale_factor,
            add_offset,
            dims,
            chunks,
            read_offset: read_offset.to_vec(),
            read_count: read_count.to_vec(),
            cube_offset: cube_offset.to_vec(),
            cube_dims: cube_dims.to_vec(),
            lut_chunk_length,
            lut_chunk_element_count,
            lut_start,
            io_size_merge,
            io_size_max,
            bytes_per_element,
            bytes_per_element_compressed,
            copy_fn,
            filter_fn,
            decompress_fn,
        })
    }

    /// Size in bytes of the scratch buffer one decoded chunk needs.
    pub fn read_buffer_size(&self) -> usize {
        let mut chunk_length = 1u64;
        for &c in &self.chunks {
            chunk_length *= c;
        }
        chunk_length as usize * self.bytes_per_element
    }

    /// Begins the index-read iteration over the requested window.
    pub fn init_index_read(&self) -> OmIndexRead {
        let mut chunk_start = 0u64;
        let mut chunk_end = 1u64;
        for i in 0..self.dims.len() {
            let chunk_in_this_dim_lower = self.read_offset[i] / self.chunks[i];
            let chunk_in_this_dim_upper =
                divide_rounded_up(self.read_offset[i] + self.read_count[i], self.chunks[i]);
            let chunk_in_this_dim_count = chunk_in_this_dim_upper - chunk_in_this_dim_lower;
            let n_chunks_in_this_dim = divide_rounded_up(self.dims[i], self.chunks[i]);

            chunk_start = chunk_start * n_chunks_in_this_dim + chunk_in_this_dim_lower;
            if self.read_count[i] == self.dims[i] {
                // The entire dimension is read
                chunk_end *= n_chunks_in_this_dim;
            } else {
                // Only parts of this dimension are read
                chunk_end = chunk_start + chunk_in_this_dim_count;
            }
        }
        OmIndexRead {
            offset: 0,
            count: 0,
            index_range: OmRange::default(),
            chunk_index: OmRange::default(),
            next_chunk: OmRange::new(chunk_start, chunk_end),
        }
    }

    /// Advances `chunk_index.lower` to the next chunk of the window and
    /// sets `upper` to the end of its linear run. Returns `false` once
    /// the window is exhausted.
    fn next_chunk_position(&self, chunk_index: &mut OmRange) -> bool {
        let mut rolling_multiply = 1u64;
        // Number of consecutive chunks that can be read linearly.
        let mut linear_read_count = 1u64;
        let mut linear_read = true;
        let dim_count = self.dims.len();

        for i in (0..dim_count).rev() {
            let n_chunks_in_this_dim = divide_rounded_up(self.dims[i], self.chunks[i]);
            let chunk_in_this_dim_lower = self.read_offset[i] / self.chunks[i];
            let chunk_in_this_dim_upper =
                divide_rounded_up(self.read_offset[i] + self.read_count[i], self.chunks[i]);
            let chunk_in_this_dim_count = chunk_in_this_dim_upper - chunk_in_this_dim_lower;

            // Move forward by one.
            chunk_index.lower += rolling_multiply;

            if i == dim_count - 1 && self.dims[i] != self.read_count[i] {
                // Fast dimension and only partially read.
                linear_read_count = chunk_in_this_dim_count;
                linear_read = false;
            }
            if linear_read && self.dims[i] == self.read_count[i] {
                // The dimension is read entirely.
                linear_read_count *= n_chunks_in_this_dim;
            } else {
                linear_read = false;
            }

            let c0 = (chunk_index.lower / rolling_multiply) % n_chunks_in_this_dim;
            if c0 != chunk_in_this_dim_upper && c0 != 0 {
                break; // No overflow in this dimension.
            }
            chunk_index.lower -= chunk_in_this_dim_count * rolling_multiply;
            rolling_multiply *= n_chunks_in_this_dim;

            if i == 0 {
                // All chunks have been processed.
                chunk_index.upper = chunk_index.lower;
                return false;
            }
        }
        chunk_index.upper = chunk_index.lower + linear_read_count;
        true
    }

    /// Produces the next merged read over the look-up table. Returns
    /// `false` when the request needs no further index data.
    pub fn next_index_read(&self, index_read: &mut OmIndexRead) -> bool {
        if index_read.next_chunk.is_empty() {
            return false;
        }
        index_read.chunk_index = index_read.next_chunk;
        index_read.index_range.lower = index_read.next_chunk.lower;

        let mut chunk_index = index_read.next_chunk.lower;

        let is_v3_lut = self.lut_chunk_element_count > 1;
        let align_offset = if is_v3_lut || index_read.index_range.lower == 0 {
            0
        } else {
            1
        };
        let end_align_offset: u64 = if is_v3_lut { 1 } else { 0 };
        let lcec = self.lut_chunk_element_count;
        let lcl = self.lut_chunk_length;

        let read_start = (index_read.next_chunk.lower - align_offset) / lcec * lcl;

        loop {
            let max_read = self.io_size_max / lcl * lcec;
            let next_increment =
                1.max(max_read.min(index_read.next_chunk.upper - index_read.next_chunk.lower - 1));

            let advanced_within_run;
            if index_read.next_chunk.lower + next_increment >= index_read.next_chunk.upper {
                // Jump to the next linear run.
                if !self.next_chunk_position(&mut index_read.next_chunk) {
                    break;
                }
                advanced_within_run = false;
                let read_start_next = match ((index_read.next_chunk.lower + end_align_offset)
                    / lcec
                    * lcl)
                    .checked_sub(lcl)
                {
                    Some(v) => v,
                    None => break,
                };
                let read_end_previous = chunk_index / lcec * lcl;
                match read_start_next.checked_sub(read_end_previous) {
                    Some(gap) if gap <= self.io_size_merge => {}
                    _ => break,
                }
            } else {
                index_read.next_chunk.lower += next_increment;
                advanced_within_run = true;
            }

            let read_end_next = (index_read.next_chunk.lower + end_align_offset) / lcec * lcl;
            if read_end_next - read_start > self.io_size_max {
                if advanced_within_run {
                    // Unwind so the next index read resumes right after
                    // the last confirmed chunk.
                    index_read.next_chunk.lower = chunk_index + 1;
                }
                break;
            }
            chunk_index = index_read.next_chunk.lower;
        }

        let read_end = ((chunk_index + end_align_offset) / lcec + 1) * lcl;
        index_read.offset = self.lut_start + read_start;
        index_read.count = read_end - read_start;
        index_read.index_range.upper = chunk_index + 1;
        true
    }

    /// Produces the next merged read over the chunk data, lazily
    /// decompressing the look-up table groups covered by `index_data`.
    /// Returns `Ok(false)` once the index read is exhausted.
    pub fn next_data_read(
        &self,
        data_read: &mut OmDataRead,
        index_data: &[u8],
    ) -> Result<bool, OmError> {
        if data_read.next_chunk.is_empty() {
            return Ok(false);
        }
        let mut chunk_index = data_read.next_chunk.lower;
        data_read.chunk_index.lower = chunk_index;

        let lcec = self.lut_chunk_element_count;
        let lcl = self.lut_chunk_length;

        if lcec == 1 {
            return self.next_data_read_legacy(data_read, index_data, chunk_index);
        }

        let mut uncompressed_lut = [0u64; MAX_LUT_ELEMENTS as usize];

        // Which table group is currently decoded into the scratch.
        let mut lut_chunk = chunk_index / lcec;
        // Byte offset of `index_data` within the whole table.
        let lut_offset = data_read.index_range.lower / lcec * lcl;

        self.decompress_lut_chunk(lut_chunk, lut_offset, index_data, &mut uncompressed_lut)?;

        let start_pos = uncompressed_lut[(chunk_index % lcec) as usize];
        let mut end_pos = start_pos;

        loop {
            let next_lut_chunk = (data_read.next_chunk.lower + 1) / lcec;
            if next_lut_chunk != lut_chunk {
                self.decompress_lut_chunk(
                    next_lut_chunk,
                    lut_offset,
                    index_data,
                    &mut uncompressed_lut,
                )?;
                lut_chunk = next_lut_chunk;
            }
            let data_end_pos =
                uncompressed_lut[((data_read.next_chunk.lower + 1) % lcec) as usize];

            // Merge and split IO requests, ensuring at least one is sent.
            if start_pos != end_pos
                && !is_mergeable(start_pos, end_pos, data_end_pos, self.io_size_max, self.io_size_merge)
            {
                break;
            }
            end_pos = data_end_pos;
            chunk_index = data_read.next_chunk.lower;

            if chunk_index + 1 >= data_read.next_chunk.upper {
                if !self.next_chunk_position(&mut data_read.next_chunk) {
                    break;
                }
            } else {
                data_read.next_chunk.lower += 1;
            }
            if data_read.next_chunk.lower >= data_read.index_range.upper {
                data_read.next_chunk = OmRange::default();
                break;
            }
        }

        if end_pos < start_pos {
            return Err(OmError::OutOfBoundRead);
        }
        data_read.offset = start_pos;
        data_read.count = end_pos - start_pos;
        data_read.chunk_index.upper = chunk_index + 1;
        Ok(true)
    }

    /// Legacy files keep the table as one raw u64 end offset per chunk,
    /// located right after the header; the data region follows the table.
    fn next_data_read_legacy(
        &self,
        data_read: &mut OmDataRead,
        index_data: &[u8],
        mut chunk_index: u64,
    ) -> Result<bool, OmError> {
        // First table entry the index read fetched.
        let first_entry = data_read.index_range.lower.saturating_sub(1);

        let entry = |chunk: u64| -> Result<u64, OmError> {
            let pos = chunk
                .checked_sub(first_entry)
                .ok_or(OmError::OutOfBoundRead)? as usize;
            let bytes = index_data
                .get(pos * 8..pos * 8 + 8)
                .ok_or(OmError::OutOfBoundRead)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Ok(u64::from_le_bytes(raw))
        };

        // Entry k holds the end offset of chunk k; chunk 0 starts at 0.
        let start_pos = if chunk_index == 0 {
            0
        } else {
            entry(chunk_index - 1)?
        };
        let mut end_pos = start_pos;

        loop {
            let data_end_pos = entry(data_read.next_chunk.lower)?;

            if start_pos != end_pos
                && !is_mergeable(start_pos, end_pos, data_end_pos, self.io_size_max, self.io_size_merge)
            {
                break;
            }
            end_pos = data_end_pos;
            chunk_index = data_read.next_chunk.lower;

            if data_read.next_chunk.lower + 1 >= data_read.next_chunk.upper {
                if !self.next_chunk_position(&mut data_read.next_chunk) {
                    break;
                }
            } else {
                data_read.next_chunk.lower += 1;
            }
            if data_read.next_chunk.lower >= data_read.index_range.upper {
                data_read.next_chunk = OmRange::default();
                break;
            }
        }

        if end_pos < start_pos {
            return Err(OmError::OutOfBoundRead);
        }
        // Old files do not compress the table and data follows it.
        let data_start = crate::om::HEADER_READ_SIZE as u64 + self.number_of_chunks * 8;
        data_read.offset = start_pos + data_start;
        data_read.count = end_pos - start_pos;
        data_read.chunk_index.upper = chunk_index + 1;
        Ok(true)
    }

    fn decompress_lut_chunk(
        &self,
        lut_chunk: u64,
        lut_offset: u64,
        index_data: &[u8],
        uncompressed_lut: &mut [u64; MAX_LUT_ELEMENTS as usize],
    ) -> Result<(), OmError> {
        let lcec = self.lut_chunk_element_count;
        let lcl = self.lut_chunk_length;
        let element_count =
            ((lut_chunk + 1) * lcec).min(self.number_of_chunks + 1) - lut_chunk * lcec;
        let start = (lut_chunk * lcl)
            .checked_sub(lut_offset)
            .ok_or(OmError::OutOfBoundRead)? as usize;
        let group = index_data
            .get(start..start + lcl as usize)
            .ok_or(OmError::OutOfBoundRead)?;
        pfor::delta_decode64(group, element_count as usize, uncompressed_lut)
            .ok_or(OmError::OutOfBoundRead)?;
        Ok(())
    }

    /// Decodes every chunk covered by one fulfilled data read and copies
    /// the window intersections into the output cube. The internal cursor
    /// must consume `data` exactly; any mismatch reports corrupted data.
    pub fn decode_chunks(
        &self,
        chunk: OmRange,
        data: &[u8],
        into: &mut [u8],
        chunk_buffer: &mut [u8],
    ) -> Result<(), OmError> {
        let mut pos = 0usize;
        for chunk_num in chunk.lower..chunk.upper {
            if pos >= data.len() {
                return Err(OmError::OutOfBoundRead);
            }
            pos += self.decode_chunk(chunk_num, &data[pos..], into, chunk_buffer)?;
        }
        if pos != data.len() {
            return Err(OmError::OutOfBoundRead);
        }
        Ok(())
    }

    /// Decodes a single chunk, returning the compressed bytes consumed.
    fn decode_chunk(
        &self,
        chunk: u64,
        data: &[u8],
        into: &mut [u8],
        chunk_buffer: &mut [u8],
    ) -> Result<usize, OmError> {
        let dim_count = self.dims.len();
        let mut rolling_multiply = 1u64;
        let mut rolling_multiply_chunk_length = 1u64;
        let mut rolling_multiply_target_cube = 1u64;

        let mut d = 0u64; // Read coordinate in the chunk buffer.
        let mut q = 0u64; // Write coordinate in the output cube.
        let mut linear_read_count = 1u64;
        let mut linear_read = true;
        let mut length_last = 0u64;
        let mut no_data = false;

        // Count length in chunk and find the first buffer offsets.
        for i in (0..dim_count).rev() {
            let n_chunks_in_this_dim = divide_rounded_up(self.dims[i], self.chunks[i]);
            let c0 = (chunk / rolling_multiply) % n_chunks_in_this_dim;
            let length0 =
                ((c0 + 1) * self.chunks[i]).min(self.dims[i]) - c0 * self.chunks[i];

            let chunk_global_start = c0 * self.chunks[i];
            let chunk_global_end = chunk_global_start + length0;
            let clamped_global_start = chunk_global_start.max(self.read_offset[i]);
            let clamped_global_end =
                chunk_global_end.min(self.read_offset[i] + self.read_count[i]);

            if self.read_offset[i] + self.read_count[i] <= chunk_global_start
                || self.read_offset[i] >= chunk_global_end
            {
                no_data = true;
            }
            let clamped_local_start = clamped_global_start.saturating_sub(chunk_global_start);
            let length_read = clamped_global_end.saturating_sub(clamped_global_start);

            if i == dim_count - 1 {
                length_last = length0;
            }

            if !no_data {
                let d0 = clamped_local_start;
                let t0 = chunk_global_start + d0 - self.read_offset[i];
                let q0 = t0 + self.cube_offset[i];
                d += rolling_multiply_chunk_length * d0;
                q += rolling_multiply_target_cube * q0;
            }

            let whole = length_read == length0
                && self.read_count[i] == length0
                && self.cube_dims[i] == length0;
            if i == dim_count - 1 && !whole {
                // Fast dimension, only partially read.
                linear_read_count = length_read;
                linear_read = false;
            }
            if linear_read && whole {
                // Read entirely; copies linearly into the output buffer.
                linear_read_count *= length0;
            } else {
                linear_read = false;
            }

            rolling_multiply *= n_chunks_in_this_dim;
            rolling_multiply_target_cube *= self.cube_dims[i];
            rolling_multiply_chunk_length *= length0;
        }

        let length_in_chunk = rolling_multiply_chunk_length as usize;
        let consumed = (self.decompress_fn)(data, length_in_chunk, chunk_buffer)
            .ok_or(OmError::OutOfBoundRead)?;

        if no_data {
            return Ok(consumed);
        }

        (self.filter_fn)(
            length_in_chunk / length_last as usize,
            length_last as usize,
            &mut chunk_buffer[..length_in_chunk * self.bytes_per_element_compressed],
        );

        // Copy the window intersection from the chunk buffer into the
        // output cube, one linear run at a time.
        loop {
            let src = &chunk_buffer[d as usize * self.bytes_per_element_compressed..];
            let dst = &mut into[q as usize * self.bytes_per_element..];
            (self.copy_fn)(
                linear_read_count as usize,
                self.scale_factor,
                self.add_offset,
                src,
                dst,
            );

            q += linear_read_count - 1;
            d += linear_read_count - 1;

            rolling_multiply = 1;
            rolling_multiply_target_cube = 1;
            rolling_multiply_chunk_length = 1;
            linear_read_count = 1;
            linear_read = true;

            for i in (0..dim_count).rev() {
                let n_chunks_in_this_dim = divide_rounded_up(self.dims[i], self.chunks[i]);
                let c0 = (chunk / rolling_multiply) % n_chunks_in_this_dim;
                let length0 =
                    ((c0 + 1) * self.chunks[i]).min(self.dims[i]) - c0 * self.chunks[i];

                let chunk_global_start = c0 * self.chunks[i];
                let chunk_global_end = chunk_global_start + length0;
                let clamped_global_start = chunk_global_start.max(self.read_offset[i]);
                let clamped_global_end =
                    chunk_global_end.min(self.read_offset[i] + self.read_count[i]);
                let clamped_local_end = clamped_global_end - chunk_global_start;
                let length_read = clamped_global_end - clamped_global_start;

                d += rolling_multiply_chunk_length;
                q += rolling_multiply_target_cube;

                let whole = length_read == length0
                    && self.read_count[i] == length0
                    && self.cube_dims[i] == length0;
                if i == dim_count - 1 && !whole {
                    linear_read_count = length_read;
                    linear_read = false;
                }
                if linear_read && whole {
                    linear_read_count *= length0;
                } else {
                    linear_read = false;
                }

                let d0 = (d / rolling_multiply_chunk_length) % length0;
                if d0 != clamped_local_end && d0 != 0 {
                    break; // No overflow in this dimension.
                }
                d -= length_read * rolling_multiply_chunk_length;
                q -= length_read * rolling_multiply_target_cube;

                rolling_multiply *= n_chunks_in_this_dim;
                rolling_multiply_target_cube *= self.cube_dims[i];
                rolling_multiply_chunk_length *= length0;

                if i == 0 {
                    return Ok(consumed); // End of iteration.
                }
            }
        }
    }
}

/// Whether extending a read from `[start, end)` to `data_end` keeps it
/// within the size ceiling and the merge gap.
#[inline]
fn is_mergeable(start: u64, end: u64, data_end: u64, io_size_max: u64, io_size_merge: u64) -> bool {
    match (data_end.checked_sub(start), data_end.checked_sub(end)) {
        (Some(total), Some(gap)) => total <= io_size_max && gap <= io_size_merge,
        _ => false,
    }
}
