//! High level file reading: open a file, locate variables and materialise
//! window reads through the planner.
//!
//! The backing store only needs to satisfy positional reads; every fetch
//! the planner emits is a single `(offset, count)` range, so any
//! `Read + Seek` source works, files and in-memory cursors alike.

use std::io::{Read, Seek, SeekFrom};

use crate::byteslice::{as_bytes_mut, OmCell};
use crate::decoder::{OmDataRead, OmDecoder};
use crate::errors::OmError;
use crate::om::{
    header_type, read_trailer, OmDataType, OmHeaderType, OmOffsetSize, OmVariable,
    HEADER_READ_SIZE, TRAILER_SIZE,
};
use crate::writer::DEFAULT_LUT_CHUNK_ELEMENT_COUNT;

/// Ceiling for a single emitted read.
pub const DEFAULT_IO_SIZE_MAX: u64 = 65536;
/// Largest gap two reads are merged across.
pub const DEFAULT_IO_SIZE_MERGE: u64 = 512;

/// Reads one om file from a seekable source.
pub struct OmFileReader<R: Read + Seek> {
    src: R,
    variable_data: Vec<u8>,
}

impl<R: Read + Seek> OmFileReader<R> {
    /// Opens a file and loads its root variable: the trailer reference
    /// for version 3 files, the header itself for legacy files.
    pub fn new(mut src: R) -> Result<Self, OmError> {
        let mut probe = [0u8; 3];
        src.seek(SeekFrom::Start(0))?;
        src.read_exact(&mut probe).map_err(|_| OmError::NotAnOmFile)?;

        let variable_data = match header_type(&probe)? {
            OmHeaderType::Legacy => {
                let mut header = vec![0u8; HEADER_READ_SIZE];
                src.seek(SeekFrom::Start(0))?;
                src.read_exact(&mut header).map_err(|_| OmError::NotAnOmFile)?;
                header
            }
            OmHeaderType::Trailer => {
                let end = src.seek(SeekFrom::End(0))?;
                if end < TRAILER_SIZE as u64 {
                    return Err(OmError::NotAnOmFile);
                }
                let mut trailer = vec![0u8; TRAILER_SIZE];
                src.seek(SeekFrom::Start(end - TRAILER_SIZE as u64))?;
                src.read_exact(&mut trailer)?;
                let root = read_trailer(&trailer)?;
                read_range(&mut src, root)?
            }
        };
        // Must parse as a variable.
        OmVariable::parse(&variable_data)?;
        Ok(Self { src, variable_data })
    }

    /// The root (or currently opened) variable.
    pub fn variable(&self) -> OmVariable {
        OmVariable::parse(&self.variable_data).expect("validated at open")
    }

    /// Opens the n-th child of the current variable as its own reader
    /// view sharing the source.
    pub fn child(&mut self, n: usize) -> Result<Option<OmFileReader<&mut R>>, OmError> {
        let location = match self.variable().child(n) {
            Some(location) => location,
            None => return Ok(None),
        };
        let variable_data = read_range(&mut self.src, location)?;
        OmVariable::parse(&variable_data)?;
        Ok(Some(OmFileReader {
            src: &mut self.src,
            variable_data,
        }))
    }

    /// Finds a direct child variable by name.
    pub fn child_by_name(&mut self, name: &str) -> Result<Option<OmFileReader<&mut R>>, OmError> {
        let n_children = self.variable().number_of_children();
        for n in 0..n_children {
            let location = self.variable().child(n).expect("child count checked");
            let variable_data = read_range(&mut self.src, location)?;
            let variable = OmVariable::parse(&variable_data)?;
            if variable.name() == name {
                return Ok(Some(OmFileReader {
                    src: &mut self.src,
                    variable_data,
                }));
            }
        }
        Ok(None)
    }

    /// Reads the window `read_offset + read_count` of an `f32` array into
    /// a freshly allocated cube, untouched cells primed with `NaN`.
    pub fn read_f32(&mut self, read_offset: &[u64], read_count: &[u64]) -> Result<Vec<f32>, OmError> {
        let total: u64 = read_count.iter().product();
        let mut out = vec![f32::NAN; total as usize];
        let cube_offset = vec![0u64; read_offset.len()];
        self.read_into::<f32>(&mut out, read_offset, read_count, &cube_offset, read_count)?;
        Ok(out)
    }

    /// Reads the window of an `f64` array into a fresh cube.
    pub fn read_f64(&mut self, read_offset: &[u64], read_count: &[u64]) -> Result<Vec<f64>, OmError> {
        let total: u64 = read_count.iter().product();
        let mut out = vec![f64::NAN; total as usize];
        let cube_offset = vec![0u64; read_offset.len()];
        self.read_into::<f64>(&mut out, read_offset, read_count, &cube_offset, read_count)?;
        Ok(out)
    }

    /// Reads a window into the caller's cube of shape `cube_dims`,
    /// placing the window at `cube_offset`. Cells outside the window are
    /// left untouched.
    pub fn read_into<T: OmCell>(
        &mut self,
        into: &mut [T],
        read_offset: &[u64],
        read_count: &[u64],
        cube_offset: &[u64],
        cube_dims: &[u64],
    ) -> Result<(), OmError> {
        self.read_into_with_io_sizes(
            into,
            read_offset,
            read_count,
            cube_offset,
            cube_dims,
            DEFAULT_LUT_CHUNK_ELEMENT_COUNT,
            DEFAULT_IO_SIZE_MERGE,
            DEFAULT_IO_SIZE_MAX,
        )
    }

    /// As [`OmFileReader::read_into`] with explicit planner parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn read_into_with_io_sizes<T: OmCell>(
        &mut self,
        into: &mut [T],
        read_offset: &[u64],
        read_count: &[u64],
        cube_offset: &[u64],
        cube_dims: &[u64],
        lut_chunk_element_count: u64,
        io_size_merge: u64,
        io_size_max: u64,
    ) -> Result<(), OmError> {
        let variable = OmVariable::parse(&self.variable_data)?;
        let element_size = variable
            .data_type()
            .array_element_size()
            .ok_or(OmError::InvalidDataType(variable.data_type() as u8))?;
        if std::mem::size_of::<T>() != element_size {
            return Err(OmError::InvalidDataType(variable.data_type() as u8));
        }
        let cube_cells: u64 = cube_dims.iter().product();
        if into.len() as u64 != cube_cells {
            return Err(OmError::OutOfBoundRead);
        }
        for i in 0..read_offset.len().min(variable.dimensions().len()) {
            if read_offset[i] + read_count[i] > variable.dimensions()[i] {
                return Err(OmError::OutOfBoundRead);
            }
        }

        let decoder = OmDecoder::new(
            &variable,
            read_offset,
            read_count,
            cube_offset,
            cube_dims,
            lut_chunk_element_count,
            io_size_merge,
            io_size_max,
        )?;
        let into = as_bytes_mut(into);
        let mut chunk_buffer = vec![0u8; decoder.read_buffer_size()];

        let mut index_read = decoder.init_index_read();
        while decoder.next_index_read(&mut index_read) {
            let index_data = read_range(
                &mut self.src,
                OmOffsetSize::new(index_read.offset, index_read.count),
            )?;
            let mut data_read = OmDataRead::new(&index_read);
            while decoder.next_data_read(&mut data_read, &index_data)? {
                let data = read_range(
                    &mut self.src,
                    OmOffsetSize::new(data_read.offset, data_read.count),
                )?;
                decoder.decode_chunks(data_read.chunk_index, &data, into, &mut chunk_buffer)?;
            }
        }
        Ok(())
    }

    /// Whether the opened variable is a numeric array of `data_type`.
    pub fn is_array_of(&self, data_type: OmDataType) -> bool {
        self.variable().data_type() == data_type
    }
}

fn read_range<R: Read + Seek>(src: &mut R, range: OmOffsetSize) -> Result<Vec<u8>, OmError> {
    let mut bytes = vec![0u8; range.size as usize];
    src.seek(SeekFrom::Start(range.offset))?;
    src.read_exact(&mut bytes)?;
    Ok(bytes)
}
