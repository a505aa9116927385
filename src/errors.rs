//! Definitions of error related things.

use std::fmt;

/// Errors of this crate
#[derive(Debug)]
#[non_exhaustive]
pub enum OmError {
    /// The compression type code is not known
    InvalidCompressionType(u8),
    /// The data type is not known or not usable with the
    /// requested compression
    InvalidDataType(u8),
    /// The number of look-up-table entries per compressed group
    /// exceeds the supported maximum of 256
    InvalidLutChunkLength(u64),
    /// Corrupted data with a potential out-of-bound read
    OutOfBoundRead,
    /// The magic bytes or the version do not identify an om file
    NotAnOmFile,
    /// Wrapper around an io error from the std lib
    IoError(std::io::Error),
}

impl OmError {
    /// Numeric code of the error as used by the on-disk format
    /// collaborators; io errors have no stable code.
    pub fn code(&self) -> u8 {
        match self {
            OmError::InvalidCompressionType(_) => 1,
            OmError::InvalidDataType(_) => 2,
            OmError::InvalidLutChunkLength(_) => 3,
            OmError::OutOfBoundRead => 4,
            OmError::NotAnOmFile => 5,
            OmError::IoError(_) => u8::MAX,
        }
    }
}

impl From<std::io::Error> for OmError {
    fn from(e: std::io::Error) -> Self {
        OmError::IoError(e)
    }
}

impl fmt::Display for OmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            OmError::InvalidCompressionType(t) => {
                write!(f, "Compression type {} is not valid", t)
            }
            OmError::InvalidDataType(t) => write!(f, "Data type {} is not valid", t),
            OmError::InvalidLutChunkLength(n) => {
                write!(f, "Invalid LUT chunk length {}. Max 256.", n)
            }
            OmError::OutOfBoundRead => {
                write!(f, "Corrupted data with potential out-of-bound read")
            }
            OmError::NotAnOmFile => write!(f, "Not an om file"),
            OmError::IoError(e) => write!(f, "IoError: {}", e),
        }
    }
}

impl std::error::Error for OmError {}
