//! Port of the Open-Meteo `om` chunked-array file format to Rust
//!
//! An om file stores one or more N-dimensional numeric arrays, each cut
//! into rectangular chunks that are compressed independently with a
//! floating-point aware codec. A compressed look-up table maps chunk
//! indices to byte ranges, so arbitrary hyperrectangles can be read with
//! a handful of merged, size-bounded fetches against a slow backing
//! store.
//!
//! [`OmFileWriter`] and [`OmFileReader`] are the two types most users
//! need; the planner ([`OmDecoder`]) and the chunk compressor
//! ([`OmEncoder`]) underneath are available for custom I/O backends.
//!
//! # Writing and reading
//!
//! ```
//! use omfile::{OmCompression, OmDataType, OmFileReader, OmFileWriter};
//!
//! # fn main() -> Result<(), omfile::OmError> {
//! // Here we use a Cursor but a std::fs::File will work just fine
//! let mut buffer = std::io::Cursor::new(Vec::new());
//!
//! let mut writer = OmFileWriter::new(&mut buffer)?;
//! let data: Vec<f32> = (0..100).map(|i| i as f32 * 0.1).collect();
//! let root = writer.write_array(
//!     "temperature_2m",
//!     OmDataType::FloatArray,
//!     OmCompression::PforDelta2d,
//!     20.0,
//!     0.0,
//!     &[10, 10],
//!     &[5, 5],
//!     &data,
//!     &[],
//! )?;
//! writer.finalize(root)?;
//!
//! let mut reader = OmFileReader::new(buffer)?;
//! assert_eq!(reader.variable().name(), "temperature_2m");
//!
//! // The full array, or any sub-window of it.
//! let all = reader.read_f32(&[0, 0], &[10, 10])?;
//! assert_eq!(all.len(), 100);
//! let window = reader.read_f32(&[2, 3], &[4, 5])?;
//! assert_eq!(window.len(), 20);
//! # Ok(())
//! # }
//! ```
//!
//! # Attaching metadata
//!
//! Variables form a tree: any variable can reference earlier written
//! children, and the trailer points at the root.
//!
//! ```
//! use omfile::{OmFileReader, OmFileWriter, OmScalarValue};
//!
//! # fn main() -> Result<(), omfile::OmError> {
//! let mut buffer = std::io::Cursor::new(Vec::new());
//! let mut writer = OmFileWriter::new(&mut buffer)?;
//! let units = writer.write_scalar("units", &OmScalarValue::String("degC"), &[])?;
//! let root = writer.write_scalar("root", &OmScalarValue::None, &[units])?;
//! writer.finalize(root)?;
//!
//! let mut reader = OmFileReader::new(buffer)?;
//! let child = reader.child_by_name("units")?.unwrap();
//! assert_eq!(
//!     child.variable().scalar_value().unwrap(),
//!     OmScalarValue::String("degC")
//! );
//! # Ok(())
//! # }
//! ```

pub mod bitpack;
pub mod bitutil;
pub mod byteslice;
pub mod decoder;
pub mod delta2d;
pub mod encoder;
pub mod errors;
pub mod fpx;
pub mod om;
pub mod pfor;
pub mod reader;
pub mod varbyte;
pub mod writer;

pub use byteslice::OmCell;
pub use decoder::{OmDataRead, OmDecoder, OmIndexRead, OmRange};
pub use encoder::OmEncoder;
pub use errors::OmError;
pub use om::{
    OmCompression, OmDataType, OmHeaderV1, OmOffsetSize, OmScalarValue, OmVariable,
};
pub use reader::OmFileReader;
pub use writer::{write_legacy, OmFileWriter};

/// Result alias of this crate.
pub type Result<T> = std::result::Result<T, OmError>;
