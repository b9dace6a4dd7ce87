//! Conversions between external field values and typed internal values.

pub mod codec;
pub mod context;
pub mod error;
pub mod json;
pub mod registry;
pub mod text;
pub mod writetime;

pub use codec::{Codec, CodecRef};
pub use context::{ConversionContext, NumberFormat, TemporalFormat, TimeUnit};
pub use error::{ConversionError, UnsupportedConversion};
pub use registry::CodecRegistry;
