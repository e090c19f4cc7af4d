pub mod analyzer;
pub mod decoder;
pub mod normalizer;
pub mod types;
pub mod utils;

pub use analyzer::{column_statistics, describe_sheet, validate};
pub use decoder::{decode, DecodeError};
pub use normalizer::normalize;
