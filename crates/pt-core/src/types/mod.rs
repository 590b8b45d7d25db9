//! Core data types: venue and feed enums plus the normalized price record.

pub mod enums;
pub mod price;

pub use enums::*;
pub use price::*;
