//! Built-in FHIRPath function implementations, grouped by category

pub mod boolean;
pub mod collection;
pub mod conversion;
pub mod math;
pub mod string;
pub mod utility;
