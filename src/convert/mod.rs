//! # Convert Module
//!
//! The type-conversion seam between raw request strings and typed handler
//! properties.
//!
//! A [`TypeConverter`] turns one submitted string into one typed value,
//! reporting failures into an error sink instead of returning `Err` — a
//! conversion failure is a validation error on the field, never an abort.
//! Converters are selected by the binder in a fixed order: the property's
//! explicit override, then a registry hit for the container type, then a
//! registry hit for the scalar element type, then the `FromStr` fallback
//! captured when the property was registered.
//!
//! The default registry covers booleans, the integer and float primitives,
//! and `String`. Applications register their own converters for richer
//! types (dates, money, domain ids) the same way.

mod builtin;
mod core;

pub use builtin::{bool_converter, float_converter, int_converter, string_converter};
pub use core::{from_fn, ConvertedValue, TypeConverter, TypeConverterRegistry};
