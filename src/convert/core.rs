use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::validation::ValidationError;

use super::builtin;

/// The built-in converter set, assembled once; `with_defaults()` clones
/// the map of shared converter handles rather than rebuilding them.
static DEFAULTS: Lazy<TypeConverterRegistry> = Lazy::new(|| {
    let mut registry = TypeConverterRegistry::empty();
    registry.register::<bool>(builtin::bool_converter());
    registry.register::<String>(builtin::string_converter());
    registry.register::<i8>(builtin::int_converter::<i8>("i8"));
    registry.register::<i16>(builtin::int_converter::<i16>("i16"));
    registry.register::<i32>(builtin::int_converter::<i32>("i32"));
    registry.register::<i64>(builtin::int_converter::<i64>("i64"));
    registry.register::<u8>(builtin::int_converter::<u8>("u8"));
    registry.register::<u16>(builtin::int_converter::<u16>("u16"));
    registry.register::<u32>(builtin::int_converter::<u32>("u32"));
    registry.register::<u64>(builtin::int_converter::<u64>("u64"));
    registry.register::<usize>(builtin::int_converter::<usize>("usize"));
    registry.register::<f32>(builtin::float_converter::<f32>("f32"));
    registry.register::<f64>(builtin::float_converter::<f64>("f64"));
    registry
});

/// A converted value in transit between a converter and a property setter.
/// Type-erased; the setter downcasts to the concrete property type.
pub type ConvertedValue = Box<dyn Any + Send>;

/// Converts one submitted string into one typed value.
///
/// Implementations push a [`ValidationError`] into the sink and return
/// `None` on failure. Returning `None` without an error means "nothing to
/// bind" (used by converters that treat certain inputs as absent).
pub trait TypeConverter: Send + Sync {
    /// The `TypeId` of the value this converter produces.
    fn produces(&self) -> TypeId;

    /// Short type name for logging and diagnostics.
    fn type_name(&self) -> &'static str;

    fn convert(&self, input: &str, errors: &mut Vec<ValidationError>) -> Option<ConvertedValue>;
}

/// Build a [`TypeConverter`] from a closure.
pub fn from_fn<T, F>(type_name: &'static str, convert: F) -> Arc<dyn TypeConverter>
where
    T: Send + 'static,
    F: Fn(&str, &mut Vec<ValidationError>) -> Option<T> + Send + Sync + 'static,
{
    Arc::new(FnConverter {
        type_name,
        convert,
        _marker: std::marker::PhantomData::<fn() -> T>,
    })
}

struct FnConverter<T, F> {
    type_name: &'static str,
    convert: F,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> TypeConverter for FnConverter<T, F>
where
    T: Send + 'static,
    F: Fn(&str, &mut Vec<ValidationError>) -> Option<T> + Send + Sync + 'static,
{
    fn produces(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn convert(&self, input: &str, errors: &mut Vec<ValidationError>) -> Option<ConvertedValue> {
        (self.convert)(input, errors).map(|v| Box::new(v) as ConvertedValue)
    }
}

/// Registry of converters keyed by the type they produce.
///
/// Populated once at startup and read concurrently afterwards. The default
/// set covers the primitive types; applications extend it with
/// [`TypeConverterRegistry::register`].
#[derive(Clone)]
pub struct TypeConverterRegistry {
    map: HashMap<TypeId, Arc<dyn TypeConverter>>,
}

impl TypeConverterRegistry {
    /// An empty registry with no converters at all.
    #[must_use]
    pub fn empty() -> Self {
        TypeConverterRegistry {
            map: HashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in primitive converters.
    #[must_use]
    pub fn with_defaults() -> Self {
        DEFAULTS.clone()
    }

    /// Register (or replace) the converter for type `T`.
    pub fn register<T: 'static>(&mut self, converter: Arc<dyn TypeConverter>) {
        debug_assert_eq!(converter.produces(), TypeId::of::<T>());
        self.map.insert(TypeId::of::<T>(), converter);
    }

    /// Look up the converter producing the given type, if any.
    #[must_use]
    pub fn converter_for(&self, target: TypeId) -> Option<&Arc<dyn TypeConverter>> {
        let hit = self.map.get(&target);
        if let Some(converter) = hit {
            debug!(converter = converter.type_name(), "Type converter selected");
        }
        hit
    }
}

impl Default for TypeConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_registered_types() {
        let registry = TypeConverterRegistry::with_defaults();
        assert!(registry.converter_for(TypeId::of::<i64>()).is_some());
        assert!(registry.converter_for(TypeId::of::<bool>()).is_some());
        assert!(registry.converter_for(TypeId::of::<Vec<u8>>()).is_none());
    }

    #[test]
    fn fn_converter_reports_type() {
        let converter = from_fn::<char, _>("char", |s, _| s.chars().next());
        assert_eq!(converter.produces(), TypeId::of::<char>());
        let mut errors = Vec::new();
        let value = converter.convert("x", &mut errors).expect("converted");
        assert_eq!(*value.downcast::<char>().expect("downcast"), 'x');
    }
}
