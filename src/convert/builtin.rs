use std::str::FromStr;
use std::sync::Arc;

use crate::validation::ValidationError;

use super::core::{from_fn, TypeConverter};

/// Truthy tokens accepted by the boolean converter.
const TRUTHY: [&str; 5] = ["true", "t", "yes", "y", "on"];

/// Boolean conversion: the truthy token set, or any non-zero number.
/// Everything else converts to `false`; this converter never errors.
#[must_use]
pub fn bool_converter() -> Arc<dyn TypeConverter> {
    from_fn::<bool, _>("bool", |input, _errors| {
        let lowered = input.trim().to_ascii_lowercase();
        if TRUTHY.contains(&lowered.as_str()) {
            return Some(true);
        }
        if let Ok(n) = lowered.parse::<f64>() {
            return Some(n != 0.0);
        }
        Some(false)
    })
}

/// Identity conversion for `String` properties.
#[must_use]
pub fn string_converter() -> Arc<dyn TypeConverter> {
    from_fn::<String, _>("String", |input, _errors| Some(input.to_string()))
}

/// Integer conversion with a leading `+` allowed; a parse failure records
/// `validation.number.invalidNumber` against the field.
#[must_use]
pub fn int_converter<T>(type_name: &'static str) -> Arc<dyn TypeConverter>
where
    T: FromStr + Send + 'static,
{
    from_fn::<T, _>(type_name, |input, errors| {
        let cleaned = input.trim().trim_start_matches('+');
        match cleaned.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                errors.push(
                    ValidationError::scoped("validation.number.invalidNumber")
                        .with_field_value(input),
                );
                None
            }
        }
    })
}

/// Float conversion; a parse failure records
/// `validation.number.invalidNumber` against the field.
#[must_use]
pub fn float_converter<T>(type_name: &'static str) -> Arc<dyn TypeConverter>
where
    T: FromStr + Send + 'static,
{
    from_fn::<T, _>(type_name, |input, errors| match input.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(
                ValidationError::scoped("validation.number.invalidNumber")
                    .with_field_value(input),
            );
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_accept_the_truthy_token_set() {
        let converter = bool_converter();
        let mut errors = Vec::new();
        for token in ["true", "T", "yes", "Y", "on", "1", "42"] {
            let value = converter.convert(token, &mut errors).expect("converted");
            assert_eq!(*value.downcast::<bool>().expect("bool"), true, "{token}");
        }
        for token in ["false", "no", "0", "off", "banana"] {
            let value = converter.convert(token, &mut errors).expect("converted");
            assert_eq!(*value.downcast::<bool>().expect("bool"), false, "{token}");
        }
        assert!(errors.is_empty());
    }

    #[test]
    fn bad_numbers_record_an_error_and_convert_to_nothing() {
        let converter = int_converter::<i32>("i32");
        let mut errors = Vec::new();
        assert!(converter.convert("12x", &mut errors).is_none());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message_key, "validation.number.invalidNumber");
    }
}
