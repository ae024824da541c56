use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::binding::{LiveBinding, PARAMETER_NAME_EVENT};
use crate::constants;
use crate::convert::{ConvertedValue, TypeConverterRegistry};
use crate::error::DispatchError;
use crate::handler::{ActionBean, ActionBeanContext, HandlerSpec, PropertyDef, PropertyKind};
use crate::validation::{ValidationError, ValidationMetadata};

use super::manifest::unseal_fields;
use super::name::ParameterName;

/// Binds submitted parameters onto handler properties, accumulating
/// validation errors instead of failing.
///
/// One binder is shared by the whole pipeline; it owns the type-converter
/// registry and the secret used to verify sealed field manifests.
pub struct PropertyBinder {
    converters: TypeConverterRegistry,
    manifest_secret: Vec<u8>,
}

impl PropertyBinder {
    #[must_use]
    pub fn new(converters: TypeConverterRegistry, manifest_secret: Vec<u8>) -> Self {
        PropertyBinder {
            converters,
            manifest_secret,
        }
    }

    #[must_use]
    pub fn converters(&self) -> &TypeConverterRegistry {
        &self.converters
    }

    #[must_use]
    pub fn manifest_secret(&self) -> &[u8] {
        &self.manifest_secret
    }

    /// Bind the request's parameters onto the handler instance.
    ///
    /// With `validate` set, required-field checks run first, string
    /// validations gate conversion, and post-conversion checks run last.
    /// Individual field failures accumulate into the context's validation
    /// errors; the only hard failure is a wizard-mode submission missing
    /// its sealed manifest.
    pub fn bind(
        &self,
        spec: &HandlerSpec,
        live: Option<&LiveBinding>,
        bean: &mut dyn ActionBean,
        ctx: &mut ActionBeanContext,
        validate: bool,
    ) -> Result<(), DispatchError> {
        let event = ctx.event_name().unwrap_or_default().to_string();
        debug!(
            handler = spec.name(),
            event = %event,
            validate,
            "Binding request parameters"
        );

        let mut parameters = self.collect_parameters(spec, live, ctx);
        let manifest_fields = self.fields_present(spec, ctx, &event)?;

        // Required checks run before any conversion so entirely-missing
        // fields are reported even when conversion would also have failed.
        if validate {
            self.validate_required_fields(spec, &mut parameters, &manifest_fields, ctx, &event);
        }

        // Numeric values and expression-validated fields are remembered so
        // the post-conversion checks can run after everything is bound.
        let mut snapshots: Vec<(ParameterName, Vec<f64>, Vec<String>)> = Vec::new();

        for (pname, values) in &parameters {
            let name = pname.name();
            if constants::is_special_key(name) {
                continue;
            }
            if ctx.validation_errors().contains_field(name) {
                continue;
            }

            let Some(property) = spec.property(pname.stripped()) else {
                if ctx.event_name() != Some(name) {
                    trace!(
                        parameter = name,
                        handler = spec.name(),
                        "No property for parameter; skipping binding"
                    );
                }
                continue;
            };
            if property.kind() == PropertyKind::File {
                // File properties bind from the multipart namespace below.
                continue;
            }

            let meta = property.metadata();
            if meta.is_ignored() {
                continue;
            }
            if !spec.policy().is_allowed(pname.stripped()) {
                warn!(parameter = name, handler = spec.name(), "Binding denied for parameter");
                continue;
            }

            let mut errors: Vec<ValidationError> = Vec::new();
            if validate {
                pre_conversion_validations(values, meta, &mut errors);
            }

            let mut converted: Vec<ConvertedValue> = Vec::new();
            if errors.is_empty() {
                converted = self.convert_values(property, pname, values, &mut errors);
                let numbers: Vec<f64> = converted.iter().filter_map(numeric_snapshot).collect();
                if !numbers.is_empty() || meta.expression_fn().is_some() {
                    snapshots.push((pname.clone(), numbers, values.clone()));
                }
            }

            if !errors.is_empty() {
                ctx.validation_errors_mut().add_all(name, errors);
            } else if !converted.is_empty() {
                if let Err(e) = property.apply(bean, converted) {
                    debug!(parameter = name, error = %e, "Could not bind property");
                }
            } else if let Err(e) = property.clear(bean) {
                debug!(parameter = name, error = %e, "Could not clear property");
            }
        }

        // Fields present on the originating form but absent from this
        // submission are explicitly cleared: absence is meaningful for
        // checkboxes and multi-selects, unlike fields never on the form.
        let submitted: HashSet<&str> = ctx
            .request()
            .parameters()
            .keys()
            .map(String::as_str)
            .collect();
        for field in &manifest_fields {
            if !submitted.contains(field.as_str()) {
                let pname = ParameterName::new(field);
                if let Some(property) = spec.property(pname.stripped()) {
                    if let Err(e) = property.clear(bean) {
                        debug!(parameter = field.as_str(), error = %e, "Could not clear absent field");
                    }
                }
            }
        }

        // File uploads bind after all regular parameters, from their own
        // parameter namespace.
        let file_names: Vec<String> = ctx
            .request()
            .file_parameter_names()
            .map(String::from)
            .collect();
        for fname in file_names {
            let pname = ParameterName::new(&fname);
            let Some(property) = spec.property(pname.stripped()) else {
                continue;
            };
            if let Some(upload) = ctx.request().file_parameter(&fname).cloned() {
                trace!(parameter = %fname, "Binding file parameter");
                if let Err(e) = property.apply_file(bean, upload) {
                    debug!(parameter = %fname, error = %e, "Could not bind file property");
                }
            }
        }

        // Post-conversion checks go last so expression predicates can see
        // every property bound by this same call.
        if validate {
            self.post_conversion_validations(spec, bean, ctx, &snapshots);
        }

        Ok(())
    }

    /// Submitted parameters plus URL-extracted binding parameters, keyed by
    /// [`ParameterName`] so iteration visits simple names before indexed
    /// extensions. Values are trimmed unless the property opts out.
    fn collect_parameters(
        &self,
        spec: &HandlerSpec,
        live: Option<&LiveBinding>,
        ctx: &ActionBeanContext,
    ) -> BTreeMap<ParameterName, Vec<String>> {
        let mut parameters: BTreeMap<ParameterName, Vec<String>> = BTreeMap::new();

        for (name, values) in ctx.request().parameters() {
            let pname = ParameterName::new(name);
            let trims = spec
                .property(pname.stripped())
                .map_or(true, |p| p.metadata().trims());
            let values = if trims {
                values.iter().map(|v| v.trim().to_string()).collect()
            } else {
                values.clone()
            };
            parameters.insert(pname, values);
        }

        // URL-extracted parameters never override an explicitly submitted
        // parameter of the same name; the $event parameter is consumed by
        // event resolution, not by binding.
        if let Some(live) = live {
            for (name, value) in live.parameters() {
                if name == PARAMETER_NAME_EVENT {
                    continue;
                }
                if let Some(value) = value {
                    parameters
                        .entry(ParameterName::new(name))
                        .or_insert_with(|| vec![value.to_string()]);
                }
            }
        }

        parameters
    }

    /// The field names carried by the sealed fields-present manifest.
    ///
    /// A wizard-mode submission outside the declared start events without a
    /// verifiable manifest is a fatal security error: silently skipping the
    /// per-step field scoping would let a client bypass it.
    fn fields_present(
        &self,
        spec: &HandlerSpec,
        ctx: &ActionBeanContext,
        event: &str,
    ) -> Result<Vec<String>, DispatchError> {
        let raw = ctx.request().parameter(constants::URL_KEY_FIELDS_PRESENT);
        let fields = match raw {
            None | Some("") => None,
            Some(sealed) => unseal_fields(sealed, &self.manifest_secret),
        };

        match fields {
            Some(fields) => Ok(fields),
            None => {
                if spec.is_wizard()
                    && !spec.wizard_start_events().iter().any(|e| e == event)
                {
                    Err(DispatchError::MissingFieldsManifest {
                        handler: spec.name().to_string(),
                    })
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Required-field validation, run before any conversion.
    ///
    /// Plain properties are checked directly. Indexed parameters are
    /// grouped into rows first: required checks apply only to rows that
    /// carried at least one non-empty value, and fully-empty rows are
    /// removed from binding entirely.
    fn validate_required_fields(
        &self,
        spec: &HandlerSpec,
        parameters: &mut BTreeMap<ParameterName, Vec<String>>,
        manifest_fields: &[String],
        ctx: &mut ActionBeanContext,
        event: &str,
    ) {
        let indexed_names: HashSet<String> = parameters
            .keys()
            .filter(|p| p.is_indexed())
            .map(|p| p.stripped().to_string())
            .collect();

        for property in spec.properties() {
            let meta = property.metadata();
            if !meta.required_on(event) || indexed_names.contains(property.name()) {
                continue;
            }
            // Wizard forms only require the fields that were actually on
            // the page for this step.
            if spec.is_wizard() && !manifest_fields.iter().any(|f| f == property.name()) {
                continue;
            }

            let pname = ParameterName::new(property.name());
            check_single_required_field(
                property.name(),
                parameters.get(&pname).map(Vec::as_slice),
                ctx,
            );
        }

        if indexed_names.is_empty() {
            return;
        }

        let mut rows: HashMap<String, Vec<ParameterName>> = HashMap::new();
        let mut row_has_values: HashMap<String, bool> = HashMap::new();
        for (pname, values) in parameters.iter() {
            if let Some(row_key) = pname.row_key() {
                rows.entry(row_key.to_string())
                    .or_default()
                    .push(pname.clone());
                let non_empty = values.iter().any(|v| !v.trim().is_empty());
                let entry = row_has_values.entry(row_key.to_string()).or_insert(false);
                *entry |= non_empty;
            }
        }

        for (row_key, row_params) in rows {
            if row_has_values.get(&row_key).copied().unwrap_or(false) {
                for pname in row_params {
                    let Some(property) = spec.property(pname.stripped()) else {
                        continue;
                    };
                    if property.metadata().required_on(event) {
                        check_single_required_field(
                            pname.name(),
                            parameters.get(&pname).map(Vec::as_slice),
                            ctx,
                        );
                    }
                }
            } else {
                // A row of entirely empty data is dropped so it cannot
                // confuse downstream validation or binding.
                trace!(row = %row_key, "Dropping fully-empty indexed row");
                for pname in row_params {
                    parameters.remove(&pname);
                }
            }
        }
    }

    /// Convert each non-empty raw value via the selected converter,
    /// stamping any produced errors with the stripped field name and raw
    /// value. Selection order: explicit override, then the registry entry
    /// for the property's type, then the `FromStr` fallback captured at
    /// registration.
    fn convert_values(
        &self,
        property: &PropertyDef,
        pname: &ParameterName,
        values: &[String],
        errors: &mut Vec<ValidationError>,
    ) -> Vec<ConvertedValue> {
        let meta = property.metadata();
        let override_converter = meta.converter_override();
        let registry_converter = self.converters.converter_for(property.scalar_type());

        let mut converted = Vec::with_capacity(values.len());
        for value in values {
            if value.is_empty() {
                continue;
            }

            let unsealed;
            let input: &str = if meta.is_encrypted() {
                match unseal_fields(value, &self.manifest_secret)
                    .and_then(|mut f| if f.is_empty() { None } else { Some(f.remove(0)) })
                {
                    Some(plain) => {
                        unsealed = plain;
                        &unsealed
                    }
                    None => {
                        warn!(parameter = pname.name(), "Sealed value failed to unseal; skipping");
                        continue;
                    }
                }
            } else {
                value
            };

            let before = errors.len();
            let result = if let Some(converter) = override_converter {
                converter.convert(input, errors)
            } else if let Some(converter) = registry_converter {
                converter.convert(input, errors)
            } else if property.has_fallback() {
                property.convert_fallback(input, errors)
            } else {
                debug!(
                    parameter = pname.name(),
                    target = property.scalar_type_name(),
                    "No converter and no string fallback; skipping value"
                );
                None
            };

            for error in errors.iter_mut().skip(before) {
                error.field_name = pname.stripped().to_string();
                if error.field_value.is_none() {
                    error.field_value = Some(input.to_string());
                }
            }

            if let Some(value) = result {
                converted.push(value);
            }
        }

        converted
    }

    /// Numeric range checks and expression predicates, after everything is
    /// bound.
    fn post_conversion_validations(
        &self,
        spec: &HandlerSpec,
        bean: &mut dyn ActionBean,
        ctx: &mut ActionBeanContext,
        snapshots: &[(ParameterName, Vec<f64>, Vec<String>)],
    ) {
        for (pname, numbers, raw_values) in snapshots {
            let Some(property) = spec.property(pname.stripped()) else {
                continue;
            };
            let meta = property.metadata();

            for (i, number) in numbers.iter().enumerate() {
                let raw = raw_values.get(i).cloned().unwrap_or_else(|| number.to_string());
                if let Some(min) = meta.min_value_limit() {
                    if *number < min {
                        ctx.validation_errors_mut().add(
                            pname.name(),
                            ValidationError::scoped("validation.minvalue.valueBelowMinimum")
                                .with_parameter(min)
                                .with_field_value(&raw),
                        );
                    }
                }
                if let Some(max) = meta.max_value_limit() {
                    if *number > max {
                        ctx.validation_errors_mut().add(
                            pname.name(),
                            ValidationError::scoped("validation.maxvalue.valueAboveMaximum")
                                .with_parameter(max)
                                .with_field_value(&raw),
                        );
                    }
                }
            }

            if let Some(expression) = meta.expression_fn() {
                let predicate = expression.as_ref();
                if !predicate(&*bean) {
                    ctx.validation_errors_mut().add(
                        pname.name(),
                        ValidationError::scoped("validation.expression.valueFailedExpression"),
                    );
                }
            }
        }
    }
}

/// A single field's required check: a zero-byte file upload, an absent
/// parameter, or any empty submitted value all record
/// `validation.required.valueNotPresent` against the field.
fn check_single_required_field(
    name: &str,
    values: Option<&[String]>,
    ctx: &mut ActionBeanContext,
) {
    let upload_size = ctx.request().file_parameter(name).map(|u| u.size);
    if let Some(size) = upload_size {
        if size == 0 {
            ctx.validation_errors_mut().add(
                name,
                ValidationError::scoped("validation.required.valueNotPresent"),
            );
        }
        return;
    }

    match values {
        None => {
            trace!(field = name, "Required field not submitted");
            ctx.validation_errors_mut().add(
                name,
                ValidationError::scoped("validation.required.valueNotPresent"),
            );
        }
        Some(values) if values.is_empty() => {
            ctx.validation_errors_mut().add(
                name,
                ValidationError::scoped("validation.required.valueNotPresent"),
            );
        }
        Some(values) => {
            for value in values {
                if value.is_empty() {
                    ctx.validation_errors_mut().add(
                        name,
                        ValidationError::scoped("validation.required.valueNotPresent")
                            .with_field_value(value),
                    );
                }
            }
        }
    }
}

/// Pre-conversion string validations: length limits and the regex mask,
/// applied only to non-empty values.
fn pre_conversion_validations(
    values: &[String],
    meta: &ValidationMetadata,
    errors: &mut Vec<ValidationError>,
) {
    for value in values {
        if value.is_empty() {
            continue;
        }

        if let Some(min) = meta.min_length_limit() {
            if value.chars().count() < min {
                errors.push(
                    ValidationError::scoped("validation.minlength.valueTooShort")
                        .with_parameter(min)
                        .with_field_value(value),
                );
            }
        }
        if let Some(max) = meta.max_length_limit() {
            if value.chars().count() > max {
                errors.push(
                    ValidationError::scoped("validation.maxlength.valueTooLong")
                        .with_parameter(max)
                        .with_field_value(value),
                );
            }
        }
        if let Some(mask) = meta.mask_pattern() {
            if !mask.is_match(value) {
                errors.push(
                    ValidationError::scoped("validation.mask.valueDoesNotMatch")
                        .with_field_value(value),
                );
            }
        }
    }
}

/// Best-effort numeric view of a converted value, for range checks.
fn numeric_snapshot(value: &ConvertedValue) -> Option<f64> {
    let value = value.as_ref();
    if let Some(v) = value.downcast_ref::<i8>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.downcast_ref::<i16>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.downcast_ref::<i32>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.downcast_ref::<i64>() {
        return Some(*v as f64);
    }
    if let Some(v) = value.downcast_ref::<u8>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.downcast_ref::<u16>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.downcast_ref::<u32>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.downcast_ref::<u64>() {
        return Some(*v as f64);
    }
    if let Some(v) = value.downcast_ref::<usize>() {
        return Some(*v as f64);
    }
    if let Some(v) = value.downcast_ref::<f32>() {
        return Some(f64::from(*v));
    }
    if let Some(v) = value.downcast_ref::<f64>() {
        return Some(*v);
    }
    None
}
