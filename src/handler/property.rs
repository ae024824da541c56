use std::any::TypeId;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;

use crate::convert::ConvertedValue;
use crate::server::FileUpload;
use crate::validation::{ValidationError, ValidationMetadata};

use super::core::ActionBean;

/// Shape of a bindable property: one value, a collection of values, or a
/// file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar,
    List,
    File,
}

pub(crate) type SetterFn =
    Arc<dyn Fn(&mut dyn ActionBean, Vec<ConvertedValue>) -> anyhow::Result<()> + Send + Sync>;
pub(crate) type ClearFn = Arc<dyn Fn(&mut dyn ActionBean) -> anyhow::Result<()> + Send + Sync>;
pub(crate) type FallbackFn =
    Arc<dyn Fn(&str, &mut Vec<ValidationError>) -> Option<ConvertedValue> + Send + Sync>;
pub(crate) type FileSetterFn =
    Arc<dyn Fn(&mut dyn ActionBean, FileUpload) -> anyhow::Result<()> + Send + Sync>;

/// One bindable property of a handler type: its name, target type, shape,
/// validation metadata, and the typed closures that apply or clear values
/// on the handler instance.
#[derive(Clone)]
pub struct PropertyDef {
    name: String,
    kind: PropertyKind,
    scalar_type: TypeId,
    scalar_type_name: &'static str,
    validate: ValidationMetadata,
    apply: Option<SetterFn>,
    clear: Option<ClearFn>,
    fallback: Option<FallbackFn>,
    file_apply: Option<FileSetterFn>,
}

impl PropertyDef {
    /// Attach validation metadata to this property.
    #[must_use]
    pub fn validate(mut self, metadata: ValidationMetadata) -> Self {
        self.validate = metadata;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    #[must_use]
    pub fn scalar_type(&self) -> TypeId {
        self.scalar_type
    }

    #[must_use]
    pub fn scalar_type_name(&self) -> &'static str {
        self.scalar_type_name
    }

    #[must_use]
    pub fn metadata(&self) -> &ValidationMetadata {
        &self.validate
    }

    /// Apply converted values to the handler instance. For scalar
    /// properties the first value is bound; for lists, all of them.
    pub fn apply(
        &self,
        bean: &mut dyn ActionBean,
        values: Vec<ConvertedValue>,
    ) -> anyhow::Result<()> {
        match &self.apply {
            Some(apply) => (**apply)(bean, values),
            None => Err(anyhow!("property '{}' does not accept values", self.name)),
        }
    }

    /// Set the property to its empty state (a `None` scalar or an empty
    /// list). Used for fields on the originating form that were not
    /// submitted.
    pub fn clear(&self, bean: &mut dyn ActionBean) -> anyhow::Result<()> {
        match &self.clear {
            Some(clear) => (**clear)(bean),
            None => Ok(()),
        }
    }

    /// Last-resort string conversion captured at registration time, used
    /// when no converter is registered for the property's type.
    #[must_use]
    pub fn convert_fallback(
        &self,
        input: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<ConvertedValue> {
        self.fallback.as_ref().and_then(|f| (**f)(input, errors))
    }

    #[must_use]
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Apply an uploaded file to the handler instance.
    pub fn apply_file(&self, bean: &mut dyn ActionBean, upload: FileUpload) -> anyhow::Result<()> {
        match &self.file_apply {
            Some(apply) => (**apply)(bean, upload),
            None => Err(anyhow!("property '{}' is not a file property", self.name)),
        }
    }
}

impl std::fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("type", &self.scalar_type_name)
            .finish_non_exhaustive()
    }
}

/// Constructors for [`PropertyDef`]s.
pub struct Property;

impl Property {
    /// A single-valued property of type `T`. The setter receives `None`
    /// when the field is cleared (present on the form, absent from the
    /// submission). `T: FromStr` provides the last-resort conversion when
    /// no converter is registered for the type.
    #[must_use]
    pub fn scalar<B, T>(
        name: &str,
        set: impl Fn(&mut B, Option<T>) + Send + Sync + 'static,
    ) -> PropertyDef
    where
        B: ActionBean,
        T: FromStr + Send + 'static,
    {
        let mut def = Self::scalar_converted::<B, T>(name, set);
        def.fallback = Some(from_str_fallback::<T>());
        def
    }

    /// A single-valued property without a `FromStr` bound; conversion must
    /// come from the registry or an explicit converter override.
    #[must_use]
    pub fn scalar_converted<B, T>(
        name: &str,
        set: impl Fn(&mut B, Option<T>) + Send + Sync + 'static,
    ) -> PropertyDef
    where
        B: ActionBean,
        T: Send + 'static,
    {
        let set = Arc::new(set);
        let apply_name = name.to_string();
        let apply_set = Arc::clone(&set);
        let apply: SetterFn = Arc::new(move |bean, values| {
            let bean = downcast_bean::<B>(bean, &apply_name)?;
            let value = values
                .into_iter()
                .next()
                .map(|v| downcast_value::<T>(v, &apply_name))
                .transpose()?;
            (*apply_set)(bean, value);
            Ok(())
        });
        let clear_name = name.to_string();
        let clear: ClearFn = Arc::new(move |bean| {
            let bean = downcast_bean::<B>(bean, &clear_name)?;
            (*set)(bean, None);
            Ok(())
        });

        PropertyDef {
            name: name.to_string(),
            kind: PropertyKind::Scalar,
            scalar_type: TypeId::of::<T>(),
            scalar_type_name: std::any::type_name::<T>(),
            validate: ValidationMetadata::new(),
            apply: Some(apply),
            clear: Some(clear),
            fallback: None,
            file_apply: None,
        }
    }

    /// A multi-valued property of element type `T`. All converted values
    /// are bound; clearing binds an empty list.
    #[must_use]
    pub fn list<B, T>(
        name: &str,
        set: impl Fn(&mut B, Vec<T>) + Send + Sync + 'static,
    ) -> PropertyDef
    where
        B: ActionBean,
        T: FromStr + Send + 'static,
    {
        let set = Arc::new(set);
        let apply_name = name.to_string();
        let apply_set = Arc::clone(&set);
        let apply: SetterFn = Arc::new(move |bean, values| {
            let bean = downcast_bean::<B>(bean, &apply_name)?;
            let mut typed = Vec::with_capacity(values.len());
            for value in values {
                typed.push(downcast_value::<T>(value, &apply_name)?);
            }
            (*apply_set)(bean, typed);
            Ok(())
        });
        let clear_name = name.to_string();
        let clear: ClearFn = Arc::new(move |bean| {
            let bean = downcast_bean::<B>(bean, &clear_name)?;
            (*set)(bean, Vec::new());
            Ok(())
        });

        PropertyDef {
            name: name.to_string(),
            kind: PropertyKind::List,
            scalar_type: TypeId::of::<T>(),
            scalar_type_name: std::any::type_name::<T>(),
            validate: ValidationMetadata::new(),
            apply: Some(apply),
            clear: Some(clear),
            fallback: Some(from_str_fallback::<T>()),
            file_apply: None,
        }
    }

    /// A file-upload property, bound from the multipart parameter namespace
    /// after all regular parameters.
    #[must_use]
    pub fn file<B>(
        name: &str,
        set: impl Fn(&mut B, FileUpload) + Send + Sync + 'static,
    ) -> PropertyDef
    where
        B: ActionBean,
    {
        let apply_name = name.to_string();
        let file_apply: FileSetterFn = Arc::new(move |bean, upload| {
            let bean = downcast_bean::<B>(bean, &apply_name)?;
            set(bean, upload);
            Ok(())
        });

        PropertyDef {
            name: name.to_string(),
            kind: PropertyKind::File,
            scalar_type: TypeId::of::<FileUpload>(),
            scalar_type_name: "FileUpload",
            validate: ValidationMetadata::new(),
            apply: None,
            clear: None,
            fallback: None,
            file_apply: Some(file_apply),
        }
    }
}

fn downcast_bean<'b, B: ActionBean>(
    bean: &'b mut dyn ActionBean,
    property: &str,
) -> anyhow::Result<&'b mut B> {
    bean.as_any_mut().downcast_mut::<B>().ok_or_else(|| {
        anyhow!(
            "property '{property}' was registered for a different handler type ({})",
            std::any::type_name::<B>()
        )
    })
}

fn downcast_value<T: 'static>(value: ConvertedValue, property: &str) -> anyhow::Result<T> {
    value.downcast::<T>().map(|v| *v).map_err(|_| {
        anyhow!(
            "converted value for property '{property}' is not a {}",
            std::any::type_name::<T>()
        )
    })
}

fn from_str_fallback<T>() -> FallbackFn
where
    T: FromStr + Send + 'static,
{
    Arc::new(|input, errors| match input.parse::<T>() {
        Ok(value) => Some(Box::new(value) as ConvertedValue),
        Err(_) => {
            errors.push(
                ValidationError::scoped("validation.conversion.invalidValue")
                    .with_field_value(input),
            );
            None
        }
    })
}
