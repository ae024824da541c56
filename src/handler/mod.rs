//! # Handler Module
//!
//! The handler ("action bean") capability and its declarative registration
//! API.
//!
//! ## Overview
//!
//! A handler type responds to requests for one URL binding. Where the
//! original design discovered handler metadata by reflective annotation
//! scanning, this engine takes an explicit [`HandlerSpec`] built once at
//! startup: the binding pattern, scope, kind, event methods (as typed
//! closures in a dispatch table), bindable properties (typed setter
//! closures plus validation metadata), custom validation methods, and
//! before/after lifecycle methods.
//!
//! ## Registration
//!
//! ```rust,ignore
//! let spec = HandlerSpec::of::<ContactAction>("ContactAction")
//!     .binding("/contact/{id}/{$event=view}")
//!     .event(Event::new::<ContactAction>("save", |bean, ctx| bean.save(ctx)).on_verbs([Method::POST]))
//!     .event(Event::new::<ContactAction>("view", |bean, ctx| bean.view(ctx)).default_handler())
//!     .property(
//!         Property::scalar::<ContactAction, i64>("id", |bean, v| bean.id = v)
//!             .validate(ValidationMetadata::new().required().on(["save"])),
//!     )
//!     .build()?;
//! ```
//!
//! `HandlerSpec::extending` layers a spec over a base spec, preserving the
//! base-first discovery order while letting re-registered names override —
//! the inheritance-chain precedence rule of the original design.

mod core;
mod property;
mod spec;

pub use core::{ActionBean, ActionBeanContext, Attachment, BeanHandle};
pub use property::{Property, PropertyDef, PropertyKind};
pub use spec::{
    Advice, AsyncEventFn, ConstructorFn, ErrorHandlerFn, Event, EventDef, EventFn, HandlerKind,
    HandlerSpec, HandlerSpecBuilder, LifecycleMethod, LifecycleMethodDef, LifecycleMethodFn,
    Scope, ValidationMethod, ValidationMethodDef, ValidationMethodFn, When,
};
