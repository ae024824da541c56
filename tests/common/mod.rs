//! Shared fixtures for the integration test suite: a conventional form
//! handler, REST-style handlers, a wizard handler, and small test doubles
//! for the pluggable collaborators.
#![allow(dead_code)]

use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use http::Method;
use regex::Regex;
use serde_json::json;

use stagecoach::asynch::AsyncExecutor;
use stagecoach::handler::{
    ActionBean, ActionBeanContext, Attachment, Event, HandlerSpec, Property, ValidationMethod,
};
use stagecoach::resolution::Resolution;
use stagecoach::resolver::{ActionResolver, ViewLocator};
use stagecoach::validation::{ValidationError, ValidationMetadata};

/// Conventional form handler bound to `/contact/{id}/{$event=view}`.
#[derive(Default)]
pub struct ContactAction {
    pub attachment: Attachment,
    pub id: Option<i64>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub tags: Vec<String>,
    pub agree: Option<bool>,
    pub saved: bool,
    pub trace: Vec<String>,
}

impl ContactAction {
    fn view(&mut self, _ctx: &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>> {
        self.trace.push("view".to_string());
        Ok(Some(Resolution::forward("/contact/detail.html")))
    }

    fn save(&mut self, _ctx: &mut ActionBeanContext) -> anyhow::Result<Option<Resolution>> {
        self.saved = true;
        self.trace.push("save".to_string());
        Ok(Some(Resolution::redirect("/contact/list.html")))
    }
}

impl ActionBean for ContactAction {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn contact_spec() -> Arc<HandlerSpec> {
    HandlerSpec::of::<ContactAction>("ContactAction")
        .binding("/contact/{id}/{$event=view}")
        .event(Event::new::<ContactAction, _>("view", |b, c| b.view(c)).default_handler())
        .event(
            Event::new::<ContactAction, _>("save", |b, c| b.save(c))
                .on_verbs([Method::POST, Method::GET]),
        )
        .property(Property::scalar::<ContactAction, i64>("id", |b, v| b.id = v))
        .property(
            Property::scalar::<ContactAction, String>("email", |b, v| b.email = v).validate(
                ValidationMetadata::new()
                    .required()
                    .on(["save"])
                    .mask(Regex::new("[^@]+@[^@]+").expect("mask regex")),
            ),
        )
        .property(
            Property::scalar::<ContactAction, i64>("age", |b, v| b.age = v)
                .validate(ValidationMetadata::new().min_value(0.0).max_value(150.0)),
        )
        .property(Property::list::<ContactAction, String>("tags", |b, v| b.tags = v))
        .property(Property::scalar::<ContactAction, bool>("agree", |b, v| b.agree = v))
        .validation_method(
            ValidationMethod::new::<ContactAction, _>("check_email_domain", |b, c| {
                b.trace.push("check_email_domain".to_string());
                if b.email
                    .as_deref()
                    .is_some_and(|e| e.ends_with("@blocked.example"))
                {
                    c.validation_errors_mut()
                        .add("email", ValidationError::simple("domain is blocked"));
                }
                Ok(())
            })
            .on(["save"]),
        )
        .build()
        .expect("contact spec")
}

/// REST handler with a verb-named method, a verb-restricted method, and a
/// required property.
#[derive(Default)]
pub struct ItemApiAction {
    pub attachment: Attachment,
    pub name: Option<String>,
    pub updated: bool,
}

impl ActionBean for ItemApiAction {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn item_api_spec() -> Arc<HandlerSpec> {
    HandlerSpec::of::<ItemApiAction>("ItemApiAction")
        .binding("/api/items")
        .rest()
        .event(Event::new::<ItemApiAction, _>("get", |_b, _c| {
            Ok(Some(Resolution::json(200, json!({ "items": [] }))))
        }))
        .event(Event::new::<ItemApiAction, _>("post", |b, _c| {
            Ok(Some(Resolution::json(
                201,
                json!({ "name": b.name.as_deref().unwrap_or_default() }),
            )))
        }))
        .event(
            Event::new::<ItemApiAction, _>("update", |b, _c| {
                b.updated = true;
                Ok(Some(Resolution::json(200, json!({ "updated": true }))))
            })
            .on_verbs([Method::POST]),
        )
        .property(
            Property::scalar::<ItemApiAction, String>("name", |b, v| b.name = v)
                .validate(ValidationMetadata::new().required().on(["post"])),
        )
        .build()
        .expect("item api spec")
}

/// Read-only REST handler: only `get` exists, so anything else resolves to
/// a structured 404.
#[derive(Default)]
pub struct ReadOnlyApiAction {
    pub attachment: Attachment,
}

impl ActionBean for ReadOnlyApiAction {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn read_only_api_spec() -> Arc<HandlerSpec> {
    HandlerSpec::of::<ReadOnlyApiAction>("ReadOnlyApiAction")
        .binding("/api/reports")
        .rest()
        .event(Event::new::<ReadOnlyApiAction, _>("get", |_b, _c| {
            Ok(Some(Resolution::json(200, json!({ "reports": [] }))))
        }))
        .build()
        .expect("read-only api spec")
}

/// Session-scoped counter handler for scope tests.
#[derive(Default)]
pub struct CounterAction {
    pub attachment: Attachment,
    pub count: u32,
}

impl ActionBean for CounterAction {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn counter_spec() -> Arc<HandlerSpec> {
    HandlerSpec::of::<CounterAction>("CounterAction")
        .binding("/counter")
        .session_scope()
        .event(Event::new::<CounterAction, _>("tick", |b, _c| {
            b.count += 1;
            Ok(Some(Resolution::json(200, json!({ "count": b.count }))))
        }))
        .build()
        .expect("counter spec")
}

/// Wizard-mode handler: submissions outside `start` require the sealed
/// manifest.
#[derive(Default)]
pub struct SignupWizardAction {
    pub attachment: Attachment,
    pub email: Option<String>,
}

impl ActionBean for SignupWizardAction {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn signup_wizard_spec() -> Arc<HandlerSpec> {
    HandlerSpec::of::<SignupWizardAction>("SignupWizardAction")
        .binding("/signup")
        .wizard(["start"])
        .event(Event::new::<SignupWizardAction, _>("start", |_b, _c| {
            Ok(Some(Resolution::forward("/signup/step1.html")))
        }))
        .event(Event::new::<SignupWizardAction, _>("next", |_b, _c| {
            Ok(Some(Resolution::forward("/signup/step2.html")))
        }))
        .property(
            Property::scalar::<SignupWizardAction, String>("email", |b, v| b.email = v)
                .validate(ValidationMetadata::new().required().on(["next"])),
        )
        .build()
        .expect("wizard spec")
}

pub fn resolver_with(specs: Vec<Arc<HandlerSpec>>) -> Arc<ActionResolver> {
    let mut builder = ActionResolver::builder();
    for spec in specs {
        builder = builder.register(spec);
    }
    builder.build().expect("resolver")
}

/// View locator backed by a fixed set of paths.
pub struct SetViewLocator {
    views: HashSet<String>,
}

impl SetViewLocator {
    pub fn new<I, S>(views: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Arc::new(SetViewLocator {
            views: views.into_iter().map(|v| v.as_ref().to_string()).collect(),
        })
    }
}

impl ViewLocator for SetViewLocator {
    fn exists(&self, path: &str) -> bool {
        self.views.contains(path)
    }
}

/// Executor test double that collects spawned tasks for the test to run by
/// hand, making async completion flows deterministic.
#[derive(Default)]
pub struct ManualExecutor {
    tasks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl ManualExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().expect("tasks lock").len()
    }

    /// Run the oldest pending task on the calling thread.
    pub fn run_next(&self) {
        let task = self.tasks.lock().expect("tasks lock").remove(0);
        task();
    }
}

impl AsyncExecutor for ManualExecutor {
    fn supports_suspension(&self) -> bool {
        true
    }

    fn spawn(&self, task: Box<dyn FnOnce() + Send>) -> anyhow::Result<()> {
        self.tasks.lock().expect("tasks lock").push(task);
        Ok(())
    }
}

/// Run a closure against the request-scoped (or session-scoped) handler
/// instance stored under the canonical binding key.
pub fn with_bean<B: ActionBean, R>(
    handle: &stagecoach::handler::BeanHandle,
    f: impl FnOnce(&B) -> R,
) -> R {
    let guard = handle.lock().expect("bean lock");
    let bean = guard
        .as_any()
        .downcast_ref::<B>()
        .expect("bean downcast to fixture type");
    f(bean)
}
