use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::constants;
use crate::resolution::{ForwardResolution, Resolution};
use crate::server::{Request, Response};
use crate::validation::ValidationErrors;

/// Shared, lock-guarded handle to a handler instance.
///
/// Request-scoped instances live in the request attribute map; session-scoped
/// instances live in the session, shared across concurrent requests. Every
/// pipeline touch locks the instance, so concurrent same-session requests
/// serialize per stage rather than racing on field writes.
pub type BeanHandle = Arc<Mutex<Box<dyn ActionBean>>>;

/// The handler capability: a type that responds to requests for one URL
/// binding.
///
/// Implementations embed an [`Attachment`] and delegate the attachment
/// methods to it; the downcast methods are the standard `Any` plumbing:
///
/// ```rust,ignore
/// struct ContactAction {
///     attachment: Attachment,
///     id: Option<i64>,
/// }
///
/// impl ActionBean for ContactAction {
///     fn attachment(&self) -> &Attachment { &self.attachment }
///     fn attachment_mut(&mut self) -> &mut Attachment { &mut self.attachment }
///     fn as_any(&self) -> &dyn Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn Any { self }
/// }
/// ```
pub trait ActionBean: Send + Any {
    fn attachment(&self) -> &Attachment;
    fn attachment_mut(&mut self) -> &mut Attachment;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Records which request a handler instance is currently attached to.
///
/// Session-scoped instances outlive requests; before each dispatch the
/// resolver re-attaches the instance to the current request *unless* it is
/// already attached to the same underlying request (pointer identity). That
/// skip keeps nested dispatch of the same instance from clobbering its
/// attachment mid-request.
#[derive(Default)]
pub struct Attachment {
    request: Option<Arc<Request>>,
}

impl Attachment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request(&self) -> Option<&Arc<Request>> {
        self.request.as_ref()
    }

    /// True if already attached to this exact request object.
    #[must_use]
    pub fn is_attached_to(&self, request: &Arc<Request>) -> bool {
        self.request
            .as_ref()
            .is_some_and(|r| Arc::ptr_eq(r, request))
    }

    pub fn attach(&mut self, request: Arc<Request>) {
        self.request = Some(request);
    }
}

/// Per-request context shared with the handler during every stage: the
/// request, the response handle, the resolved event name, and the
/// accumulated validation errors.
pub struct ActionBeanContext {
    request: Arc<Request>,
    response: Response,
    event_name: Option<String>,
    validation_errors: ValidationErrors,
}

impl ActionBeanContext {
    #[must_use]
    pub fn new(request: Arc<Request>, response: Response) -> Self {
        ActionBeanContext {
            request,
            response,
            event_name: None,
            validation_errors: ValidationErrors::new(),
        }
    }

    #[must_use]
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// The resolved event name. `None` until HandlerResolution has run, or
    /// when the default handler answered an unnamed event.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn set_event_name(&mut self, event: Option<String>) {
        self.event_name = event;
    }

    #[must_use]
    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.validation_errors
    }

    pub fn validation_errors_mut(&mut self) -> &mut ValidationErrors {
        &mut self.validation_errors
    }

    /// The path of the page the current submission came from, as carried by
    /// the reserved `_sourcePage` parameter.
    #[must_use]
    pub fn source_page(&self) -> Option<&str> {
        self.request.parameter(constants::URL_KEY_SOURCE_PAGE)
    }

    /// A resolution returning the user to the page the submission came
    /// from, for re-display with errors attached. `None` when the request
    /// did not carry a source page.
    #[must_use]
    pub fn source_page_resolution(&self) -> Option<Resolution> {
        self.source_page()
            .map(|page| Resolution::Forward(ForwardResolution::new(page)))
    }
}
