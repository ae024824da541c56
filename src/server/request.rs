use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use http::Method;
use tracing::debug;

use crate::handler::BeanHandle;
use crate::ids::RequestId;

/// A request attribute value. Attributes carry per-request engine state:
/// forwarded event names, the current handler instance, the nested-dispatch
/// stack.
#[derive(Clone)]
pub enum Attribute {
    Text(String),
    Bean(BeanHandle),
    BeanStack(Vec<BeanHandle>),
}

/// An uploaded file parameter, pre-parsed by the (out-of-scope) multipart
/// layer. The engine only consumes the resulting view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: u64,
}

/// Server-side session state shared by all requests carrying it.
///
/// Holds session-scoped handler instances keyed by their canonical binding
/// string.
#[derive(Default)]
pub struct Session {
    attributes: Mutex<HashMap<String, Attribute>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn attributes(&self) -> MutexGuard<'_, HashMap<String, Attribute>> {
        self.attributes.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn bean(&self, key: &str) -> Option<BeanHandle> {
        match self.attributes().get(key) {
            Some(Attribute::Bean(handle)) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    pub fn set_bean(&self, key: &str, handle: BeanHandle) {
        self.attributes()
            .insert(key.to_string(), Attribute::Bean(handle));
    }

    pub fn remove(&self, key: &str) {
        self.attributes().remove(key);
    }
}

/// An inbound HTTP request as seen by the dispatch engine.
///
/// Immutable request data (method, path, parameters, headers, files) plus a
/// mutable attribute map for per-request engine state. Shared by `Arc`
/// throughout a dispatch; attribute access is internally synchronized.
pub struct Request {
    id: RequestId,
    method: Method,
    path: String,
    parameters: BTreeMap<String, Vec<String>>,
    headers: HashMap<String, String>,
    files: HashMap<String, FileUpload>,
    attributes: Mutex<HashMap<String, Attribute>>,
    session: Arc<Session>,
}

impl Request {
    /// Start building a request. `path` may carry a query string, which is
    /// parsed into the parameter map.
    #[must_use]
    pub fn builder(method: Method, path: &str) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The decoded request path, without any query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of a parameter, if present.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values submitted under a parameter name.
    #[must_use]
    pub fn parameter_values(&self, name: &str) -> Option<&[String]> {
        self.parameters.get(name).map(Vec::as_slice)
    }

    /// The full parameter map, ordered by name.
    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, Vec<String>> {
        &self.parameters
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Names of uploaded file parameters (distinct namespace from the
    /// regular parameter map).
    pub fn file_parameter_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    #[must_use]
    pub fn file_parameter(&self, name: &str) -> Option<&FileUpload> {
        self.files.get(name)
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn attributes(&self) -> MutexGuard<'_, HashMap<String, Attribute>> {
        self.attributes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_attribute(&self, key: &str, value: Attribute) {
        self.attributes().insert(key.to_string(), value);
    }

    pub fn remove_attribute(&self, key: &str) {
        self.attributes().remove(key);
    }

    #[must_use]
    pub fn text_attribute(&self, key: &str) -> Option<String> {
        match self.attributes().get(key) {
            Some(Attribute::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn bean_attribute(&self, key: &str) -> Option<BeanHandle> {
        match self.attributes().get(key) {
            Some(Attribute::Bean(handle)) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Push onto a bean-stack attribute, creating the stack when absent.
    pub fn push_bean_stack(&self, key: &str, handle: BeanHandle) {
        let mut attributes = self.attributes();
        match attributes.get_mut(key) {
            Some(Attribute::BeanStack(stack)) => stack.push(handle),
            _ => {
                attributes.insert(key.to_string(), Attribute::BeanStack(vec![handle]));
            }
        }
    }

    /// Pop from a bean-stack attribute. `None` when the stack is absent or
    /// empty.
    #[must_use]
    pub fn pop_bean_stack(&self, key: &str) -> Option<BeanHandle> {
        match self.attributes().get_mut(key) {
            Some(Attribute::BeanStack(stack)) => stack.pop(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Request`] from its parts. Containers adapt their native
/// request type through this; tests drive the pipeline with it directly.
pub struct RequestBuilder {
    method: Method,
    path: String,
    parameters: BTreeMap<String, Vec<String>>,
    headers: HashMap<String, String>,
    files: HashMap<String, FileUpload>,
    session: Option<Arc<Session>>,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        let (path_part, query) = match path.find('?') {
            Some(pos) => (&path[..pos], Some(&path[pos + 1..])),
            None => (path, None),
        };

        let decoded_path = urlencoding::decode(path_part)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| path_part.to_string());

        let mut parameters: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(query) = query {
            for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
                parameters.entry(k.into_owned()).or_default().push(v.into_owned());
            }
        }

        RequestBuilder {
            method,
            path: decoded_path,
            parameters,
            headers: HashMap::new(),
            files: HashMap::new(),
            session: None,
        }
    }

    /// Add one parameter value (form-body style); repeatable for
    /// multi-valued parameters.
    #[must_use]
    pub fn parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    #[must_use]
    pub fn file(mut self, name: &str, upload: FileUpload) -> Self {
        self.files.insert(name.to_string(), upload);
        self
    }

    /// Attach an existing session (shared across requests); a fresh session
    /// is created otherwise.
    #[must_use]
    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Request> {
        let request = Request {
            id: RequestId::new(),
            method: self.method,
            path: self.path,
            parameters: self.parameters,
            headers: self.headers,
            files: self.files,
            attributes: Mutex::new(HashMap::new()),
            session: self.session.unwrap_or_else(Session::new),
        };

        debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            param_count = request.parameters.len(),
            "Request built"
        );

        Arc::new(request)
    }
}
