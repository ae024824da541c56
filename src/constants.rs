//! Well-known parameter and request-attribute names used across the
//! dispatch engine.

/// URL parameter holding the path (relative to the application root) from
/// which the current form submission was made.
pub const URL_KEY_SOURCE_PAGE: &str = "_sourcePage";

/// URL parameter carrying the sealed list of field names that were present
/// on the originating form but might not be submitted with it (checkboxes,
/// multi-selects).
pub const URL_KEY_FIELDS_PRESENT: &str = "__fp";

/// URL parameter used as a last resort to name the event being fired.
pub const URL_KEY_EVENT_NAME: &str = "_eventName";

/// Request parameters with special meaning to the engine; never bound,
/// validated, or otherwise treated as handler properties.
pub const SPECIAL_URL_KEYS: [&str; 3] =
    [URL_KEY_SOURCE_PAGE, URL_KEY_FIELDS_PRESENT, URL_KEY_EVENT_NAME];

/// Request attribute under which the current handler instance is stored.
pub const REQ_ATTR_ACTION_BEAN: &str = "__action_bean";

/// Request attribute holding a stack of handler instances when a single
/// request involves nested dispatch to other handlers.
pub const REQ_ATTR_ACTION_BEAN_STACK: &str = "__action_bean_stack";

/// Request attribute checked first when determining the event to fire.
/// Set by forwarding dispatch, where the original request parameters are
/// still present and would otherwise mis-name the event.
pub const REQ_ATTR_EVENT_NAME: &str = "__dispatch_event_name";

/// Request attribute recording the canonical binding resolved for the
/// request path.
pub const REQ_ATTR_RESOLVED_BINDING: &str = "__resolved_binding";

/// True if the parameter name is one of the reserved engine keys.
#[must_use]
pub fn is_special_key(name: &str) -> bool {
    SPECIAL_URL_KEYS.contains(&name)
}
