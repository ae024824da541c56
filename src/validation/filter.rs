/// Per-event applicability rules shared by validation metadata, custom
/// validation methods, and before/after interceptor methods.
///
/// - an empty list applies to every event
/// - a plain list applies only to the listed events
/// - a list whose first entry starts with `!` applies to every event
///   *except* the listed ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    events: Vec<String>,
    negated: bool,
}

impl EventFilter {
    /// Build a filter from event names, honoring leading-`!` negation.
    ///
    /// Empty entries (or a bare `"!"`) are rejected at registration time;
    /// they would silently match nothing.
    #[must_use]
    pub fn new<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<String> = events
            .into_iter()
            .map(|e| e.as_ref().to_string())
            .filter(|e| !e.is_empty() && e != "!")
            .collect();

        let negated = raw.first().is_some_and(|e| e.starts_with('!'));
        let events = if negated {
            raw.iter()
                .map(|e| e.strip_prefix('!').unwrap_or(e).to_string())
                .collect()
        } else {
            raw
        };

        EventFilter { events, negated }
    }

    /// A filter that applies to every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether the filter applies to the named event.
    #[must_use]
    pub fn applies(&self, event: &str) -> bool {
        if self.events.is_empty() {
            return true;
        }
        let listed = self.events.iter().any(|e| e == event);
        if self.negated {
            !listed
        } else {
            listed
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_applies_to_everything() {
        let filter = EventFilter::all();
        assert!(filter.applies("save"));
        assert!(filter.applies("delete"));
    }

    #[test]
    fn positive_filter_applies_only_to_listed_events() {
        let filter = EventFilter::new(["save", "update"]);
        assert!(filter.applies("save"));
        assert!(filter.applies("update"));
        assert!(!filter.applies("delete"));
    }

    #[test]
    fn negated_filter_applies_to_everything_except_listed() {
        let filter = EventFilter::new(["!logout"]);
        assert!(filter.applies("save"));
        assert!(filter.applies("login"));
        assert!(!filter.applies("logout"));
    }
}
