use std::sync::Arc;

use super::*;

fn parse(p: &str) -> Arc<UrlBindingPattern> {
    Arc::new(UrlBindingPattern::parse(p).expect("pattern should parse"))
}

#[test]
fn plain_path_has_no_components() {
    let pattern = parse("/contact/List.action");
    assert_eq!(pattern.path(), "/contact/List.action");
    assert!(pattern.components().is_empty());
    assert_eq!(pattern.suffix(), None);
}

#[test]
fn path_is_trimmed_to_last_identifier_character() {
    // The "/" between the path and the first parameter becomes a leading
    // literal component, not part of the path.
    let pattern = parse("/user/{id}");
    assert_eq!(pattern.path(), "/user");
    assert_eq!(
        pattern.components().first(),
        Some(&Component::Literal("/".to_string()))
    );
    let params: Vec<_> = pattern.parameters().collect();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].name, "id");
    assert_eq!(params[0].default_value, None);
}

#[test]
fn parameter_defaults_are_parsed() {
    let pattern = parse("/user/{id=5}/{$event=view}");
    let params: Vec<_> = pattern.parameters().collect();
    assert_eq!(params[0].default_value.as_deref(), Some("5"));
    assert!(params[1].is_event());
    assert_eq!(params[1].default_value.as_deref(), Some("view"));
}

#[test]
fn trailing_literal_becomes_suffix() {
    let pattern = parse("/user/{id}/{$event}.action");
    assert_eq!(pattern.suffix(), Some(".action"));
}

#[test]
fn escapes_are_honored() {
    let pattern = parse("/literal\\{brace/{name=\\=x}");
    assert_eq!(pattern.path(), "/literal{brace");
    let params: Vec<_> = pattern.parameters().collect();
    assert_eq!(params[0].name, "name");
    assert_eq!(params[0].default_value.as_deref(), Some("=x"));
}

#[test]
fn unterminated_brace_is_a_config_error() {
    assert!(UrlBindingPattern::parse("/user/{id").is_err());
}

#[test]
fn trailing_escape_is_a_config_error() {
    assert!(UrlBindingPattern::parse("/user/{id}\\").is_err());
}

#[test]
fn evaluate_extracts_positional_values() {
    let pattern = parse("/user/{id}/{$event=view}");
    let live = pattern.evaluate("/user/42/edit");
    assert_eq!(live.parameter("id"), Some("42"));
    assert_eq!(live.event(), Some("edit"));
}

#[test]
fn evaluate_falls_back_to_defaults_for_unmatched_parameters() {
    let pattern = parse("/user/{id}/{$event=view}");
    let live = pattern.evaluate("/user/42");
    assert_eq!(live.parameter("id"), Some("42"));
    assert_eq!(live.event(), Some("view"));
}

#[test]
fn evaluate_ignores_trailing_slashes_and_suffix() {
    let pattern = parse("/user/{id}/{$event}.action");
    let live = pattern.evaluate("/user/42/edit.action/");
    assert_eq!(live.parameter("id"), Some("42"));
    assert_eq!(live.event(), Some("edit"));
}

#[test]
fn event_default_fill_is_lazy() {
    let pattern = parse("/user/{id}/{$event}");
    let live = pattern.evaluate("/user/42");
    assert_eq!(live.event(), None);

    let filled = Arc::new(pattern.with_event_default("list"));
    let live = filled.evaluate("/user/42");
    assert_eq!(live.event(), Some("list"));
}

#[test]
fn registry_picks_longest_matching_prefix() {
    let mut registry = UrlBindingRegistry::new();
    registry.add(parse("/foo")).expect("add");
    registry.add(parse("/foo/bar")).expect("add");
    registry.add(parse("/foo/bar/baz")).expect("add");

    let hit = registry.match_path("/foo/bar/bop").expect("match");
    assert_eq!(hit.path(), "/foo/bar");
    let hit = registry.match_path("/foo/bar/baz/1").expect("match");
    assert_eq!(hit.path(), "/foo/bar/baz");
    assert!(registry.match_path("/other").is_none());
}

#[test]
fn registry_breaks_prefix_ties_lexically() {
    let mut registry = UrlBindingRegistry::new();
    registry.add(parse("/ab{x}")).expect("add");
    registry.add(parse("/aa{x}")).expect("add");

    // "/a…" matches neither literal prefix fully; both "/aa" and "/ab" are
    // two-byte paths, so ordering falls to the lexical leg.
    let hit = registry.match_path("/aa/111").expect("match");
    assert_eq!(hit.path(), "/aa");
}

#[test]
fn registry_rejects_conflicting_paths() {
    let mut registry = UrlBindingRegistry::new();
    registry.add(parse("/user/{id}")).expect("add");
    let err = registry.add(parse("/user/{name}"));
    assert!(err.is_err());
}
