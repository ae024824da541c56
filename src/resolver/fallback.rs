use std::any::Any;

use crate::handler::{ActionBean, Attachment};

/// Collaborator that can answer whether a view resource exists at a path.
/// The engine never renders views; it only probes for their existence when
/// deciding whether a not-found path can fall back to one.
pub trait ViewLocator: Send + Sync {
    fn exists(&self, path: &str) -> bool;
}

/// Synthesize a binding path from a handler type name.
///
/// The name is trimmed after the last occurrence of any configured base
/// segment, `Action`/`Bean` suffixes are dropped, module separators become
/// slashes, and the binding suffix is appended:
/// `app::web::user::RegisterActionBean` → `/user/Register.action`.
#[must_use]
pub fn synthesize_binding(type_name: &str, base_segments: &[String], suffix: &str) -> String {
    let mut name = type_name.replace("::", ".");

    for base in base_segments {
        if let Some(pos) = name.find(base.as_str()) {
            name = name[pos + base.len()..].to_string();
        }
    }

    if let Some(stripped) = name.strip_suffix("Bean") {
        name = stripped.to_string();
    }
    if let Some(stripped) = name.strip_suffix("Action") {
        name = stripped.to_string();
    }

    let mut path = name.replace('.', "/");
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    path.push_str(suffix);
    path
}

/// Candidate view paths for a request path with no bound handler, probed
/// in order: the name as-is, lower-cased first letter, then snake_case.
#[must_use]
pub fn view_candidates(binding_path: &str, view_suffix: &str) -> Vec<String> {
    let slash = binding_path.rfind('/').map_or(0, |i| i + 1);
    let dir = &binding_path[..slash];
    let file = &binding_path[slash..];
    let name = match file.rfind('.') {
        Some(dot) => &file[..dot],
        None => file,
    };
    if name.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::with_capacity(3);
    candidates.push(format!("{dir}{name}{view_suffix}"));

    let mut lowered = String::with_capacity(name.len());
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        lowered.extend(first.to_lowercase());
        lowered.push_str(chars.as_str());
    }
    if lowered != name {
        candidates.push(format!("{dir}{lowered}{view_suffix}"));
    }

    let mut snaked = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_uppercase() {
            snaked.push('_');
            snaked.extend(c.to_lowercase());
        } else {
            snaked.push(c);
        }
    }
    let snaked = snaked.trim_start_matches('_').to_string();
    if snaked != name && snaked != lowered {
        candidates.push(format!("{dir}{snaked}{view_suffix}"));
    }

    candidates
}

/// Special-purpose handler synthesized when no handler is bound to a URL
/// but a same-named view exists: its single event forwards to that view.
#[derive(Default)]
pub struct DefaultViewBean {
    attachment: Attachment,
    view: String,
}

impl DefaultViewBean {
    #[must_use]
    pub fn new(view: &str) -> Self {
        DefaultViewBean {
            attachment: Attachment::new(),
            view: view.to_string(),
        }
    }

    #[must_use]
    pub fn view(&self) -> &str {
        &self.view
    }
}

impl ActionBean for DefaultViewBean {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_synthesis_strips_base_segments_and_suffixes() {
        let binding = synthesize_binding(
            "app::web::user::RegisterActionBean",
            &["web".to_string()],
            ".action",
        );
        assert_eq!(binding, "/user/Register.action");
    }

    #[test]
    fn view_candidates_cover_the_three_transforms() {
        let candidates = view_candidates("/account/ViewAccount.action", ".html");
        assert_eq!(
            candidates,
            vec![
                "/account/ViewAccount.html",
                "/account/viewAccount.html",
                "/account/view_account.html",
            ]
        );
    }
}
