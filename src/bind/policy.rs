use regex::Regex;
use tracing::warn;

/// Allow/deny glob rules deciding which parameters may bind onto a handler
/// type.
///
/// Globs match the stripped parameter name; `*` matches any run of
/// characters, everything else is literal. Deny rules win over allow
/// rules; a name matching neither falls back to the default policy
/// (allow, unless the policy was built with [`BindingPolicy::strict`]).
#[derive(Debug, Clone)]
pub struct BindingPolicy {
    default_deny: bool,
    allow: Vec<(String, Regex)>,
    deny: Vec<(String, Regex)>,
}

impl BindingPolicy {
    /// Permissive policy: everything binds unless denied.
    #[must_use]
    pub fn new() -> Self {
        BindingPolicy {
            default_deny: false,
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    /// Strict policy: nothing binds unless allowed.
    #[must_use]
    pub fn strict() -> Self {
        BindingPolicy {
            default_deny: true,
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    #[must_use]
    pub fn allow(mut self, glob: &str) -> Self {
        if let Some(regex) = compile_glob(glob) {
            self.allow.push((glob.to_string(), regex));
        }
        self
    }

    #[must_use]
    pub fn deny(mut self, glob: &str) -> Self {
        if let Some(regex) = compile_glob(glob) {
            self.deny.push((glob.to_string(), regex));
        }
        self
    }

    /// Whether binding into the named (stripped) property is permitted.
    /// Deny wins over allow; no match falls back to the default.
    #[must_use]
    pub fn is_allowed(&self, stripped_name: &str) -> bool {
        if self.deny.iter().any(|(_, re)| re.is_match(stripped_name)) {
            return false;
        }
        if self.allow.iter().any(|(_, re)| re.is_match(stripped_name)) {
            return true;
        }
        !self.default_deny
    }
}

impl Default for BindingPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_glob(glob: &str) -> Option<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');

    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(glob, error = %e, "Ignoring unparsable binding-policy glob");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_everything() {
        let policy = BindingPolicy::new();
        assert!(policy.is_allowed("anything.at.all"));
    }

    #[test]
    fn deny_wins_over_allow() {
        let policy = BindingPolicy::new().allow("user.*").deny("user.password");
        assert!(policy.is_allowed("user.name"));
        assert!(!policy.is_allowed("user.password"));
    }

    #[test]
    fn strict_policy_denies_unlisted_names() {
        let policy = BindingPolicy::strict().allow("title");
        assert!(policy.is_allowed("title"));
        assert!(!policy.is_allowed("admin"));
    }
}
