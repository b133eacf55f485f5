use std::fmt;

/// A dotted hierarchical instance path, e.g. `top.cpu.alu`.
///
/// Used two places: the dependency analyzer stamps combinational-loop
/// diagnostics with one (§4.1), and `$display`'s `%m` substitution
/// (§4.6) resolves to one at runtime. Both want the same cheap,
/// cloneable, displayable type, so it lives here rather than in either
/// crate that consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HierPath(Vec<String>);

impl HierPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Returns a new path with `name` appended, leaving `self` untouched.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut out = self.0.clone();
        out.push(name.into());
        Self(out)
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for HierPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for HierPath {
    fn from(value: &str) -> Self {
        Self::root(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_appends_without_mutating_parent() {
        let top = HierPath::root("top");
        let child = top.child("cpu");
        assert_eq!(top.to_string(), "top");
        assert_eq!(child.to_string(), "top.cpu");
    }
}
