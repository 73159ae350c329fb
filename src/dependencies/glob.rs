//! Class name patterns.
//!
//! Patterns name classes with `.` or `/` as package separator. `*` matches within one
//! segment, including `$`-qualified nested class names, and `**` matches any number of
//! segments. Patterns are translated to anchored regular expressions.

use regex::Regex;

use crate::Result;

/// A compiled class name pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

fn translate(pattern: &str) -> String {
    let mut expression = String::with_capacity(pattern.len() * 2 + 8);
    expression.push_str("^(?:");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' | '/' => expression.push('/'),
            '*' if chars.next_if_eq(&'*').is_some() => expression.push_str(".*"),
            '*' => expression.push_str(r"[\w$]*"),
            c => expression.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    expression.push_str(")$");
    expression
}

impl Glob {
    /// Compile `pattern`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Pattern`] if the translated expression is rejected.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Glob {
            pattern: pattern.to_string(),
            regex: Regex::new(&translate(pattern))?,
        })
    }

    /// Whether the internal class name `name` matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// A list of patterns matching when any of them does.
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
    globs: Vec<Glob>,
}

impl GlobSet {
    /// Compile every pattern in `patterns`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Pattern`] for the first invalid pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let globs = patterns
            .iter()
            .map(|pattern| Glob::new(pattern.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(GlobSet { globs })
    }

    /// Whether any pattern matches `name`.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.globs.iter().any(|glob| glob.matches(name))
    }

    /// Whether the set has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }

    /// The compiled patterns.
    pub fn iter(&self) -> impl Iterator<Item = &Glob> {
        self.globs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment() {
        let glob = Glob::new("a.b.*").unwrap();
        assert!(glob.matches("a/b/Foo"));
        assert!(glob.matches("a/b/Foo$Inner"));
        assert!(!glob.matches("a/b/c/Foo"));
        assert!(!glob.matches("x/a/b/Foo"));
    }

    #[test]
    fn test_any_segments() {
        let glob = Glob::new("a.**").unwrap();
        assert!(glob.matches("a/b/Foo"));
        assert!(glob.matches("a/b/c/Foo"));
        assert!(!glob.matches("b/Foo"));
    }

    #[test]
    fn test_literal_names() {
        let glob = Glob::new("java/lang/Thread$UncaughtExceptionHandler").unwrap();
        assert!(glob.matches("java/lang/Thread$UncaughtExceptionHandler"));
        assert!(!glob.matches("java/lang/Thread"));

        let dotted = Glob::new("com.example.Main").unwrap();
        assert!(dotted.matches("com/example/Main"));
        assert!(!dotted.matches("com/example/MainX"));
    }

    #[test]
    fn test_set() {
        let set = GlobSet::new(&["java.util.**", "a.B"]).unwrap();
        assert!(set.matches("java/util/HashMap"));
        assert!(set.matches("a/B"));
        assert!(!set.matches("a/C"));
        assert!(GlobSet::default().is_empty());
    }
}
