//! Shell-style include patterns.
//!
//! Thumbnail specs select resources with `fnmatch`-style globs matched
//! against the whole filesystem path:
//!
//! | Pattern | Matches |
//! |---|---|
//! | `*` | any run of characters, including `/` |
//! | `?` | any single character |
//! | `[abc]`, `[a-z]` | one character from the set |
//! | `[!abc]` | one character not in the set |
//!
//! Because `*` crosses directory separators, `*.jpg` matches every JPEG
//! regardless of where the content root lives.

use regex::Regex;
use std::path::Path;

/// Translate a glob into an anchored regular expression.
fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Find the closing bracket; a `]` right after `[` or `[!` is literal.
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str("\\[");
                    continue;
                }
                let mut body = &chars[i..j];
                i = j + 1;
                out.push('[');
                if let Some(('!', rest)) = body.split_first() {
                    out.push('^');
                    body = rest;
                }
                for &ch in body {
                    // Characters with a meaning inside regex classes
                    if matches!(ch, '\\' | '[' | '^' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}

/// A compiled set of include globs; a path matches if any glob matches.
#[derive(Debug, Clone)]
pub struct IncludeSet {
    globs: Vec<String>,
    compiled: Vec<Regex>,
}

impl IncludeSet {
    /// Compile every glob. Returns the first offending glob on failure.
    pub fn new(globs: &[String]) -> Result<Self, (String, regex::Error)> {
        let compiled = globs
            .iter()
            .map(|g| Regex::new(&glob_to_regex(g)).map_err(|e| (g.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            globs: globs.to_vec(),
            compiled,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let s = path.to_string_lossy();
        self.compiled.iter().any(|re| re.is_match(&s))
    }

    pub fn globs(&self) -> &[String] {
        &self.globs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(globs: &[&str]) -> IncludeSet {
        let owned: Vec<String> = globs.iter().map(|g| g.to_string()).collect();
        IncludeSet::new(&owned).unwrap()
    }

    #[test]
    fn star_crosses_directories() {
        let s = set(&["*.jpg"]);
        assert!(s.matches(Path::new("/site/content/blog/a.jpg")));
        assert!(!s.matches(Path::new("/site/content/blog/a.jpeg")));
        assert!(!s.matches(Path::new("/site/content/blog/a.jpg.bak")));
    }

    #[test]
    fn any_glob_in_set_matches() {
        let s = set(&["*.png", "*.jpg"]);
        assert!(s.matches(Path::new("/x/a.png")));
        assert!(s.matches(Path::new("/x/b.jpg")));
        assert!(!s.matches(Path::new("/x/c.gif")));
    }

    #[test]
    fn question_mark_and_classes() {
        let s = set(&["*/img?.[pj][np]g"]);
        assert!(s.matches(Path::new("/a/img1.png")));
        assert!(s.matches(Path::new("/a/img2.jpg")));
        assert!(!s.matches(Path::new("/a/img10.png")));
    }

    #[test]
    fn negated_class() {
        let s = set(&["*/[!t]????.jpg"]);
        assert!(s.matches(Path::new("/a/photo.jpg")));
        assert!(!s.matches(Path::new("/a/thumb.jpg")));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let s = set(&["*/a+b (1).jpg"]);
        assert!(s.matches(Path::new("/x/a+b (1).jpg")));
        assert!(!s.matches(Path::new("/x/aab (1).jpg")));
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        let s = set(&["*[abc"]);
        assert!(s.matches(Path::new("/x/[abc")));
        assert!(!s.matches(Path::new("/x/a")));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let s = set(&["*.jpg"]);
        assert!(!s.matches(Path::new("/x/A.JPG")));
    }

    #[test]
    fn empty_set_matches_nothing() {
        assert!(!set(&[]).matches(Path::new("/x/a.jpg")));
    }
}
