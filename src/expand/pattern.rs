//! Shell pattern matching
//!
//! Converts glob patterns (`*`, `?`, `[...]` with POSIX classes) to
//! regexes for case statements, parameter-expansion operators, and
//! pathname expansion. Pattern text may carry the internal literal
//! marker: a NUL prefix protects the next character from being treated
//! as a metacharacter.
//!
//! Invalid ranges fail regex compilation and the caller treats the
//! pattern as matching nothing; an unclosed `[` is a literal bracket.

use lazy_static::lazy_static;
use regex_lite::Regex;
use std::collections::HashMap;

use crate::ast::types::ReplaceAnchor;

/// In-band sentinel: the following character is literal even if it looks
/// like a glob metacharacter. Stripped during quote removal; must never
/// reach output or the filesystem.
pub const LITERAL_MARK: char = '\0';

lazy_static! {
    /// POSIX character class names and their regex equivalents.
    static ref POSIX_CLASSES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("alnum", "a-zA-Z0-9");
        m.insert("alpha", "a-zA-Z");
        m.insert("ascii", "\\x00-\\x7F");
        m.insert("blank", " \\t");
        m.insert("cntrl", "\\x00-\\x1F\\x7F");
        m.insert("digit", "0-9");
        m.insert("graph", "!-~");
        m.insert("lower", "a-z");
        m.insert("print", " -~");
        m.insert("punct", "!-/:-@\\[-`{-~");
        m.insert("space", " \\t\\n\\r\\x0b\\x0c");
        m.insert("upper", "A-Z");
        m.insert("xdigit", "0-9A-Fa-f");
        m
    };
}

/// Prefix every glob metacharacter with the literal marker.
pub fn protect(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push(LITERAL_MARK);
        }
        out.push(c);
    }
    out
}

/// Remove every literal marker (the quote-removal phase for fields).
pub fn strip_marks(s: &str) -> String {
    s.chars().filter(|c| *c != LITERAL_MARK).collect()
}

/// Does the string contain an unprotected glob metacharacter?
pub fn has_unquoted_glob(s: &str) -> bool {
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            LITERAL_MARK => {
                chars.next();
            }
            '*' | '?' | '[' => return true,
            _ => {}
        }
    }
    false
}

fn push_regex_literal(out: &mut String, c: char) {
    if matches!(
        c,
        '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
    ) {
        out.push('\\');
    }
    out.push(c);
}

/// Convert a pattern (possibly marker-protected) to a regex body that
/// matches the whole subject.
pub fn pattern_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            LITERAL_MARK => {
                if let Some(&next) = chars.get(i + 1) {
                    push_regex_literal(&mut out, next);
                    i += 1;
                }
            }
            '\\' => {
                // Backslash escapes the next pattern character.
                if let Some(&next) = chars.get(i + 1) {
                    push_regex_literal(&mut out, next);
                    i += 1;
                } else {
                    out.push_str("\\\\");
                }
            }
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match translate_bracket(&chars, i) {
                Some((class, end)) => {
                    out.push_str(&class);
                    i = end;
                }
                None => out.push_str("\\["),
            },
            _ => push_regex_literal(&mut out, c),
        }
        i += 1;
    }
    out
}

/// Translate `[...]` starting at `open`. Returns the regex class and the
/// index of the closing bracket, or `None` when the class never closes.
fn translate_bracket(chars: &[char], open: usize) -> Option<(String, usize)> {
    let mut i = open + 1;
    let mut body = String::new();
    let mut negated = false;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        negated = true;
        i += 1;
    }
    // A `]` right after the opening (and negation) is literal.
    if chars.get(i) == Some(&']') {
        body.push_str("\\]");
        i += 1;
    }
    loop {
        let c = *chars.get(i)?;
        match c {
            ']' => break,
            '[' if chars.get(i + 1) == Some(&':') => {
                // POSIX class: [:alpha:]
                let end = (i + 2..chars.len()).find(|&j| {
                    chars[j] == ':' && chars.get(j + 1) == Some(&']')
                })?;
                let name: String = chars[i + 2..end].iter().collect();
                match POSIX_CLASSES.get(name.as_str()) {
                    Some(expansion) => body.push_str(expansion),
                    None => return None,
                }
                i = end + 1;
            }
            LITERAL_MARK => {
                if let Some(&next) = chars.get(i + 1) {
                    escape_in_class(&mut body, next);
                    i += 1;
                }
            }
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    escape_in_class(&mut body, next);
                    i += 1;
                }
            }
            _ => escape_in_class_keep_ranges(&mut body, c),
        }
        i += 1;
    }
    let prefix = if negated { "[^" } else { "[" };
    Some((format!("{prefix}{body}]"), i))
}

fn escape_in_class(body: &mut String, c: char) {
    if matches!(c, '\\' | ']' | '^' | '-' | '[') {
        body.push('\\');
    }
    body.push(c);
}

fn escape_in_class_keep_ranges(body: &mut String, c: char) {
    if matches!(c, '\\' | ']' | '^' | '[') {
        body.push('\\');
    }
    body.push(c);
}

/// Compile a pattern for whole-string matching. `None` when the pattern
/// is invalid (it then matches nothing).
pub fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^(?:{})$", pattern_to_regex(pattern))).ok()
}

/// Does `pattern` match all of `subject`?
pub fn matches(pattern: &str, subject: &str) -> bool {
    compile(pattern).map_or(false, |re| re.is_match(subject))
}

/// Byte offsets of char boundaries, for prefix/suffix candidate loops.
fn boundaries(s: &str) -> Vec<usize> {
    let mut v: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
    v.push(s.len());
    v
}

/// `${V#pat}` / `${V##pat}`: remove the shortest/longest matching prefix.
pub fn remove_prefix(value: &str, pattern: &str, longest: bool) -> String {
    let re = match compile(pattern) {
        Some(re) => re,
        None => return value.to_string(),
    };
    let bounds = boundaries(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(bounds.iter().rev())
    } else {
        Box::new(bounds.iter())
    };
    for &end in candidates {
        if re.is_match(&value[..end]) {
            return value[end..].to_string();
        }
    }
    value.to_string()
}

/// `${V%pat}` / `${V%%pat}`: remove the shortest/longest matching suffix.
pub fn remove_suffix(value: &str, pattern: &str, longest: bool) -> String {
    let re = match compile(pattern) {
        Some(re) => re,
        None => return value.to_string(),
    };
    let bounds = boundaries(value);
    let candidates: Box<dyn Iterator<Item = &usize>> = if longest {
        Box::new(bounds.iter())
    } else {
        Box::new(bounds.iter().rev())
    };
    for &start in candidates {
        if re.is_match(&value[start..]) {
            return value[..start].to_string();
        }
    }
    value.to_string()
}

/// `${V/pat/repl}` and variants: replace the first (or every, or the
/// anchored) longest match.
pub fn replace(
    value: &str,
    pattern: &str,
    replacement: &str,
    all: bool,
    anchor: Option<ReplaceAnchor>,
) -> String {
    let re = match compile(pattern) {
        Some(re) => re,
        None => return value.to_string(),
    };
    let bounds = boundaries(value);

    match anchor {
        Some(ReplaceAnchor::Prefix) => {
            for &end in bounds.iter().rev() {
                if re.is_match(&value[..end]) {
                    return format!("{replacement}{}", &value[end..]);
                }
            }
            value.to_string()
        }
        Some(ReplaceAnchor::Suffix) => {
            for &start in bounds.iter() {
                if re.is_match(&value[start..]) {
                    return format!("{}{replacement}", &value[..start]);
                }
            }
            value.to_string()
        }
        None => {
            let mut out = String::new();
            let mut at = 0; // index into bounds
            let mut replaced = false;
            while at < bounds.len() - 1 {
                let start = bounds[at];
                if replaced && !all {
                    out.push_str(&value[start..]);
                    return out;
                }
                // Longest non-empty match beginning here.
                let found = bounds[at + 1..]
                    .iter()
                    .rev()
                    .find(|&&end| re.is_match(&value[start..end]))
                    .copied();
                match found {
                    Some(end) => {
                        out.push_str(replacement);
                        replaced = true;
                        at = bounds
                            .iter()
                            .position(|&b| b == end)
                            .expect("match ends on a boundary");
                    }
                    None => {
                        out.push_str(&value[start..bounds[at + 1]]);
                        at += 1;
                    }
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_and_question() {
        assert!(matches("*.txt", "notes.txt"));
        assert!(!matches("*.txt", "notes.text"));
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
    }

    #[test]
    fn bracket_classes() {
        assert!(matches("[abc]x", "bx"));
        assert!(!matches("[!abc]x", "bx"));
        assert!(matches("[a-f]1", "d1"));
        assert!(matches("[[:digit:]][[:digit:]]", "42"));
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        assert!(matches("a[bc", "a[bc"));
    }

    #[test]
    fn protected_metachars_are_literal() {
        let pat = protect("*.txt");
        assert!(matches(&pat, "*.txt"));
        assert!(!matches(&pat, "notes.txt"));
    }

    #[test]
    fn prefix_and_suffix_removal() {
        assert_eq!(remove_prefix("src/lib.rs", "*/", false), "lib.rs");
        assert_eq!(remove_prefix("a/b/c", "*/", true), "c");
        assert_eq!(remove_suffix("file.tar.gz", ".*", false), "file.tar");
        assert_eq!(remove_suffix("file.tar.gz", ".*", true), "file");
    }

    #[test]
    fn replacement() {
        assert_eq!(replace("hello", "l", "L", false, None), "heLlo");
        assert_eq!(replace("hello", "l", "L", true, None), "heLLo");
        assert_eq!(
            replace("hello", "h", "H", false, Some(ReplaceAnchor::Prefix)),
            "Hello"
        );
        assert_eq!(
            replace("hello", "o", "0", false, Some(ReplaceAnchor::Suffix)),
            "hell0"
        );
        // Longest match wins.
        assert_eq!(replace("aaa", "a*", "X", false, None), "X");
    }

    #[test]
    fn strip_marks_removes_sentinels() {
        let s = protect("a*b");
        assert_eq!(strip_marks(&s), "a*b");
        assert!(!has_unquoted_glob(&s));
        assert!(has_unquoted_glob("a*b"));
    }
}
