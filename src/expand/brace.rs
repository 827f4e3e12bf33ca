//! Brace expansion
//!
//! Phase one, before anything else: `{a,b,c}` lists and `{1..5}` /
//! `{a..e}` / `{01..05}` / `{1..10..2}` sequences expand combinatorially
//! with their surrounding text. Zero-padding width is preserved, empty
//! list elements are retained, nesting expands depth-first. A brace
//! construct must lie entirely within one unquoted literal run; quoted
//! or escaped braces, and braces whose body spans an expansion part
//! (`{$var}`), stay literal.

use crate::ast::types::{WordNode, WordPart};

/// Cap on generated sequence elements, to keep `{1..9999999}` from
/// exhausting memory.
const MAX_RANGE_ITEMS: usize = 10000;

/// Expand every brace construct in the word, depth-first. Returns the
/// word itself (cloned) when nothing expands.
pub fn expand_braces(word: &WordNode) -> Vec<WordNode> {
    for (pi, part) in word.parts.iter().enumerate() {
        let text = match part {
            WordPart::Literal(text) => text,
            _ => continue,
        };
        if let Some((open, close, items)) = find_brace_construct(text) {
            let mut results = Vec::new();
            for item in &items {
                let mut parts = word.parts[..pi].to_vec();
                let new_text = format!("{}{}{}", &text[..open], item, &text[close + 1..]);
                if !new_text.is_empty() {
                    parts.push(WordPart::Literal(new_text));
                }
                parts.extend_from_slice(&word.parts[pi + 1..]);
                results.extend(expand_braces(&WordNode { parts }));
            }
            return results;
        }
    }
    vec![word.clone()]
}

/// Find the first expandable `{...}` in a literal run. Returns the byte
/// offsets of the braces and the expansion items.
fn find_brace_construct(text: &str) -> Option<(usize, usize, Vec<String>)> {
    let bytes = text.as_bytes();
    let mut open = 0;
    while open < bytes.len() {
        if bytes[open] == b'{' {
            if let Some((close, items)) = try_construct(text, open) {
                return Some((open, close, items));
            }
        }
        open += 1;
    }
    None
}

/// Try to read a valid construct whose `{` is at `open`.
fn try_construct(text: &str, open: usize) -> Option<(usize, Vec<String>)> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut commas = Vec::new();
    let mut close = None;
    for i in open..bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            b',' if depth == 1 => commas.push(i),
            _ => {}
        }
    }
    let close = close?;
    let body = &text[open + 1..close];

    if commas.is_empty() {
        let items = expand_range(body)?;
        return Some((close, items));
    }

    // Split on top-level commas; empty elements are kept.
    let mut items = Vec::new();
    let mut start = open + 1;
    for &c in &commas {
        items.push(text[start..c].to_string());
        start = c + 1;
    }
    items.push(text[start..close].to_string());
    Some((close, items))
}

/// Expand `a..b` and `a..b..step` sequence bodies.
fn expand_range(body: &str) -> Option<Vec<String>> {
    let pieces: Vec<&str> = body.split("..").collect();
    let (from, to, step) = match pieces.as_slice() {
        [a, b] => (*a, *b, None),
        [a, b, s] => (*a, *b, Some(*s)),
        _ => return None,
    };

    if let (Ok(start), Ok(end)) = (from.parse::<i64>(), to.parse::<i64>()) {
        let step = match step {
            Some(s) => s.parse::<i64>().ok()?,
            None => 1,
        };
        return Some(numeric_range(start, end, step, from, to));
    }

    // Character ranges: single chars on both sides, no padding concept.
    let (fc, tc) = (single_char(from)?, single_char(to)?);
    let step = match step {
        Some(s) => s.parse::<i64>().ok()?,
        None => 1,
    };
    let step = if step == 0 { 1 } else { step.abs() as u32 };
    let (a, b) = (fc as u32, tc as u32);
    let mut out = Vec::new();
    if a <= b {
        let mut c = a;
        while c <= b && out.len() < MAX_RANGE_ITEMS {
            out.push(char::from_u32(c)?.to_string());
            c += step;
        }
    } else {
        let mut c = a;
        while c >= b && out.len() < MAX_RANGE_ITEMS {
            out.push(char::from_u32(c)?.to_string());
            if c < step {
                break;
            }
            c -= step;
        }
    }
    Some(out)
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_some() || !c.is_ascii_alphabetic() {
        None
    } else {
        Some(c)
    }
}

/// Numeric sequence with bash's rules: step 0 acts as 1, the step's sign
/// is ignored in favor of the natural direction, and zero-padding width
/// comes from the wider of the endpoints.
fn numeric_range(start: i64, end: i64, raw_step: i64, from: &str, to: &str) -> Vec<String> {
    let step = if raw_step == 0 { 1 } else { raw_step.abs() };

    let mut pad = 0usize;
    for s in [from, to] {
        let digits = s.trim_start_matches('-');
        if digits.len() > 1 && digits.starts_with('0') {
            pad = pad.max(digits.len());
        }
    }
    let format_num = |n: i64| -> String {
        if pad > 0 {
            if n < 0 {
                format!("-{:0>width$}", n.unsigned_abs(), width = pad)
            } else {
                format!("{n:0>pad$}")
            }
        } else {
            n.to_string()
        }
    };

    let mut out = Vec::new();
    if start <= end {
        let mut i = start;
        while i <= end && out.len() < MAX_RANGE_ITEMS {
            out.push(format_num(i));
            i += step;
        }
    } else {
        let mut i = start;
        while i >= end && out.len() < MAX_RANGE_ITEMS {
            out.push(format_num(i));
            i -= step;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(text: &str) -> Vec<String> {
        expand_braces(&WordNode::literal(text))
            .iter()
            .map(WordNode::flatten_literal)
            .collect()
    }

    #[test]
    fn simple_list() {
        assert_eq!(expand("{a,b,c}"), vec!["a", "b", "c"]);
        assert_eq!(expand("x{a,b}y"), vec!["xay", "xby"]);
    }

    #[test]
    fn empty_elements_are_retained() {
        assert_eq!(expand("a{,b}"), vec!["a", "ab"]);
    }

    #[test]
    fn nested_expands_depth_first() {
        assert_eq!(expand("{a,{b,c}}"), vec!["a", "b", "c"]);
        assert_eq!(expand("x{1,{2,3}z}"), vec!["x1", "x2z", "x3z"]);
    }

    #[test]
    fn multiple_constructs_multiply() {
        assert_eq!(expand("{a,b}{1,2}"), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn numeric_ranges() {
        assert_eq!(expand("{1..5}"), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(expand("{5..1}"), vec!["5", "4", "3", "2", "1"]);
        assert_eq!(expand("{-2..2}"), vec!["-2", "-1", "0", "1", "2"]);
        assert_eq!(expand("{1..10..2}"), vec!["1", "3", "5", "7", "9"]);
    }

    #[test]
    fn zero_padding_is_preserved() {
        assert_eq!(expand("{01..05}"), vec!["01", "02", "03", "04", "05"]);
        assert_eq!(expand("{08..11}"), vec!["08", "09", "10", "11"]);
    }

    #[test]
    fn character_ranges() {
        assert_eq!(expand("{a..e}"), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(expand("{e..a}"), vec!["e", "d", "c", "b", "a"]);
    }

    #[test]
    fn no_comma_no_range_is_literal() {
        assert_eq!(expand("{abc}"), vec!["{abc}"]);
        assert_eq!(expand("{}"), vec!["{}"]);
    }

    #[test]
    fn brace_spanning_expansion_part_is_literal() {
        // {$var} — the construct spans a parameter part, so no expansion.
        let word = WordNode {
            parts: vec![
                WordPart::Literal("{".into()),
                WordPart::Parameter(crate::ast::types::ParameterExpr::plain("var")),
                WordPart::Literal("}".into()),
            ],
        };
        assert_eq!(expand_braces(&word).len(), 1);
    }

    #[test]
    fn range_count_roundtrip() {
        assert_eq!(expand("{1..100}").len(), 100);
    }
}
