//! Word splitting
//!
//! Phase six: IFS-based field splitting over the segments produced by the
//! expansion phases. Only unquoted expansion results split; literal and
//! quoted text joins with adjacent fields, and a quoted empty segment
//! anchors an empty field. Whitespace IFS characters coalesce and are
//! trimmed at the edges; each non-whitespace IFS character delimits
//! exactly one field; empty IFS disables splitting entirely.

use crate::expand::Seg;

fn is_ifs_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

/// Split a single expansion result by IFS. Returns the pieces plus
/// whether the value began/ended with a delimiter (which breaks the join
/// with the neighboring segment).
fn split_ifs(value: &str, ifs: &str) -> (Vec<String>, bool, bool) {
    if ifs.is_empty() {
        return (vec![value.to_string()], false, false);
    }
    let chars: Vec<char> = value.chars().collect();
    let in_ifs = |c: char| ifs.contains(c);
    let is_ws = |c: char| in_ifs(c) && is_ifs_whitespace(c);
    let is_nws = |c: char| in_ifs(c) && !is_ifs_whitespace(c);

    let leading = chars.first().map_or(false, |&c| in_ifs(c));
    let trailing = chars.last().map_or(false, |&c| in_ifs(c));

    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut pos = 0;
    let len = chars.len();

    while pos < len && is_ws(chars[pos]) {
        pos += 1;
    }
    let mut field_open = pos < len;
    while pos < len {
        let c = chars[pos];
        if is_nws(c) {
            fields.push(std::mem::take(&mut cur));
            pos += 1;
            while pos < len && is_ws(chars[pos]) {
                pos += 1;
            }
            field_open = pos < len;
        } else if is_ws(c) {
            fields.push(std::mem::take(&mut cur));
            while pos < len && is_ws(chars[pos]) {
                pos += 1;
            }
            // Whitespace absorbs one adjacent non-whitespace delimiter.
            if pos < len && is_nws(chars[pos]) {
                pos += 1;
                while pos < len && is_ws(chars[pos]) {
                    pos += 1;
                }
            }
            field_open = pos < len;
        } else {
            cur.push(c);
            pos += 1;
        }
    }
    if field_open {
        fields.push(cur);
    }
    (fields, leading, trailing)
}

/// Assemble final fields from expansion segments.
pub fn assemble_fields(segs: &[Seg], ifs: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for seg in segs {
        match seg {
            Seg::Break => {
                if let Some(f) = current.take() {
                    fields.push(f);
                }
            }
            Seg::Text {
                value,
                quoted,
                splittable,
            } => {
                if !*splittable {
                    // Joins the field in progress. A quoted empty still
                    // anchors a field; an unquoted empty does not.
                    if !value.is_empty() || *quoted {
                        current.get_or_insert_with(String::new).push_str(value);
                    }
                } else {
                    if value.is_empty() {
                        // An empty unquoted expansion vanishes.
                        continue;
                    }
                    let (pieces, leading, trailing) = split_ifs(value, ifs);
                    if leading {
                        if let Some(f) = current.take() {
                            fields.push(f);
                        }
                    }
                    for (k, piece) in pieces.iter().enumerate() {
                        if k > 0 {
                            if let Some(f) = current.take() {
                                fields.push(f);
                            }
                        }
                        current.get_or_insert_with(String::new).push_str(piece);
                    }
                    if trailing {
                        if let Some(f) = current.take() {
                            fields.push(f);
                        }
                    }
                }
            }
        }
    }
    if let Some(f) = current {
        fields.push(f);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Seg {
        Seg::Text {
            value: s.into(),
            quoted: false,
            splittable: false,
        }
    }

    fn exp(s: &str) -> Seg {
        Seg::Text {
            value: s.into(),
            quoted: false,
            splittable: true,
        }
    }

    fn quoted(s: &str) -> Seg {
        Seg::Text {
            value: s.into(),
            quoted: true,
            splittable: false,
        }
    }

    const WS: &str = " \t\n";

    #[test]
    fn literal_words_do_not_split() {
        // A literal containing no expansion is one field even if it could
        // split (the lexer already split words).
        assert_eq!(assemble_fields(&[lit("a")], WS), vec!["a"]);
    }

    #[test]
    fn unquoted_expansion_splits() {
        assert_eq!(
            assemble_fields(&[exp("one two  three")], WS),
            vec!["one", "two", "three"]
        );
    }

    #[test]
    fn expansion_joins_adjacent_literal() {
        // a$x with x="1 2": the "1" joins the "a".
        assert_eq!(
            assemble_fields(&[lit("a"), exp("1 2")], WS),
            vec!["a1", "2"]
        );
        // $x"b" with x="1 2": the "b" joins the "2".
        assert_eq!(
            assemble_fields(&[exp("1 2"), quoted("b")], WS),
            vec!["1", "2b"]
        );
    }

    #[test]
    fn leading_delimiter_breaks_join() {
        assert_eq!(
            assemble_fields(&[lit("a"), exp(" b")], WS),
            vec!["a", "b"]
        );
        assert_eq!(
            assemble_fields(&[exp("b "), lit("c")], WS),
            vec!["b", "c"]
        );
    }

    #[test]
    fn quoted_empty_anchors_field() {
        assert_eq!(assemble_fields(&[quoted("")], WS), vec![""]);
        // Unquoted empty expansion produces nothing.
        assert_eq!(assemble_fields(&[exp("")], WS), Vec::<String>::new());
    }

    #[test]
    fn non_whitespace_ifs_retains_empty_fields() {
        assert_eq!(
            assemble_fields(&[exp("a::b")], ":"),
            vec!["a", "", "b"]
        );
        assert_eq!(assemble_fields(&[exp(":a")], ":"), vec!["", "a"]);
        // Trailing delimiter does not create an empty field.
        assert_eq!(assemble_fields(&[exp("a:")], ":"), vec!["a"]);
    }

    #[test]
    fn mixed_ifs_whitespace_absorbs_one_delimiter() {
        assert_eq!(
            assemble_fields(&[exp("a : b")], ": "),
            vec!["a", "b"]
        );
    }

    #[test]
    fn empty_ifs_disables_splitting() {
        assert_eq!(
            assemble_fields(&[exp("one two three")], ""),
            vec!["one two three"]
        );
    }

    #[test]
    fn breaks_separate_fields() {
        assert_eq!(
            assemble_fields(&[quoted("a"), Seg::Break, quoted("")], WS),
            vec!["a", ""]
        );
    }

    #[test]
    fn ifs_split_rejoin_roundtrip() {
        // join(L, d) re-splits to L for non-whitespace IFS.
        let l = ["x", "", "y z", "w"];
        let joined = l.join(":");
        assert_eq!(
            assemble_fields(&[exp(&joined)], ":"),
            l.iter().map(|s| s.to_string()).collect::<Vec<_>>()
        );
    }
}
