//! Word expansion
//!
//! The eight-phase POSIX word-processing pipeline, in strict order:
//! brace expansion, tilde expansion, parameter/variable expansion,
//! command substitution, arithmetic expansion, word splitting, pathname
//! expansion, and quote removal. Quoting flows through as structure: the
//! phases 3-5 produce *segments* that remember whether their text was
//! quoted and whether it may split, and literal occurrences of glob
//! metacharacters are protected with an in-band marker that the final
//! phase strips.

pub mod arith;
pub mod brace;
pub mod command_subst;
pub mod parameter;
pub mod pathname;
pub mod pattern;
pub mod split;
pub mod tilde;

use thiserror::Error;

use crate::ast::types::{WordNode, WordPart};
use crate::shell::Shell;
use parameter::ParamValue;

#[derive(Debug, Clone, Error)]
pub enum ExpandError {
    /// The `${V:?}` operator fired.
    #[error("{name}: {message}")]
    ParameterNull { name: String, message: String },
    /// `set -u` and an unset parameter.
    #[error("{0}: unbound variable")]
    Unbound(String),
    #[error("{0}: bad substitution")]
    BadSubstitution(String),
    #[error("{0}")]
    Arith(String),
    /// `failglob` and a pattern with no match.
    #[error("no match: {0}")]
    NoMatch(String),
    /// A command substitution failed to parse or run.
    #[error("command substitution: {0}")]
    Subst(String),
}

/// One intermediate piece of a word between expansion and splitting.
#[derive(Debug, Clone, PartialEq)]
pub enum Seg {
    Text {
        value: String,
        /// Quoted text never splits or globs, and an empty quoted
        /// segment still anchors a field.
        quoted: bool,
        /// Unquoted expansion results split on IFS.
        splittable: bool,
    },
    /// Hard field boundary between `"$@"`/array elements.
    Break,
}

impl Seg {
    fn text(value: String, quoted: bool, splittable: bool) -> Self {
        Seg::Text {
            value,
            quoted,
            splittable,
        }
    }
}

/// Expand a command's words into its argv.
pub fn expand_words(shell: &mut Shell, words: &[WordNode]) -> Result<Vec<String>, ExpandError> {
    let mut argv = Vec::new();
    for word in words {
        argv.extend(expand_word(shell, word)?);
    }
    Ok(argv)
}

/// Full eight-phase expansion of one word into zero or more fields.
pub fn expand_word(shell: &mut Shell, word: &WordNode) -> Result<Vec<String>, ExpandError> {
    let mut out = Vec::new();
    for braced in brace::expand_braces(word) {
        let tilded = tilde::expand_tilde(shell, &braced, false);
        let segs = expand_parts(shell, &tilded.parts, false)?;
        let fields = split::assemble_fields(&segs, &shell.ifs());
        let globbed = pathname::expand_fields(shell, fields)?;
        out.extend(globbed.iter().map(|f| pattern::strip_marks(f)));
    }
    Ok(out)
}

/// Expansion to a single field: no brace expansion, no splitting, no
/// globbing. Used for redirection targets, case subjects, and heredoc
/// bodies.
pub fn expand_word_single(shell: &mut Shell, word: &WordNode) -> Result<String, ExpandError> {
    expand_to_string(shell, word, false, false)
}

/// Assignment-value expansion: like `expand_word_single` but with the
/// assignment form of tilde expansion (`:`-separated values).
pub fn expand_assignment_value(
    shell: &mut Shell,
    word: &WordNode,
) -> Result<String, ExpandError> {
    expand_to_string(shell, word, true, false)
}

/// Pattern operand expansion (case patterns, parameter-op patterns):
/// single field, but the literal markers survive so the matcher can tell
/// quoted metacharacters from live ones.
pub(crate) fn expand_word_keep_marks(
    shell: &mut Shell,
    word: &WordNode,
) -> Result<String, ExpandError> {
    expand_to_string(shell, word, false, true)
}

fn expand_to_string(
    shell: &mut Shell,
    word: &WordNode,
    assignment: bool,
    keep_marks: bool,
) -> Result<String, ExpandError> {
    let tilded = tilde::expand_tilde(shell, word, assignment);
    let segs = expand_parts(shell, &tilded.parts, false)?;
    let mut s = String::new();
    for seg in segs {
        match seg {
            // Multi-value expansions join with spaces in a one-field
            // context.
            Seg::Break => s.push(' '),
            Seg::Text { value, .. } => s.push_str(&value),
        }
    }
    Ok(if keep_marks { s } else { pattern::strip_marks(&s) })
}

/// Phases 3-5 over a part list. `quoted` is true inside double quotes
/// (and heredoc bodies): expansion still happens, splitting and globbing
/// do not.
pub(crate) fn expand_parts(
    shell: &mut Shell,
    parts: &[WordPart],
    quoted: bool,
) -> Result<Vec<Seg>, ExpandError> {
    let mut segs = Vec::new();
    for part in parts {
        match part {
            WordPart::Literal(text) => {
                if quoted {
                    segs.push(Seg::text(pattern::protect(text), true, false));
                } else {
                    segs.push(Seg::text(text.clone(), false, false));
                }
            }
            WordPart::SingleQuoted(text) | WordPart::AnsiC(text) => {
                segs.push(Seg::text(pattern::protect(text), true, false));
            }
            WordPart::Escaped(c) => {
                segs.push(Seg::text(pattern::protect(&c.to_string()), true, false));
            }
            WordPart::DoubleQuoted(inner) => {
                if inner.is_empty() {
                    // `""` anchors an empty field; an empty `"$@"` does
                    // not reach here (its parts are non-empty).
                    segs.push(Seg::text(String::new(), true, false));
                } else {
                    segs.extend(expand_parts(shell, inner, true)?);
                }
            }
            WordPart::Parameter(p) => {
                let star = (p.name == "*" && p.index.is_none())
                    || p.index.as_deref() == Some("*");
                match parameter::expand_parameter(shell, p, quoted)? {
                    ParamValue::Single(None) => {
                        // Unset: vanishes unquoted, anchors an empty field
                        // inside quotes.
                        segs.push(Seg::text(String::new(), quoted, !quoted));
                    }
                    ParamValue::Single(Some(s)) => {
                        if quoted {
                            segs.push(Seg::text(pattern::protect(&s), true, false));
                        } else {
                            segs.push(Seg::text(s, false, true));
                        }
                    }
                    ParamValue::Multi(elements) => {
                        if star && quoted {
                            // "$*": one field joined with IFS's first char.
                            let joined = elements.join(&shell.ifs_join());
                            segs.push(Seg::text(pattern::protect(&joined), true, false));
                        } else if star {
                            let joined = elements.join(&shell.ifs_join());
                            segs.push(Seg::text(joined, false, true));
                        } else {
                            // "$@": one field per element.
                            for (i, el) in elements.iter().enumerate() {
                                if i > 0 {
                                    segs.push(Seg::Break);
                                }
                                if quoted {
                                    segs.push(Seg::text(pattern::protect(el), true, false));
                                } else {
                                    segs.push(Seg::text(el.clone(), false, true));
                                }
                            }
                        }
                    }
                }
            }
            WordPart::CommandSubst(text) => {
                let s = command_subst::expand_command_subst(shell, text)?;
                if quoted {
                    segs.push(Seg::text(pattern::protect(&s), true, false));
                } else {
                    segs.push(Seg::text(s, false, true));
                }
            }
            WordPart::Arith(text) => {
                let n = arith::eval_arith(shell, text)?;
                segs.push(Seg::text(n.to_string(), quoted, !quoted));
            }
        }
    }
    Ok(segs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOptions;

    fn shell() -> Shell {
        let mut sh = Shell::new(ShellOptions::default());
        sh.vars.set_scalar("greeting", "hello world", false).unwrap();
        sh.vars
            .set_array("arr", vec!["a".into(), "b c".into(), "".into()])
            .unwrap();
        sh.positional = vec!["p1".into(), "p 2".into()];
        sh
    }

    fn expand_src(sh: &mut Shell, src: &str) -> Vec<String> {
        let out = crate::lexer::tokenize(src).unwrap();
        let word = WordNode {
            parts: out.tokens[0].parts.clone(),
        };
        expand_word(sh, &word).unwrap()
    }

    #[test]
    fn plain_word_is_identity() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "abc"), vec!["abc"]);
    }

    #[test]
    fn unquoted_expansion_splits() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "$greeting"), vec!["hello", "world"]);
    }

    #[test]
    fn quoted_expansion_is_one_field() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "\"$greeting\""), vec!["hello world"]);
    }

    #[test]
    fn quote_removal_identity_for_quoted_literals() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "'a b'"), vec!["a b"]);
        assert_eq!(expand_src(&mut sh, "\"x\"'y'z"), vec!["xyz"]);
    }

    #[test]
    fn empty_quotes_anchor_an_empty_field() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "\"\""), vec![""]);
        assert_eq!(expand_src(&mut sh, "''"), vec![""]);
    }

    #[test]
    fn quoted_glob_chars_stay_literal() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "'*.rs'"), vec!["*.rs"]);
        assert_eq!(expand_src(&mut sh, "\\*"), vec!["*"]);
    }

    #[test]
    fn at_in_quotes_yields_one_field_per_param() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "\"$@\""), vec!["p1", "p 2"]);
        assert_eq!(expand_src(&mut sh, "\"${arr[@]}\""), vec!["a", "b c", ""]);
    }

    #[test]
    fn star_in_quotes_joins_with_ifs_first_char() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "\"$*\""), vec!["p1 p 2"]);
        sh.vars.set_scalar("IFS", ":", false).unwrap();
        assert_eq!(expand_src(&mut sh, "\"$*\""), vec!["p1:p 2"]);
    }

    #[test]
    fn empty_at_contributes_nothing() {
        let mut sh = shell();
        sh.positional.clear();
        assert_eq!(expand_src(&mut sh, "\"$@\""), Vec::<String>::new());
    }

    #[test]
    fn unset_in_quotes_is_empty_field() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "\"$nosuch\""), vec![""]);
        assert_eq!(expand_src(&mut sh, "$nosuch"), Vec::<String>::new());
    }

    #[test]
    fn arithmetic_expansion() {
        let mut sh = shell();
        assert_eq!(expand_src(&mut sh, "$((2 + 3))"), vec!["5"]);
        assert_eq!(expand_src(&mut sh, "x$((1+1))y"), vec!["x2y"]);
    }

    #[test]
    fn brace_then_everything_else() {
        let mut sh = shell();
        assert_eq!(
            expand_src(&mut sh, "{1..3}"),
            vec!["1", "2", "3"]
        );
        sh.vars.set_scalar("n", "9", false).unwrap();
        assert_eq!(
            expand_src(&mut sh, "{a,b}$n"),
            vec!["a9", "b9"]
        );
    }

    #[test]
    fn adjacent_parts_concatenate() {
        let mut sh = shell();
        sh.vars.set_scalar("v", "mid", false).unwrap();
        assert_eq!(expand_src(&mut sh, "pre${v}post"), vec!["premidpost"]);
    }

    #[test]
    fn assignment_value_keeps_spaces_without_quotes() {
        let mut sh = shell();
        let out = crate::lexer::tokenize("$greeting").unwrap();
        let word = WordNode {
            parts: out.tokens[0].parts.clone(),
        };
        // No field splitting in assignment context.
        assert_eq!(
            expand_assignment_value(&mut sh, &word).unwrap(),
            "hello world"
        );
    }
}
