//! Parameter and variable expansion
//!
//! Phase three: `$V`, `${V}` and the operator suite — defaults,
//! assignment, error-if-unset, alternatives, length, prefix/suffix
//! removal, replacement, substrings, case modification — over scalars,
//! arrays, positional parameters, and the special parameters.

use crate::ast::types::{CaseModOp, ParamOp, ParameterExpr};
use crate::expand::arith::eval_arith;
use crate::expand::{expand_word_keep_marks, pattern, ExpandError};
use crate::shell::Shell;
use crate::var::{Subscript, Value};

/// The value a parameter reference produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A scalar-like result; `None` when the parameter is unset.
    Single(Option<String>),
    /// One value per element (`$@`, `$*`, `${a[@]}`, `${a[*]}`).
    Multi(Vec<String>),
}

impl ParamValue {
    fn is_unset(&self) -> bool {
        match self {
            ParamValue::Single(v) => v.is_none(),
            ParamValue::Multi(v) => v.is_empty(),
        }
    }

    fn is_null(&self) -> bool {
        match self {
            ParamValue::Single(v) => v.as_deref().map_or(true, str::is_empty),
            ParamValue::Multi(v) => {
                v.is_empty() || (v.len() == 1 && v[0].is_empty())
            }
        }
    }

    fn map_elements(self, f: impl Fn(&str) -> String) -> ParamValue {
        match self {
            ParamValue::Single(v) => ParamValue::Single(v.map(|s| f(&s))),
            ParamValue::Multi(v) => {
                ParamValue::Multi(v.iter().map(|s| f(s)).collect())
            }
        }
    }
}

/// Expand one parameter reference.
pub(crate) fn expand_parameter(
    shell: &mut Shell,
    p: &ParameterExpr,
    _quoted: bool,
) -> Result<ParamValue, ExpandError> {
    let (name, index) = if p.indirect {
        // ${!ref}: the referenced value names the real parameter.
        let target = match base_value(shell, &p.name, p.index.as_deref())? {
            ParamValue::Single(Some(s)) => s,
            _ => String::new(),
        };
        parse_reference(&target)
    } else {
        (p.name.clone(), p.index.clone())
    };

    let base = base_value(shell, &name, index.as_deref())?;

    let value = match &p.op {
        None => base,
        Some(op) => apply_op(shell, &name, index.as_deref(), base, op)?,
    };

    // nounset applies to a bare reference that produced nothing; any
    // operator has already had its say, and `$@`/`$*` with zero
    // parameters stay legal.
    if shell.opts.nounset
        && p.op.is_none()
        && !is_collective(&name, index.as_deref())
        && matches!(value, ParamValue::Single(None))
    {
        return Err(ExpandError::Unbound(name));
    }

    Ok(value)
}

fn is_collective(name: &str, index: Option<&str>) -> bool {
    matches!(name, "@" | "*") || matches!(index, Some("@") | Some("*"))
}

/// Split an indirect reference like `a[2]` into name and subscript.
fn parse_reference(text: &str) -> (String, Option<String>) {
    if let Some(open) = text.find('[') {
        if let Some(stripped) = text.strip_suffix(']') {
            return (
                text[..open].to_string(),
                Some(stripped[open + 1..].to_string()),
            );
        }
    }
    (text.to_string(), None)
}

/// The parameter's value before any operator is applied.
fn base_value(
    shell: &mut Shell,
    name: &str,
    index: Option<&str>,
) -> Result<ParamValue, ExpandError> {
    // Special parameters first.
    if index.is_none() {
        match name {
            "@" | "*" => return Ok(ParamValue::Multi(shell.positional.clone())),
            "#" => {
                return Ok(ParamValue::Single(Some(shell.positional.len().to_string())))
            }
            "?" => return Ok(ParamValue::Single(Some(shell.last_status.to_string()))),
            "$" => return Ok(ParamValue::Single(Some(shell.pid.to_string()))),
            "!" => {
                return Ok(ParamValue::Single(
                    shell.last_bg_pid.map(|pid| pid.to_string()),
                ))
            }
            "-" => return Ok(ParamValue::Single(Some(shell.opts.flag_string()))),
            "0" => return Ok(ParamValue::Single(Some(shell.arg0.clone()))),
            _ => {}
        }
        if name.chars().all(|c| c.is_ascii_digit()) {
            let n: usize = name
                .parse()
                .map_err(|_| ExpandError::BadSubstitution(name.to_string()))?;
            return Ok(ParamValue::Single(if n == 0 {
                Some(shell.arg0.clone())
            } else {
                shell.positional.get(n - 1).cloned()
            }));
        }
    }

    match index {
        None => {
            if let Some(dynamic) = shell.dynamic.get(name) {
                if !shell.vars.is_set(name) {
                    return Ok(ParamValue::Single(Some(dynamic)));
                }
            }
            Ok(ParamValue::Single(
                shell.vars.get_scalar(name).map(str::to_string),
            ))
        }
        Some("@") | Some("*") => {
            let elements = match shell.vars.get(name).and_then(|v| v.value.as_ref()) {
                None => Vec::new(),
                Some(value) => value.elements(),
            };
            Ok(ParamValue::Multi(elements))
        }
        Some(sub) => {
            let value = shell.vars.get(name).and_then(|v| v.value.as_ref()).cloned();
            match value {
                None => Ok(ParamValue::Single(None)),
                Some(Value::Assoc(m)) => {
                    Ok(ParamValue::Single(m.get(sub).cloned()))
                }
                Some(Value::Indexed(v)) => {
                    let i = eval_arith(shell, sub)?;
                    let element = if i < 0 {
                        // Negative subscripts count back from the end.
                        let len = v.len() as i64;
                        let i = len + i;
                        if i < 0 {
                            None
                        } else {
                            v.get(i as usize).and_then(|e| e.clone())
                        }
                    } else {
                        v.get(i as usize).and_then(|e| e.clone())
                    };
                    Ok(ParamValue::Single(element))
                }
                Some(Value::Scalar(s)) => {
                    let i = eval_arith(shell, sub)?;
                    Ok(ParamValue::Single(if i == 0 { Some(s) } else { None }))
                }
            }
        }
    }
}

fn apply_op(
    shell: &mut Shell,
    name: &str,
    index: Option<&str>,
    base: ParamValue,
    op: &ParamOp,
) -> Result<ParamValue, ExpandError> {
    match op {
        ParamOp::Length => {
            let len = match (&base, is_collective(name, index)) {
                (ParamValue::Multi(v), _) => v.len(),
                (ParamValue::Single(v), _) => {
                    v.as_deref().unwrap_or("").chars().count()
                }
            };
            Ok(ParamValue::Single(Some(len.to_string())))
        }

        ParamOp::Default { word, colon } => {
            if triggers(&base, *colon) {
                Ok(ParamValue::Single(Some(expand_word_keep_marks(
                    shell, word,
                )?)))
            } else {
                Ok(base)
            }
        }

        ParamOp::Assign { word, colon } => {
            if triggers(&base, *colon) {
                let value = expand_word_keep_marks(shell, word)?;
                assign_back(shell, name, index, &pattern::strip_marks(&value))?;
                Ok(ParamValue::Single(Some(value)))
            } else {
                Ok(base)
            }
        }

        ParamOp::Error { word, colon } => {
            if triggers(&base, *colon) {
                let message = if word.is_empty() {
                    "parameter null or not set".to_string()
                } else {
                    pattern::strip_marks(&expand_word_keep_marks(shell, word)?)
                };
                Err(ExpandError::ParameterNull {
                    name: name.to_string(),
                    message,
                })
            } else {
                Ok(base)
            }
        }

        ParamOp::Alternative { word, colon } => {
            if triggers(&base, *colon) {
                Ok(ParamValue::Single(None))
            } else {
                Ok(ParamValue::Single(Some(expand_word_keep_marks(
                    shell, word,
                )?)))
            }
        }

        ParamOp::RemovePrefix { pattern: pat, longest } => {
            let pat = expand_word_keep_marks(shell, pat)?;
            Ok(defaulted(base)
                .map_elements(|s| pattern::remove_prefix(s, &pat, *longest)))
        }

        ParamOp::RemoveSuffix { pattern: pat, longest } => {
            let pat = expand_word_keep_marks(shell, pat)?;
            Ok(defaulted(base)
                .map_elements(|s| pattern::remove_suffix(s, &pat, *longest)))
        }

        ParamOp::Replace {
            pattern: pat,
            replacement,
            all,
            anchor,
        } => {
            let pat = expand_word_keep_marks(shell, pat)?;
            let repl = match replacement {
                None => String::new(),
                Some(word) => {
                    pattern::strip_marks(&expand_word_keep_marks(shell, word)?)
                }
            };
            Ok(defaulted(base)
                .map_elements(|s| pattern::replace(s, &pat, &repl, *all, *anchor)))
        }

        ParamOp::Substring { offset, length } => {
            substring(shell, name, index, base, offset, length.as_deref())
        }

        ParamOp::CaseMod { op, pattern: pat } => {
            let pat = match pat {
                None => None,
                Some(word) => Some(expand_word_keep_marks(shell, word)?),
            };
            Ok(defaulted(base).map_elements(|s| case_mod(s, *op, pat.as_deref())))
        }
    }
}

/// Unset/null test for the `:-` family: with the colon a null value also
/// triggers; without it only an unset parameter does.
fn triggers(base: &ParamValue, colon: bool) -> bool {
    if colon {
        base.is_null()
    } else {
        base.is_unset()
    }
}

/// Ops that transform a value treat an unset parameter as empty.
fn defaulted(base: ParamValue) -> ParamValue {
    match base {
        ParamValue::Single(None) => ParamValue::Single(Some(String::new())),
        other => other,
    }
}

/// `${V:=word}` writes back through to the variable store.
fn assign_back(
    shell: &mut Shell,
    name: &str,
    index: Option<&str>,
    value: &str,
) -> Result<(), ExpandError> {
    if is_collective(name, index)
        || name.chars().next().map_or(true, |c| c.is_ascii_digit())
    {
        return Err(ExpandError::BadSubstitution(format!(
            "${{{name}}}: cannot assign in this way"
        )));
    }
    let result = match index {
        None => shell.vars.set_scalar(name, value, false),
        Some(sub) => {
            let i = eval_arith(shell, sub)?;
            shell
                .vars
                .set_element(name, Subscript::Index(i), value, false)
        }
    };
    result.map_err(|e| ExpandError::BadSubstitution(e.to_string()))
}

fn substring(
    shell: &mut Shell,
    name: &str,
    index: Option<&str>,
    base: ParamValue,
    offset: &str,
    length: Option<&str>,
) -> Result<ParamValue, ExpandError> {
    let offset = eval_arith(shell, offset)?;
    let length = match length {
        None => None,
        Some(text) => Some(eval_arith(shell, text)?),
    };

    match base {
        ParamValue::Multi(elements) => {
            // ${@:off:len} slices the parameter list; offset 1 is $1.
            let skip = if matches!(name, "@" | "*") && index.is_none() {
                if offset <= 0 {
                    0
                } else {
                    (offset - 1) as usize
                }
            } else if offset < 0 {
                elements.len().saturating_sub((-offset) as usize)
            } else {
                offset as usize
            };
            let sliced: Vec<String> = match length {
                None => elements.into_iter().skip(skip).collect(),
                Some(len) if len < 0 => {
                    return Err(ExpandError::BadSubstitution(format!(
                        "{len}: substring expression < 0"
                    )))
                }
                Some(len) => elements
                    .into_iter()
                    .skip(skip)
                    .take(len as usize)
                    .collect(),
            };
            Ok(ParamValue::Multi(sliced))
        }
        ParamValue::Single(value) => {
            let value = value.unwrap_or_default();
            let chars: Vec<char> = value.chars().collect();
            let len = chars.len() as i64;
            let start = if offset < 0 {
                (len + offset).max(0)
            } else {
                offset.min(len)
            } as usize;
            let end = match length {
                None => len as usize,
                Some(l) if l < 0 => {
                    let end = len + l;
                    if end < start as i64 {
                        return Err(ExpandError::BadSubstitution(format!(
                            "{l}: substring expression < 0"
                        )));
                    }
                    end as usize
                }
                Some(l) => ((start as i64 + l).min(len)) as usize,
            };
            Ok(ParamValue::Single(Some(
                chars[start..end.max(start)].iter().collect(),
            )))
        }
    }
}

/// `${V^}` / `${V^^}` / `${V,}` / `${V,,}` with an optional single-char
/// pattern restricting which characters convert.
fn case_mod(s: &str, op: CaseModOp, pat: Option<&str>) -> String {
    let matches_char = |c: char| match pat {
        None => true,
        Some(p) => pattern::matches(p, &c.to_string()),
    };
    let (first_only, upper) = match op {
        CaseModOp::UpperFirst => (true, true),
        CaseModOp::UpperAll => (false, true),
        CaseModOp::LowerFirst => (true, false),
        CaseModOp::LowerAll => (false, false),
    };
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        let apply = (!first_only || i == 0) && matches_char(c);
        if apply {
            if upper {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOptions;
    use assert_matches::assert_matches;

    fn shell() -> Shell {
        let mut sh = Shell::new(ShellOptions::default());
        sh.vars.set_scalar("x", "hello", false).unwrap();
        sh.vars
            .set_array("a", vec!["one".into(), "two".into(), "three".into()])
            .unwrap();
        sh.positional = vec!["p1".into(), "p2".into(), "p3".into()];
        sh
    }

    fn single(v: ParamValue) -> String {
        match v {
            ParamValue::Single(Some(s)) => s,
            other => panic!("expected single value, got {other:?}"),
        }
    }

    fn expand(sh: &mut Shell, src: &str) -> ParamValue {
        // Parse `${...}` through the real lexer.
        let out = crate::lexer::tokenize(src).unwrap();
        match &out.tokens[0].parts[0] {
            crate::ast::types::WordPart::Parameter(p) => {
                expand_parameter(sh, p, false).unwrap()
            }
            other => panic!("expected parameter part, got {other:?}"),
        }
    }

    #[test]
    fn plain_and_special() {
        let mut sh = shell();
        assert_eq!(single(expand(&mut sh, "$x")), "hello");
        assert_eq!(single(expand(&mut sh, "$#")), "3");
        assert_eq!(single(expand(&mut sh, "$1")), "p1");
        assert_eq!(
            expand(&mut sh, "$@"),
            ParamValue::Multi(vec!["p1".into(), "p2".into(), "p3".into()])
        );
    }

    #[test]
    fn defaults() {
        let mut sh = shell();
        assert_eq!(single(expand(&mut sh, "${nosuch:-fallback}")), "fallback");
        assert_eq!(single(expand(&mut sh, "${x:-fallback}")), "hello");
        sh.vars.set_scalar("empty", "", false).unwrap();
        assert_eq!(single(expand(&mut sh, "${empty:-fb}")), "fb");
        // Without the colon, a null-but-set value is used as is.
        assert_eq!(single(expand(&mut sh, "${empty-fb}")), "");
    }

    #[test]
    fn assign_default_writes_back() {
        let mut sh = shell();
        assert_eq!(single(expand(&mut sh, "${newvar:=seeded}")), "seeded");
        assert_eq!(sh.vars.get_scalar("newvar"), Some("seeded"));
    }

    #[test]
    fn error_op() {
        let mut sh = shell();
        let out = crate::lexer::tokenize("${nosuch:?custom message}").unwrap();
        match &out.tokens[0].parts[0] {
            crate::ast::types::WordPart::Parameter(p) => {
                assert_matches!(
                    expand_parameter(&mut sh, p, false),
                    Err(ExpandError::ParameterNull { name, message }) => {
                        assert_eq!(name, "nosuch");
                        assert_eq!(message, "custom message");
                    }
                );
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn length() {
        let mut sh = shell();
        assert_eq!(single(expand(&mut sh, "${#x}")), "5");
        assert_eq!(single(expand(&mut sh, "${#a[@]}")), "3");
        assert_eq!(single(expand(&mut sh, "${#nosuch}")), "0");
    }

    #[test]
    fn pattern_ops() {
        let mut sh = shell();
        sh.vars.set_scalar("path", "src/lib/mod.rs", false).unwrap();
        assert_eq!(single(expand(&mut sh, "${path#*/}")), "lib/mod.rs");
        assert_eq!(single(expand(&mut sh, "${path##*/}")), "mod.rs");
        assert_eq!(single(expand(&mut sh, "${path%/*}")), "src/lib");
        assert_eq!(single(expand(&mut sh, "${x/l/L}")), "heLlo");
        assert_eq!(single(expand(&mut sh, "${x//l/L}")), "heLLo");
    }

    #[test]
    fn substrings() {
        let mut sh = shell();
        assert_eq!(single(expand(&mut sh, "${x:1:3}")), "ell");
        assert_eq!(single(expand(&mut sh, "${x:1}")), "ello");
        assert_eq!(single(expand(&mut sh, "${x: -2}")), "lo");
        assert_eq!(single(expand(&mut sh, "${x:0:-1}")), "hell");
    }

    #[test]
    fn array_access() {
        let mut sh = shell();
        assert_eq!(single(expand(&mut sh, "${a[1]}")), "two");
        assert_eq!(
            expand(&mut sh, "${a[@]}"),
            ParamValue::Multi(vec!["one".into(), "two".into(), "three".into()])
        );
        // Arithmetic in subscripts.
        assert_eq!(single(expand(&mut sh, "${a[1+1]}")), "three");
    }

    #[test]
    fn case_modification() {
        let mut sh = shell();
        assert_eq!(single(expand(&mut sh, "${x^}")), "Hello");
        assert_eq!(single(expand(&mut sh, "${x^^}")), "HELLO");
        sh.vars.set_scalar("caps", "ABC", false).unwrap();
        assert_eq!(single(expand(&mut sh, "${caps,,}")), "abc");
        assert_eq!(single(expand(&mut sh, "${x^^[el]}")), "hELLo");
    }

    #[test]
    fn indirection() {
        let mut sh = shell();
        sh.vars.set_scalar("ref", "x", false).unwrap();
        assert_eq!(single(expand(&mut sh, "${!ref}")), "hello");
    }

    #[test]
    fn nounset_errors_on_unset() {
        let mut sh = shell();
        sh.opts.nounset = true;
        let out = crate::lexer::tokenize("$nosuch").unwrap();
        match &out.tokens[0].parts[0] {
            crate::ast::types::WordPart::Parameter(p) => {
                assert_matches!(
                    expand_parameter(&mut sh, p, false),
                    Err(ExpandError::Unbound(_))
                );
            }
            _ => unreachable!(),
        }
        // Defaults rescue it.
        assert_eq!(single(expand(&mut sh, "${nosuch:-ok}")), "ok");
        // $@ stays legal with no positionals.
        sh.positional.clear();
        assert_eq!(expand(&mut sh, "$@"), ParamValue::Multi(vec![]));
    }

    #[test]
    fn positional_slicing() {
        let mut sh = shell();
        assert_eq!(
            expand(&mut sh, "${@:2}"),
            ParamValue::Multi(vec!["p2".into(), "p3".into()])
        );
        assert_eq!(
            expand(&mut sh, "${@:1:2}"),
            ParamValue::Multi(vec!["p1".into(), "p2".into()])
        );
    }
}
