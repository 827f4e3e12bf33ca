//! Dollar sub-parsers
//!
//! Everything introduced by `$`: plain variables, special parameters,
//! `${...}` with its operator suite, `$(...)` command substitution,
//! `$((...))` arithmetic, and `$'...'` quoting. Backquoted command
//! substitution lives here too. Nested constructs are scanned with
//! balanced-delimiter counting that respects quoting.

use crate::ast::types::{
    CaseModOp, ParamOp, ParameterExpr, ReplaceAnchor, WordNode, WordPart,
};
use crate::lexer::{LexError, LexMode, Lexer};

/// Special single-character parameters.
fn is_special_param(c: char) -> bool {
    matches!(c, '@' | '*' | '#' | '?' | '$' | '!' | '-')
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Lexer {
    /// Scan a `$`-introduced part, positioned at the `$`. In double quotes
    /// `$'...'` is not special.
    pub(crate) fn scan_dollar(&mut self, in_double_quotes: bool) -> Result<WordPart, LexError> {
        match self.peek_at(1) {
            // `$'...'` is an extension; strict POSIX mode leaves it alone.
            Some('\'') if !in_double_quotes && !self.posix_strict => {
                return Ok(WordPart::AnsiC(self.scan_ansi_c()?))
            }
            Some('{') => return self.scan_param_expansion(),
            Some('(') => {
                if self.peek_at(2) == Some('(') {
                    // `$((` is arithmetic if the parens balance out to a
                    // final `))`; otherwise it was a subshell inside `$( )`.
                    if let Some(part) = self.try_scan_arith()? {
                        return Ok(part);
                    }
                }
                self.advance(); // $
                let text = self.scan_parens_text()?;
                return Ok(WordPart::CommandSubst(text));
            }
            _ => {}
        }

        self.advance(); // $
        match self.peek() {
            Some(c) if is_special_param(c) => {
                self.advance();
                Ok(WordPart::Parameter(ParameterExpr::plain(c.to_string())))
            }
            Some(c) if c.is_ascii_digit() => {
                // Plain `$N` takes a single digit; `${NN}` is the
                // multi-digit form.
                self.advance();
                Ok(WordPart::Parameter(ParameterExpr::plain(c.to_string())))
            }
            Some(c) if is_name_start(c) => {
                let mut name = String::new();
                while matches!(self.peek(), Some(c) if is_name_char(c)) {
                    name.push(self.advance().unwrap());
                }
                Ok(WordPart::Parameter(ParameterExpr::plain(name)))
            }
            _ => Ok(WordPart::Literal("$".to_string())),
        }
    }

    /// Scan `` `...` ``, positioned at the opening backquote. Inside,
    /// `\$`, `` \` `` and `\\` lose their backslash; everything else is
    /// kept for the nested parse at expansion time.
    pub(crate) fn scan_backquote(&mut self) -> Result<WordPart, LexError> {
        let prev = self.enter_mode(LexMode::InBacktick);
        self.advance(); // `
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(self.unexpected_eof()),
                Some('`') => break,
                Some('\\') => match self.peek() {
                    Some(c @ ('$' | '`' | '\\')) => {
                        text.push(c);
                        self.advance();
                    }
                    _ => text.push('\\'),
                },
                Some(c) => text.push(c),
            }
        }
        self.leave_mode(prev);
        Ok(WordPart::CommandSubst(text))
    }

    /// Scan `$((...))` if the construct really is arithmetic; restores the
    /// position and returns `None` when it turns out to be `$( (...) ...)`.
    fn try_scan_arith(&mut self) -> Result<Option<WordPart>, LexError> {
        let save = (self.pos, self.line, self.column);
        let prev = self.enter_mode(LexMode::InArith);
        self.arith_depth += 1;
        self.advance(); // $
        self.advance(); // (
        self.advance(); // (
        let start = self.pos;
        let mut depth = 2usize;
        loop {
            let c = match self.advance() {
                None => {
                    self.arith_depth -= 1;
                    self.leave_mode(prev);
                    return Err(self.unexpected_eof());
                }
                Some(c) => c,
            };
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                '\'' => {
                    while let Some(c) = self.advance() {
                        if c == '\'' {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
        self.arith_depth -= 1;
        self.leave_mode(prev);
        // Arithmetic must close with an adjacent `))`.
        if self.chars.get(self.pos.wrapping_sub(2)) == Some(&')') {
            Ok(Some(WordPart::Arith(self.slice(start, self.pos - 2))))
        } else {
            self.pos = save.0;
            self.line = save.1;
            self.column = save.2;
            Ok(None)
        }
    }

    /// Scan the raw text of `$(...)`, positioned at the opening paren.
    /// Tracks nested parens, quotes, and backslashes; the text is parsed
    /// as a script at expansion time.
    fn scan_parens_text(&mut self) -> Result<String, LexError> {
        self.advance(); // (
        self.paren_depth += 1;
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            let c = match self.advance() {
                None => {
                    self.paren_depth -= 1;
                    return Err(self.unexpected_eof());
                }
                Some(c) => c,
            };
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                '\\' => {
                    self.advance();
                }
                '\'' => {
                    while let Some(c) = self.advance() {
                        if c == '\'' {
                            break;
                        }
                    }
                }
                '"' => loop {
                    match self.advance() {
                        None => {
                            self.paren_depth -= 1;
                            return Err(self.unexpected_eof());
                        }
                        Some('\\') => {
                            self.advance();
                        }
                        Some('"') => break,
                        Some(_) => {}
                    }
                },
                '`' => {
                    while let Some(c) = self.advance() {
                        if c == '`' {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
        self.paren_depth -= 1;
        Ok(self.slice(start, self.pos - 1))
    }

    /// Scan `${...}`, positioned at the `$`.
    fn scan_param_expansion(&mut self) -> Result<WordPart, LexError> {
        let prev = self.enter_mode(LexMode::InParamExpansion);
        self.brace_depth += 1;
        self.advance(); // $
        self.advance(); // {

        let mut indirect = false;
        let mut length = false;

        if self.peek() == Some('!') && self.peek_at(1) != Some('}') {
            indirect = true;
            self.advance();
        } else if self.peek() == Some('#') {
            // `${#}` is $#; `${#V}` is the length of V.
            if self.peek_at(1) != Some('}') {
                length = true;
                self.advance();
            }
        }

        let name = self.scan_param_name()?;
        let index = if self.peek() == Some('[') {
            Some(self.scan_subscript()?)
        } else {
            None
        };

        let op = if length {
            if self.peek() != Some('}') {
                return Err(self.error("bad substitution: `${#...}` takes no operator"));
            }
            Some(ParamOp::Length)
        } else {
            self.scan_param_op()?
        };

        if self.advance() != Some('}') {
            return Err(self.unexpected_eof());
        }
        self.brace_depth -= 1;
        self.leave_mode(prev);
        Ok(WordPart::Parameter(ParameterExpr {
            name,
            index,
            indirect,
            op,
        }))
    }

    fn scan_param_name(&mut self) -> Result<String, LexError> {
        match self.peek() {
            Some(c) if is_special_param(c) => {
                self.advance();
                Ok(c.to_string())
            }
            Some(c) if c.is_ascii_digit() => {
                let mut name = String::new();
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    name.push(self.advance().unwrap());
                }
                Ok(name)
            }
            Some(c) if is_name_start(c) => {
                let mut name = String::new();
                while matches!(self.peek(), Some(c) if is_name_char(c)) {
                    name.push(self.advance().unwrap());
                }
                Ok(name)
            }
            Some(_) => Err(self.error("bad substitution")),
            None => Err(self.unexpected_eof()),
        }
    }

    /// Raw subscript text between `[` and the matching `]`.
    fn scan_subscript(&mut self) -> Result<String, LexError> {
        self.advance(); // [
        self.bracket_depth += 1;
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.advance() {
                None => {
                    self.bracket_depth -= 1;
                    return Err(self.unexpected_eof());
                }
                Some('[') => depth += 1,
                Some(']') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {}
            }
        }
        self.bracket_depth -= 1;
        Ok(self.slice(start, self.pos - 1))
    }

    fn scan_param_op(&mut self) -> Result<Option<ParamOp>, LexError> {
        let op = match self.peek() {
            Some('}') | None => return Ok(None),
            Some(':') => match self.peek_at(1) {
                Some('-') => {
                    self.advance();
                    self.advance();
                    ParamOp::Default {
                        word: self.scan_operand_word(&['}'])?.0,
                        colon: true,
                    }
                }
                Some('=') => {
                    self.advance();
                    self.advance();
                    ParamOp::Assign {
                        word: self.scan_operand_word(&['}'])?.0,
                        colon: true,
                    }
                }
                Some('?') => {
                    self.advance();
                    self.advance();
                    ParamOp::Error {
                        word: self.scan_operand_word(&['}'])?.0,
                        colon: true,
                    }
                }
                Some('+') => {
                    self.advance();
                    self.advance();
                    ParamOp::Alternative {
                        word: self.scan_operand_word(&['}'])?.0,
                        colon: true,
                    }
                }
                _ => {
                    self.advance();
                    let offset = self.scan_raw_until(&[':', '}'])?;
                    let length = if self.peek() == Some(':') {
                        self.advance();
                        Some(self.scan_raw_until(&['}'])?)
                    } else {
                        None
                    };
                    ParamOp::Substring { offset, length }
                }
            },
            Some('-') => {
                self.advance();
                ParamOp::Default {
                    word: self.scan_operand_word(&['}'])?.0,
                    colon: false,
                }
            }
            Some('=') => {
                self.advance();
                ParamOp::Assign {
                    word: self.scan_operand_word(&['}'])?.0,
                    colon: false,
                }
            }
            Some('?') => {
                self.advance();
                ParamOp::Error {
                    word: self.scan_operand_word(&['}'])?.0,
                    colon: false,
                }
            }
            Some('+') => {
                self.advance();
                ParamOp::Alternative {
                    word: self.scan_operand_word(&['}'])?.0,
                    colon: false,
                }
            }
            Some('#') => {
                self.advance();
                let longest = if self.peek() == Some('#') {
                    self.advance();
                    true
                } else {
                    false
                };
                ParamOp::RemovePrefix {
                    pattern: self.scan_operand_word(&['}'])?.0,
                    longest,
                }
            }
            Some('%') => {
                self.advance();
                let longest = if self.peek() == Some('%') {
                    self.advance();
                    true
                } else {
                    false
                };
                ParamOp::RemoveSuffix {
                    pattern: self.scan_operand_word(&['}'])?.0,
                    longest,
                }
            }
            Some('/') => {
                self.advance();
                let mut all = false;
                let mut anchor = None;
                match self.peek() {
                    Some('/') => {
                        all = true;
                        self.advance();
                    }
                    Some('#') => {
                        anchor = Some(ReplaceAnchor::Prefix);
                        self.advance();
                    }
                    Some('%') => {
                        anchor = Some(ReplaceAnchor::Suffix);
                        self.advance();
                    }
                    _ => {}
                }
                let (pattern, stopped) = self.scan_operand_word(&['/', '}'])?;
                let replacement = if stopped == Some('/') {
                    self.advance();
                    Some(self.scan_operand_word(&['}'])?.0)
                } else {
                    None
                };
                ParamOp::Replace {
                    pattern,
                    replacement,
                    all,
                    anchor,
                }
            }
            Some('^') => {
                self.advance();
                let op = if self.peek() == Some('^') {
                    self.advance();
                    CaseModOp::UpperAll
                } else {
                    CaseModOp::UpperFirst
                };
                let pattern = self.scan_optional_pattern()?;
                ParamOp::CaseMod { op, pattern }
            }
            Some(',') => {
                self.advance();
                let op = if self.peek() == Some(',') {
                    self.advance();
                    CaseModOp::LowerAll
                } else {
                    CaseModOp::LowerFirst
                };
                let pattern = self.scan_optional_pattern()?;
                ParamOp::CaseMod { op, pattern }
            }
            Some(_) => return Err(self.error("bad substitution")),
        };
        Ok(Some(op))
    }

    fn scan_optional_pattern(&mut self) -> Result<Option<WordNode>, LexError> {
        if self.peek() == Some('}') {
            Ok(None)
        } else {
            Ok(Some(self.scan_operand_word(&['}'])?.0))
        }
    }

    /// Scan an operand word inside `${...}` until one of `stops` at
    /// brace-depth zero. Returns the word and the stop character seen.
    /// The stop character is not consumed.
    fn scan_operand_word(
        &mut self,
        stops: &[char],
    ) -> Result<(WordNode, Option<char>), LexError> {
        let mut parts: Vec<WordPart> = Vec::new();
        let mut lit = String::new();
        let mut depth = 0usize;
        let stopped;
        loop {
            let c = match self.peek() {
                None => return Err(self.unexpected_eof()),
                Some(c) => c,
            };
            if depth == 0 && stops.contains(&c) {
                stopped = Some(c);
                break;
            }
            match c {
                '\'' => {
                    flush(&mut lit, &mut parts);
                    parts.push(WordPart::SingleQuoted(self.scan_single_quoted()?));
                }
                '"' => {
                    flush(&mut lit, &mut parts);
                    parts.push(WordPart::DoubleQuoted(self.scan_double_quoted()?));
                }
                '$' => {
                    flush(&mut lit, &mut parts);
                    let part = self.scan_dollar(false)?;
                    parts.push(part);
                }
                '`' => {
                    flush(&mut lit, &mut parts);
                    parts.push(self.scan_backquote()?);
                }
                '\\' => {
                    self.advance();
                    match self.peek() {
                        None => return Err(self.unexpected_eof()),
                        Some('\n') => {
                            self.advance();
                        }
                        Some(esc) => {
                            flush(&mut lit, &mut parts);
                            parts.push(WordPart::Escaped(esc));
                            self.advance();
                        }
                    }
                }
                '{' => {
                    depth += 1;
                    lit.push(c);
                    self.advance();
                }
                '}' => {
                    depth -= 1;
                    lit.push(c);
                    self.advance();
                }
                _ => {
                    lit.push(c);
                    self.advance();
                }
            }
        }
        flush(&mut lit, &mut parts);
        Ok((WordNode { parts }, stopped))
    }

    /// Raw text until one of `stops` at nesting-depth zero; nested
    /// `${...}`, `$(...)` and parens are skipped over whole.
    fn scan_raw_until(&mut self, stops: &[char]) -> Result<String, LexError> {
        let start = self.pos;
        let mut paren = 0usize;
        let mut brace = 0usize;
        loop {
            let c = match self.peek() {
                None => return Err(self.unexpected_eof()),
                Some(c) => c,
            };
            if paren == 0 && brace == 0 && stops.contains(&c) {
                return Ok(self.slice(start, self.pos));
            }
            match c {
                '(' => paren += 1,
                ')' if paren > 0 => paren -= 1,
                '{' => brace += 1,
                '}' if brace > 0 => brace -= 1,
                _ => {}
            }
            self.advance();
        }
    }
}

fn flush(lit: &mut String, parts: &mut Vec<WordPart>) {
    if !lit.is_empty() {
        parts.push(WordPart::Literal(std::mem::take(lit)));
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::types::{ParamOp, ParameterExpr, WordNode, WordPart};
    use crate::lexer::tokenize;

    fn first_part(input: &str) -> WordPart {
        tokenize(input).unwrap().tokens[0].parts[0].clone()
    }

    fn param(input: &str) -> ParameterExpr {
        match first_part(input) {
            WordPart::Parameter(p) => p,
            other => panic!("expected parameter, got {other:?}"),
        }
    }

    #[test]
    fn plain_variable() {
        assert_eq!(param("$foo"), ParameterExpr::plain("foo"));
        assert_eq!(param("$?"), ParameterExpr::plain("?"));
        assert_eq!(param("$1"), ParameterExpr::plain("1"));
    }

    #[test]
    fn braced_with_default() {
        let p = param("${foo:-bar baz}");
        assert_eq!(p.name, "foo");
        match p.op {
            Some(ParamOp::Default { word, colon }) => {
                assert!(colon);
                assert_eq!(word, WordNode::literal("bar baz"));
            }
            other => panic!("expected default op, got {other:?}"),
        }
    }

    #[test]
    fn length_and_count() {
        let p = param("${#foo}");
        assert_eq!(p.name, "foo");
        assert_eq!(p.op, Some(ParamOp::Length));
        // ${#} is the positional count.
        let p = param("${#}");
        assert_eq!(p.name, "#");
        assert_eq!(p.op, None);
    }

    #[test]
    fn pattern_replacement() {
        let p = param("${x/l/L}");
        match p.op {
            Some(ParamOp::Replace {
                pattern,
                replacement,
                all,
                anchor,
            }) => {
                assert_eq!(pattern, WordNode::literal("l"));
                assert_eq!(replacement, Some(WordNode::literal("L")));
                assert!(!all);
                assert!(anchor.is_none());
            }
            other => panic!("expected replace op, got {other:?}"),
        }
    }

    #[test]
    fn substring_with_nested_arith() {
        let p = param("${x:1:2}");
        assert_eq!(
            p.op,
            Some(ParamOp::Substring {
                offset: "1".into(),
                length: Some("2".into()),
            })
        );
    }

    #[test]
    fn nested_expansion_in_default() {
        let p = param("${a:-${b:-c}}");
        match p.op {
            Some(ParamOp::Default { word, .. }) => {
                assert!(matches!(word.parts[0], WordPart::Parameter(_)));
            }
            other => panic!("expected default op, got {other:?}"),
        }
    }

    #[test]
    fn array_subscripts() {
        let p = param("${a[2]}");
        assert_eq!(p.index.as_deref(), Some("2"));
        let p = param("${a[@]}");
        assert_eq!(p.index.as_deref(), Some("@"));
    }

    #[test]
    fn command_substitution_text() {
        assert_eq!(
            first_part("$(echo hi)"),
            WordPart::CommandSubst("echo hi".into())
        );
        // Nested parens.
        assert_eq!(
            first_part("$(echo (x))"),
            WordPart::CommandSubst("echo (x)".into())
        );
    }

    #[test]
    fn backquote_unescaping() {
        assert_eq!(
            first_part(r"`echo \`date\``"),
            // Inner backquote escapes lose their backslash.
            WordPart::CommandSubst("echo `date`".into())
        );
    }

    #[test]
    fn arithmetic_expansion() {
        assert_eq!(first_part("$((1 + 2))"), WordPart::Arith("1 + 2".into()));
        assert_eq!(
            first_part("$(( (1+2) * 3 ))"),
            WordPart::Arith(" (1+2) * 3 ".into())
        );
    }

    #[test]
    fn dollar_dparen_subshell_fallback() {
        // `$((echo x); echo y)` is a command substitution, not arithmetic.
        assert_eq!(
            first_part("$((echo x); echo y)"),
            WordPart::CommandSubst("(echo x); echo y".into())
        );
    }

    #[test]
    fn lone_dollar_is_literal() {
        let toks = tokenize("echo $").unwrap().tokens;
        assert_eq!(toks[1].parts, vec![WordPart::Literal("$".into())]);
    }
}
