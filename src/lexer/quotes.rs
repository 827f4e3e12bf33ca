//! Quote sub-parsers
//!
//! Single quotes are verbatim until the closing quote. Double quotes
//! recognize `$`, backtick, and backslash (which escapes only `"` `\`
//! `$` backtick and newline), emitting nested token-parts. ANSI-C
//! quoting (`$'...'`) decodes escape sequences up front.

use crate::ast::types::WordPart;
use crate::lexer::{LexError, LexMode, Lexer};

impl Lexer {
    /// Scan `'...'`, positioned at the opening quote. Returns the literal
    /// content.
    pub(crate) fn scan_single_quoted(&mut self) -> Result<String, LexError> {
        let prev = self.enter_mode(LexMode::InSingleQuote);
        self.quote_stack.push(crate::lexer::QuoteKind::Single);
        self.advance(); // opening '
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(self.unexpected_eof()),
                Some('\'') => break,
                Some(c) => value.push(c),
            }
        }
        self.quote_stack.pop();
        self.leave_mode(prev);
        Ok(value)
    }

    /// Scan `"..."`, positioned at the opening quote. Returns the nested
    /// parts.
    pub(crate) fn scan_double_quoted(&mut self) -> Result<Vec<WordPart>, LexError> {
        let prev = self.enter_mode(LexMode::InDoubleQuote);
        self.quote_stack.push(crate::lexer::QuoteKind::Double);
        self.advance(); // opening "
        let mut parts: Vec<WordPart> = Vec::new();
        let mut lit = String::new();
        loop {
            let c = match self.peek() {
                None => return Err(self.unexpected_eof()),
                Some(c) => c,
            };
            match c {
                '"' => {
                    self.advance();
                    break;
                }
                '$' => {
                    if !lit.is_empty() {
                        parts.push(WordPart::Literal(std::mem::take(&mut lit)));
                    }
                    parts.push(self.scan_dollar(true)?);
                }
                '`' => {
                    if !lit.is_empty() {
                        parts.push(WordPart::Literal(std::mem::take(&mut lit)));
                    }
                    parts.push(self.scan_backquote()?);
                }
                '\\' => {
                    self.advance();
                    match self.peek() {
                        None => return Err(self.unexpected_eof()),
                        Some('\n') => {
                            // Line continuation inside double quotes.
                            self.advance();
                        }
                        Some(esc @ ('"' | '\\' | '$' | '`')) => {
                            lit.push(esc);
                            self.advance();
                        }
                        Some(_) => {
                            // Backslash stays literal before other characters.
                            lit.push('\\');
                        }
                    }
                }
                _ => {
                    lit.push(c);
                    self.advance();
                }
            }
        }
        if !lit.is_empty() {
            parts.push(WordPart::Literal(lit));
        }
        self.quote_stack.pop();
        self.leave_mode(prev);
        Ok(parts)
    }

    /// Scan `$'...'`, positioned at the `$`. Returns the decoded content.
    pub(crate) fn scan_ansi_c(&mut self) -> Result<String, LexError> {
        let prev = self.enter_mode(LexMode::InAnsi);
        self.quote_stack.push(crate::lexer::QuoteKind::AnsiC);
        self.advance(); // $
        self.advance(); // '
        let mut value = String::new();
        loop {
            let c = match self.advance() {
                None => return Err(self.unexpected_eof()),
                Some(c) => c,
            };
            match c {
                '\'' => break,
                '\\' => {
                    let esc = match self.advance() {
                        None => return Err(self.unexpected_eof()),
                        Some(e) => e,
                    };
                    match esc {
                        'a' => value.push('\x07'),
                        'b' => value.push('\x08'),
                        'e' | 'E' => value.push('\x1b'),
                        'f' => value.push('\x0c'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'v' => value.push('\x0b'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        '?' => value.push('?'),
                        'x' => {
                            let code = self.scan_radix_digits(16, 2);
                            match code {
                                Some(n) => value.push(n as u8 as char),
                                None => {
                                    value.push('\\');
                                    value.push('x');
                                }
                            }
                        }
                        '0'..='7' => {
                            // Up to three octal digits, including the one
                            // just consumed.
                            let mut n = esc.to_digit(8).unwrap();
                            for _ in 0..2 {
                                match self.peek().and_then(|c| c.to_digit(8)) {
                                    Some(d) => {
                                        n = n * 8 + d;
                                        self.advance();
                                    }
                                    None => break,
                                }
                            }
                            value.push((n & 0xff) as u8 as char);
                        }
                        'u' => match self.scan_radix_digits(16, 4) {
                            Some(n) => match char::from_u32(n) {
                                Some(c) => value.push(c),
                                None => return Err(self.error("invalid unicode escape")),
                            },
                            None => {
                                value.push('\\');
                                value.push('u');
                            }
                        },
                        'U' => match self.scan_radix_digits(16, 8) {
                            Some(n) => match char::from_u32(n) {
                                Some(c) => value.push(c),
                                None => return Err(self.error("invalid unicode escape")),
                            },
                            None => {
                                value.push('\\');
                                value.push('U');
                            }
                        },
                        other => {
                            // Unknown escapes keep the backslash.
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                _ => value.push(c),
            }
        }
        self.quote_stack.pop();
        self.leave_mode(prev);
        Ok(value)
    }

    /// Consume up to `max` digits in `radix`; `None` if there are none.
    fn scan_radix_digits(&mut self, radix: u32, max: usize) -> Option<u32> {
        let mut n: u32 = 0;
        let mut count = 0;
        while count < max {
            match self.peek().and_then(|c| c.to_digit(radix)) {
                Some(d) => {
                    n = n.wrapping_mul(radix).wrapping_add(d);
                    self.advance();
                    count += 1;
                }
                None => break,
            }
        }
        if count == 0 {
            None
        } else {
            Some(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::types::WordPart;
    use crate::lexer::tokenize;

    fn first_parts(input: &str) -> Vec<WordPart> {
        tokenize(input).unwrap().tokens[0].parts.clone()
    }

    #[test]
    fn single_quotes_are_verbatim() {
        let parts = first_parts("'a $b `c`'");
        assert_eq!(parts, vec![WordPart::SingleQuoted("a $b `c`".into())]);
    }

    #[test]
    fn double_quotes_keep_expansions() {
        let parts = first_parts("\"a $b\"");
        match &parts[0] {
            WordPart::DoubleQuoted(inner) => {
                assert_eq!(inner.len(), 2);
                assert_eq!(inner[0], WordPart::Literal("a ".into()));
                assert!(matches!(inner[1], WordPart::Parameter(_)));
            }
            other => panic!("expected double-quoted part, got {other:?}"),
        }
    }

    #[test]
    fn double_quote_backslash_rules() {
        // \$ is an escape; \x keeps the backslash.
        let parts = first_parts(r#""\$a \x""#);
        match &parts[0] {
            WordPart::DoubleQuoted(inner) => {
                assert_eq!(inner, &vec![WordPart::Literal("$a \\x".into())]);
            }
            other => panic!("expected double-quoted part, got {other:?}"),
        }
    }

    #[test]
    fn ansi_c_escapes() {
        let parts = first_parts(r"$'a\tb\n\x41\101'");
        assert_eq!(parts, vec![WordPart::AnsiC("a\tb\nAA".into())]);
    }
}
