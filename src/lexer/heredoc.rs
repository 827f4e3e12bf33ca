//! Heredoc collection
//!
//! After a logical line ends, the input stream supplies subsequent lines
//! until a line matches the recorded delimiter. Bodies are attached to
//! their introducing `<<` tokens in the order the heredocs appeared.

use crate::ast::types::WordPart;
use crate::lexer::token::HeredocBody;
use crate::lexer::{LexError, LexMode, Lexer};

impl Lexer {
    /// Pull the bodies for every heredoc recorded on the line that just
    /// ended. Called by the driver after emitting a newline token.
    pub(crate) fn collect_pending_heredocs(&mut self) -> Result<(), LexError> {
        let pending = std::mem::take(&mut self.pending_heredocs);
        for ph in pending {
            let prev = self.enter_mode(LexMode::InHeredoc);
            let mut content = String::new();
            let mut found = false;
            while !self.at_end() {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                let line_text = self.slice(start, self.pos);
                let had_newline = if self.peek() == Some('\n') {
                    self.advance();
                    true
                } else {
                    false
                };

                let candidate = if ph.strip_tabs {
                    line_text.trim_start_matches('\t')
                } else {
                    line_text.as_str()
                };
                if candidate == ph.delimiter {
                    found = true;
                    break;
                }
                content.push_str(candidate);
                if had_newline {
                    content.push('\n');
                }
            }
            self.leave_mode(prev);
            if !found {
                return Err(self.incomplete(format!(
                    "here-document delimited by end-of-file (wanted `{}')",
                    ph.delimiter
                )));
            }
            let index = self.heredocs.len();
            self.heredocs.push(HeredocBody {
                delimiter: ph.delimiter,
                quoted: ph.quoted,
                strip_tabs: ph.strip_tabs,
                content,
            });
            self.tokens[ph.token_index].heredoc = Some(index);
        }
        Ok(())
    }
}

/// Lex an unquoted heredoc body into word parts. The body behaves like a
/// double-quoted string: `$`, backtick, and backslash (before `$`,
/// backtick, `\` and newline) are special; quotes are not.
pub fn lex_heredoc_body(body: &str) -> Result<Vec<WordPart>, LexError> {
    let mut lx = Lexer::new(body);
    lx.mode = LexMode::InHeredoc;
    let mut parts: Vec<WordPart> = Vec::new();
    let mut lit = String::new();
    loop {
        let c = match lx.peek() {
            None => break,
            Some(c) => c,
        };
        match c {
            '$' => {
                if !lit.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut lit)));
                }
                parts.push(lx.scan_dollar(true)?);
            }
            '`' => {
                if !lit.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut lit)));
                }
                parts.push(lx.scan_backquote()?);
            }
            '\\' => {
                lx.advance();
                match lx.peek() {
                    None => {
                        lit.push('\\');
                        break;
                    }
                    Some('\n') => {
                        lx.advance();
                    }
                    Some(esc @ ('$' | '`' | '\\')) => {
                        lit.push(esc);
                        lx.advance();
                    }
                    Some(_) => lit.push('\\'),
                }
            }
            _ => {
                lit.push(c);
                lx.advance();
            }
        }
    }
    if !lit.is_empty() {
        parts.push(WordPart::Literal(lit));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_expansions_are_lexed() {
        let parts = lex_heredoc_body("user: $USER\n").unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], WordPart::Literal("user: ".into()));
        assert!(matches!(parts[1], WordPart::Parameter(_)));
        assert_eq!(parts[2], WordPart::Literal("\n".into()));
    }

    #[test]
    fn quotes_are_not_special_in_bodies() {
        let parts = lex_heredoc_body("say 'hello'\n").unwrap();
        assert_eq!(parts, vec![WordPart::Literal("say 'hello'\n".into())]);
    }

    #[test]
    fn backslash_dollar_stays_literal() {
        let parts = lex_heredoc_body("cost: \\$5\n").unwrap();
        assert_eq!(parts, vec![WordPart::Literal("cost: $5\n".into())]);
    }
}
