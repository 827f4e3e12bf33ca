//! Simple commands, assignments, and redirections

use crate::ast::types::*;
use crate::lexer::heredoc::lex_heredoc_body;
use crate::lexer::token::{Op, Token, TokenKind};
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};

impl Parser {
    /// Parse a simple command: assignment prefix, words, redirections in
    /// any order after the first word.
    pub(crate) fn parse_simple_command(&mut self) -> Result<SimpleCommandNode, ParseError> {
        let mut node = SimpleCommandNode::default();
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::AssignmentWord if node.words.is_empty() => {
                    self.advance();
                    node.assignments.push(self.parse_assignment(tok)?);
                }
                TokenKind::Word | TokenKind::AssignmentWord => {
                    self.advance();
                    node.words.push(word_from_token(tok));
                }
                TokenKind::IoNumber => {
                    let redir = self.parse_redirection()?;
                    node.redirections.push(redir);
                }
                TokenKind::Op(op) if op.is_redirection() => {
                    let redir = self.parse_redirection()?;
                    node.redirections.push(redir);
                }
                _ => break,
            }
        }
        if node.assignments.is_empty() && node.words.is_empty() && node.redirections.is_empty() {
            return Err(self.unexpected(&self.peek().clone()));
        }
        Ok(node)
    }

    /// Split an ASSIGNMENT_WORD token into name, subscript, append flag,
    /// and value. The `=` is found in the token's leading literal part;
    /// `=` inside `[...]` is not an assignment delimiter.
    pub(crate) fn parse_assignment(&mut self, tok: Token) -> Result<AssignmentNode, ParseError> {
        let prefix = match tok.parts.first() {
            Some(WordPart::Literal(s)) => s.clone(),
            _ => return Err(self.unexpected(&tok)),
        };
        let eq = find_assignment_eq(&prefix)
            .ok_or_else(|| self.unexpected(&tok))?;
        let append = eq > 0 && prefix.as_bytes()[eq - 1] == b'+';
        let lhs_end = if append { eq - 1 } else { eq };
        let lhs = &prefix[..lhs_end];
        let (name, index) = match lhs.find('[') {
            Some(open) => {
                let close = lhs.rfind(']').unwrap_or(lhs.len());
                (
                    lhs[..open].to_string(),
                    Some(lhs[open + 1..close].to_string()),
                )
            }
            None => (lhs.to_string(), None),
        };

        if let Some(raw) = &tok.array {
            let elements = self.parse_array_elements(raw, &tok)?;
            return Ok(AssignmentNode {
                name,
                index,
                value: None,
                append,
                array: Some(elements),
            });
        }

        // The value is whatever follows the `=` in the first literal part
        // plus all remaining parts.
        let mut parts = Vec::new();
        let rest = &prefix[eq + 1..];
        if !rest.is_empty() {
            parts.push(WordPart::Literal(rest.to_string()));
        }
        parts.extend(tok.parts.into_iter().skip(1));
        let value = if parts.is_empty() {
            None
        } else {
            Some(WordNode { parts })
        };
        Ok(AssignmentNode {
            name,
            index,
            value,
            append,
            array: None,
        })
    }

    /// Re-lex the raw element text of `NAME=(...)` into words.
    fn parse_array_elements(
        &mut self,
        raw: &str,
        at: &Token,
    ) -> Result<Vec<WordNode>, ParseError> {
        let output = Lexer::new(raw).tokenize().map_err(|e| ParseError {
            message: e.message,
            line: at.line,
            column: at.column,
            incomplete: false,
        })?;
        let mut elements = Vec::new();
        for tok in output.tokens {
            match tok.kind {
                TokenKind::Word | TokenKind::AssignmentWord => {
                    elements.push(word_from_token(tok))
                }
                TokenKind::Newline | TokenKind::Eof => {}
                _ => {
                    return Err(ParseError {
                        message: format!("invalid token in array literal: `{}'", tok.lexeme),
                        line: at.line,
                        column: at.column,
                        incomplete: false,
                    })
                }
            }
        }
        Ok(elements)
    }

    /// Parse one redirection: `[n]op target`.
    pub(crate) fn parse_redirection(&mut self) -> Result<RedirectionNode, ParseError> {
        let fd = if self.peek().kind == TokenKind::IoNumber {
            let tok = self.advance();
            Some(tok.lexeme.parse::<i32>().map_err(|_| ParseError {
                message: format!("file descriptor out of range: {}", tok.lexeme),
                line: tok.line,
                column: tok.column,
                incomplete: false,
            })?)
        } else {
            None
        };

        let op_tok = self.advance();
        let op = match op_tok.kind {
            TokenKind::Op(Op::Less) => RedirectOp::Less,
            TokenKind::Op(Op::Great) => RedirectOp::Great,
            TokenKind::Op(Op::DGreat) => RedirectOp::DGreat,
            TokenKind::Op(Op::LessAnd) => RedirectOp::LessAnd,
            TokenKind::Op(Op::GreatAnd) => RedirectOp::GreatAnd,
            TokenKind::Op(Op::LessGreat) => RedirectOp::LessGreat,
            TokenKind::Op(Op::Clobber) => RedirectOp::Clobber,
            TokenKind::Op(Op::TLess) => RedirectOp::TLess,
            TokenKind::Op(Op::DLess) => RedirectOp::DLess,
            TokenKind::Op(Op::DLessDash) => RedirectOp::DLessDash,
            _ => return Err(self.unexpected(&op_tok)),
        };

        if matches!(op, RedirectOp::DLess | RedirectOp::DLessDash) {
            // The delimiter word follows, but the body was collected by
            // the lexer and is referenced from the operator token.
            let delim_tok = self.peek().clone();
            if !delim_tok.is_word_like() {
                return Err(ParseError::new(
                    "expected here-document delimiter",
                    &delim_tok,
                ));
            }
            self.advance();
            let index = op_tok.heredoc.ok_or_else(|| ParseError {
                message: "here-document has no body".into(),
                line: op_tok.line,
                column: op_tok.column,
                incomplete: true,
            })?;
            let body = self.heredoc_body(index).clone();
            let content = if body.quoted {
                WordNode::literal(body.content.clone())
            } else {
                WordNode {
                    parts: lex_heredoc_body(&body.content).map_err(|e| ParseError {
                        message: e.message,
                        line: op_tok.line,
                        column: op_tok.column,
                        incomplete: e.incomplete,
                    })?,
                }
            };
            return Ok(RedirectionNode {
                fd,
                operator: op,
                target: RedirectTarget::HereDoc(HereDocNode {
                    delimiter: body.delimiter,
                    content,
                    quoted: body.quoted,
                    strip_tabs: body.strip_tabs,
                }),
            });
        }

        let target_tok = self.peek().clone();
        if !target_tok.is_word_like() {
            return Err(ParseError::new(
                format!("expected redirection target after `{op}'"),
                &target_tok,
            ));
        }
        self.advance();
        Ok(RedirectionNode {
            fd,
            operator: op,
            target: RedirectTarget::Word(word_from_token(target_tok)),
        })
    }
}

/// Build a word from any word-like (or keyword) token. Keyword tokens
/// keep their original parts, so `case $x in if) ...` still works.
pub(crate) fn word_from_token(tok: Token) -> WordNode {
    if tok.parts.is_empty() {
        WordNode::literal(tok.lexeme)
    } else {
        WordNode { parts: tok.parts }
    }
}

/// Index of the assignment `=` in a literal prefix, skipping `=` and `]`
/// inside a subscript.
pub(crate) fn find_assignment_eq(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::find_assignment_eq;

    #[test]
    fn eq_outside_subscript() {
        assert_eq!(find_assignment_eq("x=1"), Some(1));
        assert_eq!(find_assignment_eq("a[i=1]=2"), Some(6));
        assert_eq!(find_assignment_eq("novalue"), None);
    }
}
