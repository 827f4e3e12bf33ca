//! Compound commands and function definitions

use crate::ast::types::*;
use crate::lexer::token::{Keyword, Op, TokenKind};
use crate::parser::commands::word_from_token;
use crate::parser::{ParseError, Parser};

impl Parser {
    /// `if list; then list; [elif list; then list;]... [else list;] fi`
    pub(crate) fn parse_if(&mut self) -> Result<IfNode, ParseError> {
        self.expect_keyword(Keyword::If)?;
        let mut clauses = Vec::new();
        let mut else_body = None;
        loop {
            let condition =
                self.parse_list_until(|t| t.is_keyword(Keyword::Then))?;
            self.expect_keyword(Keyword::Then)?;
            let body = self.parse_list_until(|t| {
                t.is_keyword(Keyword::Elif)
                    || t.is_keyword(Keyword::Else)
                    || t.is_keyword(Keyword::Fi)
            })?;
            clauses.push(IfClause { condition, body });
            match self.peek().kind {
                TokenKind::Keyword(Keyword::Elif) => {
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Else) => {
                    self.advance();
                    else_body =
                        Some(self.parse_list_until(|t| t.is_keyword(Keyword::Fi))?);
                    break;
                }
                _ => break,
            }
        }
        self.expect_keyword(Keyword::Fi)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(IfNode {
            clauses,
            else_body,
            redirections,
        })
    }

    pub(crate) fn parse_while(&mut self) -> Result<WhileNode, ParseError> {
        self.expect_keyword(Keyword::While)?;
        let (condition, body) = self.parse_loop_tail()?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(WhileNode {
            condition,
            body,
            redirections,
        })
    }

    pub(crate) fn parse_until(&mut self) -> Result<UntilNode, ParseError> {
        self.expect_keyword(Keyword::Until)?;
        let (condition, body) = self.parse_loop_tail()?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(UntilNode {
            condition,
            body,
            redirections,
        })
    }

    /// `list; do list; done` shared by while/until.
    fn parse_loop_tail(
        &mut self,
    ) -> Result<(Vec<StatementNode>, Vec<StatementNode>), ParseError> {
        let condition = self.parse_list_until(|t| t.is_keyword(Keyword::Do))?;
        self.expect_keyword(Keyword::Do)?;
        let body = self.parse_list_until(|t| t.is_keyword(Keyword::Done))?;
        self.expect_keyword(Keyword::Done)?;
        Ok((condition, body))
    }

    /// `for NAME [in words] <sep> do list; done`
    pub(crate) fn parse_for(&mut self) -> Result<ForNode, ParseError> {
        self.expect_keyword(Keyword::For)?;
        let (variable, words) = self.parse_iteration_head()?;
        let body = self.parse_do_done()?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(ForNode {
            variable,
            words,
            body,
            redirections,
        })
    }

    pub(crate) fn parse_select(&mut self) -> Result<SelectNode, ParseError> {
        self.expect_keyword(Keyword::Select)?;
        let (variable, words) = self.parse_iteration_head()?;
        let body = self.parse_do_done()?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(SelectNode {
            variable,
            words,
            body,
            redirections,
        })
    }

    /// `NAME [in words]` followed by the separator before `do`.
    fn parse_iteration_head(
        &mut self,
    ) -> Result<(String, Option<Vec<WordNode>>), ParseError> {
        let name_tok = self.peek().clone();
        if name_tok.kind != TokenKind::Word {
            return Err(ParseError::new("expected variable name", &name_tok));
        }
        self.advance();
        let variable = name_tok.lexeme;

        self.skip_newlines();
        let words = if self.peek().is_keyword(Keyword::In) {
            self.advance();
            let mut words = Vec::new();
            while self.peek().is_word_like() {
                let tok = self.advance();
                words.push(word_from_token(tok));
            }
            Some(words)
        } else {
            None
        };

        // The word list is ended by `;` or a newline before `do`.
        match self.peek().kind {
            TokenKind::Op(Op::Semi) | TokenKind::Newline => {
                self.advance();
                self.skip_newlines();
            }
            TokenKind::Keyword(Keyword::Do) => {}
            _ => {
                let tok = self.peek().clone();
                return Err(self.unexpected(&tok));
            }
        }
        Ok((variable, words))
    }

    fn parse_do_done(&mut self) -> Result<Vec<StatementNode>, ParseError> {
        self.expect_keyword(Keyword::Do)?;
        let body = self.parse_list_until(|t| t.is_keyword(Keyword::Done))?;
        self.expect_keyword(Keyword::Done)?;
        Ok(body)
    }

    /// `case WORD in [(] pattern [| pattern]... ) list ;; ... esac`
    pub(crate) fn parse_case(&mut self) -> Result<CaseNode, ParseError> {
        self.expect_keyword(Keyword::Case)?;
        let word_tok = self.peek().clone();
        if !word_tok.is_word_like() {
            return Err(ParseError::new("expected word after `case'", &word_tok));
        }
        self.advance();
        let word = word_from_token(word_tok);

        self.skip_newlines();
        self.expect_keyword(Keyword::In)?;
        self.skip_newlines();

        let mut items = Vec::new();
        while !self.peek().is_keyword(Keyword::Esac) {
            if self.at_end() {
                let tok = self.peek().clone();
                return Err(ParseError::new("expected `esac'", &tok));
            }
            if self.peek().is_op(Op::LParen) {
                self.advance();
            }

            let mut patterns = Vec::new();
            loop {
                let tok = self.peek().clone();
                // Keywords are ordinary pattern words here.
                if !tok.is_word_like() && !matches!(tok.kind, TokenKind::Keyword(_)) {
                    return Err(ParseError::new("expected case pattern", &tok));
                }
                self.advance();
                patterns.push(word_from_token(tok));
                if self.peek().is_op(Op::Pipe) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_op(Op::RParen)?;

            let body = self.parse_list_until(|t| {
                matches!(
                    t.kind,
                    TokenKind::Op(Op::DSemi)
                        | TokenKind::Op(Op::SemiAnd)
                        | TokenKind::Op(Op::DSemiAnd)
                ) || t.is_keyword(Keyword::Esac)
            })?;

            let terminator = match self.peek().kind {
                TokenKind::Op(Op::DSemi) => {
                    self.advance();
                    CaseTerminator::Break
                }
                TokenKind::Op(Op::SemiAnd) => {
                    self.advance();
                    CaseTerminator::FallThrough
                }
                TokenKind::Op(Op::DSemiAnd) => {
                    self.advance();
                    CaseTerminator::TestNext
                }
                // The last item may omit `;;`.
                _ => CaseTerminator::Break,
            };
            items.push(CaseItemNode {
                patterns,
                body,
                terminator,
            });
            self.skip_newlines();
        }
        self.expect_keyword(Keyword::Esac)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CaseNode {
            word,
            items,
            redirections,
        })
    }

    /// `( list )`
    pub(crate) fn parse_subshell(&mut self) -> Result<SubshellNode, ParseError> {
        self.expect_op(Op::LParen)?;
        let body = self.parse_list_until(|t| t.is_op(Op::RParen))?;
        self.expect_op(Op::RParen)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(SubshellNode { body, redirections })
    }

    /// `{ list ; }`
    pub(crate) fn parse_group(&mut self) -> Result<GroupNode, ParseError> {
        self.expect_keyword(Keyword::LBrace)?;
        let body = self.parse_list_until(|t| t.is_keyword(Keyword::RBrace))?;
        self.expect_keyword(Keyword::RBrace)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(GroupNode { body, redirections })
    }

    /// POSIX form: `name() compound-command`.
    pub(crate) fn parse_function_posix(&mut self) -> Result<FunctionDefNode, ParseError> {
        let name_tok = self.advance();
        self.expect_op(Op::LParen)?;
        self.expect_op(Op::RParen)?;
        self.skip_newlines();
        self.parse_function_body(name_tok.lexeme)
    }

    /// Extension form: `function name [()] compound-command`.
    pub(crate) fn parse_function_keyword(&mut self) -> Result<FunctionDefNode, ParseError> {
        self.expect_keyword(Keyword::Function)?;
        let name_tok = self.peek().clone();
        if name_tok.kind != TokenKind::Word {
            return Err(ParseError::new("expected function name", &name_tok));
        }
        self.advance();
        if self.peek().is_op(Op::LParen) {
            self.advance();
            self.expect_op(Op::RParen)?;
        }
        self.skip_newlines();
        self.parse_function_body(name_tok.lexeme)
    }

    fn parse_function_body(&mut self, name: String) -> Result<FunctionDefNode, ParseError> {
        let body = self.parse_command()?;
        match body {
            CommandNode::Simple(_) => {
                let tok = self.peek().clone();
                Err(ParseError::new(
                    "function body must be a compound command",
                    &tok,
                ))
            }
            body => Ok(FunctionDefNode {
                name,
                body: Box::new(body),
                redirections: Vec::new(),
            }),
        }
    }

    /// Redirections after a compound command's closing word.
    fn parse_trailing_redirections(&mut self) -> Result<Vec<RedirectionNode>, ParseError> {
        let mut redirections = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::IoNumber => redirections.push(self.parse_redirection()?),
                TokenKind::Op(op) if op.is_redirection() => {
                    redirections.push(self.parse_redirection()?)
                }
                _ => break,
            }
        }
        Ok(redirections)
    }
}
