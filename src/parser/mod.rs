//! Parser
//!
//! Recursive descent over the token stream, producing the tagged-union
//! AST. The lexer has already normalized keywords and collected heredoc
//! bodies; the parser attaches bodies to their redirections by index.

pub mod commands;
pub mod compound;

use thiserror::Error;

use crate::ast::types::*;
use crate::lexer::token::{HeredocBody, Keyword, Op, Token, TokenKind};
use crate::lexer::{LexError, Lexer};

/// Maximum nesting depth for compound commands, to keep pathological
/// input from exhausting the stack.
const MAX_PARSE_DEPTH: usize = 200;

#[derive(Debug, Clone, Error)]
#[error("line {line}: syntax error: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// More input could complete the command (interactive continuation).
    pub incomplete: bool,
}

impl ParseError {
    fn new(message: impl Into<String>, tok: &Token) -> Self {
        ParseError {
            message: message.into(),
            line: tok.line,
            column: tok.column,
            incomplete: tok.kind == TokenKind::Eof,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            message: e.message,
            line: e.line,
            column: e.column,
            incomplete: e.incomplete,
        }
    }
}

/// Parse a complete source string.
pub fn parse(input: &str) -> Result<ScriptNode, ParseError> {
    let output = Lexer::new(input).tokenize()?;
    Parser::new(input, output.tokens, output.heredocs).parse_script()
}

/// Parse in POSIX strict mode.
pub fn parse_posix(input: &str) -> Result<ScriptNode, ParseError> {
    let output = Lexer::new(input).posix_strict(true).tokenize()?;
    Parser::new(input, output.tokens, output.heredocs).parse_script()
}

pub struct Parser {
    source: Vec<char>,
    tokens: Vec<Token>,
    heredocs: Vec<HeredocBody>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(source: &str, tokens: Vec<Token>, heredocs: Vec<HeredocBody>) -> Self {
        Parser {
            source: source.chars().collect(),
            tokens,
            heredocs,
            pos: 0,
            depth: 0,
        }
    }

    pub fn parse_script(mut self) -> Result<ScriptNode, ParseError> {
        let statements = self.parse_list_until(|t| t.kind == TokenKind::Eof)?;
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            return Err(self.unexpected(&tok));
        }
        Ok(ScriptNode { statements })
    }

    // --- token helpers -----------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    pub(crate) fn expect_op(&mut self, op: Op) -> Result<Token, ParseError> {
        let tok = self.peek().clone();
        if tok.is_op(op) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(
                format!("expected `{}', found {}", op.as_str(), describe(&tok)),
                &tok,
            ))
        }
    }

    pub(crate) fn expect_keyword(&mut self, kw: Keyword) -> Result<Token, ParseError> {
        let tok = self.peek().clone();
        if tok.is_keyword(kw) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(
                format!("expected `{}', found {}", keyword_text(kw), describe(&tok)),
                &tok,
            ))
        }
    }

    pub(crate) fn unexpected(&self, tok: &Token) -> ParseError {
        ParseError::new(format!("unexpected token {}", describe(tok)), tok)
    }

    pub(crate) fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            let tok = self.peek().clone();
            return Err(ParseError::new("command nesting too deep", &tok));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn heredoc_body(&self, index: usize) -> &HeredocBody {
        &self.heredocs[index]
    }

    pub(crate) fn source_text(&self, start: usize, end: usize) -> String {
        self.source[start.min(self.source.len())..end.min(self.source.len())]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }

    // --- lists, statements, pipelines -------------------------------------

    /// Parse statements until `is_end` matches (the end token is not
    /// consumed) or end of input.
    pub(crate) fn parse_list_until(
        &mut self,
        is_end: impl Fn(&Token) -> bool,
    ) -> Result<Vec<StatementNode>, ParseError> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_end() && !is_end(self.peek()) {
            statements.push(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(statements)
    }

    /// Parse one and-or list with its optional `;` or `&` terminator.
    pub(crate) fn parse_statement(&mut self) -> Result<StatementNode, ParseError> {
        let start = self.peek().start;
        let mut pipelines = vec![self.parse_pipeline()?];
        let mut operators = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::AndIf) => AndOrOp::And,
                TokenKind::Op(Op::OrIf) => AndOrOp::Or,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            operators.push(op);
            pipelines.push(self.parse_pipeline()?);
        }
        let mut background = false;
        match self.peek().kind {
            TokenKind::Op(Op::Semi) => {
                self.advance();
            }
            TokenKind::Op(Op::Amp) => {
                self.advance();
                background = true;
            }
            _ => {}
        }
        let end = self.peek().start;
        Ok(StatementNode {
            pipelines,
            operators,
            background,
            source_text: self.source_text(start, end),
        })
    }

    /// Parse `[!] command (| command)*`.
    pub(crate) fn parse_pipeline(&mut self) -> Result<PipelineNode, ParseError> {
        let mut negated = false;
        while self.peek().is_keyword(Keyword::Bang) {
            self.advance();
            negated = !negated;
        }
        let mut commands = vec![self.parse_command()?];
        while self.peek().is_op(Op::Pipe) {
            self.advance();
            self.skip_newlines();
            commands.push(self.parse_command()?);
        }
        Ok(PipelineNode { commands, negated })
    }

    /// Dispatch on the current token to the right command parser.
    pub(crate) fn parse_command(&mut self) -> Result<CommandNode, ParseError> {
        self.enter()?;
        let result = match self.peek().kind {
            TokenKind::Keyword(Keyword::If) => self.parse_if().map(CommandNode::If),
            TokenKind::Keyword(Keyword::While) => self.parse_while().map(CommandNode::While),
            TokenKind::Keyword(Keyword::Until) => self.parse_until().map(CommandNode::Until),
            TokenKind::Keyword(Keyword::For) => self.parse_for().map(CommandNode::For),
            TokenKind::Keyword(Keyword::Case) => self.parse_case().map(CommandNode::Case),
            TokenKind::Keyword(Keyword::Select) => self.parse_select().map(CommandNode::Select),
            TokenKind::Keyword(Keyword::LBrace) => self.parse_group().map(CommandNode::Group),
            TokenKind::Keyword(Keyword::Function) => {
                self.parse_function_keyword().map(CommandNode::FunctionDef)
            }
            TokenKind::Op(Op::LParen) => self.parse_subshell().map(CommandNode::Subshell),
            TokenKind::Word
                if self.peek_at(1).is_op(Op::LParen) && self.peek_at(2).is_op(Op::RParen) =>
            {
                self.parse_function_posix().map(CommandNode::FunctionDef)
            }
            _ => self.parse_simple_command().map(CommandNode::Simple),
        };
        self.leave();
        result
    }
}

fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Newline => "newline".to_string(),
        _ => format!("`{}'", tok.lexeme),
    }
}

fn keyword_text(kw: Keyword) -> &'static str {
    match kw {
        Keyword::If => "if",
        Keyword::Then => "then",
        Keyword::Else => "else",
        Keyword::Elif => "elif",
        Keyword::Fi => "fi",
        Keyword::While => "while",
        Keyword::Until => "until",
        Keyword::Do => "do",
        Keyword::Done => "done",
        Keyword::For => "for",
        Keyword::In => "in",
        Keyword::Case => "case",
        Keyword::Esac => "esac",
        Keyword::Function => "function",
        Keyword::Select => "select",
        Keyword::LBrace => "{",
        Keyword::RBrace => "}",
        Keyword::Bang => "!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &str) -> CommandNode {
        let script = parse(input).unwrap();
        assert_eq!(script.statements.len(), 1, "one statement in {input:?}");
        script.statements[0].pipelines[0].commands[0].clone()
    }

    #[test]
    fn simple_command_words() {
        match parse_one("echo a b") {
            CommandNode::Simple(cmd) => {
                assert_eq!(cmd.words.len(), 3);
                assert!(cmd.assignments.is_empty());
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    #[test]
    fn assignments_before_command() {
        match parse_one("x=1 y=2 env") {
            CommandNode::Simple(cmd) => {
                assert_eq!(cmd.assignments.len(), 2);
                assert_eq!(cmd.assignments[0].name, "x");
                assert_eq!(cmd.assignments[1].name, "y");
                assert_eq!(cmd.words.len(), 1);
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    #[test]
    fn and_or_chain() {
        let script = parse("a && b || c").unwrap();
        let stmt = &script.statements[0];
        assert_eq!(stmt.pipelines.len(), 3);
        assert_eq!(stmt.operators, vec![AndOrOp::And, AndOrOp::Or]);
    }

    #[test]
    fn background_statement() {
        let script = parse("sleep 5 &").unwrap();
        assert!(script.statements[0].background);
        assert_eq!(script.statements[0].source_text, "sleep 5");
    }

    #[test]
    fn pipeline_with_negation() {
        let script = parse("! a | b").unwrap();
        let p = &script.statements[0].pipelines[0];
        assert!(p.negated);
        assert_eq!(p.commands.len(), 2);
    }

    #[test]
    fn if_elif_else() {
        match parse_one("if a; then b; elif c; then d; else e; fi") {
            CommandNode::If(node) => {
                assert_eq!(node.clauses.len(), 2);
                assert!(node.else_body.is_some());
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn while_and_for_loops() {
        assert!(matches!(
            parse_one("while a; do b; done"),
            CommandNode::While(_)
        ));
        match parse_one("for i in 1 2 3; do echo $i; done") {
            CommandNode::For(node) => {
                assert_eq!(node.variable, "i");
                assert_eq!(node.words.as_ref().unwrap().len(), 3);
            }
            other => panic!("expected for, got {other:?}"),
        }
    }

    #[test]
    fn for_without_in_iterates_positionals() {
        match parse_one("for arg; do echo \"$arg\"; done") {
            CommandNode::For(node) => assert!(node.words.is_none()),
            other => panic!("expected for, got {other:?}"),
        }
    }

    #[test]
    fn case_items_and_terminators() {
        match parse_one("case $x in a|b) one;; c) two;& d) three;;& esac") {
            CommandNode::Case(node) => {
                assert_eq!(node.items.len(), 3);
                assert_eq!(node.items[0].patterns.len(), 2);
                assert_eq!(node.items[0].terminator, CaseTerminator::Break);
                assert_eq!(node.items[1].terminator, CaseTerminator::FallThrough);
                assert_eq!(node.items[2].terminator, CaseTerminator::TestNext);
            }
            other => panic!("expected case, got {other:?}"),
        }
    }

    #[test]
    fn subshell_and_group() {
        assert!(matches!(parse_one("(a; b)"), CommandNode::Subshell(_)));
        assert!(matches!(parse_one("{ a; b; }"), CommandNode::Group(_)));
    }

    #[test]
    fn function_definitions() {
        match parse_one("greet() { echo hi; }") {
            CommandNode::FunctionDef(f) => {
                assert_eq!(f.name, "greet");
                assert!(matches!(*f.body, CommandNode::Group(_)));
            }
            other => panic!("expected function, got {other:?}"),
        }
        assert!(matches!(
            parse_one("function greet { echo hi; }"),
            CommandNode::FunctionDef(_)
        ));
    }

    #[test]
    fn redirections_on_simple_command() {
        match parse_one("echo hi > out.txt 2>&1") {
            CommandNode::Simple(cmd) => {
                assert_eq!(cmd.redirections.len(), 2);
                assert_eq!(cmd.redirections[0].operator, RedirectOp::Great);
                assert_eq!(cmd.redirections[1].fd, Some(2));
                assert_eq!(cmd.redirections[1].operator, RedirectOp::GreatAnd);
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    #[test]
    fn heredoc_redirection() {
        match parse_one("cat <<EOF\nhello $name\nEOF\n") {
            CommandNode::Simple(cmd) => match &cmd.redirections[0].target {
                RedirectTarget::HereDoc(h) => {
                    assert_eq!(h.delimiter, "EOF");
                    assert!(!h.quoted);
                    // Unquoted delimiter: the body is lexed for expansion.
                    assert!(h
                        .content
                        .parts
                        .iter()
                        .any(|p| matches!(p, WordPart::Parameter(_))));
                }
                other => panic!("expected heredoc target, got {other:?}"),
            },
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_input_is_flagged() {
        assert!(parse("if true; then").unwrap_err().incomplete);
        assert!(parse("echo 'abc").unwrap_err().incomplete);
        assert!(!parse("fi").unwrap_err().incomplete);
    }

    #[test]
    fn array_assignment() {
        match parse_one("a=(one two three)") {
            CommandNode::Simple(cmd) => {
                let a = &cmd.assignments[0];
                assert_eq!(a.name, "a");
                assert_eq!(a.array.as_ref().unwrap().len(), 3);
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    #[test]
    fn subscript_assignment() {
        match parse_one("a[3]=x") {
            CommandNode::Simple(cmd) => {
                let a = &cmd.assignments[0];
                assert_eq!(a.name, "a");
                assert_eq!(a.index.as_deref(), Some("3"));
                assert!(!a.append);
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }

    #[test]
    fn append_assignment() {
        match parse_one("x+=more") {
            CommandNode::Simple(cmd) => {
                assert!(cmd.assignments[0].append);
            }
            other => panic!("expected simple command, got {other:?}"),
        }
    }
}
