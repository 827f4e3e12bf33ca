//! Lexer
//!
//! A modular, context-sensitive tokenizer. Recognizers are registered with
//! integer priorities and tried greedily at each position, highest priority
//! first. Words are assembled from token-parts by delegating into the quote
//! and dollar sub-parsers, so quoting and expansion structure survive into
//! the tokens. Heredoc bodies are collected from the lines following each
//! logical line and associated with their introducing `<<` tokens by index.

pub mod dollar;
pub mod heredoc;
pub mod keywords;
pub mod quotes;
pub mod recognizers;
pub mod token;

pub use token::{HeredocBody, Keyword, Op, QuoteKind, Token, TokenKind};

use lazy_static::lazy_static;
use thiserror::Error;

use recognizers::{
    CommentRecognizer, OperatorRecognizer, ProcessSubstitutionRecognizer, WhitespaceRecognizer,
    WordRecognizer,
};

/// Error produced when the lexer encounters invalid input.
#[derive(Debug, Clone, Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// True when the only problem is unbalanced quoting or nesting at end
    /// of input; interactive mode solicits further lines instead of
    /// reporting an error.
    pub incomplete: bool,
}

/// What the lexer is in the middle of scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexMode {
    #[default]
    Normal,
    InDoubleQuote,
    InSingleQuote,
    InAnsi,
    InBacktick,
    InBraceExpansion,
    InArith,
    InParamExpansion,
    InHeredoc,
}

impl LexMode {
    fn describe(self) -> &'static str {
        match self {
            LexMode::Normal => "input",
            LexMode::InDoubleQuote => "double-quoted string",
            LexMode::InSingleQuote => "single-quoted string",
            LexMode::InAnsi => "$'...' string",
            LexMode::InBacktick => "backquoted command substitution",
            LexMode::InBraceExpansion => "brace expansion",
            LexMode::InArith => "arithmetic expansion",
            LexMode::InParamExpansion => "parameter expansion",
            LexMode::InHeredoc => "here-document",
        }
    }
}

/// A heredoc redirection seen on the current logical line, waiting for
/// its body.
#[derive(Debug, Clone)]
pub(crate) struct PendingHeredoc {
    pub delimiter: String,
    pub quoted: bool,
    pub strip_tabs: bool,
    /// Index of the introducing `<<` token in the token stream.
    pub token_index: usize,
}

/// Result of tokenizing a source string.
#[derive(Debug, Clone, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub heredocs: Vec<HeredocBody>,
}

/// Outcome of one recognizer attempt.
pub(crate) enum Recognition {
    /// Not this recognizer's business; try the next one.
    None,
    /// Input consumed without producing a token (whitespace, comments).
    Skip,
    /// A token was produced.
    Token(Token),
}

/// A registered recognizer. Higher priority is tried first.
pub(crate) trait Recognize: Send + Sync {
    fn priority(&self) -> u32;
    fn recognize(&self, lx: &mut Lexer) -> Result<Recognition, LexError>;
}

lazy_static! {
    static ref REGISTRY: Vec<Box<dyn Recognize>> = {
        let mut v: Vec<Box<dyn Recognize>> = vec![
            Box::new(OperatorRecognizer),
            Box::new(WhitespaceRecognizer),
            Box::new(CommentRecognizer),
            Box::new(ProcessSubstitutionRecognizer),
            Box::new(WordRecognizer),
        ];
        v.sort_by_key(|r| std::cmp::Reverse(r.priority()));
        v
    };
}

/// The lexer state machine.
pub struct Lexer {
    pub(crate) chars: Vec<char>,
    pub(crate) pos: usize,
    pub(crate) line: usize,
    pub(crate) column: usize,
    pub(crate) mode: LexMode,
    pub(crate) quote_stack: Vec<QuoteKind>,
    pub(crate) bracket_depth: usize,
    pub(crate) paren_depth: usize,
    pub(crate) brace_depth: usize,
    pub(crate) arith_depth: usize,
    /// Whether the next word may be a command name or assignment prefix.
    pub(crate) command_position: bool,
    /// Whether the current position can start a comment.
    pub(crate) at_word_start: bool,
    pub(crate) pending_heredocs: Vec<PendingHeredoc>,
    /// `Some(strip_tabs)` after `<<`/`<<-`, until the delimiter word.
    pub(crate) expect_heredoc_delimiter: Option<bool>,
    /// Token index of the most recent `<<`/`<<-` operator.
    heredoc_token_index: usize,
    pub(crate) posix_strict: bool,
    pub(crate) tokens: Vec<Token>,
    pub(crate) heredocs: Vec<HeredocBody>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            mode: LexMode::Normal,
            quote_stack: Vec::new(),
            bracket_depth: 0,
            paren_depth: 0,
            brace_depth: 0,
            arith_depth: 0,
            command_position: true,
            at_word_start: true,
            pending_heredocs: Vec::new(),
            expect_heredoc_delimiter: None,
            heredoc_token_index: 0,
            posix_strict: false,
            tokens: Vec::new(),
            heredocs: Vec::new(),
        }
    }

    pub fn posix_strict(mut self, strict: bool) -> Self {
        self.posix_strict = strict;
        self
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<LexOutput, LexError> {
        loop {
            // Line continuations disappear before any recognizer sees them.
            while self.peek() == Some('\\') && self.peek_at(1) == Some('\n') {
                self.advance();
                self.advance();
            }

            if self.at_end() {
                if !self.pending_heredocs.is_empty() {
                    let delim = self.pending_heredocs[0].delimiter.clone();
                    return Err(self.incomplete(format!(
                        "here-document delimited by end-of-file (wanted `{delim}')"
                    )));
                }
                let pos = self.pos;
                self.push_token(Token::new(TokenKind::Eof, "", pos, pos));
                break;
            }

            if self.peek() == Some('\n') {
                let start = self.pos;
                self.advance();
                let tok =
                    Token::new(TokenKind::Newline, "\n", start, self.pos).at(self.line, self.column);
                self.push_token(tok);
                self.collect_pending_heredocs()?;
                self.command_position = true;
                self.at_word_start = true;
                continue;
            }

            let mut matched = false;
            for rec in REGISTRY.iter() {
                match rec.recognize(&mut self)? {
                    Recognition::None => continue,
                    Recognition::Skip => {
                        self.at_word_start = true;
                        matched = true;
                        break;
                    }
                    Recognition::Token(tok) => {
                        self.push_token(tok);
                        matched = true;
                        break;
                    }
                }
            }
            if !matched {
                // The word recognizer is a universal fallback, so this is
                // unreachable for any input.
                return Err(self.error("unexpected character"));
            }
        }

        let tokens = keywords::normalize_keywords(std::mem::take(&mut self.tokens));
        Ok(LexOutput {
            tokens,
            heredocs: std::mem::take(&mut self.heredocs),
        })
    }

    fn push_token(&mut self, tok: Token) {
        // Heredoc bookkeeping: a `<<` operator makes the next word the
        // delimiter.
        if let Some(strip_tabs) = self.expect_heredoc_delimiter.take() {
            if tok.is_word_like() {
                let quoted = tok.parts.iter().any(|p| {
                    !matches!(p, crate::ast::types::WordPart::Literal(_))
                });
                self.pending_heredocs.push(PendingHeredoc {
                    delimiter: crate::ast::types::WordNode {
                        parts: tok.parts.clone(),
                    }
                    .flatten_literal(),
                    quoted,
                    strip_tabs,
                    token_index: self.heredoc_token_index,
                });
            }
        }
        if let TokenKind::Op(op @ (Op::DLess | Op::DLessDash)) = tok.kind {
            self.expect_heredoc_delimiter = Some(op == Op::DLessDash);
            self.heredoc_token_index = self.tokens.len();
        }

        self.update_positions(&tok);
        self.tokens.push(tok);
    }

    fn update_positions(&mut self, tok: &Token) {
        match tok.kind {
            TokenKind::Op(op) => {
                // After `)` a command follows too: case-item bodies start
                // right after the pattern's closing paren.
                self.command_position = !op.is_redirection();
                self.at_word_start = true;
            }
            TokenKind::Newline => {
                self.command_position = true;
                self.at_word_start = true;
            }
            TokenKind::AssignmentWord => {
                // Assignment prefixes keep the command position open.
                self.at_word_start = true;
            }
            TokenKind::Word => {
                let lexeme = tok.lexeme.as_str();
                if self.command_position && keywords::is_reserved_word(lexeme) {
                    // Reserved words that introduce a command keep the
                    // position open; `for`, `case`, `select` and `function`
                    // are followed by a name instead.
                    self.command_position =
                        !matches!(lexeme, "for" | "case" | "select" | "function" | "in");
                } else {
                    self.command_position = false;
                }
                self.at_word_start = true;
            }
            TokenKind::IoNumber => {
                self.at_word_start = true;
            }
            _ => {}
        }
    }

    // --- character helpers -------------------------------------------------

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    pub(crate) fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(c) = c {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    pub(crate) fn starts_with(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Raw source text between two character offsets.
    pub(crate) fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
            column: self.column,
            incomplete: false,
        }
    }

    /// An error caused purely by running out of input inside an open
    /// construct.
    pub(crate) fn incomplete(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
            column: self.column,
            incomplete: true,
        }
    }

    pub(crate) fn unexpected_eof(&self) -> LexError {
        self.incomplete(format!("unexpected end of input in {}", self.mode.describe()))
    }

    pub(crate) fn enter_mode(&mut self, mode: LexMode) -> LexMode {
        std::mem::replace(&mut self.mode, mode)
    }

    pub(crate) fn leave_mode(&mut self, prev: LexMode) {
        self.mode = prev;
    }
}

/// Convenience wrapper: tokenize a complete source string.
pub fn tokenize(input: &str) -> Result<LexOutput, LexError> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().tokens.iter().map(|t| t.kind).collect()
    }

    fn words(input: &str) -> Vec<String> {
        tokenize(input)
            .unwrap()
            .tokens
            .iter()
            .filter(|t| t.is_word_like())
            .map(|t| t.lexeme.clone())
            .collect()
    }

    #[test]
    fn simple_command() {
        assert_eq!(
            kinds("echo hello"),
            vec![TokenKind::Word, TokenKind::Word, TokenKind::Eof]
        );
    }

    #[test]
    fn operators_longest_match() {
        assert_eq!(
            kinds("a && b || c;;"),
            vec![
                TokenKind::Word,
                TokenKind::Op(Op::AndIf),
                TokenKind::Word,
                TokenKind::Op(Op::OrIf),
                TokenKind::Word,
                TokenKind::Op(Op::DSemi),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("x>>f 2>&1"),
            vec![
                TokenKind::Word,
                TokenKind::Op(Op::DGreat),
                TokenKind::Word,
                TokenKind::IoNumber,
                TokenKind::Op(Op::GreatAnd),
                TokenKind::Word,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keyword_only_at_command_position() {
        let toks = tokenize("if true; then echo if; fi").unwrap().tokens;
        assert_eq!(toks[0].kind, TokenKind::Keyword(Keyword::If));
        // `if` as an argument to echo stays a word.
        let arg = toks.iter().filter(|t| t.lexeme == "if").nth(1).unwrap();
        assert_eq!(arg.kind, TokenKind::Word);
    }

    #[test]
    fn assignment_word_at_command_position_only() {
        let toks = tokenize("x=1 echo x=2").unwrap().tokens;
        assert_eq!(toks[0].kind, TokenKind::AssignmentWord);
        assert_eq!(toks[2].kind, TokenKind::Word);
        assert_eq!(toks[2].lexeme, "x=2");
    }

    #[test]
    fn comment_skipped_at_word_start_only() {
        assert_eq!(words("echo a #comment"), vec!["echo", "a"]);
        assert_eq!(words("echo a#b"), vec!["echo", "a#b"]);
    }

    #[test]
    fn concatenation_of_token_streams() {
        // tokenize(T1 ++ T2) == tokenize(T1) ++ tokenize(T2) when the
        // split does not cut a token.
        let t1 = "echo one two ";
        let t2 = "| grep o";
        let whole: Vec<_> = tokenize(&format!("{t1}{t2}"))
            .unwrap()
            .tokens
            .iter()
            .map(|t| (t.kind, t.lexeme.clone()))
            .collect();
        let mut left: Vec<_> = tokenize(t1)
            .unwrap()
            .tokens
            .iter()
            .map(|t| (t.kind, t.lexeme.clone()))
            .collect();
        left.pop(); // drop EOF
        let right: Vec<_> = tokenize(t2)
            .unwrap()
            .tokens
            .iter()
            .map(|t| (t.kind, t.lexeme.clone()))
            .collect();
        let joined: Vec<_> = left.into_iter().chain(right).collect();
        assert_eq!(whole, joined);
    }

    #[test]
    fn unterminated_quote_is_incomplete() {
        let err = tokenize("echo 'abc").unwrap_err();
        assert!(err.incomplete);
        let err = tokenize("echo \"abc").unwrap_err();
        assert!(err.incomplete);
    }

    #[test]
    fn heredoc_body_collection() {
        let out = tokenize("cat <<EOF\nhello\nworld\nEOF\n").unwrap();
        assert_eq!(out.heredocs.len(), 1);
        assert_eq!(out.heredocs[0].content, "hello\nworld\n");
        assert!(!out.heredocs[0].quoted);
        let dless = out
            .tokens
            .iter()
            .find(|t| t.is_op(Op::DLess))
            .expect("<< token");
        assert_eq!(dless.heredoc, Some(0));
    }

    #[test]
    fn quoted_heredoc_delimiter_disables_expansion() {
        let out = tokenize("cat <<'EOF'\n$HOME\nEOF\n").unwrap();
        assert!(out.heredocs[0].quoted);
        assert_eq!(out.heredocs[0].content, "$HOME\n");
    }

    #[test]
    fn strip_tabs_heredoc() {
        let out = tokenize("cat <<-EOF\n\t\tindented\n\tEOF\n").unwrap();
        assert_eq!(out.heredocs[0].content, "indented\n");
    }

    #[test]
    fn multiple_heredocs_in_introduction_order() {
        let out = tokenize("cat <<A <<B\none\nA\ntwo\nB\n").unwrap();
        assert_eq!(out.heredocs[0].delimiter, "A");
        assert_eq!(out.heredocs[0].content, "one\n");
        assert_eq!(out.heredocs[1].delimiter, "B");
        assert_eq!(out.heredocs[1].content, "two\n");
    }

    #[test]
    fn line_continuation_joins_words() {
        let toks = tokenize("ec\\\nho hi").unwrap().tokens;
        let flat = crate::ast::types::WordNode {
            parts: toks[0].parts.clone(),
        }
        .flatten_literal();
        assert_eq!(flat, "echo");
        assert_eq!(toks[1].lexeme, "hi");
    }
}
