//! Token types
//!
//! Tokens carry part-structure metadata through to the expansion pipeline:
//! each WORD token records, per substring, whether expansion applies and
//! under what quoting.

use crate::ast::types::WordPart;

/// Token kind after keyword normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    /// `NAME=...` or `NAME[sub]=...` at command position.
    AssignmentWord,
    /// Digits immediately preceding a redirection operator (`2>`).
    IoNumber,
    Keyword(Keyword),
    Op(Op),
    Newline,
    Eof,
}

/// Reserved words, recognized only at command position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    If,
    Then,
    Else,
    Elif,
    Fi,
    While,
    Until,
    Do,
    Done,
    For,
    In,
    Case,
    Esac,
    Function,
    Select,
    LBrace, // {
    RBrace, // }
    Bang,   // !
}

/// Operator tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Semi,      // ;
    Amp,       // &
    Pipe,      // |
    AndIf,     // &&
    OrIf,      // ||
    DSemi,     // ;;
    SemiAnd,   // ;&
    DSemiAnd,  // ;;&
    LParen,    // (
    RParen,    // )
    Less,      // <
    Great,     // >
    DGreat,    // >>
    DLess,     // <<
    DLessDash, // <<-
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    Clobber,   // >|
    TLess,     // <<<
}

impl Op {
    pub fn is_redirection(self) -> bool {
        matches!(
            self,
            Op::Less
                | Op::Great
                | Op::DGreat
                | Op::DLess
                | Op::DLessDash
                | Op::LessAnd
                | Op::GreatAnd
                | Op::LessGreat
                | Op::Clobber
                | Op::TLess
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Semi => ";",
            Op::Amp => "&",
            Op::Pipe => "|",
            Op::AndIf => "&&",
            Op::OrIf => "||",
            Op::DSemi => ";;",
            Op::SemiAnd => ";&",
            Op::DSemiAnd => ";;&",
            Op::LParen => "(",
            Op::RParen => ")",
            Op::Less => "<",
            Op::Great => ">",
            Op::DGreat => ">>",
            Op::DLess => "<<",
            Op::DLessDash => "<<-",
            Op::LessAnd => "<&",
            Op::GreatAnd => ">&",
            Op::LessGreat => "<>",
            Op::Clobber => ">|",
            Op::TLess => "<<<",
        }
    }
}

/// Strongest quoting present in a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteKind {
    #[default]
    None,
    Single,
    Double,
    AnsiC,
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token.
    pub lexeme: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// Strongest quoting found anywhere in the token.
    pub quote: QuoteKind,
    /// Part structure for WORD and ASSIGNMENT_WORD tokens.
    pub parts: Vec<WordPart>,
    /// For `<<`/`<<-` tokens: index into the collected heredoc bodies.
    pub heredoc: Option<usize>,
    /// For assignment words of the form `NAME=(...)`: raw element text.
    pub array: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, start: usize, end: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            start,
            end,
            line: 0,
            column: 0,
            quote: QuoteKind::None,
            parts: Vec::new(),
            heredoc: None,
            array: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn is_op(&self, op: Op) -> bool {
        self.kind == TokenKind::Op(op)
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    /// True for tokens that can begin or continue a word list.
    pub fn is_word_like(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Word | TokenKind::AssignmentWord | TokenKind::IoNumber
        )
    }
}

/// A heredoc body collected after its introducing logical line.
#[derive(Debug, Clone, PartialEq)]
pub struct HeredocBody {
    pub delimiter: String,
    /// Quoted delimiter disables expansion of the body.
    pub quoted: bool,
    /// `<<-` strips leading tabs from body lines and the delimiter line.
    pub strip_tabs: bool,
    /// Raw body text, newline-terminated lines.
    pub content: String,
}
