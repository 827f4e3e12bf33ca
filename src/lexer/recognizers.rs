//! Token recognizers
//!
//! Each recognizer is tried at the current position in priority order.
//! The operator recognizer matches longest-first from length-indexed
//! tables; the word recognizer is the universal fallback that assembles
//! token-parts, delegating into the quote and dollar sub-parsers.

use crate::ast::types::WordPart;
use crate::lexer::token::{Op, QuoteKind, Token, TokenKind};
use crate::lexer::{LexError, Lexer, Recognition, Recognize};

/// Multi-character operators, longest first.
const THREE_CHAR_OPS: &[(&str, Op)] = &[
    (";;&", Op::DSemiAnd),
    ("<<-", Op::DLessDash),
    ("<<<", Op::TLess),
];

const TWO_CHAR_OPS: &[(&str, Op)] = &[
    ("&&", Op::AndIf),
    ("||", Op::OrIf),
    (";;", Op::DSemi),
    (";&", Op::SemiAnd),
    ("<<", Op::DLess),
    (">>", Op::DGreat),
    ("<&", Op::LessAnd),
    (">&", Op::GreatAnd),
    ("<>", Op::LessGreat),
    (">|", Op::Clobber),
];

const ONE_CHAR_OPS: &[(char, Op)] = &[
    (';', Op::Semi),
    ('&', Op::Amp),
    ('|', Op::Pipe),
    ('(', Op::LParen),
    (')', Op::RParen),
    ('<', Op::Less),
    ('>', Op::Great),
];

/// Characters that end an unquoted word.
pub(crate) fn is_word_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

/// Operator recognizer (priority 150).
pub(crate) struct OperatorRecognizer;

impl Recognize for OperatorRecognizer {
    fn priority(&self) -> u32 {
        150
    }

    fn recognize(&self, lx: &mut Lexer) -> Result<Recognition, LexError> {
        // `<(` and `>(` belong to the process-substitution recognizer.
        if matches!(lx.peek(), Some('<') | Some('>'))
            && lx.peek_at(1) == Some('(')
            && !lx.starts_with("<<")
        {
            return Ok(Recognition::None);
        }

        let start = lx.pos;
        let (line, column) = (lx.line, lx.column);

        for (text, op) in THREE_CHAR_OPS {
            if lx.starts_with(text) {
                for _ in 0..text.chars().count() {
                    lx.advance();
                }
                let tok =
                    Token::new(TokenKind::Op(*op), *text, start, lx.pos).at(line, column);
                return Ok(Recognition::Token(tok));
            }
        }
        for (text, op) in TWO_CHAR_OPS {
            if lx.starts_with(text) {
                lx.advance();
                lx.advance();
                let tok =
                    Token::new(TokenKind::Op(*op), *text, start, lx.pos).at(line, column);
                return Ok(Recognition::Token(tok));
            }
        }
        if let Some(c) = lx.peek() {
            for (ch, op) in ONE_CHAR_OPS {
                if c == *ch {
                    lx.advance();
                    let tok = Token::new(TokenKind::Op(*op), c.to_string(), start, lx.pos)
                        .at(line, column);
                    return Ok(Recognition::Token(tok));
                }
            }
        }
        Ok(Recognition::None)
    }
}

/// Whitespace recognizer (priority 120). Emits a separator event, not a
/// token.
pub(crate) struct WhitespaceRecognizer;

impl Recognize for WhitespaceRecognizer {
    fn priority(&self) -> u32 {
        120
    }

    fn recognize(&self, lx: &mut Lexer) -> Result<Recognition, LexError> {
        let mut consumed = false;
        while matches!(lx.peek(), Some(' ') | Some('\t')) {
            lx.advance();
            consumed = true;
        }
        Ok(if consumed {
            Recognition::Skip
        } else {
            Recognition::None
        })
    }
}

/// Comment recognizer (priority 110): `#` through end of line, only at
/// word start.
pub(crate) struct CommentRecognizer;

impl Recognize for CommentRecognizer {
    fn priority(&self) -> u32 {
        110
    }

    fn recognize(&self, lx: &mut Lexer) -> Result<Recognition, LexError> {
        if lx.peek() != Some('#') || !lx.at_word_start {
            return Ok(Recognition::None);
        }
        while let Some(c) = lx.peek() {
            if c == '\n' {
                break;
            }
            lx.advance();
        }
        Ok(Recognition::Skip)
    }
}

/// Process-substitution recognizer (priority 100). The feature depends on
/// `/dev/fd`; it is recognized here so the diagnostic names the construct
/// instead of tripping over a stray parenthesis.
pub(crate) struct ProcessSubstitutionRecognizer;

impl Recognize for ProcessSubstitutionRecognizer {
    fn priority(&self) -> u32 {
        100
    }

    fn recognize(&self, lx: &mut Lexer) -> Result<Recognition, LexError> {
        if matches!(lx.peek(), Some('<') | Some('>')) && lx.peek_at(1) == Some('(') {
            return Err(lx.error("process substitution is not supported"));
        }
        Ok(Recognition::None)
    }
}

/// Word recognizer (priority 70): the fallback. Assembles a WORD token by
/// appending token-parts until a delimiter is reached.
pub(crate) struct WordRecognizer;

impl Recognize for WordRecognizer {
    fn priority(&self) -> u32 {
        70
    }

    fn recognize(&self, lx: &mut Lexer) -> Result<Recognition, LexError> {
        let start = lx.pos;
        let (line, column) = (lx.line, lx.column);
        let mut parts: Vec<WordPart> = Vec::new();
        let mut quote = QuoteKind::None;
        let mut kind = TokenKind::Word;
        let mut array: Option<String> = None;
        let mut lit = String::new();

        // Assignment prefix: at command position, `NAME=`, `NAME+=`, or
        // `NAME[subscript]=` with no intervening space.
        if lx.command_position {
            if let Some(len) = assignment_prefix_len(&lx.chars, lx.pos) {
                let mut prefix = String::new();
                for _ in 0..len {
                    prefix.push(lx.advance().unwrap());
                }
                parts.push(WordPart::Literal(prefix));
                kind = TokenKind::AssignmentWord;
                if lx.peek() == Some('(') {
                    array = Some(scan_array_literal(lx)?);
                }
            }
        }

        if array.is_none() {
            loop {
                let c = match lx.peek() {
                    None => break,
                    Some(c) => c,
                };
                if is_word_delimiter(c) {
                    break;
                }
                match c {
                    '\'' => {
                        flush_literal(&mut lit, &mut parts);
                        parts.push(WordPart::SingleQuoted(lx.scan_single_quoted()?));
                        quote = strongest(quote, QuoteKind::Single);
                    }
                    '"' => {
                        flush_literal(&mut lit, &mut parts);
                        parts.push(WordPart::DoubleQuoted(lx.scan_double_quoted()?));
                        quote = strongest(quote, QuoteKind::Double);
                    }
                    '$' => {
                        flush_literal(&mut lit, &mut parts);
                        let part = lx.scan_dollar(false)?;
                        if matches!(&part, WordPart::AnsiC(_)) {
                            quote = strongest(quote, QuoteKind::AnsiC);
                        }
                        parts.push(part);
                    }
                    '`' => {
                        flush_literal(&mut lit, &mut parts);
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
                            Some(esc) => {
                                flush_literal(&mut lit, &mut parts);
                                parts.push(WordPart::Escaped(esc));
                                lx.advance();
                            }
                        }
                    }
                    _ => {
                        lit.push(c);
                        lx.advance();
                    }
                }
            }
            flush_literal(&mut lit, &mut parts);
        }

        if parts.is_empty() && array.is_none() {
            return Ok(Recognition::None);
        }

        // A run of digits directly before `<` or `>` is an IO number.
        if kind == TokenKind::Word
            && quote == QuoteKind::None
            && parts.len() == 1
            && matches!(lx.peek(), Some('<') | Some('>'))
        {
            if let WordPart::Literal(s) = &parts[0] {
                if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                    kind = TokenKind::IoNumber;
                }
            }
        }

        let lexeme = lx.slice(start, lx.pos);
        let mut tok = Token::new(kind, lexeme, start, lx.pos).at(line, column);
        tok.quote = quote;
        tok.parts = parts;
        tok.array = array;
        Ok(Recognition::Token(tok))
    }
}

fn flush_literal(lit: &mut String, parts: &mut Vec<WordPart>) {
    if !lit.is_empty() {
        parts.push(WordPart::Literal(std::mem::take(lit)));
    }
}

fn strongest(a: QuoteKind, b: QuoteKind) -> QuoteKind {
    fn rank(q: QuoteKind) -> u8 {
        match q {
            QuoteKind::None => 0,
            QuoteKind::Double => 1,
            QuoteKind::AnsiC => 2,
            QuoteKind::Single => 3,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

/// Length of an assignment prefix (`NAME=`, `NAME+=`, `NAME[sub]=`)
/// starting at `pos`, or `None`. Inside `[...]`, `=` and `]` are literal
/// until the matching bracket.
fn assignment_prefix_len(chars: &[char], pos: usize) -> Option<usize> {
    let mut i = pos;
    match chars.get(i) {
        Some(c) if c.is_ascii_alphabetic() || *c == '_' => i += 1,
        _ => return None,
    }
    while matches!(chars.get(i), Some(c) if c.is_ascii_alphanumeric() || *c == '_') {
        i += 1;
    }
    if chars.get(i) == Some(&'[') {
        let mut depth = 0usize;
        loop {
            match chars.get(i) {
                Some('[') => depth += 1,
                Some(']') => {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                }
                None => return None,
                _ => {}
            }
            i += 1;
        }
    }
    match (chars.get(i), chars.get(i + 1)) {
        (Some('+'), Some('=')) => Some(i + 2 - pos),
        (Some('='), _) => Some(i + 1 - pos),
        _ => None,
    }
}

/// Capture the raw element text of `NAME=(...)`, quote- and nesting-aware.
fn scan_array_literal(lx: &mut Lexer) -> Result<String, LexError> {
    lx.advance(); // consume `(`
    let start = lx.pos;
    let mut depth = 1usize;
    loop {
        let c = match lx.advance() {
            None => return Err(lx.unexpected_eof()),
            Some(c) => c,
        };
        match c {
            '\\' => {
                lx.advance();
            }
            '\'' => {
                while let Some(c) = lx.advance() {
                    if c == '\'' {
                        break;
                    }
                }
            }
            '"' => loop {
                match lx.advance() {
                    None => return Err(lx.unexpected_eof()),
                    Some('\\') => {
                        lx.advance();
                    }
                    Some('"') => break,
                    Some(_) => {}
                }
            },
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(lx.slice(start, lx.pos - 1));
                }
            }
            _ => {}
        }
    }
}
