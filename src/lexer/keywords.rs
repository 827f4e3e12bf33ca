//! Keyword normalization
//!
//! A post-pass over the raw token stream that rewrites WORD tokens into
//! keywords, but only at command position: start of input, after
//! separators and control operators, or after command-introducing
//! keywords. `echo if` must leave `if` as a WORD. `in` is special-cased:
//! it is a keyword only as the third word of `for`/`select` or `case`.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::ast::types::WordPart;
use crate::lexer::token::{Keyword, Op, Token, TokenKind};

lazy_static! {
    static ref RESERVED_WORDS: HashMap<&'static str, Keyword> = {
        let mut m = HashMap::new();
        m.insert("if", Keyword::If);
        m.insert("then", Keyword::Then);
        m.insert("else", Keyword::Else);
        m.insert("elif", Keyword::Elif);
        m.insert("fi", Keyword::Fi);
        m.insert("while", Keyword::While);
        m.insert("until", Keyword::Until);
        m.insert("do", Keyword::Do);
        m.insert("done", Keyword::Done);
        m.insert("for", Keyword::For);
        m.insert("case", Keyword::Case);
        m.insert("esac", Keyword::Esac);
        m.insert("function", Keyword::Function);
        m.insert("select", Keyword::Select);
        m.insert("{", Keyword::LBrace);
        m.insert("}", Keyword::RBrace);
        m.insert("!", Keyword::Bang);
        m
    };
}

/// True for words the lexer treats as reserved when they sit at command
/// position. `in` is not here; it is contextual.
pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains_key(s) || s == "in"
}

/// What the normalizer expects the next word to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    None,
    /// After `for`/`select`: the loop variable.
    Name,
    /// After the loop variable or case subject: possibly `in`.
    In,
    /// After `case`: the subject word.
    CaseWord,
    /// After `function`: the function name.
    FunctionName,
}

/// Rewrite WORD tokens into keywords where the context calls for it.
pub(crate) fn normalize_keywords(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut command_position = true;
    let mut expect = Expect::None;

    for mut tok in tokens {
        match tok.kind {
            TokenKind::Word => {
                let bare = bare_lexeme(&tok).map(str::to_owned);
                if expect == Expect::In && bare.as_deref() == Some("in") {
                    tok.kind = TokenKind::Keyword(Keyword::In);
                    expect = Expect::None;
                    command_position = false;
                } else {
                    if expect == Expect::In {
                        // `for i; do` — no `in`; fall through so `do` is
                        // still recognized.
                        expect = Expect::None;
                    }
                    match (expect, bare.as_deref()) {
                        (Expect::Name, _) | (Expect::CaseWord, _) => {
                            expect = Expect::In;
                            command_position = false;
                        }
                        (Expect::FunctionName, _) => {
                            expect = Expect::None;
                            command_position = false;
                        }
                        (Expect::None, Some(word)) if command_position => {
                            if let Some(&kw) = RESERVED_WORDS.get(word) {
                                tok.kind = TokenKind::Keyword(kw);
                                match kw {
                                    Keyword::For | Keyword::Select => expect = Expect::Name,
                                    Keyword::Case => expect = Expect::CaseWord,
                                    Keyword::Function => expect = Expect::FunctionName,
                                    Keyword::Fi
                                    | Keyword::Done
                                    | Keyword::Esac
                                    | Keyword::RBrace => command_position = false,
                                    _ => {}
                                }
                            } else {
                                command_position = false;
                            }
                        }
                        _ => command_position = false,
                    }
                }
            }
            TokenKind::AssignmentWord => {
                // Assignment prefixes keep the command position open.
            }
            TokenKind::IoNumber => {}
            TokenKind::Op(op) => {
                command_position = !op.is_redirection();
                if matches!(op, Op::Semi | Op::Amp | Op::DSemi | Op::SemiAnd | Op::DSemiAnd) {
                    // Separators do not cancel a pending `do`/`in`:
                    // `for i in; do` and `for i; do` both occur.
                    if expect != Expect::In {
                        expect = Expect::None;
                    }
                }
            }
            TokenKind::Newline => {
                command_position = true;
            }
            TokenKind::Eof | TokenKind::Keyword(_) => {}
        }
        out.push(tok);
    }
    out
}

/// The lexeme if the token is a bare unquoted literal, else `None`.
/// Quoted or escaped text never becomes a keyword.
fn bare_lexeme(tok: &Token) -> Option<&str> {
    match tok.parts.as_slice() {
        [WordPart::Literal(s)] if s == &tok.lexeme => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::token::{Keyword, TokenKind};
    use crate::lexer::tokenize;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn for_in_keywords() {
        let k = kinds("for i in a b; do echo; done");
        assert_eq!(k[0], TokenKind::Keyword(Keyword::For));
        assert_eq!(k[1], TokenKind::Word); // i
        assert_eq!(k[2], TokenKind::Keyword(Keyword::In));
        assert_eq!(k[3], TokenKind::Word); // a
        assert_eq!(k[6], TokenKind::Keyword(Keyword::Do));
    }

    #[test]
    fn case_in_keyword() {
        let k = kinds("case x in a) echo;; esac");
        assert_eq!(k[0], TokenKind::Keyword(Keyword::Case));
        assert_eq!(k[1], TokenKind::Word); // x
        assert_eq!(k[2], TokenKind::Keyword(Keyword::In));
    }

    #[test]
    fn in_is_contextual() {
        // `echo in` keeps `in` a word.
        let k = kinds("echo in");
        assert_eq!(k[1], TokenKind::Word);
    }

    #[test]
    fn quoted_keyword_stays_word() {
        let k = kinds("'if' true");
        assert_eq!(k[0], TokenKind::Word);
    }

    #[test]
    fn brace_group_and_bang() {
        let k = kinds("{ echo; }");
        assert_eq!(k[0], TokenKind::Keyword(Keyword::LBrace));
        assert_eq!(k[3], TokenKind::Keyword(Keyword::RBrace));
        let k = kinds("! true");
        assert_eq!(k[0], TokenKind::Keyword(Keyword::Bang));
    }

    #[test]
    fn keyword_after_and_if() {
        let k = kinds("true && if false; then echo; fi");
        assert_eq!(k[2], TokenKind::Keyword(Keyword::If));
    }
}
