//! AST node types
//!
//! A single tagged-union tree: the executor matches on the node tag rather
//! than dispatching through virtual methods. Every node is `Clone` so
//! function bodies and subshell copies can be retained cheaply.

use std::fmt;

// =============================================================================
// SCRIPT & STATEMENTS
// =============================================================================

/// Root node: a complete script or one logical line of input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptNode {
    pub statements: Vec<StatementNode>,
}

/// An and-or list: pipelines connected by `&&` / `||`, optionally ending
/// in `&` for background execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementNode {
    pub pipelines: Vec<PipelineNode>,
    /// Connectors between pipelines; `operators.len() == pipelines.len() - 1`.
    pub operators: Vec<AndOrOp>,
    /// Run the whole list in the background?
    pub background: bool,
    /// Original source text, used for job names and trace output.
    pub source_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOrOp {
    And, // &&
    Or,  // ||
}

// =============================================================================
// PIPELINES & COMMANDS
// =============================================================================

/// A pipeline: `cmd1 | cmd2 | cmd3`, optionally negated with `!`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineNode {
    pub commands: Vec<CommandNode>,
    pub negated: bool,
}

/// Union of all command forms.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandNode {
    Simple(SimpleCommandNode),
    If(IfNode),
    While(WhileNode),
    Until(UntilNode),
    For(ForNode),
    Case(CaseNode),
    Select(SelectNode),
    Subshell(SubshellNode),
    Group(GroupNode),
    FunctionDef(FunctionDefNode),
}

impl CommandNode {
    /// Redirections attached to this command, whatever its form.
    pub fn redirections(&self) -> &[RedirectionNode] {
        match self {
            CommandNode::Simple(n) => &n.redirections,
            CommandNode::If(n) => &n.redirections,
            CommandNode::While(n) => &n.redirections,
            CommandNode::Until(n) => &n.redirections,
            CommandNode::For(n) => &n.redirections,
            CommandNode::Case(n) => &n.redirections,
            CommandNode::Select(n) => &n.redirections,
            CommandNode::Subshell(n) => &n.redirections,
            CommandNode::Group(n) => &n.redirections,
            CommandNode::FunctionDef(n) => &n.redirections,
        }
    }
}

/// Simple command: assignment prefix, words (name and arguments), and
/// redirections. `words` may be empty for an assignment-only command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleCommandNode {
    pub assignments: Vec<AssignmentNode>,
    pub words: Vec<WordNode>,
    pub redirections: Vec<RedirectionNode>,
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

/// `if` statement with zero or more `elif` clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub clauses: Vec<IfClause>,
    pub else_body: Option<Vec<StatementNode>>,
    pub redirections: Vec<RedirectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

/// `while` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileNode {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// `until` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct UntilNode {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// `for VAR in WORDS; do ...; done`. `words` of `None` means iterate
/// over the positional parameters, as if `in "$@"` had been written.
#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub variable: String,
    pub words: Option<Vec<WordNode>>,
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// `case WORD in PATTERN) ...;; esac`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseNode {
    pub word: WordNode,
    pub items: Vec<CaseItemNode>,
    pub redirections: Vec<RedirectionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseItemNode {
    pub patterns: Vec<WordNode>,
    pub body: Vec<StatementNode>,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerminator {
    /// `;;` — stop after this item.
    Break,
    /// `;&` — fall through into the next item's body.
    FallThrough,
    /// `;;&` — test the next item's patterns.
    TestNext,
}

/// `select VAR in WORDS; do ...; done`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectNode {
    pub variable: String,
    pub words: Option<Vec<WordNode>>,
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// Subshell: `( ... )` — forks.
#[derive(Debug, Clone, PartialEq)]
pub struct SubshellNode {
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

/// Command group: `{ ...; }` — runs in the current shell.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub body: Vec<StatementNode>,
    pub redirections: Vec<RedirectionNode>,
}

// =============================================================================
// FUNCTIONS
// =============================================================================

/// Function definition: `name() body` or `function name body`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefNode {
    pub name: String,
    pub body: Box<CommandNode>,
    pub redirections: Vec<RedirectionNode>,
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// Variable assignment: `VAR=value`, `VAR+=value`, `VAR[sub]=value`,
/// or `VAR=(a b c)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentNode {
    pub name: String,
    /// Raw subscript text between `[` and `]`, if any.
    pub index: Option<String>,
    pub value: Option<WordNode>,
    pub append: bool,
    /// `VAR=(...)` array literal elements.
    pub array: Option<Vec<WordNode>>,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

/// I/O redirection attached to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectionNode {
    /// Explicit descriptor (`2>`); `None` means the operator's default.
    pub fd: Option<i32>,
    pub operator: RedirectOp,
    pub target: RedirectTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectTarget {
    Word(WordNode),
    HereDoc(HereDocNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    Less,      // <
    Great,     // >
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    Clobber,   // >|
    DLess,     // <<
    DLessDash, // <<-
    TLess,     // <<<
}

impl RedirectOp {
    /// Descriptor the operator applies to when none is written.
    pub fn default_fd(self) -> i32 {
        match self {
            RedirectOp::Less
            | RedirectOp::LessAnd
            | RedirectOp::LessGreat
            | RedirectOp::DLess
            | RedirectOp::DLessDash
            | RedirectOp::TLess => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RedirectOp::Less => "<",
            RedirectOp::Great => ">",
            RedirectOp::DGreat => ">>",
            RedirectOp::LessAnd => "<&",
            RedirectOp::GreatAnd => ">&",
            RedirectOp::LessGreat => "<>",
            RedirectOp::Clobber => ">|",
            RedirectOp::DLess => "<<",
            RedirectOp::DLessDash => "<<-",
            RedirectOp::TLess => "<<<",
        };
        f.write_str(s)
    }
}

/// Here-document body collected by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct HereDocNode {
    pub delimiter: String,
    /// Body content; a single literal part when the delimiter was quoted,
    /// otherwise lexed into parts so expansion applies at read time.
    pub content: WordNode,
    pub quoted: bool,
    pub strip_tabs: bool,
}

// =============================================================================
// WORDS
// =============================================================================

/// A word is an ordered sequence of parts. The part structure carries
/// quoting through to expansion, so the expander knows per substring
/// whether expansion applies and under what quoting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordNode {
    pub parts: Vec<WordPart>,
}

impl WordNode {
    pub fn literal(value: impl Into<String>) -> Self {
        WordNode {
            parts: vec![WordPart::Literal(value.into())],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// True when no part is subject to any expansion and no part is quoted.
    pub fn is_plain_literal(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, WordPart::Literal(_)))
    }

    /// Flatten to the literal text, ignoring quoting. Only meaningful for
    /// words with no expansion parts (heredoc delimiters, function names).
    pub fn flatten_literal(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                WordPart::Literal(s) | WordPart::SingleQuoted(s) | WordPart::AnsiC(s) => {
                    out.push_str(s)
                }
                WordPart::Escaped(c) => out.push(*c),
                WordPart::DoubleQuoted(parts) => {
                    out.push_str(&WordNode { parts: parts.clone() }.flatten_literal())
                }
                _ => {}
            }
        }
        out
    }
}

/// Parts that can make up a word.
#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    /// Unquoted literal run. May still contain glob metacharacters.
    Literal(String),
    /// `'...'` — fully literal.
    SingleQuoted(String),
    /// `"..."` — inner parts are expanded but never split or globbed.
    DoubleQuoted(Vec<WordPart>),
    /// `$'...'` with escape sequences already decoded.
    AnsiC(String),
    /// Backslash-escaped character in an unquoted context.
    Escaped(char),
    /// `$V`, `${V}`, `${V...}`.
    Parameter(ParameterExpr),
    /// `$(...)` or backticks; raw command text, parsed when expanded.
    CommandSubst(String),
    /// `$((...))`; raw expression text.
    Arith(String),
}

// =============================================================================
// PARAMETER EXPANSION
// =============================================================================

/// A parameter reference with an optional operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpr {
    /// Variable name or special parameter (`@ * # ? $ ! - 0`..`9`).
    pub name: String,
    /// Array subscript: raw text between `[` and `]`, `@`, or `*`.
    pub index: Option<String>,
    /// `${!V}` indirection.
    pub indirect: bool,
    pub op: Option<ParamOp>,
}

impl ParameterExpr {
    pub fn plain(name: impl Into<String>) -> Self {
        ParameterExpr {
            name: name.into(),
            index: None,
            indirect: false,
            op: None,
        }
    }
}

/// The `${V...}` operator set. The `colon` flag distinguishes
/// unset-or-null (`:-`) from unset-only (`-`) treatment.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamOp {
    /// `${V:-word}` / `${V-word}`
    Default { word: WordNode, colon: bool },
    /// `${V:=word}` / `${V=word}`
    Assign { word: WordNode, colon: bool },
    /// `${V:?word}` / `${V?word}`
    Error { word: WordNode, colon: bool },
    /// `${V:+word}` / `${V+word}`
    Alternative { word: WordNode, colon: bool },
    /// `${#V}`
    Length,
    /// `${V#pat}` / `${V##pat}`
    RemovePrefix { pattern: WordNode, longest: bool },
    /// `${V%pat}` / `${V%%pat}`
    RemoveSuffix { pattern: WordNode, longest: bool },
    /// `${V/pat/repl}` and friends.
    Replace {
        pattern: WordNode,
        replacement: Option<WordNode>,
        all: bool,
        anchor: Option<ReplaceAnchor>,
    },
    /// `${V:offset}` / `${V:offset:length}`; raw arithmetic texts.
    Substring {
        offset: String,
        length: Option<String>,
    },
    /// `${V^pat}` `${V^^pat}` `${V,pat}` `${V,,pat}`
    CaseMod { op: CaseModOp, pattern: Option<WordNode> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceAnchor {
    /// `${V/#pat/repl}` — pattern must match at the start.
    Prefix,
    /// `${V/%pat/repl}` — pattern must match at the end.
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseModOp {
    UpperFirst, // ^
    UpperAll,   // ^^
    LowerFirst, // ,
    LowerAll,   // ,,
}
