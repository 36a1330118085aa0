use std::fmt;

/// Kind of a placeholder, which decides its extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// A single identifier: `[A-Za-z_][A-Za-z0-9_]*`.
    Ident,
    /// Free-form run of text, terminated at the next literal anchor.
    /// Never stops inside an open delimiter.
    Expr,
    /// A balanced delimited block, captured including its outer
    /// delimiters (`{...}`, `[...]` or `(...)`).
    Block,
    /// Like `Expr`, but the capture can additionally be split into
    /// separator-delimited items.
    List,
    /// Run of blank/indentation characters; absorbed, never captured.
    Gap,
}

impl PlaceholderKind {
    pub fn name(&self) -> &'static str {
        match self {
            PlaceholderKind::Ident => "ident",
            PlaceholderKind::Expr => "expr",
            PlaceholderKind::Block => "block",
            PlaceholderKind::List => "list",
            PlaceholderKind::Gap => "gap",
        }
    }

    pub const ALL: [PlaceholderKind; 5] = [
        PlaceholderKind::Ident,
        PlaceholderKind::Expr,
        PlaceholderKind::Block,
        PlaceholderKind::List,
        PlaceholderKind::Gap,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Kinds whose capture length depends on the surrounding anchors.
    pub fn is_variable_length(&self) -> bool {
        matches!(self, PlaceholderKind::Expr | PlaceholderKind::List)
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a variable-length placeholder picks among candidate end anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greediness {
    /// Stop at the first viable occurrence of the terminating anchor.
    Lazy,
    /// Stop at the last viable occurrence of the terminating anchor.
    Greedy,
}

/// A named slot within a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub kind: PlaceholderKind,
    pub greediness: Greediness,
}

impl Placeholder {
    /// Gaps are absorbed during matching but never surfaced as captures.
    pub fn is_captured(&self) -> bool {
        self.kind != PlaceholderKind::Gap
    }
}

/// One segment of a compiled pattern: a literal text run or a
/// placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

impl Segment {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Segment::Literal(text) => Some(text),
            Segment::Placeholder(_) => None,
        }
    }

    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            Segment::Literal(_) => None,
            Segment::Placeholder(p) => Some(p),
        }
    }
}
