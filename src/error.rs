pub type FabulaResult<T> = std::result::Result<T, FabulaError>;

/// What went wrong, structurally. Every variant corresponds to a class of
/// source defect the scanner can hit; parsing aborts on the first one.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// `{` encountered while the insertion node has no child to descend into.
    BlockOpenWithoutCommand,
    /// `{` encountered after a child that cannot hold children.
    BlockOpenAfterTerminal,
    /// `}` encountered while already at the document root.
    UnbalancedClose,
    /// End of input reached with one or more blocks still open.
    UnclosedBlock { depth: usize },
    /// `\else` with no preceding unmatched `\if` sibling.
    OrphanElse,
    /// Two `\else` blocks matched against the same `\if`.
    DoubleElse,
    /// A backslash command the language does not define.
    UnknownCommand { command: String },
    /// A character that is not legal in the current context.
    UnexpectedCharacter { found: char },
    /// A directive that does not match its required `(...)` shape.
    MalformedDirective {
        directive: String,
        expected: String,
    },
    /// Content other than `\choice(...)` inside a `\choices` block.
    InvalidChoicesContent { found: String },
    /// A `\script{...}` or `\style{...}` body whose braces never rebalance.
    UnterminatedRawBlock { directive: String },
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockOpenWithoutCommand => {
                write!(
                    f,
                    "Cannot begin block here; your brackets are likely unbalanced"
                )
            }
            Self::BlockOpenAfterTerminal => {
                write!(f, "Invalid '{{' following an element that cannot hold a block")
            }
            Self::UnbalancedClose => {
                write!(
                    f,
                    "Cannot end block at the document root; your brackets are likely unbalanced"
                )
            }
            Self::UnclosedBlock { depth } => {
                write!(f, "Unexpected end of input with {} unclosed block(s)", depth)
            }
            Self::OrphanElse => {
                write!(f, "No corresponding \\if block found for \\else")
            }
            Self::DoubleElse => {
                write!(f, "Cannot have a double \\else block")
            }
            Self::UnknownCommand { command } => {
                write!(f, "Unrecognized command '\\{}'", command)
            }
            Self::UnexpectedCharacter { found } => {
                write!(f, "Unexpected character '{}'", found)
            }
            Self::MalformedDirective {
                directive,
                expected,
            } => {
                write!(f, "Malformed \\{} directive: expected {}", directive, expected)
            }
            Self::InvalidChoicesContent { found } => {
                write!(
                    f,
                    "Invalid content inside \\choices: expected \\choice(...), found '{}'",
                    found
                )
            }
            Self::UnterminatedRawBlock { directive } => {
                write!(f, "Unterminated \\{} block: braces never rebalance", directive)
            }
        }
    }
}

impl std::error::Error for ParseErrorKind {}

/// A fatal parse failure, located by character offset and line/column.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError {
    /// Byte offset into the source at which the defect was detected.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {} (offset {}): {}",
            self.line, self.column, self.offset, self.kind
        )
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FabulaError {
    Parse(ParseError),
    /// The host template handed to the merge step has no content placeholder.
    MissingPlaceholder { placeholder: String },
}

impl std::fmt::Display for FabulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(parse_error) => {
                write!(f, "{}", parse_error)
            }
            Self::MissingPlaceholder { placeholder } => {
                write!(f, "Template has no '{}' placeholder", placeholder)
            }
        }
    }
}

impl std::error::Error for FabulaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(parse_error) => Some(parse_error),
            Self::MissingPlaceholder { .. } => None,
        }
    }
}

impl From<ParseError> for FabulaError {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}
