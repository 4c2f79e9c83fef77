//! Fabula is a compiler for a small markup language for interactive,
//! branching stories: sections with parameters, navigation and choice links,
//! conditional content, variables, and embedded style/script bodies.
//!
//! Source text is compiled into generated output — one function declaration
//! per section, plus markup fragments carrying interpolation slots and event
//! markers — which a host renderer executes to display the current section
//! and react to navigation events. The compiler never evaluates the embedded
//! expression language; conditions, assignments, and prints pass through
//! verbatim.
//!
//! ```
//! let compiled = fabula::compile("\\title(The Cellar)\\section(intro) {Hello}").unwrap();
//! assert_eq!(compiled.output, "function intro() { return `Hello`; }\n");
//! assert_eq!(compiled.title, "The Cellar");
//! ```

mod ast;
mod codegen;
mod document;
mod error;
mod parser;

// Public exports.
pub use document::{merge_into_template, minify};
pub use error::{FabulaError, FabulaResult, ParseError, ParseErrorKind};

/// The result of one successful compilation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Compiled {
    /// The generated output text: hoisted statements and one function
    /// declaration per section, with markup fragments inline.
    pub output: String,
    /// The story title; empty when the source carries no `\title` directive.
    pub title: String,
}

/// Compiles Fabula source text.
///
/// Parsing is a single left-to-right pass producing a syntax tree, which the
/// code generator then renders bottom-up. Each call owns its tree and cursor
/// state exclusively, so independent compilations can run in parallel and
/// compiling the same input twice produces byte-identical output.
///
/// # Errors
///
/// Returns [`FabulaError::Parse`] on the first structural defect (unbalanced
/// brackets, orphan or double `\else`, unrecognized commands, malformed
/// directives). No partial output is produced on failure.
///
/// # Examples
///
/// ```
/// let compiled = fabula::compile("\\section(intro) {Hello}").unwrap();
/// assert_eq!(compiled.output, "function intro() { return `Hello`; }\n");
/// assert_eq!(compiled.title, "");
/// ```
pub fn compile(source: &str) -> FabulaResult<Compiled> {
    let tree = parser::parse(source)?;
    let output = codegen::generate(&tree);
    let title = tree.title().unwrap_or_default().to_string();
    Ok(Compiled { output, title })
}
