//! The document-assembly seams around the compiler: merging generated output
//! into a host HTML template and collapsing whitespace before the result is
//! persisted. Both are thin; all the interesting work happens in the parser
//! and code generator.

use crate::Compiled;
use crate::error::{FabulaError, FabulaResult};

const CONTENT_PLACEHOLDER: &str = "%%content%%";
const TITLE_PLACEHOLDER: &str = "%%title%%";

/// Substitutes the compiled output into the `%%content%%` placeholder of a
/// host template, and the extracted title into `%%title%%` when the template
/// carries one.
///
/// # Errors
///
/// Returns [`FabulaError::MissingPlaceholder`] when the template has no
/// `%%content%%` placeholder; merging into such a template would silently
/// drop the whole story.
pub fn merge_into_template(template: &str, compiled: &Compiled) -> FabulaResult<String> {
    if !template.contains(CONTENT_PLACEHOLDER) {
        return Err(FabulaError::MissingPlaceholder {
            placeholder: CONTENT_PLACEHOLDER.to_string(),
        });
    }
    let merged = template.replacen(CONTENT_PLACEHOLDER, &compiled.output, 1);
    Ok(merged.replace(TITLE_PLACEHOLDER, &compiled.title))
}

/// Collapses every run of whitespace in the merged document to a single
/// space and trims the ends. Conservative on purpose: the generated output
/// never depends on repeated whitespace.
pub fn minify(document: &str) -> String {
    let mut out = String::with_capacity(document.len());
    let mut in_whitespace = false;
    for c in document.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            out.push(c);
        }
    }
    out.trim().to_string()
}
