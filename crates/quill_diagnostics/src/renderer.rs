//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
///
/// Implementations format diagnostics for different output targets:
/// terminal (human-readable) and JSON (machine-readable).
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;

    /// Renders a batch of diagnostics, one per line block.
    fn render_all(&self, diags: &[Diagnostic]) -> String {
        diags.iter().map(|d| self.render(d)).collect::<Vec<_>>().join("\n")
    }
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[E101]: could not extract the format version
///   --> /sdk/lib/Foo.qi
///    = note: while loading module Foo
/// ```
pub struct TerminalRenderer;

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}[{}]: {}\n", diag.severity, diag.code, diag.message));
        if let Some(file) = &diag.file {
            out.push_str(&format!("  --> {}\n", file.display()));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        out
    }
}

/// Renders diagnostics as JSON objects, one per diagnostic.
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        serde_json::to_string(diag).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    fn sample() -> Diagnostic {
        Diagnostic::error(DiagnosticCode::new(Category::Error, 101), "bad header")
            .with_file("/sdk/Foo.qi")
            .with_note("while loading module Foo")
    }

    #[test]
    fn terminal_format() {
        let out = TerminalRenderer.render(&sample());
        assert!(out.starts_with("error[E101]: bad header\n"));
        assert!(out.contains("--> /sdk/Foo.qi"));
        assert!(out.contains("= note: while loading module Foo"));
    }

    #[test]
    fn terminal_without_file() {
        let diag = Diagnostic::warning(DiagnosticCode::new(Category::Warning, 5), "hmm");
        let out = TerminalRenderer.render(&diag);
        assert_eq!(out, "warning[W005]: hmm\n");
    }

    #[test]
    fn json_format_parses_back() {
        let out = JsonRenderer.render(&sample());
        let back: Diagnostic = serde_json::from_str(&out).unwrap();
        assert_eq!(back.message, "bad header");
    }

    #[test]
    fn render_all_joins() {
        let diags = vec![sample(), sample()];
        let out = TerminalRenderer.render_all(&diags);
        assert_eq!(out.matches("error[E101]").count(), 2);
    }
}
