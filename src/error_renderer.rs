//! Error rendering using ariadne
//!
//! Diagnostics carry byte spans into the VFR source; this module turns them
//! into annotated source snippets.

use crate::{Diagnostic, Error, Severity};
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;

/// Render an error to stderr. `path` names the source in the report.
///
/// # Example
/// ```no_run
/// use vfr::{CompileOptions, SequentialStrings, compile_source, render_error};
///
/// let source = "formset endformset;";
/// if let Err(e) = compile_source(source, &SequentialStrings::new(), CompileOptions::default()) {
///     render_error(&e, "setup.vfr");
/// }
/// ```
pub fn render_error(error: &Error, path: &str) {
    render_error_to_writer(error, path, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &Error, path: &str, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(error, path, writer, true)
}

/// Render an error to a String
pub fn render_error_to_string(error: &Error, path: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, path, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &Error, path: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, path, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    path: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Compilation {
            diagnostics,
            source,
        } => render_diagnostics(path, source, diagnostics, writer, use_color),
        Error::Emit(msg) => {
            writeln!(writer, "Emit error: {}", msg)
        }
    }
}

/// Render diagnostics (errors or warnings) against their source.
pub fn render_diagnostics(
    path: &str,
    source: &str,
    diagnostics: &[Diagnostic],
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    for diag in diagnostics {
        let mut colors = ColorGenerator::new();
        colors.next(); // Skip the first color.

        let kind = match diag.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
            Severity::Info => ReportKind::Advice,
        };

        // Spans past the end (errors at end of input) are clamped.
        let end = diag.span.0.end.min(source.len());
        let span = diag.span.0.start.min(end)..end;

        let mut report = Report::build(kind, (path, span.clone()))
            .with_message(&diag.message)
            .with_config(ariadne::Config::default().with_color(use_color));

        if let Some(code) = &diag.code {
            report = report.with_code(code);
        }

        report = report.with_label(
            Label::new((path, span))
                .with_message(format!("line {}", diag.line))
                .with_color(colors.next()),
        );

        if let Some(help) = &diag.help {
            report = report.with_help(help);
        }

        report
            .finish()
            .write((path, Source::from(source)), &mut *writer)?;
    }

    Ok(())
}
