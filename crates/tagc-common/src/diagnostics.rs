//! Ariadne-based diagnostic rendering.
//!
//! Renders `LowerError` values into labeled reports. Output is colorless so
//! it is stable under snapshot tests, carries an error code per kind, and
//! ends with the suggested fix when the diagnostic has one.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::error::{DiagnosticKind, LowerError, Severity};
use crate::span::Span;

/// Assign a stable code to each diagnostic kind.
pub fn error_code(kind: DiagnosticKind) -> &'static str {
    match kind {
        DiagnosticKind::Arity => "E0101",
        DiagnosticKind::UnknownVariant => "E0102",
        DiagnosticKind::UnknownField => "E0103",
        DiagnosticKind::DuplicateVariantName => "E0104",
        DiagnosticKind::UnreachablePattern => "E0105",
        DiagnosticKind::Exhaustiveness => "E0106",
        DiagnosticKind::TypeUnification => "E0107",
        DiagnosticKind::TupleArityExceeded => "E0108",
        DiagnosticKind::InvalidPattern => "E0109",
        DiagnosticKind::UnresolvedType => "E0110",
        DiagnosticKind::NamingCollision => "W0101",
        DiagnosticKind::RedundantWildcard => "W0102",
        DiagnosticKind::RedundantArm => "W0103",
    }
}

fn span_to_range(span: Span) -> Range<usize> {
    span.start as usize..span.end as usize
}

/// Render a diagnostic into a formatted string.
pub fn render_diagnostic(error: &LowerError, source: &str, _filename: &str) -> String {
    let config = Config::default().with_color(false);
    let source_len = source.len();

    // ariadne needs a non-empty span inside the source.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };

    let (report_kind, color) = match error.severity() {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
    };
    let primary = clamp(span_to_range(error.span()));

    let mut builder = Report::build(report_kind, primary.clone())
        .with_code(error_code(error.kind()))
        .with_message(error.to_string())
        .with_config(config);

    match error {
        LowerError::Exhaustiveness {
            missing, remaining, ..
        } => {
            let mut label = format!("missing: {}", missing.join(", "));
            if *remaining > 0 {
                label.push_str(&format!(" (and {} more)", remaining));
            }
            builder.add_label(Label::new(primary).with_message(label).with_color(color));
        }
        LowerError::DuplicateVariantName { first, .. } => {
            builder.add_label(
                Label::new(clamp(span_to_range(*first)))
                    .with_message("first declared here")
                    .with_color(Color::Blue),
            );
            builder.add_label(
                Label::new(primary)
                    .with_message("declared again here")
                    .with_color(color),
            );
        }
        LowerError::UnreachablePattern { catch_all, .. } => {
            builder.add_label(
                Label::new(clamp(span_to_range(*catch_all)))
                    .with_message("this arm matches everything")
                    .with_color(Color::Blue),
            );
            builder.add_label(
                Label::new(primary)
                    .with_message("this arm is unreachable")
                    .with_color(color),
            );
        }
        LowerError::TypeUnification { conflicts, .. } => {
            for c in conflicts {
                builder.add_label(
                    Label::new(clamp(span_to_range(c.span)))
                        .with_message(format!("arm {} has type {}", c.arm_index + 1, c.ty))
                        .with_color(color),
                );
            }
        }
        LowerError::RedundantWildcard { .. } | LowerError::RedundantArm { .. } => {
            builder.add_label(
                Label::new(primary)
                    .with_message("this arm is never reached")
                    .with_color(color),
            );
        }
        _ => {
            builder.add_label(
                Label::new(primary)
                    .with_message(error.to_string())
                    .with_color(color),
            );
        }
    }

    if let Some(help) = error.help() {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    let cache = Source::from(source);
    if builder.finish().write(cache, &mut buf).is_err() {
        // Rendering only fails on I/O into the buffer; fall back to the plain message.
        return format!("[{}] {}", error_code(error.kind()), error);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render every diagnostic of a batch, in order.
pub fn render_all(errors: &[LowerError], source: &str, filename: &str) -> Vec<String> {
    errors
        .iter()
        .map(|e| render_diagnostic(e, source, filename))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "match status do\n  Pending -> \"waiting\"\n  Approved -> \"done\"\nend";

    #[test]
    fn exhaustiveness_renders_missing_and_help() {
        let err = LowerError::Exhaustiveness {
            scrutinee: "Status".to_string(),
            missing: vec!["Rejected".to_string()],
            remaining: 0,
            span: Span::new(0, 12),
        };
        let out = render_diagnostic(&err, SRC, "test.tg");
        assert!(out.contains("E0106"), "{}", out);
        assert!(out.contains("missing: Rejected"), "{}", out);
        assert!(out.contains("add an arm for `Rejected`"), "{}", out);
    }

    #[test]
    fn warning_uses_warning_header() {
        let err = LowerError::RedundantWildcard {
            arm_index: 2,
            span: Span::new(16, 23),
        };
        let out = render_diagnostic(&err, SRC, "test.tg");
        assert!(out.contains("Warning"), "{}", out);
        assert!(out.contains("W0102"), "{}", out);
    }

    #[test]
    fn render_all_preserves_order() {
        let errs = vec![
            LowerError::TupleArityExceeded {
                found: 7,
                max: 6,
                span: Span::new(0, 5),
            },
            LowerError::UnresolvedType {
                what: "the scrutinee".to_string(),
                span: Span::new(6, 12),
            },
        ];
        let out = render_all(&errs, SRC, "test.tg");
        assert_eq!(out.len(), 2);
        assert!(out[0].contains("E0108"));
        assert!(out[1].contains("E0110"));
    }
}
