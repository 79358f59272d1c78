//! Prometheus text exposition format.
//!
//! Renders collected metric families into the text format served on a
//! `/metrics` endpoint. Output is a pure function of the input: families
//! and samples are emitted in the order given.

use std::fmt::Write;

use crate::types::{BUCKET_LABEL, MetricFamilySamples};

/// Render metric families into Prometheus text format.
pub fn render_prometheus(families: &[MetricFamilySamples]) -> String {
    let mut out = String::new();

    for family in families {
        let fqname = family.fqname();
        let _ = writeln!(out, "# HELP {fqname} {}", escape_help(&family.schema.help));
        let _ = writeln!(out, "# TYPE {fqname} {}", family.kind());

        for sample in &family.samples {
            out.push_str(&sample.name);

            let mut labels: Vec<(&str, &str)> = family
                .schema
                .label_names
                .iter()
                .map(String::as_str)
                .zip(sample.label_values.iter().map(String::as_str))
                .collect();
            if let Some(le) = &sample.le {
                labels.push((BUCKET_LABEL, le));
            }
            if !labels.is_empty() {
                out.push('{');
                for (i, (name, value)) in labels.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{name}=\"{}\"", escape_label_value(value));
                }
                out.push('}');
            }

            let _ = writeln!(out, " {}", format_value(sample.value));
        }
    }

    out
}

/// Largest magnitude below which every integral `f64` is exact.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Canonical text form of a sample value or bucket bound.
///
/// Integral values below 2^53 print as integers. Everything else uses the
/// shortest text that parses back to the same `f64`, in exponent notation
/// outside `[1e-6, 1e15)`, so distinct values never share a rendering.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if value.fract() == 0.0 && magnitude < EXACT_INTEGER_LIMIT {
        format!("{}", value as i64)
    } else if (1e-6..1e15).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
