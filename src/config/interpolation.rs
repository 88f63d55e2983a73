//! `${key}` templates over step outputs.
//!
//! Step parameters can embed output registry keys, e.g.
//! `${registry.loginServer}/todo-api:${image.tag}`.
//!
//! # Syntax
//!
//! - `${step.field}` - replaced with the registry value
//! - `$${escaped}` - produces literal `${escaped}` in output

use std::collections::BTreeSet;

use crate::error::Result;
use crate::outputs::OutputRegistry;

/// A segment of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Registry reference: ${key}
    Variable(String),
}

/// Parse a string containing `${key}` interpolations.
pub fn parse_interpolation(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current_literal = String::new();

    while let Some(c) = chars.next() {
        if c != '$' {
            current_literal.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                if chars.peek() == Some(&'{') {
                    // $${...} -> literal ${...}
                    chars.next();
                    current_literal.push_str("${");
                    for c in chars.by_ref() {
                        current_literal.push(c);
                        if c == '}' {
                            break;
                        }
                    }
                } else {
                    current_literal.push('$');
                }
            }
            Some('{') => {
                chars.next();

                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }

                let mut key = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    key.push(c);
                }

                segments.push(Segment::Variable(key.trim().to_string()));
            }
            _ => current_literal.push(c),
        }
    }

    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

/// Every registry key referenced by a template, in sorted order.
pub fn extract_variables(input: &str) -> BTreeSet<String> {
    parse_interpolation(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Variable(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Resolve every reference in `input` against the registry on behalf of `step`.
///
/// # Errors
///
/// Returns `UnresolvedReference` for the first key that has not been written.
pub fn resolve_string(input: &str, step: &str, registry: &OutputRegistry) -> Result<String> {
    let mut result = String::new();

    for segment in parse_interpolation(input) {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Variable(key) => result.push_str(registry.require(step, &key)?),
        }
    }

    Ok(result)
}
