//! Bind-name templates
//!
//! `k8s-{{serviceaccount.name}}` rendered against
//! `{serviceaccount.name: "vault"}` yields `k8s-vault`. Every placeholder
//! must resolve; there is no blank substitution.

use std::collections::BTreeSet;

use crate::error::TemplateError;
use crate::types::VerifiedFields;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed bind-name template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindNameTemplate {
    segments: Vec<Segment>,
}

impl BindNameTemplate {
    /// Parse a template
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let end = after_open.find("}}").ok_or(TemplateError::Unterminated {
                position: offset + start,
            })?;
            let name = after_open[..end].trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyPlaceholder {
                    position: offset + start,
                });
            }
            segments.push(Segment::Field(name.to_string()));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Field paths referenced by placeholders
    pub fn fields(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Interpolate against verified fields
    pub fn render(&self, fields: &VerifiedFields) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value = fields
                        .get(name)
                        .ok_or_else(|| TemplateError::UnresolvedField(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Parse and render in one step
pub fn interpolate(template: &str, fields: &VerifiedFields) -> Result<String, TemplateError> {
    BindNameTemplate::parse(template)?.render(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> VerifiedFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_interpolates_placeholder() {
        let out = interpolate(
            "k8s-{{serviceaccount.name}}",
            &fields(&[("serviceaccount.name", "vault")]),
        )
        .unwrap();
        assert_eq!(out, "k8s-vault");
    }

    #[test]
    fn test_missing_field_fails() {
        let err = interpolate("k8s-{{serviceaccount.name}}", &fields(&[])).unwrap_err();
        assert_eq!(err, TemplateError::UnresolvedField("serviceaccount.name".into()));
    }

    #[test]
    fn test_multiple_placeholders_and_whitespace() {
        let out = interpolate(
            "{{ ns }}--{{name}}-x",
            &fields(&[("ns", "default"), ("name", "web")]),
        )
        .unwrap();
        assert_eq!(out, "default--web-x");
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(interpolate("ops", &fields(&[])).unwrap(), "ops");
        assert_eq!(interpolate("a}}b", &fields(&[])).unwrap(), "a}}b");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            BindNameTemplate::parse("abc-{{name"),
            Err(TemplateError::Unterminated { position: 4 })
        );
        assert_eq!(
            BindNameTemplate::parse("x{{ }}"),
            Err(TemplateError::EmptyPlaceholder { position: 1 })
        );
    }

    #[test]
    fn test_fields_listing() {
        let tpl = BindNameTemplate::parse("{{b}}-{{a}}-{{b}}").unwrap();
        assert_eq!(tpl.fields().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
