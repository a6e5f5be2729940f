//! Textual output of a classification.
//!
//! The command-line classifier prints one mapping per run. Existing callers
//! scrape that mapping out of stdout, so its shape is fixed: exactly the keys
//! `label` and `confidence`. [`parse_mapping`] is the reading side, for
//! callers that still consume the text form instead of the typed API.

use crate::error::{Error, Result};
use crate::types::{ClassificationResult, Label};
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::OnceLock;

/// Output format for a rendered result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `{'label': 'Real', 'confidence': 0.9876}`
    #[default]
    Python,
    /// `{"label":"Real","confidence":0.9876}`
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "dict" => Ok(Self::Python),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{}' (expected python or json)", other)),
        }
    }
}

/// Render a result in the given format
pub fn render(result: &ClassificationResult, format: OutputFormat) -> Result<String> {
    match format {
        // `{:?}` keeps a trailing `.0` on whole numbers, matching the dict repr
        OutputFormat::Python => Ok(format!(
            "{{'label': '{}', 'confidence': {:?}}}",
            result.label, result.confidence
        )),
        OutputFormat::Json => Ok(serde_json::to_string(result)?),
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMapping {
    label: String,
    confidence: f64,
}

fn mapping_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("mapping pattern is valid"))
}

/// Extract a `{label, confidence}` mapping from classifier output.
///
/// The output may carry log lines or warnings around the mapping; the span
/// from the first `{` to the last `}` is taken. Both JSON and the
/// single-quoted form are accepted. Anything else is
/// [`Error::MalformedOutput`].
pub fn parse_mapping(output: &str) -> Result<ClassificationResult> {
    let span = mapping_pattern()
        .find(output)
        .ok_or_else(|| Error::malformed("no mapping found in output"))?
        .as_str();

    let raw: RawMapping = match serde_json::from_str(span) {
        Ok(raw) => raw,
        Err(_) => serde_json::from_str(&span.replace('\'', "\""))
            .map_err(|e| Error::malformed(format!("unparseable mapping {}: {}", span, e)))?,
    };

    let label = Label::from_str(&raw.label)?;
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(Error::malformed(format!(
            "confidence {} outside [0, 1]",
            raw.confidence
        )));
    }

    Ok(ClassificationResult::new(label, raw.confidence as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_python() {
        let result = ClassificationResult::new(Label::Real, 0.9876);
        assert_eq!(
            render(&result, OutputFormat::Python).unwrap(),
            "{'label': 'Real', 'confidence': 0.9876}"
        );

        let whole = ClassificationResult::new(Label::Fake, 1.0);
        assert_eq!(
            render(&whole, OutputFormat::Python).unwrap(),
            "{'label': 'Fake', 'confidence': 1.0}"
        );
    }

    #[test]
    fn test_render_json() {
        let result = ClassificationResult::new(Label::Fake, 0.61);
        assert_eq!(
            render(&result, OutputFormat::Json).unwrap(),
            r#"{"label":"Fake","confidence":0.61}"#
        );
    }

    #[test]
    fn test_parse_python_mapping_with_noise() {
        let output = "Some weights were not initialized\n{'label': 'Fake', 'confidence': 0.8123}\n";
        let result = parse_mapping(output).unwrap();
        assert_eq!(result.label, Label::Fake);
        assert_eq!(result.confidence, 0.8123);
    }

    #[test]
    fn test_parse_json_mapping() {
        let result = parse_mapping(r#"{"label": "Real", "confidence": 0.5}"#).unwrap();
        assert_eq!(result.label, Label::Real);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_parse_rendered_output() {
        let result = ClassificationResult::new(Label::Real, 0.7071);
        for format in [OutputFormat::Python, OutputFormat::Json] {
            let text = render(&result, format).unwrap();
            assert_eq!(parse_mapping(&text).unwrap(), result);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for output in [
            "",
            "Traceback (most recent call last): ...",
            "{'label': 'Maybe', 'confidence': 0.5}",
            "{'label': 'Real', 'confidence': 1.5}",
            "{'label': 'Real'}",
            "{'label': 'Real', 'confidence': 0.9, 'extra': 1}",
            "{not a mapping}",
        ] {
            let err = parse_mapping(output).unwrap_err();
            assert!(
                matches!(err, Error::MalformedOutput(_)),
                "expected malformed output for {:?}, got {:?}",
                output,
                err
            );
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("python".parse::<OutputFormat>().unwrap(), OutputFormat::Python);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
