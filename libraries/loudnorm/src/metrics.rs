//! Loudness statistics reported by the loudnorm measurement pass
//!
//! FFmpeg prints the statistics as a JSON object embedded in its diagnostic
//! (stderr) text, surrounded by banner and progress lines:
//!
//! ```text
//! size=N/A time=00:00:10.00 bitrate=N/A speed= 484x
//! [Parsed_loudnorm_0 @ 0x55d5c8a0c2c0]
//! {
//!     "input_i" : "-20.02",
//!     "input_tp" : "-19.99",
//!     ...
//!     "target_offset" : "0.01"
//! }
//! ```
//!
//! [`parse_metrics`] isolates the first multi-line `{ ... }` block and parses
//! it. Values are JSON strings and may be `"-inf"` for silent input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Which mode loudnorm used (or would use) for the correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationType {
    /// Single gain applied to the whole file
    Linear,
    /// Adaptive gain, used when linear would violate TP or LRA targets
    Dynamic,
}

impl FromStr for NormalizationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(NormalizationType::Linear),
            "dynamic" => Ok(NormalizationType::Dynamic),
            other => Err(format!("unknown normalization type: {other}")),
        }
    }
}

impl fmt::Display for NormalizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationType::Linear => f.write_str("linear"),
            NormalizationType::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// Loudness metrics measured by the first pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoudnessMetrics {
    /// Integrated loudness in LUFS
    pub input_i: f64,
    /// True peak in dBTP
    pub input_tp: f64,
    /// Loudness range in LU
    pub input_lra: f64,
    /// Gating threshold in LUFS
    pub input_thresh: f64,
    /// Offset to feed back into the correction pass, in LU
    pub target_offset: f64,

    pub output_i: Option<f64>,
    pub output_tp: Option<f64>,
    pub output_lra: Option<f64>,
    pub output_thresh: Option<f64>,
    pub normalization_type: Option<NormalizationType>,

    /// Size of the measured file in bytes
    pub file_size: u64,
}

/// Why diagnostic text could not be turned into metrics
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("no statistics block found in tool output")]
    NoBlock,

    #[error("statistics block is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("statistics block has no \"{0}\" entry")]
    MissingField(&'static str),

    #[error("\"{field}\" is not a number: {value:?}")]
    NotNumeric { field: &'static str, value: String },
}

/// A value as loudnorm prints it: normally a string, tolerated as a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reading {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawStats {
    input_i: Option<Reading>,
    input_tp: Option<Reading>,
    input_lra: Option<Reading>,
    input_thresh: Option<Reading>,
    output_i: Option<Reading>,
    output_tp: Option<Reading>,
    output_lra: Option<Reading>,
    output_thresh: Option<Reading>,
    normalization_type: Option<String>,
    target_offset: Option<Reading>,
}

fn block_regex() -> &'static Regex {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    // `{` ending its line, lazily up to the first `}` starting a line
    BLOCK.get_or_init(|| Regex::new(r"(?s)\{[\r\n].*?[\r\n][ \t]*\}").expect("static pattern"))
}

/// Locate the first multi-line JSON object in diagnostic text
pub fn extract_json_block(diagnostics: &str) -> Option<&str> {
    block_regex().find(diagnostics).map(|m| m.as_str())
}

fn parse_reading(value: &Reading) -> Option<f64> {
    match value {
        Reading::Number(v) => Some(*v),
        Reading::Text(s) => s.trim().parse().ok(),
    }
}

fn required(field: &'static str, value: Option<&Reading>) -> Result<f64, MetricsError> {
    let value = value.ok_or(MetricsError::MissingField(field))?;
    parse_reading(value).ok_or_else(|| MetricsError::NotNumeric {
        field,
        value: match value {
            Reading::Number(v) => v.to_string(),
            Reading::Text(s) => s.clone(),
        },
    })
}

fn optional(value: Option<&Reading>) -> Option<f64> {
    value.and_then(parse_reading)
}

/// Parse the loudnorm statistics embedded in `diagnostics`
pub fn parse_metrics(diagnostics: &str, file_size: u64) -> Result<LoudnessMetrics, MetricsError> {
    let block = extract_json_block(diagnostics).ok_or(MetricsError::NoBlock)?;
    let raw: RawStats = serde_json::from_str(block)?;

    Ok(LoudnessMetrics {
        input_i: required("input_i", raw.input_i.as_ref())?,
        input_tp: required("input_tp", raw.input_tp.as_ref())?,
        input_lra: required("input_lra", raw.input_lra.as_ref())?,
        input_thresh: required("input_thresh", raw.input_thresh.as_ref())?,
        target_offset: required("target_offset", raw.target_offset.as_ref())?,
        output_i: optional(raw.output_i.as_ref()),
        output_tp: optional(raw.output_tp.as_ref()),
        output_lra: optional(raw.output_lra.as_ref()),
        output_thresh: optional(raw.output_thresh.as_ref()),
        normalization_type: raw.normalization_type.and_then(|t| t.parse().ok()),
        file_size,
    })
}

#[cfg(test)]
pub(crate) const SAMPLE_STDERR: &str = "\
Input #0, wav, from 'speech.wav':
  Duration: 00:00:10.00, bitrate: 1411 kb/s
  Stream #0:0: Audio: pcm_s16le ([1][0][0][0] / 0x0001), 44100 Hz, 2 channels, s16, 1411 kb/s
Stream mapping:
  Stream #0:0 -> #0:0 (pcm_s16le (native) -> pcm_s16le (native))
Output #0, null, to 'pipe:':
  Stream #0:0: Audio: pcm_s16le, 192000 Hz, stereo, s16, 6144 kb/s
size=N/A time=00:00:10.00 bitrate=N/A speed= 484x
[Parsed_loudnorm_0 @ 0x55d5c8a0c2c0]
{
\t\"input_i\" : \"-20.02\",
\t\"input_tp\" : \"-19.99\",
\t\"input_lra\" : \"0.00\",
\t\"input_thresh\" : \"-30.02\",
\t\"output_i\" : \"-16.01\",
\t\"output_tp\" : \"-15.98\",
\t\"output_lra\" : \"0.00\",
\t\"output_thresh\" : \"-26.01\",
\t\"normalization_type\" : \"linear\",
\t\"target_offset\" : \"0.01\"
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_ffmpeg_stderr() {
        let metrics = parse_metrics(SAMPLE_STDERR, 1_764_044).unwrap();
        assert_eq!(metrics.input_i, -20.02);
        assert_eq!(metrics.input_tp, -19.99);
        assert_eq!(metrics.input_lra, 0.0);
        assert_eq!(metrics.input_thresh, -30.02);
        assert_eq!(metrics.target_offset, 0.01);
        assert_eq!(metrics.output_i, Some(-16.01));
        assert_eq!(metrics.normalization_type, Some(NormalizationType::Linear));
        assert_eq!(metrics.file_size, 1_764_044);
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = SAMPLE_STDERR.replace('\n', "\r\n");
        let metrics = parse_metrics(&text, 0).unwrap();
        assert_eq!(metrics.input_i, -20.02);
    }

    #[test]
    fn test_cr_only_line_endings() {
        let text = SAMPLE_STDERR.replace('\n', "\r");
        let metrics = parse_metrics(&text, 0).unwrap();
        assert_eq!(metrics.target_offset, 0.01);
    }

    #[test]
    fn test_first_block_wins() {
        let text = format!(
            "{}\n{{\n\t\"input_i\" : \"-99.00\"\n}}\n",
            SAMPLE_STDERR
        );
        let block = extract_json_block(&text).unwrap();
        assert!(block.contains("-20.02"));
        assert!(!block.contains("-99.00"));
    }

    #[test]
    fn test_inline_braces_are_not_a_block() {
        let text = "Metadata: {encoder: Lavf}\nsize=N/A\n";
        assert!(extract_json_block(text).is_none());
        assert!(matches!(parse_metrics(text, 0), Err(MetricsError::NoBlock)));
    }

    #[test]
    fn test_empty_output() {
        assert!(matches!(parse_metrics("", 0), Err(MetricsError::NoBlock)));
    }

    #[test]
    fn test_unterminated_block() {
        let cut = SAMPLE_STDERR.trim_end().trim_end_matches('}');
        assert!(matches!(parse_metrics(cut, 0), Err(MetricsError::NoBlock)));
    }

    #[test]
    fn test_block_with_invalid_json() {
        let text = "[Parsed_loudnorm_0 @ 0x1]\n{\n\t\"input_i\" : \"-20.0\",,\n}\n";
        assert!(matches!(parse_metrics(text, 0), Err(MetricsError::Json(_))));
    }

    #[test]
    fn test_missing_required_field() {
        let text = SAMPLE_STDERR.replace("\t\"input_tp\" : \"-19.99\",\n", "");
        assert!(matches!(
            parse_metrics(&text, 0),
            Err(MetricsError::MissingField("input_tp"))
        ));
    }

    #[test]
    fn test_non_numeric_field() {
        let text = SAMPLE_STDERR.replace("\"-30.02\"", "\"n/a\"");
        match parse_metrics(&text, 0) {
            Err(MetricsError::NotNumeric { field, value }) => {
                assert_eq!(field, "input_thresh");
                assert_eq!(value, "n/a");
            }
            other => panic!("Expected NotNumeric, got {:?}", other),
        }
    }

    #[test]
    fn test_infinite_values_parse() {
        let text = SAMPLE_STDERR
            .replace("\"-20.02\"", "\"-inf\"")
            .replace("\"-30.02\"", "\"-inf\"");
        let metrics = parse_metrics(&text, 0).unwrap();
        assert!(metrics.input_i.is_infinite());
        assert!(metrics.input_thresh.is_infinite());
    }

    #[test]
    fn test_numbers_instead_of_strings() {
        let text = "{\n\"input_i\": -20.5, \"input_tp\": -3, \"input_lra\": 4.2,\n\"input_thresh\": -31.0, \"target_offset\": 0.4\n}";
        let metrics = parse_metrics(text, 7).unwrap();
        assert_eq!(metrics.input_i, -20.5);
        assert_eq!(metrics.output_i, None);
        assert_eq!(metrics.normalization_type, None);
    }

    #[test]
    fn test_normalization_type_from_str() {
        assert_eq!("Dynamic".parse::<NormalizationType>(), Ok(NormalizationType::Dynamic));
        assert_eq!(" linear ".parse::<NormalizationType>(), Ok(NormalizationType::Linear));
        assert!("loud".parse::<NormalizationType>().is_err());
    }

    proptest! {
        /// Banner and progress noise around the block never changes the result
        #[test]
        fn noise_around_block_is_ignored(
            prefix in "[a-zA-Z0-9 :=@.\\[\\]/\n\r]{0,200}",
            suffix in "[a-zA-Z0-9 :=@.\\[\\]/\n\r]{0,200}",
        ) {
            let block_start = SAMPLE_STDERR.find("{\n").unwrap();
            let text = format!("{}\n{}{}", prefix, &SAMPLE_STDERR[block_start..], suffix);
            let metrics = parse_metrics(&text, 1).unwrap();
            prop_assert_eq!(metrics.input_i, -20.02);
            prop_assert_eq!(metrics.target_offset, 0.01);
        }
    }
}
