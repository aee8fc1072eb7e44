//! Parser for the `print_format=summary` report of the correction pass

use crate::metrics::NormalizationType;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Before/after loudness as reported by the correction pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionSummary {
    pub input_integrated: f64,
    pub input_true_peak: f64,
    pub input_lra: f64,
    pub input_threshold: f64,
    pub output_integrated: f64,
    pub output_true_peak: f64,
    pub output_lra: f64,
    pub output_threshold: f64,
    pub normalization_type: NormalizationType,
    pub target_offset: f64,
}

fn line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*([A-Za-z][A-Za-z ]*?):[ \t]+(\S+)").expect("static pattern")
    })
}

/// Parse the summary block, `None` if any entry is missing or malformed
///
/// Later occurrences of a label win, since the summary is printed last.
pub fn parse_summary(text: &str) -> Option<CorrectionSummary> {
    let mut entries: HashMap<&str, &str> = HashMap::new();
    for caps in line_regex().captures_iter(text) {
        if let (Some(label), Some(value)) = (caps.get(1), caps.get(2)) {
            entries.insert(label.as_str(), value.as_str());
        }
    }

    let number = |label: &str| -> Option<f64> { entries.get(label)?.parse().ok() };

    Some(CorrectionSummary {
        input_integrated: number("Input Integrated")?,
        input_true_peak: number("Input True Peak")?,
        input_lra: number("Input LRA")?,
        input_threshold: number("Input Threshold")?,
        output_integrated: number("Output Integrated")?,
        output_true_peak: number("Output True Peak")?,
        output_lra: number("Output LRA")?,
        output_threshold: number("Output Threshold")?,
        normalization_type: entries.get("Normalization Type")?.parse().ok()?,
        target_offset: number("Target Offset")?,
    })
}

#[cfg(test)]
pub(crate) const SAMPLE_SUMMARY: &str = "\
Output #0, wav, to 'misc/normalized/speech.wav':
  Metadata:
    ISFT            : Lavf60.16.100
  Stream #0:0: Audio: pcm_s16le ([1][0][0][0] / 0x0001), 192000 Hz, stereo, s16, 6144 kb/s
size=    7500kB time=00:00:10.00 bitrate=6144.0kbits/s speed= 312x
[Parsed_loudnorm_0 @ 0x5581e9a8f280]
Input Integrated:    -20.0 LUFS
Input True Peak:     -20.0 dBTP
Input LRA:             0.0 LU
Input Threshold:     -30.0 LUFS

Output Integrated:   -16.0 LUFS
Output True Peak:    -16.0 dBTP
Output LRA:            0.0 LU
Output Threshold:    -26.0 LUFS

Normalization Type:   Linear
Target Offset:        +0.0 LU
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary() {
        let summary = parse_summary(SAMPLE_SUMMARY).unwrap();
        assert_eq!(summary.input_integrated, -20.0);
        assert_eq!(summary.output_integrated, -16.0);
        assert_eq!(summary.output_true_peak, -16.0);
        assert_eq!(summary.output_threshold, -26.0);
        assert_eq!(summary.normalization_type, NormalizationType::Linear);
        assert_eq!(summary.target_offset, 0.0);
    }

    #[test]
    fn test_dynamic_with_negative_offset() {
        let text = SAMPLE_SUMMARY
            .replace("Linear", "Dynamic")
            .replace("+0.0 LU", "-0.7 LU");
        let summary = parse_summary(&text).unwrap();
        assert_eq!(summary.normalization_type, NormalizationType::Dynamic);
        assert_eq!(summary.target_offset, -0.7);
    }

    #[test]
    fn test_crlf_summary() {
        let text = SAMPLE_SUMMARY.replace('\n', "\r\n");
        let summary = parse_summary(&text).unwrap();
        assert_eq!(summary.input_lra, 0.0);
    }

    #[test]
    fn test_incomplete_summary() {
        let text = SAMPLE_SUMMARY.replace("Output LRA:            0.0 LU\n", "");
        assert!(parse_summary(&text).is_none());
        assert!(parse_summary("").is_none());
    }

    #[test]
    fn test_unknown_normalization_type() {
        let text = SAMPLE_SUMMARY.replace("Linear", "Sideways");
        assert!(parse_summary(&text).is_none());
    }
}
