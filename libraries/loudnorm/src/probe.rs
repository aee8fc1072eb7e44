//! Typed view of `ffprobe -print_format json` output
//!
//! Every field is optional: a missing or oddly shaped entry means "no audio
//! stream" or "no duration", never a hard failure.

use serde::Deserialize;
use serde_json::Value;

/// Subset of the ffprobe JSON document we ask for
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
}

/// Container-level entries (`-show_entries format=duration`)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProbeFormat {
    /// ffprobe prints it as a string, `"N/A"` when unknown
    #[serde(default)]
    pub duration: Option<Value>,
}

impl ProbeReport {
    /// Parse ffprobe stdout, `None` if it is not the expected JSON shape
    pub fn parse(stdout: &[u8]) -> Option<Self> {
        serde_json::from_slice(stdout).ok()
    }

    /// Codec type of the first selected stream
    pub fn first_codec_type(&self) -> Option<&str> {
        self.streams.first().and_then(|s| s.codec_type.as_deref())
    }

    pub fn has_audio_stream(&self) -> bool {
        self.first_codec_type() == Some("audio")
    }

    /// Container duration in seconds, if ffprobe knew it
    pub fn duration_secs(&self) -> Option<f64> {
        let secs = match self.format.as_ref()?.duration.as_ref()? {
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            Value::Number(n) => n.as_f64()?,
            _ => return None,
        };
        (secs.is_finite() && secs >= 0.0).then_some(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_stream() {
        let stdout = br#"{
    "programs": [

    ],
    "streams": [
        {
            "codec_type": "audio"
        }
    ]
}"#;
        let report = ProbeReport::parse(stdout).unwrap();
        assert_eq!(report.first_codec_type(), Some("audio"));
        assert!(report.has_audio_stream());
    }

    #[test]
    fn test_no_streams_key() {
        // ffprobe -loglevel quiet on a text file prints an empty object
        let report = ProbeReport::parse(b"{\n\n}\n").unwrap();
        assert_eq!(report.first_codec_type(), None);
        assert!(!report.has_audio_stream());
    }

    #[test]
    fn test_empty_streams() {
        let report = ProbeReport::parse(br#"{"streams": []}"#).unwrap();
        assert!(!report.has_audio_stream());
    }

    #[test]
    fn test_stream_without_codec_type() {
        let report = ProbeReport::parse(br#"{"streams": [{"index": 0}]}"#).unwrap();
        assert_eq!(report.first_codec_type(), None);
        assert!(!report.has_audio_stream());
    }

    #[test]
    fn test_non_audio_codec_type() {
        let report = ProbeReport::parse(br#"{"streams": [{"codec_type": "video"}]}"#).unwrap();
        assert!(!report.has_audio_stream());
    }

    #[test]
    fn test_format_duration() {
        let stdout = br#"{
    "programs": [

    ],
    "streams": [
        {
            "codec_type": "audio"
        }
    ],
    "format": {
        "duration": "10.031000"
    }
}"#;
        let report = ProbeReport::parse(stdout).unwrap();
        assert!(report.has_audio_stream());
        assert_eq!(report.duration_secs(), Some(10.031));
    }

    #[test]
    fn test_unknown_duration() {
        let na = ProbeReport::parse(br#"{"format": {"duration": "N/A"}}"#).unwrap();
        assert_eq!(na.duration_secs(), None);

        let missing = ProbeReport::parse(br#"{"format": {}}"#).unwrap();
        assert_eq!(missing.duration_secs(), None);

        let no_format = ProbeReport::parse(br#"{"streams": []}"#).unwrap();
        assert_eq!(no_format.duration_secs(), None);

        let negative = ProbeReport::parse(br#"{"format": {"duration": "-1.0"}}"#).unwrap();
        assert_eq!(negative.duration_secs(), None);

        let odd = ProbeReport::parse(br#"{"format": {"duration": [1]}}"#).unwrap();
        assert_eq!(odd.duration_secs(), None);
    }

    #[test]
    fn test_numeric_duration() {
        let report = ProbeReport::parse(br#"{"format": {"duration": 4.5}}"#).unwrap();
        assert_eq!(report.duration_secs(), Some(4.5));
    }

    #[test]
    fn test_malformed_output() {
        assert!(ProbeReport::parse(b"").is_none());
        assert!(ProbeReport::parse(b"not json at all").is_none());
        assert!(ProbeReport::parse(br#"{"streams": "audio"}"#).is_none());
        assert!(ProbeReport::parse(br#"{"streams": [{"codec_type": 1}]}"#).is_none());
    }
}
