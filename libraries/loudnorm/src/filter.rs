/// loudnorm filter graphs for both passes
use crate::metrics::LoudnessMetrics;
use crate::settings::NormalizerSettings;

/// Measurement-only filter, statistics printed as JSON
pub fn measurement_filter(target_lufs: f64, settings: &NormalizerSettings) -> String {
    format!(
        "loudnorm=I={}:dual_mono={}:TP={}:LRA={}:print_format=json",
        target_lufs, settings.dual_mono, settings.true_peak_dbtp, settings.loudness_range_lu
    )
}

/// Correction filter fed with first-pass measurements, linear gain mode
pub fn correction_filter(
    target_lufs: f64,
    settings: &NormalizerSettings,
    metrics: &LoudnessMetrics,
) -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}:measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}:offset={}:linear=true:print_format=summary",
        target_lufs,
        settings.true_peak_dbtp,
        settings.loudness_range_lu,
        metrics.input_i,
        metrics.input_tp,
        metrics.input_lra,
        metrics.input_thresh,
        metrics.target_offset,
    )
}
