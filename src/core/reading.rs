//! The decoded telemetry record.

/// One decoded meter record.
///
/// Every field is genuinely optional: `None` means the tag was missing from
/// the source line (or carried non-numeric content), which is distinct from
/// a present reading of zero watts. Values are kept as the raw decoded
/// strings so the published payload is byte-for-byte what the meter sent —
/// `"01200"` stays `"01200"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reading {
    /// Temperature in Celsius (`<tmpr>`).
    pub temperature_c: Option<String>,

    /// Temperature in Fahrenheit (`<tmprF>`). Decoded but not published.
    pub temperature_f: Option<String>,

    /// Channel 1 power in watts (`<ch1><watts>`). Presence of this field is
    /// what qualifies a reading for publishing.
    pub channel1_watts: Option<String>,

    /// Channel 2 power in watts (`<ch2><watts>`). Decoded but not published.
    pub channel2_watts: Option<String>,
}

impl Reading {
    /// True when the record carries nothing the pipeline could ever use.
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_none()
            && self.temperature_f.is_none()
            && self.channel1_watts.is_none()
            && self.channel2_watts.is_none()
    }
}
