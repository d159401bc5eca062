//! Line decoder: one raw meter line to one [`Reading`].
//!
//! The meter emits newline-delimited XML records shaped like
//!
//! ```text
//! <msg><src>CC128-v0.11</src><tmpr>21.5</tmpr><ch1><watts>01200</watts></ch1></msg>
//! ```
//!
//! with any subset of `tmpr`, `tmprF`, `ch1/watts`, `ch2/watts` present.
//! Decoding is total and idempotent: the same bytes always produce the same
//! result, and no input can do worse than return a [`DecodeError`]. Failures
//! are local to the line — the caller logs and moves on.

use serde::Deserialize;
use thiserror::Error;

use super::reading::Reading;

/// Why a line failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line is not valid UTF-8.
    #[error("line is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The line is not a well-formed `<msg>` record (malformed markup,
    /// truncated line, or a different root element).
    #[error("line is not a meter record: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// Wire shape of a meter record. The enum forces the root element to be
/// `<msg>`; any other root is a decode failure, same as malformed markup.
#[derive(Debug, Deserialize)]
enum RawRecord {
    #[serde(rename = "msg")]
    Msg(RawMsg),
}

#[derive(Debug, Deserialize)]
struct RawMsg {
    tmpr: Option<String>,
    #[serde(rename = "tmprF")]
    tmpr_f: Option<String>,
    ch1: Option<RawChannel>,
    ch2: Option<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    watts: Option<String>,
}

/// Decodes one line of raw bytes into a [`Reading`].
pub fn decode_line(line: &[u8]) -> Result<Reading, DecodeError> {
    let text = std::str::from_utf8(line)?;
    let RawRecord::Msg(msg) = quick_xml::de::from_str(text)?;

    Ok(Reading {
        temperature_c: numeric(msg.tmpr),
        temperature_f: numeric(msg.tmpr_f),
        channel1_watts: numeric(msg.ch1.and_then(|c| c.watts)),
        channel2_watts: numeric(msg.ch2.and_then(|c| c.watts)),
    })
}

/// A field is present only if its tag carried parseable numeric content.
/// Anything else maps to the absent state, not to an error: a meter that
/// writes garbage into one tag should not invalidate the rest of the record.
fn numeric(value: Option<String>) -> Option<String> {
    let value = value?;
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Some(value),
        _ => None,
    }
}
