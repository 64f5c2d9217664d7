//! PII redaction (DLP).
//!
//! Message contents are rewritten before fingerprinting so the caches are
//! keyed on redacted text and identical requests redact to the same slot.
//!
//! Scrubbing never fails a request: any detector error forwards the original
//! text and is logged. That trade (availability over privacy) is deliberate.

mod detector;

pub use detector::{DetectorError, PiiDetector, PiiKind, PiiSpan, RegexDetector};

use tracing::{debug, warn};

use crate::api::ChatRequest;

/// Replaces every detected span in `text` with its typed placeholder.
///
/// Overlapping spans are resolved earliest-start-wins (longest on ties);
/// replacement runs right-to-left so earlier offsets stay valid. Empty input
/// passes through untouched. Idempotent: placeholders contain nothing the
/// built-in patterns match.
pub fn scrub_text(detector: &dyn PiiDetector, text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }

    let mut spans = match detector.detect(text) {
        Ok(spans) => spans,
        Err(error) => {
            warn!(error = %error, "PII detection failed; forwarding original text");
            return text.to_string();
        }
    };

    if spans.is_empty() {
        return text.to_string();
    }

    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut kept: Vec<PiiSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match kept.last() {
            Some(previous) if span.start < previous.end => continue,
            _ => kept.push(span),
        }
    }

    let mut scrubbed = text.to_string();
    for span in kept.iter().rev() {
        scrubbed.replace_range(span.start..span.end, span.kind.placeholder());
    }

    scrubbed
}

/// Scrubs every message content of a validated request in place.
pub fn scrub_request(detector: &dyn PiiDetector, request: &mut ChatRequest) {
    for message in &mut request.messages {
        let scrubbed = scrub_text(detector, &message.content);
        if scrubbed != message.content {
            debug!(
                role = message.role.as_str(),
                original_len = message.content.len(),
                "redacted PII from message content"
            );
            message.content = scrubbed;
        }
    }
}
