//! PII detection.
//!
//! The scrubber consumes typed spans from a [`PiiDetector`]; the built-in
//! [`RegexDetector`] covers the pattern-detectable entity kinds. NER-style
//! kinds (person, location, national id, medical license) are part of the
//! placeholder vocabulary so an external analyzer can be plugged in behind
//! the same trait.

use regex::Regex;
use thiserror::Error;

/// Entity kinds the scrubber knows how to redact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiKind {
    /// Email address.
    EmailAddress,
    /// Phone number (US or international).
    PhoneNumber,
    /// Credit card number (Luhn-validated).
    CreditCard,
    /// Personal name.
    Person,
    /// Geographic location.
    Location,
    /// IBAN bank account code.
    IbanCode,
    /// US Social Security Number.
    UsSsn,
    /// IPv4 or IPv6 address.
    IpAddress,
    /// URL.
    Url,
    /// US driver license number.
    UsDriverLicense,
    /// US passport number.
    UsPassport,
    /// Date or timestamp.
    DateTime,
    /// Medical license number.
    MedicalLicense,
    /// National identity number (non-US).
    Nrp,
}

impl PiiKind {
    /// The literal placeholder token substituted for this kind.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiKind::EmailAddress => "<EMAIL_ADDRESS>",
            PiiKind::PhoneNumber => "<PHONE_NUMBER>",
            PiiKind::CreditCard => "<CREDIT_CARD>",
            PiiKind::Person => "<PERSON_NAME>",
            PiiKind::Location => "<LOCATION>",
            PiiKind::IbanCode => "<IBAN_CODE>",
            PiiKind::UsSsn => "<SSN>",
            PiiKind::IpAddress => "<IP_ADDRESS>",
            PiiKind::Url => "<URL>",
            PiiKind::UsDriverLicense => "<DRIVER_LICENSE>",
            PiiKind::UsPassport => "<PASSPORT>",
            PiiKind::DateTime => "<DATE_TIME>",
            PiiKind::MedicalLicense => "<MEDICAL_LICENSE>",
            PiiKind::Nrp => "<NATIONAL_ID>",
        }
    }
}

/// A detected PII occurrence as a byte span into the analyzed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiiSpan {
    /// Entity kind.
    pub kind: PiiKind,
    /// Span start (byte offset, inclusive).
    pub start: usize,
    /// Span end (byte offset, exclusive).
    pub end: usize,
}

/// Detector failures.
///
/// The scrubber swallows these; they exist so a detector backed by an
/// external service can report unavailability without panicking.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// A pattern failed to compile.
    #[error("invalid PII pattern for {kind:?}: {source}")]
    InvalidPattern {
        /// Which kind the pattern was for.
        kind: PiiKind,
        /// Compile failure.
        #[source]
        source: regex::Error,
    },

    /// The analysis itself failed.
    #[error("PII analysis failed: {reason}")]
    AnalysisFailed {
        /// Error message.
        reason: String,
    },
}

/// Text → typed spans.
pub trait PiiDetector: Send + Sync {
    /// Returns every detected span. Spans may overlap; the scrubber
    /// resolves overlaps.
    fn detect(&self, text: &str) -> Result<Vec<PiiSpan>, DetectorError>;
}

struct PiiPattern {
    regex: Regex,
    kind: PiiKind,
    /// Additional check applied to each match (e.g. Luhn for card numbers).
    validator: Option<fn(&str) -> bool>,
}

/// Built-in regex detector.
///
/// Patterns are compiled once at construction. Covers email, phone, credit
/// card, SSN, IP, URL, IBAN, and date-like strings.
pub struct RegexDetector {
    patterns: Vec<PiiPattern>,
}

impl RegexDetector {
    /// Compiles the full built-in pattern set.
    pub fn new() -> Result<Self, DetectorError> {
        let specs: Vec<(PiiKind, &str, Option<fn(&str) -> bool>)> = vec![
            (
                PiiKind::EmailAddress,
                r"(?i)[a-z0-9._%+-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)+",
                None,
            ),
            // US formats: (555) 123-4567, 555-123-4567, 555.123.4567.
            (
                PiiKind::PhoneNumber,
                r"\(?\d{3}\)?[-.\s]\d{3}[-.\s]?\d{4}\b",
                None,
            ),
            // International: +44 20 7946 0958.
            (
                PiiKind::PhoneNumber,
                r"\+[1-9]\d{0,2}[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,9}",
                None,
            ),
            (
                PiiKind::CreditCard,
                r"\b(?:4\d{3}|5[1-5]\d{2}|6(?:011|5\d{2}|4[4-9]\d)|3[47]\d{2})[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{1,4}\b",
                Some(validate_luhn as fn(&str) -> bool),
            ),
            (
                PiiKind::UsSsn,
                r"\b\d{3}-\d{2}-\d{4}\b",
                Some(validate_ssn as fn(&str) -> bool),
            ),
            (
                PiiKind::IpAddress,
                r"\b(?:(?:25[0-5]|2[0-4]\d|1\d{2}|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d{2}|[1-9]?\d)\b",
                None,
            ),
            (
                PiiKind::IpAddress,
                r"(?i)\b(?:[0-9a-f]{1,4}:){7}[0-9a-f]{1,4}\b",
                None,
            ),
            (PiiKind::Url, r#"\bhttps?://[^\s<>"']+"#, None),
            (
                PiiKind::IbanCode,
                r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b",
                None,
            ),
            // MM/DD/YYYY, DD-MM-YYYY, YYYY-MM-DD with 19xx/20xx years.
            (
                PiiKind::DateTime,
                r"\b(?:(?:0?[1-9]|1[0-2])[-/](?:0?[1-9]|[12]\d|3[01])[-/](?:19|20)\d{2}|(?:19|20)\d{2}[-/](?:0?[1-9]|1[0-2])[-/](?:0?[1-9]|[12]\d|3[01]))\b",
                None,
            ),
        ];

        let mut patterns = Vec::with_capacity(specs.len());
        for (kind, pattern, validator) in specs {
            let regex = Regex::new(pattern)
                .map_err(|e| DetectorError::InvalidPattern { kind, source: e })?;
            patterns.push(PiiPattern {
                regex,
                kind,
                validator,
            });
        }

        Ok(Self { patterns })
    }
}

impl PiiDetector for RegexDetector {
    fn detect(&self, text: &str) -> Result<Vec<PiiSpan>, DetectorError> {
        let mut spans = Vec::new();

        for pattern in &self.patterns {
            for found in pattern.regex.find_iter(text) {
                if let Some(validator) = pattern.validator
                    && !validator(found.as_str())
                {
                    continue;
                }
                spans.push(PiiSpan {
                    kind: pattern.kind,
                    start: found.start(),
                    end: found.end(),
                });
            }
        }

        Ok(spans)
    }
}

/// Luhn checksum over the digits of a candidate card number.
fn validate_luhn(number: &str) -> bool {
    let digits: Vec<u32> = number.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let mut sum = 0;
    let mut double = false;
    for &digit in digits.iter().rev() {
        let mut digit = digit;
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        double = !double;
    }

    sum % 10 == 0
}

/// Rejects SSN candidates in ranges the SSA never issues.
fn validate_ssn(candidate: &str) -> bool {
    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 9 {
        return false;
    }

    let area = &digits[0..3];
    let group = &digits[3..5];
    let serial = &digits[5..9];

    area != "000" && area != "666" && !area.starts_with('9') && group != "00" && serial != "0000"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_in(text: &str) -> Vec<PiiKind> {
        let detector = RegexDetector::new().expect("patterns compile");
        detector
            .detect(text)
            .expect("detection succeeds")
            .into_iter()
            .map(|s| s.kind)
            .collect()
    }

    #[test]
    fn test_detects_email() {
        assert!(kinds_in("reach me at a@b.com").contains(&PiiKind::EmailAddress));
    }

    #[test]
    fn test_detects_phone_formats() {
        for text in [
            "(555) 123-4567",
            "555-123-4567",
            "call +44 20 7946 0958 now",
        ] {
            assert!(
                kinds_in(text).contains(&PiiKind::PhoneNumber),
                "no phone in {text:?}"
            );
        }
    }

    #[test]
    fn test_credit_card_requires_luhn() {
        // 4111111111111111 passes Luhn; 4111111111111112 does not.
        assert!(kinds_in("card 4111 1111 1111 1111").contains(&PiiKind::CreditCard));
        assert!(!kinds_in("card 4111 1111 1111 1112").contains(&PiiKind::CreditCard));
    }

    #[test]
    fn test_ssn_valid_and_invalid_ranges() {
        assert!(kinds_in("ssn 123-45-6789").contains(&PiiKind::UsSsn));
        assert!(!kinds_in("ssn 000-45-6789").contains(&PiiKind::UsSsn));
        assert!(!kinds_in("ssn 666-45-6789").contains(&PiiKind::UsSsn));
        assert!(!kinds_in("ssn 900-45-6789").contains(&PiiKind::UsSsn));
    }

    #[test]
    fn test_detects_ip_and_url() {
        let kinds = kinds_in("see https://example.com/path from 192.168.1.1");
        assert!(kinds.contains(&PiiKind::Url));
        assert!(kinds.contains(&PiiKind::IpAddress));
    }

    #[test]
    fn test_detects_iban() {
        assert!(kinds_in("pay to DE89370400440532013000").contains(&PiiKind::IbanCode));
    }

    #[test]
    fn test_detects_dates() {
        assert!(kinds_in("born 04/12/1988").contains(&PiiKind::DateTime));
        assert!(kinds_in("since 2021-07-03").contains(&PiiKind::DateTime));
    }

    #[test]
    fn test_clean_text_yields_nothing() {
        assert!(kinds_in("What is the capital of France?").is_empty());
    }

    #[test]
    fn test_placeholders_are_angle_bracketed_and_unique() {
        let kinds = [
            PiiKind::EmailAddress,
            PiiKind::PhoneNumber,
            PiiKind::CreditCard,
            PiiKind::Person,
            PiiKind::Location,
            PiiKind::IbanCode,
            PiiKind::UsSsn,
            PiiKind::IpAddress,
            PiiKind::Url,
            PiiKind::UsDriverLicense,
            PiiKind::UsPassport,
            PiiKind::DateTime,
            PiiKind::MedicalLicense,
            PiiKind::Nrp,
        ];

        let mut seen = std::collections::HashSet::new();
        for kind in kinds {
            let token = kind.placeholder();
            assert!(token.starts_with('<') && token.ends_with('>'));
            assert!(seen.insert(token), "duplicate placeholder {token}");
        }
        assert_eq!(PiiKind::Person.placeholder(), "<PERSON_NAME>");
        assert_eq!(PiiKind::UsSsn.placeholder(), "<SSN>");
        assert_eq!(PiiKind::Nrp.placeholder(), "<NATIONAL_ID>");
    }
}
