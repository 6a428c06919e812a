use cdr_config::ResolverConfig;
use cdr_core::{IdentifierKind, NodeId};

/// Maps raw identifiers onto canonical node ids.
///
/// Phone numbers are reduced to digits and rewritten to the configured
/// country-code form only when the prefix is unambiguous: an explicit `+` or
/// international dialing prefix, an existing country code followed by enough
/// subscriber digits, or a trunk prefix followed by enough subscriber digits.
/// Anything else passes through as bare digits. Alphanumeric sender ids (for
/// example VAS short names) are kept verbatim, uppercased.
#[derive(Debug, Clone, Default)]
pub struct EntityResolver {
    config: ResolverConfig,
}

impl EntityResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// `None` means the slot carries no identifier and must not produce a node.
    pub fn canonicalize(&self, raw: &str, kind: IdentifierKind) -> Option<NodeId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        match kind {
            IdentifierKind::Phone => Some(self.canonicalize_phone(trimmed)),
            IdentifierKind::Imei | IdentifierKind::Location => Some(trimmed.to_uppercase()),
        }
    }

    fn canonicalize_phone(&self, raw: &str) -> NodeId {
        if raw.chars().any(char::is_alphabetic) {
            return raw.to_uppercase();
        }

        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return raw.to_owned();
        }

        let country_code = self.config.country_code.as_str();
        if country_code.is_empty() || !country_code.chars().all(|ch| ch.is_ascii_digit()) {
            return digits;
        }

        let mut explicit_international = raw.starts_with('+');
        let mut digits = digits.as_str();
        let international = self.config.international_prefix.as_str();
        if !explicit_international
            && !international.is_empty()
            && digits.len() > international.len()
            && digits.starts_with(international)
        {
            digits = &digits[international.len()..];
            explicit_international = true;
        }

        let min_subscriber = self.config.min_subscriber_digits;
        if digits.starts_with(country_code) && digits.len() >= country_code.len() + min_subscriber
        {
            return digits.to_owned();
        }
        if explicit_international {
            return digits.to_owned();
        }

        let trunk = self.config.trunk_prefix.as_str();
        if !trunk.is_empty()
            && digits.starts_with(trunk)
            && digits.len() >= trunk.len() + min_subscriber
        {
            return format!("{country_code}{}", &digits[trunk.len()..]);
        }

        tracing::debug!(
            raw = raw,
            "phone number prefix is ambiguous, keeping digits unnormalized"
        );
        digits.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn phone(raw: &str) -> Option<NodeId> {
        EntityResolver::default().canonicalize(raw, IdentifierKind::Phone)
    }

    #[test]
    fn equivalent_phone_formats_share_one_id() {
        let expected = Some("6281234567890".to_owned());
        assert_eq!(phone("6281234567890"), expected);
        assert_eq!(phone("081234567890"), expected);
        assert_eq!(phone("+6281234567890"), expected);
        assert_eq!(phone("+62 812-3456-7890"), expected);
        assert_eq!(phone("006281234567890"), expected);
    }

    #[test]
    fn short_or_unprefixed_numbers_pass_through() {
        assert_eq!(phone("3636"), Some("3636".to_owned()));
        assert_eq!(phone("08123"), Some("08123".to_owned()));
        assert_eq!(phone("81234567890"), Some("81234567890".to_owned()));
        assert_eq!(phone("+1 415 555 0100"), Some("14155550100".to_owned()));
    }

    #[test]
    fn alphanumeric_sender_ids_are_uppercased() {
        assert_eq!(phone(" Telkomsel "), Some("TELKOMSEL".to_owned()));
    }

    #[test]
    fn empty_identifiers_produce_no_node() {
        assert_eq!(phone("   "), None);
        let resolver = EntityResolver::default();
        assert_eq!(resolver.canonicalize("", IdentifierKind::Imei), None);
    }

    #[test]
    fn device_and_location_codes_are_trimmed_and_uppercased() {
        let resolver = EntityResolver::default();
        assert_eq!(
            resolver.canonicalize(" 356912078685274 ", IdentifierKind::Imei),
            Some("356912078685274".to_owned())
        );
        assert_eq!(
            resolver.canonicalize("0941a_47092", IdentifierKind::Location),
            Some("0941A_47092".to_owned())
        );
    }

    #[test]
    fn custom_country_code_is_honored() {
        let resolver = EntityResolver::new(ResolverConfig {
            country_code: "44".to_owned(),
            min_subscriber_digits: 9,
            ..ResolverConfig::default()
        });
        assert_eq!(
            resolver.canonicalize("07700 900123", IdentifierKind::Phone),
            Some("447700900123".to_owned())
        );
    }

    #[test]
    fn trunk_prefix_one_digit_short_passes_through_with_debug_log() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let (short, long) = tracing::subscriber::with_default(subscriber, || {
            (phone("0812-3456"), phone("0812-34567"))
        });

        assert_eq!(short, Some("08123456".to_owned()));
        assert_eq!(long, Some("6281234567".to_owned()));
        let output = log.contents();
        assert!(output.contains("phone number prefix is ambiguous"), "{output}");
        assert!(output.contains("0812-3456"), "{output}");
        assert_eq!(output.matches("prefix is ambiguous").count(), 1, "{output}");
    }
}
