// manet-pcap-stats/src/classifier.rs
use crate::message::{MessageType, Protocol};
use crate::record::PacketRecord;

/// Maps one packet record to a control-message type.
///
/// Implementations are total and side-effect free: every record maps to
/// exactly one of the protocol's message types, `Other` by default.
pub trait Classifier {
    fn protocol(&self) -> Protocol;

    fn classify(&self, record: &PacketRecord) -> MessageType;
}

/// Reads the integer `aodv.type` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct AodvClassifier;

impl AodvClassifier {
    pub const TYPE_FIELD: &'static str = "aodv.type";
}

impl Classifier for AodvClassifier {
    fn protocol(&self) -> Protocol {
        Protocol::Aodv
    }

    fn classify(&self, record: &PacketRecord) -> MessageType {
        match record.field_u64(Self::TYPE_FIELD) {
            Some(1) => MessageType::Rreq,
            Some(2) => MessageType::Rrep,
            Some(3) => MessageType::Rerr,
            _ => MessageType::Other,
        }
    }
}

/// One ordered text rule: any keyword found in the lowercased rendering
/// selects `label`.
#[derive(Debug, Clone)]
pub struct TextRule {
    pub label: MessageType,
    pub keywords: Vec<String>,
}

impl TextRule {
    pub fn new(label: MessageType, keywords: &[&str]) -> Self {
        TextRule {
            label,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

/// Best-effort OLSR classification over the record's text rendering.
///
/// Rules are checked in order (HELLO, then TC, then MID) and the first hit
/// wins, so a packet bundling several messages counts once, as its
/// highest-priority type. The keywords are plain substrings: `tc` and `mid`
/// also hit unrelated words, so accuracy is bounded by how the decoder
/// renders packets. A missing message name gives `Other`.
#[derive(Debug, Clone)]
pub struct OlsrClassifier {
    rules: Vec<TextRule>,
}

impl OlsrClassifier {
    pub fn with_rules(rules: Vec<TextRule>) -> Self {
        OlsrClassifier { rules }
    }
}

impl Default for OlsrClassifier {
    fn default() -> Self {
        OlsrClassifier::with_rules(vec![
            TextRule::new(MessageType::Hello, &["olsr.message.hello", "hello"]),
            TextRule::new(MessageType::Tc, &["olsr.message.tc", "topology", "tc"]),
            TextRule::new(MessageType::Mid, &["olsr.message.mid", "interface", "mid"]),
        ])
    }
}

impl Classifier for OlsrClassifier {
    fn protocol(&self) -> Protocol {
        Protocol::Olsr
    }

    fn classify(&self, record: &PacketRecord) -> MessageType {
        let text = record.to_text().to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&text))
            .map(|rule| rule.label)
            .unwrap_or(MessageType::Other)
    }
}

/// Classifier selected by protocol at runtime.
#[derive(Debug, Clone)]
pub enum ProtocolClassifier {
    Aodv(AodvClassifier),
    Olsr(OlsrClassifier),
}

impl From<Protocol> for ProtocolClassifier {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Aodv => ProtocolClassifier::Aodv(AodvClassifier),
            Protocol::Olsr => ProtocolClassifier::Olsr(OlsrClassifier::default()),
        }
    }
}

impl Classifier for ProtocolClassifier {
    fn protocol(&self) -> Protocol {
        match self {
            ProtocolClassifier::Aodv(c) => c.protocol(),
            ProtocolClassifier::Olsr(c) => c.protocol(),
        }
    }

    fn classify(&self, record: &PacketRecord) -> MessageType {
        match self {
            ProtocolClassifier::Aodv(c) => c.classify(record),
            ProtocolClassifier::Olsr(c) => c.classify(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn aodv(code: Option<u64>) -> PacketRecord {
        let record = PacketRecord::new(1, 64).with_protocols(&["eth", "ip", "udp", "aodv"]);
        match code {
            Some(code) => record.with_field("aodv.type", code),
            None => record,
        }
    }

    fn olsr(messages: &[&str]) -> PacketRecord {
        PacketRecord::new(1, 90)
            .with_protocols(&["eth", "ip", "udp", "olsr"])
            .with_field("olsr.message", messages.to_vec())
    }

    #[rstest]
    #[case::zero(Some(0), MessageType::Other)]
    #[case::rreq(Some(1), MessageType::Rreq)]
    #[case::rrep(Some(2), MessageType::Rrep)]
    #[case::rerr(Some(3), MessageType::Rerr)]
    #[case::rrep_ack(Some(4), MessageType::Other)]
    #[case::unknown(Some(99), MessageType::Other)]
    #[case::absent(None, MessageType::Other)]
    fn test_aodv_type_codes(#[case] code: Option<u64>, #[case] expected: MessageType) {
        assert_eq!(AodvClassifier.classify(&aodv(code)), expected);
    }

    #[test]
    fn test_aodv_non_integer_type_is_other() {
        let record = aodv(None).with_field("aodv.type", "rreq");
        assert_eq!(AodvClassifier.classify(&record), MessageType::Other);
    }

    #[rstest]
    #[case::hello(&["hello"], MessageType::Hello)]
    #[case::tc(&["tc (topology control)"], MessageType::Tc)]
    #[case::mid(&["mid (multiple interface declaration)"], MessageType::Mid)]
    #[case::hna(&["hna (host and network association)"], MessageType::Other)]
    fn test_olsr_message_names(#[case] messages: &[&str], #[case] expected: MessageType) {
        assert_eq!(OlsrClassifier::default().classify(&olsr(messages)), expected);
    }

    #[test]
    fn test_olsr_hello_wins_over_tc() {
        let record = olsr(&["tc (topology control)", "hello"]);
        assert_eq!(OlsrClassifier::default().classify(&record), MessageType::Hello);
    }

    #[test]
    fn test_olsr_tc_wins_over_mid() {
        let record = olsr(&["mid (multiple interface declaration)", "tc (topology control)"]);
        assert_eq!(OlsrClassifier::default().classify(&record), MessageType::Tc);
    }

    #[test]
    fn test_olsr_matching_ignores_case() {
        let record = PacketRecord::new(1, 90).with_field("olsr.message", "HELLO");
        assert_eq!(OlsrClassifier::default().classify(&record), MessageType::Hello);
    }

    #[test]
    fn test_olsr_dotted_field_names_match() {
        let record = PacketRecord::new(1, 90).with_field("olsr.message.mid", 1u8);
        assert_eq!(OlsrClassifier::default().classify(&record), MessageType::Mid);
    }

    #[test]
    fn test_olsr_without_messages_is_other() {
        let record = PacketRecord::new(1, 60).with_protocols(&["eth", "ip", "udp", "olsr"]);
        assert_eq!(OlsrClassifier::default().classify(&record), MessageType::Other);
    }

    #[test]
    fn test_custom_rules_keep_order() {
        let classifier = OlsrClassifier::with_rules(vec![
            TextRule::new(MessageType::Mid, &["MID"]),
            TextRule::new(MessageType::Hello, &["hello"]),
        ]);
        let record = olsr(&["hello", "mid"]);
        assert_eq!(classifier.classify(&record), MessageType::Mid);
    }

    #[test]
    fn test_protocol_classifier_dispatch() {
        let aodv_classifier = ProtocolClassifier::from(Protocol::Aodv);
        let olsr_classifier = ProtocolClassifier::from(Protocol::Olsr);

        assert_eq!(aodv_classifier.protocol(), Protocol::Aodv);
        assert_eq!(olsr_classifier.protocol(), Protocol::Olsr);
        assert_eq!(aodv_classifier.classify(&aodv(Some(3))), MessageType::Rerr);
        assert_eq!(olsr_classifier.classify(&olsr(&["hello"])), MessageType::Hello);
    }
}
