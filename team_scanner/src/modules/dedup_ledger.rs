use chrono::{DateTime, Utc};
use std::collections::HashSet;

// An accepted payload and when it was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub qr_code: String,
    pub timestamp: DateTime<Utc>,
}

// Session-scoped record of accepted payloads.
// Payloads are compared byte for byte, so "abc" and "abc " are two different
// codes; encoders have to produce stable output for dedup to hold
#[derive(Debug, Default)]
pub struct DedupLedger {
    // Accepted entries in acceptance order
    entries: Vec<ScanEntry>,
    // Payloads in `entries`, for lookups
    seen: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, payload: &str) -> bool {
        self.seen.contains(payload)
    }

    // Returns false and leaves the ledger untouched if the payload is already present
    pub fn add(&mut self, payload: &str, timestamp: DateTime<Utc>) -> bool {
        if !self.seen.insert(payload.to_string()) {
            return false;
        }
        self.entries.push(ScanEntry {
            qr_code: payload.to_string(),
            timestamp,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_has() {
        let mut ledger = DedupLedger::new();
        assert!(ledger.is_empty());
        assert!(!ledger.has("Team Name: Alpha"));

        assert!(ledger.add("Team Name: Alpha", Utc::now()));
        assert!(ledger.has("Team Name: Alpha"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn repeated_add_is_ignored() {
        let mut ledger = DedupLedger::new();
        let first = Utc::now();

        assert!(ledger.add("code", first));
        assert!(!ledger.add("code", first + chrono::Duration::seconds(5)));

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries()[0].timestamp, first);
    }

    #[test]
    fn comparison_is_exact() {
        let mut ledger = DedupLedger::new();
        ledger.add("code", Utc::now());

        assert!(!ledger.has("code "));
        assert!(!ledger.has("CODE"));
        assert!(ledger.add("code ", Utc::now()));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.entries()[1].qr_code, "code ");
    }
}
