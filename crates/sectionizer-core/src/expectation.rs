//! Expected per-section counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reference counts for one section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionExpectation {
    pub fields: u32,
    #[serde(default)]
    pub entries: u32,
    #[serde(default)]
    pub subsections: u32,
}

impl SectionExpectation {
    pub fn fields(fields: u32) -> Self {
        Self {
            fields,
            entries: 0,
            subsections: 0,
        }
    }

    /// A section with any expected fields must not come out empty.
    pub fn is_mandatory(&self) -> bool {
        self.fields > 0
    }
}

/// Section number → expected counts. Sections absent from the table are
/// never flagged.
pub type ExpectationTable = BTreeMap<u32, SectionExpectation>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_parses_numeric_keys() {
        let table: ExpectationTable = serde_json::from_str(
            r#"{"5": {"fields": 45}, "18": {"fields": 947, "entries": 4, "subsections": 6}}"#,
        )
        .unwrap();
        assert_eq!(table[&5], SectionExpectation::fields(45));
        assert_eq!(table[&18].entries, 4);
        assert!(table[&18].is_mandatory());
    }
}
