//! Raw and classified form fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Section number meaning "no rule matched".
pub const UNCLASSIFIED: u32 = 0;

/// A form-field identifier as extracted from the PDF.
///
/// Only `name` is read by the classifier; the rest passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

impl RawField {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            value: None,
            page: None,
            field_type: None,
        }
    }
}

/// A raw field with its section assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedField {
    #[serde(flatten)]
    pub field: RawField,
    /// [`UNCLASSIFIED`] when no rule matched.
    pub section: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<u32>,
    pub confidence: f32,
    /// Matched by a section-specific rule rather than a generic fallback.
    pub is_explicitly_detected: bool,
    #[serde(default)]
    pub was_moved_by_healing: bool,
}

impl ClassifiedField {
    pub fn unclassified(field: RawField) -> Self {
        Self {
            field,
            section: UNCLASSIFIED,
            subsection: None,
            entry: None,
            confidence: 0.0,
            is_explicitly_detected: false,
            was_moved_by_healing: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    pub fn is_classified(&self) -> bool {
        self.section != UNCLASSIFIED
    }

    /// Move the field to another section. Confidence and the explicit-detection
    /// flag describe the original assignment and stay as they are.
    pub fn reassign(&mut self, section: u32, subsection: Option<String>, entry: Option<u32>) {
        self.section = section;
        self.subsection = subsection;
        self.entry = entry;
        self.was_moved_by_healing = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_field_reads_extraction_records() {
        let raw: RawField = serde_json::from_value(json!({
            "name": "form1[0].Sections7-9[0].RadioButtonList[1]",
            "id": "9782 0 R",
            "value": "NO",
            "page": 12,
            "type": "PDFRadioGroup",
            "label": "ignored"
        }))
        .unwrap();
        assert_eq!(raw.page, Some(12));
        assert_eq!(raw.field_type.as_deref(), Some("PDFRadioGroup"));
    }

    #[test]
    fn classified_field_is_flat_camel_case() {
        let mut f = ClassifiedField::unclassified(RawField::named("form1[0].Section4[0].SSN[0]"));
        f.reassign(4, Some("4.1".into()), Some(0));

        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["name"], "form1[0].Section4[0].SSN[0]");
        assert_eq!(v["section"], 4);
        assert_eq!(v["wasMovedByHealing"], true);
        assert_eq!(v["isExplicitlyDetected"], false);

        let back: ClassifiedField = serde_json::from_value(v).unwrap();
        assert_eq!(back, f);
    }
}
