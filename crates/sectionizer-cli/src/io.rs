//! File loading and writing for the CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sectionizer_core::{ClassifiedField, ExpectationTable, RawField};
use sectionizer_engine::SectionizerConfig;
use sectionizer_engine::report::SectionReference;
use sectionizer_engine::repository::{self, LoadedRules};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Raw field input: either a bare array or a document with a `fields` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FieldsInput {
    List(Vec<RawField>),
    Document {
        fields: Vec<RawField>,
        #[serde(default)]
        #[allow(dead_code, reason = "accepted for compatibility, not used")]
        metadata: Option<serde_json::Value>,
    },
}

impl FieldsInput {
    pub fn into_fields(self) -> Vec<RawField> {
        match self {
            Self::List(fields) => fields,
            Self::Document { fields, .. } => fields,
        }
    }
}

/// Classified input: a bare array (`classify`), or any document carrying a
/// `fields` list (`validate --output`, an exported `section-<N>.json`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ClassifiedInput {
    List(Vec<ClassifiedField>),
    Document { fields: Vec<ClassifiedField> },
}

impl ClassifiedInput {
    pub fn into_fields(self) -> Vec<ClassifiedField> {
        match self {
            Self::List(fields) | Self::Document { fields } => fields,
        }
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Pretty JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match path {
        Some(p) => fs::write(p, text + "\n").with_context(|| format!("writing {}", p.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

pub fn read_fields(path: &Path) -> anyhow::Result<Vec<RawField>> {
    let input: FieldsInput = read_json(path)?;
    Ok(input.into_fields())
}

pub fn read_classified(path: &Path) -> anyhow::Result<Vec<ClassifiedField>> {
    let input: ClassifiedInput = read_json(path)?;
    Ok(input.into_fields())
}

pub fn read_expectations(path: &Path) -> anyhow::Result<ExpectationTable> {
    read_json(path)
}

/// Load and merge rule documents in the order given.
pub fn read_rules(paths: &[PathBuf]) -> anyhow::Result<LoadedRules> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let document = repository::parse_document(&text)
            .with_context(|| format!("parsing rule document {}", path.display()))?;
        documents.push(document);
    }
    repository::load(documents).context("loading rules")
}

/// Defaults when no file is given.
pub fn read_config(path: Option<&Path>) -> anyhow::Result<SectionizerConfig> {
    let Some(path) = path else {
        return Ok(SectionizerConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SectionizerConfig::from_json(&text)
        .with_context(|| format!("invalid config {}", path.display()))
}

/// Write `section-<N>.json` for every section; returns the paths written.
pub fn export_sections(
    dir: &Path,
    references: &BTreeMap<u32, SectionReference>,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::with_capacity(references.len());
    for (section, reference) in references {
        let path = dir.join(format!("section-{section}.json"));
        write_json(Some(&path), reference)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sectionizer_engine::report::section_references;

    #[test]
    fn fields_from_array_or_document() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.json");
        let doc = dir.path().join("doc.json");
        fs::write(&list, r#"[{"name": "form1[0].Section1[0].Name[0]"}]"#).unwrap();
        fs::write(
            &doc,
            r#"{"metadata": {"sectionId": 1}, "fields": [
                {"name": "a", "id": "9 0 R", "page": 2, "type": "PDFTextField"},
                {"name": "b", "value": true}
            ]}"#,
        )
        .unwrap();

        let a = read_fields(&list).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].name, "form1[0].Section1[0].Name[0]");

        let b = read_fields(&doc).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].page, Some(2));
        assert_eq!(b[0].field_type.as_deref(), Some("PDFTextField"));
    }

    #[test]
    fn classified_from_array_or_run_output() {
        let dir = tempfile::tempdir().unwrap();
        let name = "form1[0].#subform[4].SSN[0]";
        let mut healed = ClassifiedField::unclassified(RawField::named(name));
        healed.section = 4;
        healed.confidence = 0.3;
        healed.was_moved_by_healing = true;
        let fields = vec![healed, ClassifiedField::unclassified(RawField::named("stray"))];

        let list = dir.path().join("classified.json");
        write_json(Some(&list), &fields).unwrap();
        assert_eq!(read_classified(&list).unwrap(), fields);

        let run = dir.path().join("run.json");
        let document = serde_json::json!({
            "removed": [],
            "diagnostics": [],
            "healingMoves": [{"fieldIndex": 0, "fromSection": 18, "toSection": 4}],
            "fields": fields,
        });
        write_json(Some(&run), &document).unwrap();
        let back = read_classified(&run).unwrap();
        assert_eq!(back, fields);
        assert!(back[0].was_moved_by_healing);
    }

    #[test]
    fn rules_merge_across_files_and_report_bad_records() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.json");
        let two = dir.path().join("two.json");
        fs::write(&one, r#"{"1": [{"pattern": "Section1\\[", "confidence": 0.9}]}"#).unwrap();
        fs::write(
            &two,
            r#"{"2": [
                {"pattern": "Section2\\[", "confidence": 0.9},
                {"pattern": "(", "confidence": 0.5}
            ]}"#,
        )
        .unwrap();

        let loaded = read_rules(&[one, two]).unwrap();
        assert_eq!(loaded.rules.rule_count(), 2);
        assert_eq!(loaded.rejected.len(), 1);
        assert_eq!(loaded.rejected[0].source, 1);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_fields(Path::new("/nonexistent/fields.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fields.json"));
    }

    #[test]
    fn config_defaults_without_file() {
        let config = read_config(None).unwrap();
        assert!(config.healing.enabled);
    }

    #[test]
    fn export_writes_one_file_per_section() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = ClassifiedField::unclassified(RawField::named("form1[0].Section5[0].Name[0]"));
        f.section = 5;
        let fields = vec![f, ClassifiedField::unclassified(RawField::named("stray"))];
        let refs = section_references(&fields, chrono::Utc::now());

        let out = dir.path().join("sections");
        let written = export_sections(&out, &refs).unwrap();
        assert_eq!(written.len(), 2);
        assert!(out.join("section-0.json").exists());

        let back: SectionReference = read_json(&out.join("section-5.json")).unwrap();
        assert_eq!(back.metadata.section_id, 5);
        assert_eq!(back.fields, vec![fields[0].clone()]);
    }
}
