//! Human-readable run summaries, printed to stdout.

use std::collections::BTreeSet;

use sectionizer_engine::report::{DuplicateName, SectionDistribution};
use sectionizer_engine::{
    DeviationStatus, HealingMove, RejectedRule, RemovedRule, SectionDeviation, ValidationResult,
};

const MAX_LIST_ITEMS: usize = 10;

// ── Rules ──

pub fn print_rejected(rejected: &[RejectedRule]) {
    if rejected.is_empty() {
        return;
    }
    println!("Rejected rules");
    for r in rejected {
        println!(
            "  {:<26} source {} section {} #{}: {}",
            r.pattern, r.source, r.section, r.index, r.error
        );
    }
    println!();
}

pub fn print_removed(removed: &[RemovedRule]) {
    if removed.is_empty() {
        return;
    }
    println!("Removed generic patterns");
    for r in removed {
        let sections: Vec<String> = r.sections.iter().map(u32::to_string).collect();
        println!(
            "  {:<26} sections {} ({:.2}..{:.2})",
            r.key,
            sections.join(", "),
            r.min_confidence,
            r.max_confidence
        );
    }
    println!();
}

// ── Validation ──

pub fn print_validation(header: &str, result: &ValidationResult) {
    println!("=== {header} ===");
    println!("  {:<26} {}", "total fields", result.total_fields);
    println!("  {:<26} {}", "unclassified", result.unknown_field_count);
    println!("  {:<26} {:.1}%", "alignment", result.alignment_percentage);
    println!("  {:<26} {}", "success", if result.success { "yes" } else { "no" });
    print_set("missing mandatory", &result.missing_mandatory_sections);
    print_set("undersized", &result.undersized_sections);
    print_set("oversized", &result.oversized_sections);
    print_set("unexpected", &result.unexpected_sections);
    println!();

    let flagged: Vec<&SectionDeviation> = result
        .deviations
        .iter()
        .filter(|d| d.status != DeviationStatus::Aligned)
        .collect();
    if flagged.is_empty() {
        return;
    }
    println!(
        "  {:<8} {:>9} {:>9} {:>8} {:>8}  status",
        "section", "expected", "actual", "delta", "%"
    );
    for d in flagged {
        println!(
            "  {:<8} {:>9} {:>9} {:>+8} {:>7.1}%  {}{}",
            d.section,
            d.expected_fields,
            d.actual_fields,
            d.field_deviation,
            d.field_deviation_percent,
            d.status.as_str(),
            if d.is_critical { " (critical)" } else { "" }
        );
    }
    println!();
}

fn print_set(label: &str, sections: &BTreeSet<u32>) {
    if sections.is_empty() {
        return;
    }
    let items: Vec<String> = sections.iter().map(u32::to_string).collect();
    println!("  {:<26} {}", label, items.join(", "));
}

// ── Healing ──

pub fn print_moves(moves: &[HealingMove]) {
    if moves.is_empty() {
        return;
    }
    println!("Healing moves ({})", moves.len());
    for m in moves.iter().take(MAX_LIST_ITEMS) {
        println!(
            "  {:<26} {} → {} ({:.2} → {:.2})",
            m.name, m.from_section, m.to_section, m.previous_confidence, m.rule_confidence
        );
    }
    if moves.len() > MAX_LIST_ITEMS {
        println!("  ... and {} more", moves.len() - MAX_LIST_ITEMS);
    }
    println!();
}

// ── Distribution ──

pub fn print_distribution(distribution: &[SectionDistribution]) {
    println!("Field distribution");
    for d in distribution {
        println!(
            "  {:<26} {} fields, {} unique, {} shared, {} healed",
            format!("section {}", d.section),
            d.total_fields,
            d.unique_names,
            d.shared_fields,
            d.moved_by_healing
        );
        for (sub, count) in &d.subsections {
            println!("    {:<24} {}", sub, count);
        }
        if !d.entries.is_empty() {
            let entries: Vec<String> = d
                .entries
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(|(e, n)| format!("{e}:{n}"))
                .collect();
            let more = if d.entries.len() > MAX_LIST_ITEMS { " ..." } else { "" };
            println!("    {:<24} {}{}", "entries", entries.join(" "), more);
        }
    }
    println!();
}

pub fn print_duplicates(duplicates: &[DuplicateName]) {
    if duplicates.is_empty() {
        return;
    }
    println!("Duplicate names ({})", duplicates.len());
    for d in duplicates.iter().take(MAX_LIST_ITEMS) {
        println!("  {:<26} ×{}", d.name, d.count);
    }
    if duplicates.len() > MAX_LIST_ITEMS {
        println!("  ... and {} more", duplicates.len() - MAX_LIST_ITEMS);
    }
    println!();
}
