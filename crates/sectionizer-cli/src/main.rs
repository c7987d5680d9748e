mod display;
mod io;

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use sectionizer_core::ClassifiedField;
use sectionizer_engine::report::{self, DuplicateName, SectionDistribution};
use sectionizer_engine::{
    ClassificationDiagnostic, HealingMove, RemovedRule, Sectionizer, SectionizerConfig,
    ValidationResult, repository,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sectionizer", version)]
#[command(about = "Assign extracted form fields to their sections and check the counts")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Run configuration (JSON)
    #[arg(long, global = true, env = "SECTIONIZER_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct RuleArgs {
    /// Rule document(s); later files append to earlier ones
    #[arg(long = "rules", required = true, num_args = 1..)]
    rules: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Remove generic patterns that tie across sections and write the cleaned rules
    Resolve {
        #[command(flatten)]
        rules: RuleArgs,
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Classify fields without validating
    Classify {
        #[command(flatten)]
        rules: RuleArgs,
        /// Raw fields: a JSON array or {"fields": [...]}
        #[arg(long)]
        fields: PathBuf,
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Classify, validate against expected counts, heal, and validate again
    Validate {
        #[command(flatten)]
        rules: RuleArgs,
        #[arg(long)]
        fields: PathBuf,
        /// Expected counts per section
        #[arg(long)]
        expected: PathBuf,
        /// 10% tolerance and oversized sections count as failures
        #[arg(long)]
        strict: bool,
        /// Skip the healing pass
        #[arg(long)]
        no_heal: bool,
        /// Write the full run (fields, deviations, moves) as JSON
        #[arg(long)]
        output: Option<PathBuf>,
        /// Exit non-zero when the final validation fails
        #[arg(long)]
        deny_deviation: bool,
    },
    /// Summarise a classification and optionally export one file per section
    Report {
        /// Classified fields: `classify` output, `validate --output`, or a section file
        #[arg(long)]
        classified: PathBuf,
        /// Write section-<N>.json files here
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Write the distribution as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput<'a> {
    removed: &'a [RemovedRule],
    diagnostics: &'a [ClassificationDiagnostic],
    initial: &'a ValidationResult,
    healing_moves: &'a [HealingMove],
    validation: &'a ValidationResult,
    fields: &'a [ClassifiedField],
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    distribution: &'a [SectionDistribution],
    duplicates: &'a [DuplicateName],
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("sectionizer v{}", env!("CARGO_PKG_VERSION"));
    let config = io::read_config(cli.config.as_deref())?;

    match cli.command {
        Command::Resolve { rules, output } => cmd_resolve(config, &rules.rules, output),
        Command::Classify {
            rules,
            fields,
            output,
        } => cmd_classify(config, &rules.rules, &fields, output),
        Command::Validate {
            rules,
            fields,
            expected,
            strict,
            no_heal,
            output,
            deny_deviation,
        } => {
            let mut config = config;
            if strict {
                config.validation.strict = true;
            }
            if no_heal {
                config.healing.enabled = false;
            }
            cmd_validate(config, &rules.rules, &fields, &expected, output, deny_deviation)
        }
        Command::Report {
            classified,
            export_dir,
            output,
        } => cmd_report(&classified, export_dir, output),
    }
}

// ── Commands ──

fn cmd_resolve(
    config: SectionizerConfig,
    rule_paths: &[PathBuf],
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let sectionizer = Sectionizer::new(config)?;
    let loaded = io::read_rules(rule_paths)?;
    let resolved = sectionizer_engine::resolve(loaded.rules, sectionizer.generic());

    io::write_json(output.as_deref(), &repository::save(&resolved.rules))?;
    // Summaries only when stdout is not carrying the JSON.
    if output.is_some() {
        display::print_rejected(&loaded.rejected);
        display::print_removed(&resolved.removed);
        println!("{} rules kept", resolved.rules.rule_count());
    }
    Ok(())
}

fn cmd_classify(
    config: SectionizerConfig,
    rule_paths: &[PathBuf],
    fields_path: &Path,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let sectionizer = Sectionizer::new(config)?;
    let loaded = io::read_rules(rule_paths)?;
    let fields = io::read_fields(fields_path)?;
    let (_, removed, classification) = sectionizer.classify(&fields, loaded.rules);

    io::write_json(output.as_deref(), &classification.fields)?;
    if output.is_some() {
        display::print_rejected(&loaded.rejected);
        display::print_removed(&removed);
        display::print_distribution(&report::distribution(&classification.fields));
        if !classification.diagnostics.is_empty() {
            println!("{} entry index failures", classification.diagnostics.len());
        }
    }
    Ok(())
}

fn cmd_validate(
    config: SectionizerConfig,
    rule_paths: &[PathBuf],
    fields_path: &Path,
    expected_path: &Path,
    output: Option<PathBuf>,
    deny_deviation: bool,
) -> anyhow::Result<()> {
    let sectionizer = Sectionizer::new(config)?;
    let loaded = io::read_rules(rule_paths)?;
    let fields = io::read_fields(fields_path)?;
    let expectations = io::read_expectations(expected_path)?;

    let run = sectionizer.run(&fields, loaded.rules, &expectations);

    display::print_rejected(&loaded.rejected);
    display::print_removed(&run.removed);
    display::print_validation("Initial validation", &run.initial);
    if run.healed() {
        display::print_moves(&run.healing_moves);
        display::print_validation("After healing", &run.validation);
    }

    if let Some(path) = output.as_deref() {
        let out = RunOutput {
            removed: &run.removed,
            diagnostics: &run.diagnostics,
            initial: &run.initial,
            healing_moves: &run.healing_moves,
            validation: &run.validation,
            fields: &run.fields,
        };
        io::write_json(Some(path), &out)?;
        info!(path = %path.display(), "wrote run output");
    }

    if deny_deviation && !run.validation.success {
        bail!(
            "validation failed: {:.1}% aligned, {} missing, {} undersized",
            run.validation.alignment_percentage,
            run.validation.missing_mandatory_sections.len(),
            run.validation.undersized_sections.len()
        );
    }
    Ok(())
}

fn cmd_report(
    classified_path: &Path,
    export_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let fields = io::read_classified(classified_path)?;
    let distribution = report::distribution(&fields);
    let duplicates = report::duplicate_names(fields.iter().map(|f| f.name()));

    display::print_distribution(&distribution);
    display::print_duplicates(&duplicates);

    if let Some(path) = output.as_deref() {
        io::write_json(
            Some(path),
            &ReportOutput {
                distribution: &distribution,
                duplicates: &duplicates,
            },
        )?;
    }

    if let Some(dir) = export_dir {
        let references = report::section_references(&fields, chrono::Utc::now());
        let written = io::export_sections(&dir, &references)?;
        info!(files = written.len(), dir = %dir.display(), "exported sections");
    }
    Ok(())
}
