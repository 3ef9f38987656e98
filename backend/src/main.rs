//! unique-contact CLI - merge duplicate contact rows from CSV
//!
//! # Main Commands
//!
//! ```bash
//! unique-contact merge contacts.csv --group-by name --code code --destination destination \
//!     --label code --label destination --variable name
//! unique-contact merge contacts.csv --preset webitel-1700000000000
//! unique-contact merge contacts.csv        # Pick the best stored preset
//! unique-contact serve                     # Start HTTP server (port 3000)
//! unique-contact preset list               # Manage selector presets
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! unique-contact parse contacts.csv        # Just parse CSV to JSON
//! unique-contact validate request.json     # Validate a JSON merge request
//! unique-contact merge-json request.json   # Merge a JSON merge request
//! ```

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use unique_contact::merge::pipeline::format_delimiter;
use unique_contact::validation::{reject_null_arguments, validate_request};
use unique_contact::{
    merge_csv, merge_csv_with_best_preset, merge_request_file, parse_file_auto, MergeOptions,
    PipelineOutcome, PresetRegistry, Selectors,
};

#[derive(Parser)]
#[command(name = "unique-contact")]
#[command(about = "Group CSV contact rows by key and merge duplicates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON records
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge the contacts of a CSV file
    Merge {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        selectors: SelectorArgs,

        /// Use a stored preset instead of selector flags.
        /// Without either, the best preset for the CSV header is picked
        #[arg(long, conflicts_with_all = ["group_by", "code", "destination", "label", "variable"])]
        preset: Option<String>,

        /// Threads used to read records (default: UNIQUE_CONTACT_WORKERS or 1)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Also write diagnostics as JSON to this file
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge a JSON request (csv + five selector arguments)
    MergeJson {
        /// Input JSON request file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a JSON merge request
    Validate {
        /// Input JSON request file
        input: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage selector presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
}

/// Selector flags shared by `merge` and `preset save`
#[derive(Args, Debug, Clone)]
struct SelectorArgs {
    /// Field to group rows by
    #[arg(long)]
    group_by: Option<String>,

    /// Field holding the destination code
    #[arg(long)]
    code: Option<String>,

    /// Field holding the destination
    #[arg(long)]
    destination: Option<String>,

    /// Label field (repeatable, order kept)
    #[arg(long)]
    label: Vec<String>,

    /// Variable field (repeatable, order kept)
    #[arg(long)]
    variable: Vec<String>,
}

impl SelectorArgs {
    fn is_empty(&self) -> bool {
        self.group_by.is_none()
            && self.code.is_none()
            && self.destination.is_none()
            && self.label.is_empty()
            && self.variable.is_empty()
    }

    fn into_selectors(self) -> Result<Selectors, Box<dyn std::error::Error>> {
        let missing: Vec<&str> = [
            ("--group-by", self.group_by.is_none()),
            ("--code", self.code.is_none()),
            ("--destination", self.destination.is_none()),
        ]
        .into_iter()
        .filter_map(|(flag, absent)| absent.then_some(flag))
        .collect();

        match (self.group_by, self.code, self.destination) {
            (Some(group_by), Some(code), Some(destination)) => {
                let selectors = Selectors::new(group_by, code, destination)
                    .with_labels(self.label)
                    .with_variables(self.variable);
                selectors.validate()?;
                Ok(selectors)
            }
            _ => Err(format!("Missing selector flags: {}", missing.join(", ")).into()),
        }
    }
}

#[derive(Subcommand)]
enum PresetAction {
    /// List all stored presets
    List,

    /// Save selector flags as a preset
    Save {
        /// Name for the preset
        name: String,

        #[command(flatten)]
        selectors: SelectorArgs,
    },

    /// Import a selectors JSON file as a preset
    Import {
        /// Selectors JSON file to import
        file: PathBuf,
        /// Name for the preset
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a preset
    Show {
        /// Preset ID
        id: String,
    },

    /// Delete a preset
    Delete {
        /// Preset ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let options = MergeOptions::from_env();

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Merge {
            input,
            selectors,
            preset,
            workers,
            diagnostics,
            output,
        } => {
            let options = MergeOptions {
                workers: workers.unwrap_or(options.workers),
                ..options
            };
            cmd_merge(
                &input,
                selectors,
                preset.as_deref(),
                &options,
                diagnostics.as_deref(),
                output.as_deref(),
            )
        }

        Commands::MergeJson { input, output } => {
            cmd_merge_json(&input, &options, output.as_deref())
        }

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Serve { port } => cmd_serve(port, options).await,

        Commands::Preset { action } => cmd_preset(action, &options),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_merge(
    input: &Path,
    selector_args: SelectorArgs,
    preset: Option<&str>,
    options: &MergeOptions,
    diagnostics_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = match preset {
        Some(id) => {
            let mut registry = PresetRegistry::with_dir(&options.preset_dir);
            let preset = registry.require(id)?;
            eprintln!("📄 Using preset: {} ({})", preset.name, preset.id);
            let selectors = preset.selectors.clone();
            registry.mark_used(id)?;
            merge_csv(input, &selectors, options)?
        }
        None if selector_args.is_empty() => merge_csv_with_best_preset(input, options)?,
        None => merge_csv(input, &selector_args.into_selectors()?, options)?,
    };

    report(&outcome);

    if let Some(path) = diagnostics_path {
        fs::write(path, serde_json::to_string_pretty(&outcome.diagnostics)?)?;
        eprintln!("💾 Diagnostics written to: {}", path.display());
    }

    let json = serde_json::to_string_pretty(&outcome.groups)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_merge_json(
    input: &Path,
    options: &MergeOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📦 Merging request: {}", input.display());

    let outcome = merge_request_file(input, options)?;
    report(&outcome);

    let json = serde_json::to_string_pretty(&outcome.groups)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let data: serde_json::Value = serde_json::from_str(&content)?;

    reject_null_arguments(&data)?;

    if let Err(errors) = validate_request(&data) {
        eprintln!("\n❌ Request invalid:");
        for err in errors.iter().take(10) {
            eprintln!("   - {}", err);
        }
        std::process::exit(1);
    }

    eprintln!("✅ Request valid");
    Ok(())
}

async fn cmd_serve(port: u16, options: MergeOptions) -> Result<(), Box<dyn std::error::Error>> {
    unique_contact::server::start_server(port, options).await?;
    Ok(())
}

fn cmd_preset(action: PresetAction, options: &MergeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = PresetRegistry::with_dir(&options.preset_dir);

    match action {
        PresetAction::List => {
            let presets = registry.list();
            if presets.is_empty() {
                eprintln!("📋 No presets stored yet.");
                eprintln!("   Use 'unique-contact preset save <name> ...' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored presets ({}):\n", presets.len());
            for p in presets {
                println!("  📄 {} ({})", p.name, p.id);
                println!("     Group by: {}", p.selectors.group_by_field);
                println!("     Fields: {}", p.selectors.referenced_fields().join(", "));
                println!("     Uses: {}", p.use_count);
                if let Some(ref last) = p.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        PresetAction::Save { name, selectors } => {
            let id = registry.save(selectors.into_selectors()?, &name)?;
            eprintln!("✅ Preset saved with ID: {}", id);
        }

        PresetAction::Import { file, name } => {
            eprintln!("📥 Importing preset from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Preset saved with ID: {}", id);
        }

        PresetAction::Show { id } => {
            let p = registry.require(&id)?;
            println!("📄 Preset: {} ({})\n", p.name, p.id);
            println!("Created: {}", p.created_at);
            println!("Uses: {}", p.use_count);
            println!("\nSelectors:");
            println!("{}", serde_json::to_string_pretty(&p.selectors)?);
        }

        PresetAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Preset deleted: {}", id);
        }
    }

    Ok(())
}

fn report(outcome: &PipelineOutcome) {
    if let Some(ref info) = outcome.csv_info {
        eprintln!("   Encoding: {}", info.encoding);
        eprintln!("   Delimiter: '{}'", format_delimiter(info.delimiter));
        eprintln!("   Rows: {}", info.row_count);
    }
    eprintln!("\n📦 {} unique contacts", outcome.groups.len());
    if outcome.skipped_rows > 0 {
        eprintln!("   ⚠️  {} rows skipped (empty group key)", outcome.skipped_rows);
    }
    if !outcome.diagnostics.is_empty() {
        eprintln!("   ⚠️  {} warnings", outcome.diagnostics.len());
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
