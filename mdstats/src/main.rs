//! mdstats CLI - Mine structural patterns in metadata corpora
//!
//! # Main Commands
//!
//! ```bash
//! mdstats run ./harvest                       # Rank legal-constraint patterns
//! mdstats run ./harvest --csv patterns.csv    # Also export a flat file
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! mdstats select record.xml --path '//gmd:useLimitation'   # Extract from one document
//! mdstats operations                                       # Show available stylesheet operations
//! mdstats example-stylesheet                               # Show example stylesheet
//! ```

use clap::{Parser, Subcommand};
use mdstats::logs::RunLog;
use mdstats::{
    example_stylesheet, export_csv, operations_description, parse_document, render, run_corpus,
    to_xml, unescape_display, ExportOptions, Masker, PipelineConfig, Selector, Tree,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mdstats")]
#[command(about = "Rank recurring structural patterns in XML metadata corpora", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: corpus → extract → mask → group → stages → table
    Run {
        /// Corpus root directory
        #[arg(env = "MDSTATS_CORPUS")]
        corpus: PathBuf,

        /// JSON configuration file (flags override it)
        #[arg(short, long, env = "MDSTATS_CONFIG")]
        config: Option<PathBuf>,

        /// Primary extraction path
        #[arg(short, long, env = "MDSTATS_EXTRACT")]
        extract: Option<String>,

        /// Mask path (repeatable)
        #[arg(short, long)]
        mask: Vec<String>,

        /// File with one mask path per line
        #[arg(long, env = "MDSTATS_MASK_FILE")]
        mask_file: Option<PathBuf>,

        /// Extraction applied to converted trees
        #[arg(long, env = "MDSTATS_SECONDARY_EXTRACT")]
        secondary_extract: Option<String>,

        /// Normalize stylesheet
        #[arg(long, env = "MDSTATS_NORMALIZE")]
        normalize: Option<PathBuf>,

        /// Transform stylesheet
        #[arg(long, env = "MDSTATS_TRANSFORM")]
        transform: Option<PathBuf>,

        /// Convert stylesheet
        #[arg(long, env = "MDSTATS_CONVERT")]
        convert: Option<PathBuf>,

        /// Document location inside each record directory
        #[arg(long, env = "MDSTATS_DOCUMENT_PATH")]
        document_path: Option<PathBuf>,

        /// Output file for the JSON table (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also export the table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// CSV delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: char,

        /// Comma-separated CSV columns (default: all)
        #[arg(long)]
        columns: Option<String>,

        /// Write the run's log entries as JSON
        #[arg(long, env = "MDSTATS_LOG_FILE")]
        log_file: Option<PathBuf>,
    },

    /// Run the extraction and masking on a single document
    Select {
        /// Input XML document
        input: PathBuf,

        /// Extraction path (default: legal constraints)
        #[arg(short, long)]
        path: Option<String>,

        /// Mask path (repeatable, default: legal-constraints masks)
        #[arg(short, long)]
        mask: Vec<String>,
    },

    /// Show example stylesheet
    ExampleStylesheet,

    /// Show available stylesheet operations
    Operations,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            corpus,
            config,
            extract,
            mask,
            mask_file,
            secondary_extract,
            normalize,
            transform,
            convert,
            document_path,
            output,
            csv,
            delimiter,
            columns,
            log_file,
        } => {
            let overrides = Overrides {
                extract,
                mask,
                mask_file,
                secondary_extract,
                normalize,
                transform,
                convert,
                document_path,
            };
            cmd_run(
                &corpus,
                config.as_deref(),
                overrides,
                output.as_deref(),
                csv.as_deref(),
                delimiter,
                columns.as_deref(),
                log_file.as_deref(),
            )
        }

        Commands::Select { input, path, mask } => cmd_select(&input, path, mask),

        Commands::ExampleStylesheet => cmd_example_stylesheet(),

        Commands::Operations => cmd_operations(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Flag values that take precedence over the config file
struct Overrides {
    extract: Option<String>,
    mask: Vec<String>,
    mask_file: Option<PathBuf>,
    secondary_extract: Option<String>,
    normalize: Option<PathBuf>,
    transform: Option<PathBuf>,
    convert: Option<PathBuf>,
    document_path: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, mut config: PipelineConfig) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        if let Some(file) = self.mask_file {
            config = config.with_mask_text(&fs::read_to_string(file)?);
        }
        if !self.mask.is_empty() {
            config.mask = self.mask;
        }
        if self.extract.is_some() {
            config.extract = self.extract;
        }
        if self.secondary_extract.is_some() {
            config.secondary_extract = self.secondary_extract;
        }
        if self.normalize.is_some() {
            config.normalize = self.normalize;
        }
        if self.transform.is_some() {
            config.transform = self.transform;
        }
        if self.convert.is_some() {
            config.convert = self.convert;
        }
        if let Some(path) = self.document_path {
            config.document_path = path;
        }
        Ok(config)
    }
}

fn cmd_run(
    corpus: &Path,
    config_path: Option<&Path>,
    overrides: Overrides,
    output: Option<&Path>,
    csv: Option<&Path>,
    delimiter: char,
    columns: Option<&str>,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📂 Corpus: {}", corpus.display());
    let mut run_log = RunLog::start();

    let config = match config_path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let config = overrides.apply(config)?;

    if let Some(extract) = &config.extract {
        eprintln!("   Extract: {}", extract);
    }
    eprintln!("   Masks: {}", config.mask.len());

    let table = run_corpus(corpus, &config)?;
    run_log.collect();

    eprintln!(
        "\n📊 {} patterns, {} groups over {} records",
        table.pattern_count(),
        table.rows.len(),
        table.record_count
    );
    for row in table.rows.iter().take(5) {
        eprintln!(
            "   {} / {}  count {}  total {}",
            row.pattern_id, row.extract_id, row.count, row.total
        );
    }
    if let Some(summary) = run_log.summary() {
        eprintln!("   ⚠️ {}", summary);
    }
    if let Some(path) = log_file {
        fs::write(path, run_log.to_json()?)?;
        eprintln!("   📝 Log written to: {}", path.display());
    }

    if let Some(csv_path) = csv {
        let delimiter = u8::try_from(delimiter).map_err(|_| format!("Delimiter must be ASCII: '{}'", delimiter))?;
        let mut options = ExportOptions::default().with_delimiter(delimiter);
        if let Some(list) = columns {
            options = options.with_column_list(list)?;
        }
        let written = export_csv(csv_path, &table, &options)?;
        eprintln!("   💾 {} rows exported to: {}", written, csv_path.display());
    }

    let json = serde_json::to_string_pretty(&table)?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_select(input: &Path, path: Option<String>, mask: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Selecting from: {}", input.display());

    let defaults = PipelineConfig::default();
    let namespaces = &defaults.source_namespaces;
    let path = path.or(defaults.extract);
    let mask = if mask.is_empty() { defaults.mask } else { mask };

    let selector = Selector::compile(path.as_deref(), namespaces)?;
    let masker = Masker::compile(&mask, namespaces)?;

    let document = Tree::Element(parse_document(&fs::read(input)?)?);
    let extract = selector.apply(&document);
    let pattern = masker.apply(&extract);

    match &extract {
        Tree::Element(forest) => println!("extract:\n{}\n", to_xml(forest)),
        Tree::Failed(message) => println!("extract:\nerror: {}\n", message),
    }
    println!("pattern:\n{}", unescape_display(&render(&pattern).text));
    Ok(())
}

fn cmd_example_stylesheet() -> Result<(), Box<dyn std::error::Error>> {
    let stylesheet = example_stylesheet();
    let json = stylesheet.to_json()?;
    println!("{}", json);
    Ok(())
}

fn cmd_operations() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", operations_description());
    Ok(())
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
