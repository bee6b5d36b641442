use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{Instrument, Span};
use vidsift::cli::{Cli, Commands, ConfigAction};
use vidsift::collector::{parse_dump, CollectionMethod, Collector, JobClient};
use vidsift::config::{expand_tilde, Config, ConfigValidator};
use vidsift::error::{Result, VidsiftError};
use vidsift::export::SnapshotWriter;
use vidsift::filtering::{EnhancedRecord, FilterPipeline, FilterStatistics};
use vidsift::patterns::PatternsFile;
use vidsift::sink::{CsvWorkbook, TabularSink};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let run_id = uuid::Uuid::new_v4();

    // Handle commands
    match cli.command {
        Commands::Collect {
            method,
            no_sheets,
            no_files,
        } => {
            let config = load_config(&config_path, cli.verbose)?;
            let span = tracing::info_span!("run", %run_id, command = "collect", %method);
            cmd_collect(&config, method, span, no_sheets, no_files)
        }
        Commands::Filter {
            input,
            no_sheets,
            no_files,
        } => {
            let config = load_config(&config_path, cli.verbose)?;
            let span = tracing::info_span!("run", %run_id, command = "filter");
            cmd_filter(&config, &input, span, no_sheets, no_files)
        }
        Commands::Config { action } => {
            init_logging(cli.verbose, None);
            cmd_config(&config_path, action)
        }
    }
}

/// Load the config file (or defaults when absent) and install logging at its level
fn load_config(path: &Path, verbose: bool) -> Result<Config> {
    let found = path.exists();
    let config = if found {
        Config::load(path)?
    } else {
        Config::default()
    };

    init_logging(verbose, Some(&config.logging.level));
    if !found {
        tracing::warn!(
            "Config file not found, using defaults. Run 'vidsift config init' to create one."
        );
    }
    Ok(config)
}

fn init_logging(verbose: bool, level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "debug" } else { level.unwrap_or("info") };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vidsift={}", level)));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_collect(
    config: &Config,
    method: CollectionMethod,
    span: Span,
    no_sheets: bool,
    no_files: bool,
) -> Result<()> {
    // Missing provider settings are fatal before anything is filtered
    ConfigValidator::validate_for_collection(config)?;

    let client = JobClient::from_config(&config.collector)?;
    let collector = Collector::new(
        client,
        &config.collector,
        config.filter.target_region.clone(),
    );

    println!("✓ Collecting videos ({method})...");

    let runtime = tokio::runtime::Runtime::new().map_err(|e| VidsiftError::Io {
        source: e,
        context: "Failed to start async runtime".to_string(),
    })?;
    let raw = runtime.block_on(collector.collect(method).instrument(span.clone()))?;

    println!("  Collected: {} records", raw.len());

    process(config, &raw, span, no_sheets, no_files)
}

fn cmd_filter(
    config: &Config,
    input: &Path,
    span: Span,
    no_sheets: bool,
    no_files: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(input).map_err(|e| VidsiftError::Io {
        source: e,
        context: format!("Failed to read input file: {:?}", input),
    })?;
    let raw = parse_dump(&content)?;

    println!("✓ Loaded {} records from {}", raw.len(), input.display());

    process(config, &raw, span, no_sheets, no_files)
}

fn process(
    config: &Config,
    raw: &[serde_json::Value],
    span: Span,
    no_sheets: bool,
    no_files: bool,
) -> Result<()> {
    let pipeline = FilterPipeline::from_config(config, span.clone())?;
    let report = pipeline.run(raw);

    print_statistics(&report.stats);

    let _enter = span.enter();
    if report.accepted.is_empty() {
        println!("No videos passed the filters; nothing to store");
        return Ok(());
    }

    // Snapshots are written before the sink
    if !no_files {
        save_files(config, &report.accepted)?;
    }
    if !no_sheets {
        upload(config, &report.accepted)?;
    }

    Ok(())
}

fn save_files(config: &Config, accepted: &[EnhancedRecord]) -> Result<()> {
    let writer = SnapshotWriter::from_config(&config.output, expand_tilde(&config.output.output_dir));
    let saved = writer.save(accepted, Utc::now())?;

    for path in saved.json.iter().chain(saved.csv.iter()) {
        println!("✓ Saved {}", path.display());
    }
    Ok(())
}

fn upload(config: &Config, accepted: &[EnhancedRecord]) -> Result<()> {
    let workbook = CsvWorkbook::open(
        expand_tilde(&config.sink.workbook_dir),
        config.sink.summary_sheet_name.clone(),
    )?;

    let receipt = workbook.upload(accepted, &config.sink.sheet_name, config.sink.clear_existing)?;
    println!(
        "✓ Uploaded {} rows to '{}' starting at row {}",
        receipt.count, config.sink.sheet_name, receipt.start_row
    );
    println!("  {}", receipt.url);

    let summary = workbook.write_summary(accepted)?;
    println!(
        "✓ Summary written ({} videos, dominant language: {})",
        summary.stats.total, summary.stats.dominant_language
    );
    println!("  {}", summary.url);
    Ok(())
}

fn print_statistics(stats: &FilterStatistics) {
    println!("✓ Filtering complete");
    println!("  Input:       {}", stats.total_input);
    println!("  Accepted:    {}", stats.final_output);
    println!("  Filter rate: {:.2}%", stats.filter_rate());
    println!("  Time:        {}ms", stats.processing_time_ms);

    if !stats.rejection_histogram.is_empty() {
        println!("  Rejections:");
        for (reason, count) in &stats.rejection_histogram {
            println!("    {:<18} {}", reason.as_str(), count);
        }
    }
}

fn cmd_config(path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = if path.exists() {
                Config::load(path)?
            } else {
                println!("# No config file at {}, showing defaults", path.display());
                Config::default()
            };

            let value = toml::Value::try_from(&config)?;
            let shown = match section {
                Some(name) => {
                    let table = value
                        .get(&name)
                        .ok_or_else(|| VidsiftError::InvalidConfigValue {
                            path: name.clone(),
                            message: "No such section".to_string(),
                        })?;
                    let mut wrapper = toml::map::Map::new();
                    wrapper.insert(name, table.clone());
                    toml::to_string_pretty(&toml::Value::Table(wrapper))?
                }
                None => toml::to_string_pretty(&value)?,
            };
            println!("{shown}");
        }
        ConfigAction::Validate { collection } => {
            let config = Config::load(path)?;
            if collection {
                ConfigValidator::validate_for_collection(&config)?;
            }
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&config_dir).map_err(|e| VidsiftError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", config_dir),
            })?;

            let patterns_path = config_dir.join("patterns.toml");
            write_patterns_template(&patterns_path, force)?;

            let mut config = Config::default();
            config.patterns.patterns_file = Some(patterns_path.clone());
            config.save(path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("✓ Pattern lexicon installed at: {}", patterns_path.display());
            println!(
                "  Set {} before running 'vidsift collect'",
                config.collector.api_key_env
            );
        }
    }

    Ok(())
}

fn write_patterns_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Ok(());
    }

    let content = toml::to_string_pretty(&PatternsFile::default())?;
    std::fs::write(path, content).map_err(|e| VidsiftError::Io {
        source: e,
        context: format!("Failed to write patterns.toml: {:?}", path),
    })
}
