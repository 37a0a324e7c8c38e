//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::Overrides;
use crate::PredictArgs;
use chrono::NaiveDateTime;
use std::path::Path;
use trafficast_core::config::workspace_config_path;
use trafficast_core::data::columns;
use trafficast_core::data::source::{CsvSource, write_csv, write_csv_file};
use trafficast_core::inference::format::{BatchReport, format_percent};
use trafficast_core::{PredictionResult, RawRecord, SchemaReference, TrafficConfig, TrafficPipeline};

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    match command {
        Commands::Predict(args) => handle_predict(args, workspace, overrides),
        Commands::Batch {
            file,
            alpha,
            output,
        } => handle_batch(&file, alpha, output.as_deref(), workspace, overrides),
        Commands::Schema { json } => handle_schema(json, workspace, overrides),
        Commands::Config { action } => handle_config(action, workspace, overrides),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if let Some(config_dir) = config_path.parent() {
                std::fs::create_dir_all(config_dir)?;
            }

            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let default_config = TrafficConfig::default();
            let toml_str = toml::to_string_pretty(&default_config)?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(workspace, overrides)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

fn handle_predict(args: PredictArgs, workspace: &Path, overrides: &Overrides) -> anyhow::Result<()> {
    let now = chrono::Local::now().naive_local();
    let json = args.json;
    let result = run_predict(&args, workspace, overrides, now)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Predicted traffic volume: {:.0}", result.point);
        println!(
            "Confidence interval ({}%): [{:.0}, {:.0}]",
            format_percent(result.confidence),
            result.lower,
            result.upper
        );
    }
    Ok(())
}

fn handle_batch(
    file: &Path,
    alpha: Option<f64>,
    output: Option<&Path>,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    let report = run_batch(file, alpha, workspace, overrides)?;
    match output {
        Some(path) => {
            write_csv_file(path, &report.header, &report.rows)?;
            tracing::info!(
                path = %path.display(),
                rows = report.rows.len(),
                "Batch report written"
            );
            eprintln!(
                "Wrote {} predictions to {}",
                report.rows.len(),
                path.display()
            );
        }
        None => report.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}

fn handle_schema(json: bool, workspace: &Path, overrides: &Overrides) -> anyhow::Result<()> {
    let config = load_config(workspace, overrides)?;
    let schema = load_schema(&config, workspace)?;
    if json {
        println!("{}", schema.to_json()?);
        return Ok(());
    }

    println!("Encoded columns ({}):", schema.width());
    for (i, name) in schema.full_column_order().iter().enumerate() {
        println!("  {:>3}  {}", i, name);
    }

    let options = schema.form_options();
    println!();
    println!("Holidays:  {}", options.holidays.join(", "));
    println!("Weather:   {}", options.weather.join(", "));
    println!("Months:    {}", options.months.join(", "));
    println!("Weekdays:  {}", options.weekdays.join(", "));
    println!("Hours:     {}", options.hours.join(", "));

    let bounds = options.bounds;
    println!();
    println!(
        "Input bounds: temp [{}, {}] K, rain [0, {}] mm, snow [0, {}] mm, clouds [{}, {}] %",
        bounds.temp.min,
        bounds.temp.max,
        bounds.rain_1h.max,
        bounds.snow_1h.max,
        bounds.clouds_all.min,
        bounds.clouds_all.max
    );

    println!();
    println!(
        "Sample upload format ({} of {} reference rows):",
        schema.sample_rows().len(),
        schema.row_count()
    );
    let (header, rows) = sample_table(&schema);
    write_csv(std::io::stdout().lock(), &header, &rows)?;
    Ok(())
}

/// Load configuration and apply the path flags given on the command line.
fn load_config(workspace: &Path, overrides: &Overrides) -> anyhow::Result<TrafficConfig> {
    let mut config =
        trafficast_core::load_config(Some(workspace), overrides.config.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    if let Some(reference) = &overrides.reference {
        config.data.reference_path = std::path::absolute(reference)?;
    }
    if let Some(model) = &overrides.model {
        config.model.artifact_path = std::path::absolute(model)?;
    }
    Ok(config)
}

fn load_schema(config: &TrafficConfig, workspace: &Path) -> anyhow::Result<SchemaReference> {
    let path = TrafficConfig::resolve(workspace, &config.data.reference_path);
    let dataset = CsvSource::new(&path).load(None)?;
    Ok(SchemaReference::build_with_sample(
        &dataset,
        config.data.sample_rows,
    )?)
}

/// Turn the predict flags into a raw record, leaving unset fields absent.
fn form_entry(args: &PredictArgs) -> RawRecord {
    let mut entry = RawRecord::new()
        .with(columns::TEMP, args.temp)
        .with(columns::RAIN_1H, args.rain)
        .with(columns::SNOW_1H, args.snow)
        .with(columns::CLOUDS_ALL, args.clouds)
        .with(columns::WEATHER_MAIN, args.weather.as_str());
    let optional = [
        (columns::HOLIDAY, &args.holiday),
        (columns::DATE_TIME, &args.timestamp),
        (columns::MONTH, &args.month),
        (columns::WEEKDAY, &args.weekday),
        (columns::HOUR, &args.hour),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            entry.insert(field, value.as_str());
        }
    }
    entry
}

fn run_predict(
    args: &PredictArgs,
    workspace: &Path,
    overrides: &Overrides,
    now: NaiveDateTime,
) -> anyhow::Result<PredictionResult> {
    let config = load_config(workspace, overrides)?;
    let alpha = config.prediction.resolve_alpha(args.alpha)?;
    let pipeline = TrafficPipeline::from_config(&config, workspace)?;
    Ok(pipeline.predict_form(&form_entry(args), alpha, now)?)
}

fn run_batch(
    file: &Path,
    alpha: Option<f64>,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<BatchReport> {
    let config = load_config(workspace, overrides)?;
    let alpha = config.prediction.resolve_alpha(alpha)?;
    let pipeline = TrafficPipeline::from_config(&config, workspace)?;

    let source = CsvSource::new(file);
    let batch = source.load(None)?;
    let info = source.source_info();
    tracing::info!(
        source = %info.location,
        rows = batch.row_count(),
        columns = batch.column_count(),
        "Loaded batch upload"
    );

    let results = pipeline.predict_batch(&batch.rows, alpha)?;
    Ok(BatchReport::new(&batch, &results))
}

/// The sample reference rows as the columns an upload needs.
fn sample_table(schema: &SchemaReference) -> (Vec<String>, Vec<Vec<String>>) {
    let header = [
        columns::HOLIDAY,
        columns::TEMP,
        columns::RAIN_1H,
        columns::SNOW_1H,
        columns::CLOUDS_ALL,
        columns::WEATHER_MAIN,
        columns::MONTH,
        columns::WEEKDAY,
        columns::HOUR,
    ]
    .map(str::to_string)
    .to_vec();
    let rows = schema
        .sample_rows()
        .iter()
        .map(|r| {
            vec![
                r.holiday.clone(),
                r.temp.to_string(),
                r.rain_1h.to_string(),
                r.snow_1h.to_string(),
                r.clouds_all.to_string(),
                r.weather_main.clone(),
                r.month.clone(),
                r.weekday.clone(),
                r.hour.clone(),
            ]
        })
        .collect();
    (header, rows)
}
