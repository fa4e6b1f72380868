mod config;
mod db;
mod error;
mod fetch;
mod parser;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Settings;
use crate::fetch::Scenario;
use crate::parser::extract::FlatRecord;
use crate::parser::summary::ImpactSummary;

#[derive(Parser)]
#[command(name = "impact_report", about = "Impact-effects report fetcher and extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one report and print its flat record
    Fetch {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Print the visualization summary instead of the flat record
        #[arg(long)]
        summary: bool,
        /// Target city carried into the summary
        #[arg(long)]
        city: Option<String>,
        /// Also print the decomposed sections
        #[arg(long)]
        sections: bool,
        /// Store the report and record in the database
        #[arg(long)]
        save: bool,
    },
    /// Extract flat records from saved HTML files
    Parse {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print the decomposed sections alongside each record
        #[arg(long)]
        sections: bool,
    },
    /// Fetch a grid of scenarios concurrently into the database
    Sweep {
        #[command(flatten)]
        base: ScenarioArgs,
        /// Projectile diameters (m), comma separated
        #[arg(long = "diams", value_delimiter = ',')]
        diams: Vec<f64>,
        /// Impact velocities (km/s), comma separated
        #[arg(long = "vels", value_delimiter = ',')]
        vels: Vec<f64>,
        /// Impact angles (degrees), comma separated
        #[arg(long = "thetas", value_delimiter = ',')]
        thetas: Vec<f64>,
    },
    /// Flatten stored reports into records
    Process {
        /// Max reports to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show database statistics
    Stats,
    /// Stored records overview table
    Records {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Args, Clone)]
struct ScenarioArgs {
    /// Distance from impact (km)
    #[arg(long, default_value_t = 1.0)]
    dist: f64,
    /// Projectile diameter (m)
    #[arg(long, default_value_t = 1000.0)]
    diam: f64,
    /// Projectile density (kg/m3)
    #[arg(long, default_value_t = 3000.0)]
    pdens: f64,
    #[arg(long, default_value_t = 0)]
    pdens_select: u8,
    /// Impact velocity (km/s)
    #[arg(long, default_value_t = 20.0)]
    vel: f64,
    /// Impact angle (degrees)
    #[arg(long, default_value_t = 30.0)]
    theta: f64,
    /// Target density (kg/m3)
    #[arg(long, default_value_t = 1000.0)]
    tdens: f64,
    #[arg(long, default_value_t = 0)]
    tdens_select: u8,
}

impl From<ScenarioArgs> for Scenario {
    fn from(a: ScenarioArgs) -> Self {
        Scenario {
            dist: a.dist,
            diam: a.diam,
            pdens: a.pdens,
            pdens_select: a.pdens_select,
            vel: a.vel,
            theta: a.theta,
            tdens: a.tdens,
            tdens_select: a.tdens_select,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("loading settings")?;
    info!(settings_loaded = ?settings, msg = "Starting impact_report");

    let result = match cli.command {
        Commands::Fetch {
            scenario,
            summary,
            city,
            sections,
            save,
        } => {
            let scenario = Scenario::from(scenario);
            let client = fetch::build_client(&settings)?;
            let (page, extracted) = fetch::run_pipeline(&client, &settings, &scenario).await?;

            if let Some(title) = &extracted.report.title {
                info!(title = %title, fetched_at = %page.fetched_at, "Report parsed");
            }
            if save {
                let conn = db::connect(&settings.db_path)?;
                db::init_schema(&conn)?;
                let scenario_id = db::upsert_scenario(&conn, &scenario)?;
                let report_id = db::insert_report(
                    &conn,
                    &db::ReportRow {
                        scenario_id,
                        url: page.url.clone(),
                        html: Some(page.html.clone()),
                        status: Some(i32::from(page.status)),
                        error: None,
                        latency_ms: Some(page.latency_ms),
                    },
                )?;
                db::save_records(
                    &conn,
                    &[db::RecordRow {
                        report_id,
                        flat: serde_json::to_string(&extracted.record)?,
                        error: None,
                    }],
                )?;
                info!(report_id, "Saved report");
            }

            let output = fetch_output(&extracted, &scenario, city, sections, summary)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Parse { files, sections } => parse_files(&files, sections),
        Commands::Sweep {
            base,
            diams,
            vels,
            thetas,
        } => {
            let grid = fetch::scenario_grid(&Scenario::from(base), &diams, &vels, &thetas);
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let scenarios = grid
                .into_iter()
                .map(|s| -> anyhow::Result<(i64, Scenario)> {
                    Ok((db::upsert_scenario(&conn, &s)?, s))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let t_sweep = Instant::now();
            println!("Sweeping {} scenarios (streaming to DB)...", scenarios.len());
            let stats = fetch::sweep_streaming(&conn, &settings, scenarios).await?;
            println!(
                "Fetched {} reports ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_sweep.elapsed().as_secs_f64()
            );
            if stats.ok > 0 {
                let pending = db::fetch_unprocessed(&conn, None)?;
                let processed = process_reports(&conn, &pending)?;
                println!("Processed {} reports.", processed);
            }
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pending = db::fetch_unprocessed(&conn, limit)?;
            if pending.is_empty() {
                println!("No unprocessed reports. Run 'sweep' or 'fetch --save' first.");
                return Ok(());
            }
            println!("Processing {} reports...", pending.len());
            let processed = process_reports(&conn, &pending)?;
            println!("Saved {} records.", processed);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Scenarios: {}", s.scenarios);
            println!("Reports:   {}", s.reports);
            println!("Errors:    {}", s.errors);
            println!("Records:   {}", s.records);
            println!("Unparsed:  {}", s.parse_failures);
            Ok(())
        }
        Commands::Records { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_records(&conn, limit)?;
            if rows.is_empty() {
                println!("No records found.");
                return Ok(());
            }

            println!(
                "{:>5} | {:>8} | {:>6} | {:>5} | {:>12} | {:>12} | {:>10} | {:<19}",
                "id", "diam m", "vel", "theta", "energy J", "megatons", "crater km", "fetched"
            );
            println!("{}", "-".repeat(99));

            for r in &rows {
                let scenario: Scenario = serde_json::from_str(&r.params)?;
                let record: FlatRecord = serde_json::from_str(&r.flat)?;
                let s = ImpactSummary::from_record(&record, &scenario, None);
                println!(
                    "{:>5} | {:>8} | {:>6} | {:>5} | {:>12} | {:>12} | {:>10} | {:<19}",
                    r.report_id,
                    scenario.diam,
                    scenario.vel,
                    scenario.theta,
                    fmt_sci(s.energy_joules),
                    fmt_sci(s.energy_megatons),
                    s.crater_diameter_meters
                        .map(|m| format!("{:.2}", m / 1000.0))
                        .unwrap_or_else(|| "-".into()),
                    truncate(&r.fetched_at, 19),
                );
            }

            println!("\n{} records", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// One JSON document for `fetch`: the record (or summary) alone, or wrapped
/// together with the sections when those are requested.
fn fetch_output(
    extracted: &parser::Extracted,
    scenario: &Scenario,
    city: Option<String>,
    with_sections: bool,
    summary: bool,
) -> anyhow::Result<serde_json::Value> {
    let (key, body) = if summary {
        let s = ImpactSummary::from_record(&extracted.record, scenario, city);
        ("summary", serde_json::to_value(&s)?)
    } else {
        ("record", serde_json::to_value(&extracted.record)?)
    };
    if !with_sections {
        return Ok(body);
    }
    let mut out = serde_json::Map::new();
    out.insert("sections".into(), serde_json::to_value(&extracted.report)?);
    out.insert(key.into(), body);
    Ok(serde_json::Value::Object(out))
}

/// Parse saved report files in parallel; a malformed file is reported and
/// skipped, the rest still print.
fn parse_files(files: &[PathBuf], with_sections: bool) -> anyhow::Result<()> {
    use rayon::prelude::*;

    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            let outcome = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))
                .and_then(|html| parser::process_document(&html).map_err(anyhow::Error::from));
            (path, outcome)
        })
        .collect();

    let mut out = serde_json::Map::new();
    for (path, outcome) in results {
        match outcome {
            Ok(extracted) => {
                let value = if with_sections {
                    serde_json::json!({
                        "sections": extracted.report,
                        "record": extracted.record,
                    })
                } else {
                    serde_json::to_value(&extracted.record)?
                };
                out.insert(path.display().to_string(), value);
            }
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Flatten stored reports in parallel chunks and save the records. Returns
/// how many parsed; failures are stored with their error.
fn process_reports(conn: &rusqlite::Connection, reports: &[db::StoredReport]) -> anyhow::Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(reports.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut saved = 0usize;
    for chunk in reports.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|r| (r, parser::process_document(&r.html)))
            .collect();

        let mut rows = Vec::with_capacity(results.len());
        for (report, outcome) in results {
            match outcome {
                Ok(extracted) => {
                    saved += 1;
                    rows.push(db::RecordRow {
                        report_id: report.report_id,
                        flat: serde_json::to_string(&extracted.record)?,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(
                        report_id = report.report_id,
                        scenario_id = report.scenario_id,
                        url = %report.url,
                        "Report failed to parse: {}", e
                    );
                    rows.push(db::RecordRow::failed(report.report_id, e.to_string()));
                }
            }
        }

        db::save_records(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(saved)
}

fn fmt_sci(v: Option<f64>) -> String {
    v.map(|x| format!("{:.3e}", x)).unwrap_or_else(|| "-".into())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
