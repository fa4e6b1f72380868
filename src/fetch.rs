use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Settings;
use crate::db::{self, ReportRow};
use crate::error::PipelineError;
use crate::parser::{self, Extracted};

/// Calculator inputs, sent as the query string of the report request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Distance from impact, km.
    pub dist: f64,
    /// Projectile diameter, m.
    pub diam: f64,
    /// Projectile density, kg/m3.
    pub pdens: f64,
    pub pdens_select: u8,
    /// Impact velocity, km/s.
    pub vel: f64,
    /// Impact angle, degrees.
    pub theta: f64,
    /// Target density, kg/m3.
    pub tdens: f64,
    pub tdens_select: u8,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            dist: 1.0,
            diam: 1000.0,
            pdens: 3000.0,
            pdens_select: 0,
            vel: 20.0,
            theta: 30.0,
            tdens: 1000.0,
            tdens_select: 0,
        }
    }
}

impl Scenario {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("dist", self.dist.to_string()),
            ("diam", self.diam.to_string()),
            ("pdens", self.pdens.to_string()),
            ("pdens_select", self.pdens_select.to_string()),
            ("vel", self.vel.to_string()),
            ("theta", self.theta.to_string()),
            ("tdens", self.tdens.to_string()),
            ("tdens_select", self.tdens_select.to_string()),
        ]
    }
}

pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub status: u16,
    pub latency_ms: i64,
    pub fetched_at: DateTime<Utc>,
}

pub fn build_client(settings: &Settings) -> Result<Client, PipelineError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    match HeaderValue::from_str(&settings.referer) {
        Ok(referer) => {
            headers.insert(REFERER, referer);
        }
        Err(_) => warn!(referer = %settings.referer, "invalid referer header, sending none"),
    }

    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|source| PipelineError::FetchFailure {
            url: settings.endpoint.clone(),
            source,
        })
}

/// GET the report for one scenario. Network errors, timeouts and non-2xx
/// statuses all surface as `FetchFailure`; nothing is retried.
pub async fn fetch_report(
    client: &Client,
    endpoint: &str,
    scenario: &Scenario,
) -> Result<FetchedPage, PipelineError> {
    let request = client
        .get(endpoint)
        .query(&scenario.query_pairs())
        .build()
        .map_err(|source| PipelineError::FetchFailure {
            url: endpoint.to_string(),
            source,
        })?;
    let url = request.url().to_string();
    let failure = |source| PipelineError::FetchFailure {
        url: url.clone(),
        source,
    };

    info!(%url, "Fetching impact report");
    let start = Instant::now();
    let response = client
        .execute(request)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(failure)?;
    let status = response.status().as_u16();
    let html = response.text().await.map_err(failure)?;
    let latency_ms = start.elapsed().as_millis() as i64;

    info!(%url, status, latency_ms, bytes = html.len(), "Fetched impact report");
    Ok(FetchedPage {
        url,
        html,
        status,
        latency_ms,
        fetched_at: Utc::now(),
    })
}

/// Fetch, decompose and flatten one scenario.
pub async fn run_pipeline(
    client: &Client,
    settings: &Settings,
    scenario: &Scenario,
) -> Result<(FetchedPage, Extracted), PipelineError> {
    let page = fetch_report(client, &settings.endpoint, scenario).await?;
    let extracted = parser::process_document(&page.html)?;
    Ok((page, extracted))
}

/// Sweep stats returned after completion.
pub struct SweepStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Fetch many scenarios concurrently, saving each report to the DB as it
/// arrives. Failed fetches are stored with their error.
pub async fn sweep_streaming(
    conn: &Connection,
    settings: &Settings,
    scenarios: Vec<(i64, Scenario)>,
) -> Result<SweepStats> {
    let client = build_client(settings)?;
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let total = scenarios.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<ReportRow>(settings.concurrency.max(1) * 2);

    for (scenario_id, scenario) in scenarios {
        let client = client.clone();
        let endpoint = settings.endpoint.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let row = match fetch_report(&client, &endpoint, &scenario).await {
                Ok(page) => ReportRow {
                    scenario_id,
                    url: page.url,
                    html: Some(page.html),
                    status: Some(i32::from(page.status)),
                    error: None,
                    latency_ms: Some(page.latency_ms),
                },
                Err(e) => {
                    warn!("Fetch failed for scenario {}: {}", scenario_id, e);
                    let url = match &e {
                        PipelineError::FetchFailure { url, .. } => url.clone(),
                        PipelineError::MalformedDocument(_) => endpoint.clone(),
                    };
                    ReportRow {
                        scenario_id,
                        url,
                        html: None,
                        status: None,
                        error: Some(e.to_string()),
                        latency_ms: None,
                    }
                }
            };
            let _ = tx.send(row).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;
    while let Some(row) = rx.recv().await {
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }
        db::insert_report(conn, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Swept {} scenarios ({} ok, {} errors)", total, ok, errors);

    Ok(SweepStats { total, ok, errors })
}

/// Cartesian product of the swept parameters over a base scenario.
pub fn scenario_grid(base: &Scenario, diams: &[f64], vels: &[f64], thetas: &[f64]) -> Vec<Scenario> {
    let or_base = |values: &[f64], base: f64| -> Vec<f64> {
        if values.is_empty() {
            vec![base]
        } else {
            values.to_vec()
        }
    };
    let diams = or_base(diams, base.diam);
    let vels = or_base(vels, base.vel);
    let thetas = or_base(thetas, base.theta);

    let mut grid = Vec::with_capacity(diams.len() * vels.len() * thetas.len());
    for &diam in &diams {
        for &vel in &vels {
            for &theta in &thetas {
                grid.push(Scenario {
                    diam,
                    vel,
                    theta,
                    ..base.clone()
                });
            }
        }
    }
    grid
}
