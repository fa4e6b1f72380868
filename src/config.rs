use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "https://impact.ese.ic.ac.uk/ImpactEarth/cgi-bin/crater.cgi";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (ImpactScraper/1.0)";
const DEFAULT_REFERER: &str = "https://impact.ese.ic.ac.uk/ImpactEarth/";
const DEFAULT_DB_PATH: &str = "data/impact.sqlite";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub referer: String,
    pub db_path: String,
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Settings {
    /// Defaults, then `impact_report.toml` if present, then `IMPACT_*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("endpoint", DEFAULT_ENDPOINT)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("referer", DEFAULT_REFERER)?
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("concurrency", DEFAULT_CONCURRENCY as i64)?
            .add_source(File::with_name("impact_report").required(false))
            .add_source(Environment::with_prefix("IMPACT"))
            .build()?
            .try_deserialize()
    }
}
