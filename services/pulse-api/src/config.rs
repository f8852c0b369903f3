//! Service configuration: monitored cities and environment settings.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use aqi_common::snapshot::CityMeta;

/// Default poll interval in seconds.
pub const DEFAULT_REFRESH_SECS: u64 = 60;

/// One monitored city and its WAQI stations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    /// WAQI station slugs, e.g. "delhi/anand-vihar".
    pub stations: Vec<String>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_emoji")]
    pub emoji: String,
}

fn default_color() -> String {
    "#7fff00".to_string()
}

fn default_emoji() -> String {
    "\u{1F33F}".to_string()
}

/// The full city roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitiesConfig {
    pub cities: Vec<CityConfig>,
}

impl CitiesConfig {
    /// The five built-in Indian cities with their CPCB/WAQI stations.
    pub fn builtin() -> Self {
        let city = |name: &str, stations: &[&str], color: &str, emoji: &str| CityConfig {
            name: name.to_string(),
            stations: stations.iter().map(|s| s.to_string()).collect(),
            color: color.to_string(),
            emoji: emoji.to_string(),
        };

        Self {
            cities: vec![
                city(
                    "Delhi",
                    &[
                        "delhi/anand-vihar",
                        "delhi/punjabi-bagh",
                        "delhi/ito",
                        "delhi/dwarka-sector-8",
                    ],
                    "#7fff00",
                    "\u{1F3DB}",
                ),
                city(
                    "Mumbai",
                    &[
                        "mumbai/bandra-kurla",
                        "mumbai/chembur",
                        "mumbai/worli",
                        "mumbai/navi-mumbai",
                    ],
                    "#38bdf8",
                    "\u{1F30A}",
                ),
                city(
                    "Kolkata",
                    &[
                        "kolkata/rabindra-bharati",
                        "kolkata/victoria",
                        "kolkata/ballygunge",
                        "kolkata/jadavpur",
                    ],
                    "#f5a623",
                    "\u{2693}",
                ),
                city(
                    "Chennai",
                    &[
                        "chennai/alandur",
                        "chennai/manali",
                        "chennai/velachery",
                        "chennai/kodungaiyur",
                    ],
                    "#c084fc",
                    "\u{1F334}",
                ),
                city(
                    "Prayagraj",
                    &[
                        "allahabad/nh-27,-prayagraj",
                        "allahabad/civil-lines-prayagraj",
                    ],
                    "#ff6b6b",
                    "\u{1F549}",
                ),
            ],
        }
    }

    /// Load the roster from `<dir>/cities.yaml`, falling back to the
    /// built-in set when the file is absent.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("cities.yaml");
        if !path.exists() {
            tracing::info!(path = %path.display(), "No cities.yaml, using built-in city roster");
            return Ok(Self::builtin());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            cities = config.cities.len(),
            "Loaded city roster"
        );
        Ok(config)
    }

    pub fn names(&self) -> Vec<String> {
        self.cities.iter().map(|c| c.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&CityConfig> {
        self.cities.iter().find(|c| c.name == name)
    }

    /// Display metadata keyed by city name, for snapshot aggregation.
    pub fn meta_map(&self) -> HashMap<String, CityMeta> {
        self.cities
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    CityMeta {
                        color: c.color.clone(),
                        emoji: c.emoji.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Settings taken from the environment.
///
/// Absence of either token degrades the corresponding feature instead of
/// failing startup: a missing WAQI token falls back to the rate-limited
/// "demo" token, a missing LLM key switches chat to placeholder answers.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub waqi_token: String,
    pub google_api_key: Option<String>,
    pub refresh_interval: Duration,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let waqi_token = std::env::var("WAQI_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "demo".to_string());

        let google_api_key = std::env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let refresh_interval = std::env::var("REFRESH_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_REFRESH_SECS));

        Self {
            waqi_token,
            google_api_key,
            refresh_interval,
        }
    }
}
