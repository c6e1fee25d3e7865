use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The listing page that `/scrape` reads
    pub source_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "HeadlineKeeper/1.0 (News Scraper)".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// CSS selectors describing one article entry on the listing page.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SelectorConfig {
    #[serde(default = "default_entry")]
    pub entry: String,
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_summary")]
    pub summary: String,
}

fn default_entry() -> String {
    "article".to_string()
}

fn default_link() -> String {
    "a".to_string()
}

fn default_title() -> String {
    "h2.headline".to_string()
}

fn default_summary() -> String {
    "p.summary".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            link: default_link(),
            title: default_title(),
            summary: default_summary(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Address to bind, with `PORT` taking precedence over the configured port.
    pub fn bind_addr(&self, port_override: Option<&str>) -> String {
        match port_override {
            Some(port) if !port.trim().is_empty() => {
                let host = self
                    .listen_addr
                    .rsplit_once(':')
                    .map(|(host, _)| host)
                    .unwrap_or("0.0.0.0");
                format!("{}:{}", host, port.trim())
            }
            _ => self.listen_addr.clone(),
        }
    }
}
