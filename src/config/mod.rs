//! Configuration management for the binday pipeline
//!
//! Configuration is layered: values from the TOML config file win, missing
//! values fall back to environment variables, and hardcoded defaults cover
//! the rest. Blank values and the strings `none`/`null` count as absent in
//! both layers, so a templated config file with empty slots behaves the
//! same as one with the keys removed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::models::Address;
use crate::schedule::{ScheduleError, ScheduleSpec};
use crate::scraper::ScraperConfig;

/// Config file consulted when neither `--config` nor `CONFIG_PATH` is set
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

// ============================================================================
// Value helpers
// ============================================================================

/// Treat blank, `none` and `null` values as absent
fn sanitize(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("null")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_string(name: &str) -> Option<String> {
    sanitize(std::env::var(name).ok())
}

/// A set boolean variable is true only when it says `true` in any case;
/// everything else a present variable says means false
fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

// ============================================================================
// Address and schedule sections
// ============================================================================

/// Address selection for the council lookup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Postcode submitted to the lookup form
    pub postcode: Option<String>,

    /// Option value identifying the address in the lookup list
    pub address_id: Option<String>,

    /// Visible text of the address in the lookup list
    pub address_text: Option<String>,
}

impl AddressConfig {
    fn merge_env(&mut self) {
        self.postcode = sanitize(self.postcode.take()).or_else(|| env_string("POSTCODE"));
        self.address_id = sanitize(self.address_id.take()).or_else(|| env_string("ADDRESS_ID"));
        self.address_text =
            sanitize(self.address_text.take()).or_else(|| env_string("ADDRESS_TEXT"));
    }

    pub fn postcode(&self) -> Option<String> {
        sanitize(self.postcode.clone())
    }

    pub fn address_id(&self) -> Option<String> {
        sanitize(self.address_id.clone())
    }

    pub fn address_text(&self) -> Option<String> {
        sanitize(self.address_text.clone())
    }
}

/// Run schedule lines
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Schedule lines, raw cron or short phrases like `mon,fri 19:30`
    pub cron: Vec<String>,
}

// ============================================================================
// Notifier sections
// ============================================================================

/// MQTT backend settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: Option<bool>,

    /// Broker hostname or IP
    pub broker: Option<String>,

    pub port: Option<u16>,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Topic prefix for the config/state/attributes messages
    pub topic: Option<String>,

    /// chrono format pattern overriding the default state payload
    pub state_format: Option<String>,
}

impl MqttConfig {
    pub const DEFAULT_PORT: u16 = 1883;
    pub const DEFAULT_TOPIC: &'static str = "homeassistant/sensor/binday";

    fn merge_env(&mut self) {
        self.enabled = self.enabled.or_else(|| env_bool("ENABLE_MQTT"));
        self.broker = sanitize(self.broker.take()).or_else(|| env_string("MQTT_BROKER"));
        self.port = self.port.or_else(|| env_parse("MQTT_PORT"));
        self.username = sanitize(self.username.take()).or_else(|| env_string("MQTT_USERNAME"));
        self.password = sanitize(self.password.take()).or_else(|| env_string("MQTT_PASSWORD"));
        self.topic = sanitize(self.topic.take()).or_else(|| env_string("MQTT_TOPIC"));
        self.state_format =
            sanitize(self.state_format.take()).or_else(|| env_string("MQTT_STATE_FORMAT"));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn broker(&self) -> Option<String> {
        sanitize(self.broker.clone())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(Self::DEFAULT_PORT)
    }

    pub fn username(&self) -> Option<String> {
        sanitize(self.username.clone())
    }

    pub fn password(&self) -> Option<String> {
        sanitize(self.password.clone())
    }

    pub fn topic(&self) -> String {
        sanitize(self.topic.clone()).unwrap_or_else(|| Self::DEFAULT_TOPIC.to_string())
    }

    pub fn state_format(&self) -> Option<String> {
        sanitize(self.state_format.clone())
    }
}

/// Webhook backend settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: Option<bool>,

    /// Endpoint receiving the JSON payload
    pub url: Option<String>,
}

impl WebhookConfig {
    fn merge_env(&mut self) {
        self.enabled = self.enabled.or_else(|| env_bool("ENABLE_WEBHOOK"));
        self.url = sanitize(self.url.take()).or_else(|| env_string("WEBHOOK_URL"));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn url(&self) -> Option<String> {
        sanitize(self.url.clone())
    }
}

// ============================================================================
// Calendar sections
// ============================================================================

/// Calendar backend settings grouped under `[calendars]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CalendarsConfig {
    pub outlook: OutlookConfig,
    pub google: GoogleConfig,
}

impl CalendarsConfig {
    fn merge_env(&mut self) {
        self.outlook.merge_env();
        self.google.merge_env();
    }
}

/// Outlook (Microsoft Graph) settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutlookConfig {
    pub enabled: Option<bool>,

    /// Azure application (client) id
    pub client_id: Option<String>,

    pub client_secret: Option<String>,

    /// Azure tenant, `common` for personal accounts
    pub tenant_id: Option<String>,

    /// Calendar display name, resolved to an id at first use
    pub calendar_name: Option<String>,

    /// Calendar id; takes precedence over the name when both are set
    pub calendar_id: Option<String>,

    /// Token file path, relative paths resolve against the config directory
    pub token_file: Option<String>,
}

impl OutlookConfig {
    pub const DEFAULT_TOKEN_FILE: &'static str = "o365_token.txt";

    fn merge_env(&mut self) {
        self.enabled = self.enabled.or_else(|| env_bool("ENABLE_OUTLOOK"));
        self.client_id = sanitize(self.client_id.take()).or_else(|| env_string("CLIENT_ID"));
        self.client_secret =
            sanitize(self.client_secret.take()).or_else(|| env_string("CLIENT_SECRET"));
        self.tenant_id = sanitize(self.tenant_id.take()).or_else(|| env_string("TENANT_ID"));
        self.calendar_name = sanitize(self.calendar_name.take())
            .or_else(|| env_string("OUTLOOK_CALENDAR_NAME"))
            .or_else(|| env_string("CALENDAR_NAME"));
        self.calendar_id =
            sanitize(self.calendar_id.take()).or_else(|| env_string("OUTLOOK_CALENDAR_ID"));
        self.token_file =
            sanitize(self.token_file.take()).or_else(|| env_string("OUTLOOK_TOKEN_FILE"));
    }

    /// Outlook is the one backend that defaults to enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn client_id(&self) -> Option<String> {
        sanitize(self.client_id.clone())
    }

    pub fn client_secret(&self) -> Option<String> {
        sanitize(self.client_secret.clone())
    }

    pub fn tenant(&self) -> String {
        sanitize(self.tenant_id.clone()).unwrap_or_else(|| "common".to_string())
    }

    pub fn calendar_name(&self) -> Option<String> {
        sanitize(self.calendar_name.clone())
    }

    pub fn calendar_id(&self) -> Option<String> {
        sanitize(self.calendar_id.clone())
    }

    pub fn token_file_path(&self, data_dir: &Path) -> PathBuf {
        let file = sanitize(self.token_file.clone())
            .unwrap_or_else(|| Self::DEFAULT_TOKEN_FILE.to_string());
        let path = PathBuf::from(file);
        if path.is_absolute() {
            path
        } else {
            data_dir.join(path)
        }
    }
}

/// Google Calendar settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub enabled: Option<bool>,

    /// Target calendar, `primary` for the account default
    pub calendar_id: Option<String>,

    /// Service account JSON path, relative paths resolve against the
    /// config directory
    pub service_account_file: Option<String>,
}

impl GoogleConfig {
    pub const DEFAULT_SERVICE_ACCOUNT_FILE: &'static str = "google_service_account.json";

    fn merge_env(&mut self) {
        self.enabled = self.enabled.or_else(|| env_bool("ENABLE_GOOGLE_CALENDAR"));
        self.calendar_id =
            sanitize(self.calendar_id.take()).or_else(|| env_string("GOOGLE_CALENDAR_ID"));
        self.service_account_file = sanitize(self.service_account_file.take())
            .or_else(|| env_string("GOOGLE_SERVICE_ACCOUNT_FILE"));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn calendar_id(&self) -> String {
        sanitize(self.calendar_id.clone()).unwrap_or_else(|| "primary".to_string())
    }

    pub fn service_account_path(&self, data_dir: &Path) -> PathBuf {
        let file = sanitize(self.service_account_file.clone())
            .unwrap_or_else(|| Self::DEFAULT_SERVICE_ACCOUNT_FILE.to_string());
        let path = PathBuf::from(file);
        if path.is_absolute() {
            path
        } else {
            data_dir.join(path)
        }
    }
}

// ============================================================================
// Status API and WebDriver sections
// ============================================================================

/// Status REST API settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: Option<bool>,

    pub host: Option<String>,

    pub port: Option<u16>,
}

impl StatusConfig {
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 5000;

    fn merge_env(&mut self) {
        self.enabled = self.enabled.or_else(|| env_bool("ENABLE_REST_API"));
        self.host = sanitize(self.host.take()).or_else(|| env_string("REST_API_HOST"));
        self.port = self.port.or_else(|| env_parse("REST_API_PORT"));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    pub fn host(&self) -> String {
        sanitize(self.host.clone()).unwrap_or_else(|| Self::DEFAULT_HOST.to_string())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(Self::DEFAULT_PORT)
    }
}

/// WebDriver endpoint settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebdriverConfig {
    pub host: Option<String>,

    pub port: Option<u16>,

    /// Override for the council lookup page URL
    pub lookup_url: Option<String>,
}

impl WebdriverConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 9515;

    fn merge_env(&mut self) {
        self.host = sanitize(self.host.take()).or_else(|| env_string("WEBDRIVER_HOST"));
        self.port = self.port.or_else(|| env_parse("WEBDRIVER_PORT"));
        self.lookup_url = sanitize(self.lookup_url.take()).or_else(|| env_string("LOOKUP_URL"));
    }

    pub fn host(&self) -> String {
        sanitize(self.host.clone()).unwrap_or_else(|| Self::DEFAULT_HOST.to_string())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(Self::DEFAULT_PORT)
    }

    pub fn lookup_url(&self) -> Option<String> {
        sanitize(self.lookup_url.clone())
    }
}

// ============================================================================
// Main configuration
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address selection
    pub address: AddressConfig,

    /// Run schedule
    pub schedule: ScheduleConfig,

    /// MQTT backend
    pub mqtt: MqttConfig,

    /// Calendar backends
    pub calendars: CalendarsConfig,

    /// Webhook backend
    pub webhook: WebhookConfig,

    /// Status REST API
    pub status: StatusConfig,

    /// WebDriver endpoint
    pub webdriver: WebdriverConfig,

    /// Where the configuration was loaded from
    #[serde(skip)]
    path: Option<PathBuf>,

    /// Parsed document as written, kept so writes preserve unknown keys
    #[serde(skip)]
    raw: Option<toml::Value>,
}

impl Config {
    /// Load configuration, layering file values over environment variables
    ///
    /// The path argument wins over `CONFIG_PATH`, which wins over
    /// [`DEFAULT_CONFIG_FILE`]. A missing file is not an error; the
    /// environment and defaults carry the whole configuration then.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => env_string("CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let raw: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;
            let mut config: Config = raw
                .clone()
                .try_into()
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            config.raw = Some(raw);
            config
        } else {
            debug!(path = %path.display(), "no config file, using environment and defaults");
            Config::default()
        };

        config.path = Some(path);
        config.merge_env();
        Ok(config)
    }

    fn merge_env(&mut self) {
        self.address.merge_env();
        self.mqtt.merge_env();
        self.calendars.merge_env();
        self.webhook.merge_env();
        self.status.merge_env();
        self.webdriver.merge_env();
    }

    /// Directory that relative credential paths resolve against
    pub fn data_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The configured address selection
    pub fn address(&self) -> Address {
        let mut address = Address::from_postcode(self.address.postcode().unwrap_or_default());
        if let Some(id) = self.address.address_id() {
            address = address.with_id(id);
        }
        if let Some(text) = self.address.address_text() {
            address = address.with_text(text);
        }
        address
    }

    /// The configured schedule, or the built-in default when none is given
    pub fn schedule_spec(&self) -> Result<ScheduleSpec, ScheduleError> {
        if self.schedule.cron.is_empty() {
            return Ok(ScheduleSpec::defaults());
        }
        ScheduleSpec::parse(&self.schedule.cron)
    }

    pub fn scraper_config(&self) -> ScraperConfig {
        let mut scraper = ScraperConfig::default();
        if let Some(url) = self.webdriver.lookup_url() {
            scraper.lookup_url = url;
        }
        scraper
    }

    /// Checks that must hold before a collection run can start
    pub fn validate_for_run(&self) -> Result<()> {
        if self.address.postcode().is_none() {
            anyhow::bail!(
                "no postcode configured; set POSTCODE or add postcode under [address] in {}",
                self.path
                    .as_deref()
                    .unwrap_or(Path::new(DEFAULT_CONFIG_FILE))
                    .display()
            );
        }
        Ok(())
    }

    /// Record the outcome of a run into the config document
    ///
    /// Rewrites the file from the document parsed at load time plus the
    /// `last_run` table, so keys this version does not know survive.
    pub async fn record_last_run(&self, status: &str, message: &str) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut doc = self
            .raw
            .clone()
            .unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()));
        let table = doc
            .as_table_mut()
            .context("config document root is not a table")?;

        let mut last_run = toml::map::Map::new();
        last_run.insert(
            "status".to_string(),
            toml::Value::String(status.to_string()),
        );
        last_run.insert(
            "message".to_string(),
            toml::Value::String(message.to_string()),
        );
        last_run.insert(
            "timestamp".to_string(),
            toml::Value::String(chrono::Utc::now().to_rfc3339()),
        );
        table.insert("last_run".to_string(), toml::Value::Table(last_run));

        let rendered = toml::to_string_pretty(&doc).context("Failed to render configuration")?;
        tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_switches() {
        let config = Config::default();
        assert!(config.calendars.outlook.is_enabled());
        assert!(!config.calendars.google.is_enabled());
        assert!(!config.mqtt.is_enabled());
        assert!(!config.webhook.is_enabled());
        assert!(!config.status.is_enabled());
    }

    #[test]
    fn test_sanitize_placeholder_values() {
        assert_eq!(
            sanitize(Some("  BT1 1AA ".to_string())),
            Some("BT1 1AA".to_string())
        );
        assert_eq!(sanitize(Some(String::new())), None);
        assert_eq!(sanitize(Some("   ".to_string())), None);
        assert_eq!(sanitize(Some("none".to_string())), None);
        assert_eq!(sanitize(Some("NULL".to_string())), None);
        assert_eq!(sanitize(None), None);
    }

    #[test]
    fn test_accessor_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.port(), 1883);
        assert_eq!(config.mqtt.topic(), "homeassistant/sensor/binday");
        assert_eq!(config.calendars.outlook.tenant(), "common");
        assert_eq!(config.calendars.google.calendar_id(), "primary");
        assert_eq!(config.status.host(), "0.0.0.0");
        assert_eq!(config.status.port(), 5000);
        assert_eq!(config.webdriver.host(), "127.0.0.1");
        assert_eq!(config.webdriver.port(), 9515);
    }

    #[test]
    fn test_parse_sections_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [address]
            postcode = "BT1 1AA"
            address_id = "12345"

            [schedule]
            cron = ["mon,fri 19:30"]

            [mqtt]
            enabled = true
            broker = "mqtt.local"
            port = 1884

            [calendars.outlook]
            enabled = false
            client_id = "abc-123"

            [calendars.google]
            enabled = true
            calendar_id = "family"

            [status]
            enabled = true
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.address.postcode().as_deref(), Some("BT1 1AA"));
        assert_eq!(config.schedule.cron, vec!["mon,fri 19:30"]);
        assert!(config.mqtt.is_enabled());
        assert_eq!(config.mqtt.broker().as_deref(), Some("mqtt.local"));
        assert_eq!(config.mqtt.port(), 1884);
        assert!(!config.calendars.outlook.is_enabled());
        assert_eq!(
            config.calendars.outlook.client_id().as_deref(),
            Some("abc-123")
        );
        assert!(config.calendars.google.is_enabled());
        assert_eq!(config.calendars.google.calendar_id(), "family");
        assert!(config.status.is_enabled());
        assert_eq!(config.status.port(), 8080);
    }

    #[test]
    fn test_unknown_sections_tolerated() {
        let config: Config = toml::from_str(
            r#"
            [address]
            postcode = "BT1 1AA"

            [last_run]
            status = "ok"
            "#,
        )
        .unwrap();
        assert_eq!(config.address.postcode().as_deref(), Some("BT1 1AA"));
    }

    #[test]
    fn test_address_assembly() {
        let mut config = Config::default();
        config.address.postcode = Some("BT1 1AA".to_string());
        config.address.address_id = Some("12345".to_string());

        let address = config.address();
        assert_eq!(address.postcode, "BT1 1AA");
        assert_eq!(address.id.as_deref(), Some("12345"));
        assert!(address.text.is_none());
        assert!(address.has_selection());
    }

    #[test]
    fn test_schedule_spec_defaults_when_empty() {
        let config = Config::default();
        let spec = config.schedule_spec().unwrap();
        assert_eq!(spec.cron_lines(), vec!["30 19 * * 1,5,6", "30 3 * * 3"]);
    }

    #[test]
    fn test_schedule_spec_invalid_line_surfaces() {
        let mut config = Config::default();
        config.schedule.cron = vec!["nonsense 99:99".to_string()];
        let err = config.schedule_spec().unwrap_err();
        assert_eq!(err.to_string(), "Invalid schedule: nonsense 99:99");
    }

    #[test]
    fn test_token_file_path_resolution() {
        let outlook = OutlookConfig::default();
        assert_eq!(
            outlook.token_file_path(Path::new("/etc/binday")),
            PathBuf::from("/etc/binday/o365_token.txt")
        );

        let outlook = OutlookConfig {
            token_file: Some("/var/lib/binday/token.json".to_string()),
            ..OutlookConfig::default()
        };
        assert_eq!(
            outlook.token_file_path(Path::new("/etc/binday")),
            PathBuf::from("/var/lib/binday/token.json")
        );
    }

    #[test]
    fn test_validate_for_run_needs_postcode() {
        let config = Config::default();
        assert!(config.validate_for_run().is_err());

        let mut config = Config::default();
        config.address.postcode = Some("BT1 1AA".to_string());
        assert!(config.validate_for_run().is_ok());
    }

    #[test]
    fn test_scraper_config_lookup_override() {
        let mut config = Config::default();
        assert_eq!(
            config.scraper_config().lookup_url,
            crate::scraper::DEFAULT_LOOKUP_URL
        );

        config.webdriver.lookup_url = Some("http://localhost:8000/lookup".to_string());
        assert_eq!(
            config.scraper_config().lookup_url,
            "http://localhost:8000/lookup"
        );
    }
}
