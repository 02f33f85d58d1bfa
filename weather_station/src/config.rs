use core::time::Duration;

use serde::Deserialize;

use crate::reading::Narrowing;

/// Defines the structure for the station settings (the contents of `secrets.toml`).
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// Wi-Fi configuration.
    pub wifi: WiFiConfig,
    /// OpenWeather API configuration.
    pub openweather: OpenWeatherConfig,
    /// HTTP transport limits.
    #[serde(default)]
    pub http: HttpConfig,
    /// Poll interval.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// How raw API values are turned into a reading.
    #[serde(default)]
    pub reading: ReadingConfig,
}

/// Defines the structure for the Wi-Fi configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct WiFiConfig {
    /// The SSID of the Wi-Fi network.
    pub ssid: String,
    /// The password of the Wi-Fi network. Empty means an open network.
    #[serde(default)]
    pub password: String,
}

/// Defines the structure for the OpenWeather API configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct OpenWeatherConfig {
    /// The API key for the OpenWeather API.
    pub api_key: String,
    /// The city for which the weather should be displayed.
    pub city: String,
    /// ISO 3166 country code appended to the city in the query.
    pub country_code: String,
    /// Host name of the API server.
    #[serde(default = "default_host")]
    pub host: String,
    /// Plain HTTP port of the API server.
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HttpConfig {
    /// Maximum wait for the end of the response headers, also used per body read.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Working-buffer size for the JSON body.
    pub max_body_bytes: u64,
    /// Reject responses whose status line is not 2xx.
    pub validate_status: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Sleep between two cycles.
    pub interval_secs: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ReadingConfig {
    pub narrowing: Narrowing,
}

fn default_host() -> String {
    "api.openweathermap.org".to_string()
}

fn default_port() -> u16 {
    80
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 10,
            max_body_bytes: 4096,
            validate_status: true,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        // 15 minutes
        Self { interval_secs: 900 }
    }
}

impl Settings {
    /// Parses and validates settings from TOML text.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let settings: Settings = toml::from_str(text)
            .map_err(|e| anyhow::anyhow!("Error parsing secrets.toml: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let ow = &self.openweather;
        for (name, value) in [
            ("openweather.api_key", &ow.api_key),
            ("openweather.city", &ow.city),
            ("openweather.country_code", &ow.country_code),
            ("openweather.host", &ow.host),
        ] {
            if value.is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
            // These end up verbatim in the request line and the Host header.
            if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
                anyhow::bail!("{} must not contain whitespace or control characters", name);
            }
        }
        if self.wifi.ssid.is_empty() {
            anyhow::bail!("wifi.ssid must not be empty");
        }
        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            anyhow::bail!("http timeouts must be at least one second");
        }
        if self.http.max_body_bytes == 0 {
            anyhow::bail!("http.max_body_bytes must not be zero");
        }
        if self.schedule.interval_secs == 0 {
            anyhow::bail!("schedule.interval_secs must not be zero");
        }
        if self.schedule.interval_secs > u64::from(u32::MAX) / 1000 {
            anyhow::bail!(
                "schedule.interval_secs must not exceed {} seconds",
                u32::MAX / 1000
            );
        }
        Ok(())
    }
}

impl OpenWeatherConfig {
    /// Request target for the current-weather endpoint.
    pub fn resource(&self) -> String {
        format!(
            "/data/2.5/weather?q={},{}&units=metric&appid={}",
            self.city, self.country_code, self.api_key
        )
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl ScheduleConfig {
    /// Interval in milliseconds. Validation guarantees it fits in `u32`.
    pub fn interval_ms(&self) -> u32 {
        u32::try_from(self.interval_secs.saturating_mul(1000)).unwrap_or(u32::MAX)
    }
}
