use weather_station::Settings;

// Read secrets directly from file at compile time
const SECRETS_TOML: &str = include_str!("../../secrets.toml");

/// Loads the settings that were embedded at compile time.
pub fn load() -> anyhow::Result<Settings> {
    Settings::from_toml(SECRETS_TOML)
}
