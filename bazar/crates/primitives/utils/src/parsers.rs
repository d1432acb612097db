use anyhow::{anyhow, bail};
use std::time::Duration;
use url::Url;

/// Parse a string URL & returns it as [Url].
pub fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    s.parse()
}

/// Parses a string duration & return it as [Duration].
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let split_index = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(|| anyhow!("Invalid duration format: {}", s))?;

    let (value_str, suffix) = s.split_at(split_index);
    let value: u64 = value_str.parse().map_err(|_| anyhow!("Invalid duration value: {}", value_str))?;

    match suffix.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "min" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => bail!("Invalid duration suffix: {}. Expected 'ms', 's', 'min' or 'h'.", suffix),
    }
}

/// Parses a comma separated list, dropping empty items.
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

/// Parses a `Name=Value` tag.
pub fn parse_tag(s: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = s.split_once('=').ok_or_else(|| anyhow!("Expected Name=Value, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Tag name cannot be empty");
    }
    Ok((name.to_string(), value.trim().to_string()))
}
