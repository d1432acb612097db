use crate::parsers::parse_duration;
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Reads durations written as `"10s"`, `"250ms"`, `"5min"`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if duration.subsec_nanos() == 0 {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    } else {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timeouts {
        #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
        node: Duration,
    }

    #[test]
    fn duration_uses_cli_notation() {
        let parsed: Timeouts = serde_json::from_str(r#"{ "node": "1500ms" }"#).unwrap();
        assert_eq!(parsed.node, Duration::from_millis(1500));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"node":"1500ms"}"#);

        let whole = Timeouts { node: Duration::from_secs(10) };
        assert_eq!(serde_json::to_string(&whole).unwrap(), r#"{"node":"10s"}"#);
        assert!(serde_json::from_str::<Timeouts>(r#"{ "node": "soon" }"#).is_err());
    }
}
