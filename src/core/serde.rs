/// Serializes a Duration as whole milliseconds
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        ms.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{Config, DelayRange};
    use std::time::Duration;

    #[test]
    fn test_config_serialization() {
        let original = Config::default();
        let serialized = serde_json::to_string(&original).unwrap();
        assert!(serialized.contains("\"start_timeout\":20000"));

        let deserialized: Config = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "join_attempts": 3, "host_delay": { "min_ms": 10, "max_ms": 20 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.join_attempts, 3);
        assert_eq!(config.host_delay, DelayRange::new(10, 20));
        assert_eq!(config.advertise_interval, Duration::from_millis(2750));
    }
}
