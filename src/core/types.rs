use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::IDENTITY_LEN;

/// Link-layer style address of a device
///
/// Used both as the peer key of a transport and as the key of a scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(pub [u8; IDENTITY_LEN]);

impl Identity {
    /// Address every device on the medium listens on
    pub const BROADCAST: Identity = Identity([0xff; IDENTITY_LEN]);

    /// Generates a random identity
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; IDENTITY_LEN];
        rng.fill(&mut bytes);
        // Clear the group bit so a random identity is never a broadcast address
        bytes[0] &= 0xfe;
        Identity(bytes)
    }

    /// Returns the raw address bytes
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Lowercase hex without separators, as carried on the wire
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First four hex digits, used as a compact label
    pub fn short(&self) -> String {
        hex::encode(&self.0[..2])
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Identity {
    type Err = Error;

    /// Accepts `aabbccddeeff` as well as `aa:bb:cc:dd:ee:ff`
    fn from_str(s: &str) -> Result<Self> {
        let compact: String = if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() != IDENTITY_LEN || parts.iter().any(|p| p.len() != 2) {
                return Err(Error::protocol(format!("invalid identity: {s}")));
            }
            parts.concat()
        } else {
            s.to_string()
        };

        let mut bytes = [0u8; IDENTITY_LEN];
        hex::decode_to_slice(&compact, &mut bytes)
            .map_err(|e| Error::protocol(format!("invalid identity {s}: {e}")))?;
        Ok(Identity(bytes))
    }
}

impl From<SocketAddrV4> for Identity {
    fn from(addr: SocketAddrV4) -> Self {
        let [a, b, c, d] = addr.ip().octets();
        let [hi, lo] = addr.port().to_be_bytes();
        Identity([a, b, c, d, hi, lo])
    }
}

impl From<Identity> for SocketAddrV4 {
    fn from(id: Identity) -> Self {
        let [a, b, c, d, hi, lo] = id.0;
        SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), u16::from_be_bytes([hi, lo]))
    }
}

/// Bounds of the pause between two room advertisements, jitter included
pub const ADVERTISE_GAP_MIN: Duration = Duration::from_millis(500);
pub const ADVERTISE_GAP_MAX: Duration = Duration::from_millis(3000);

/// Inclusive range of delays in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u32,
    pub max_ms: u32,
}

impl DelayRange {
    pub const fn new(min_ms: u32, max_ms: u32) -> Self {
        DelayRange { min_ms, max_ms }
    }

    /// Picks a uniformly random delay within the range
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min_ms..=self.max_ms)
    }

    pub fn contains(&self, ms: u32) -> bool {
        (self.min_ms..=self.max_ms).contains(&ms)
    }
}

/// Configuration for a Reactz node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base pause between room advertisements
    #[serde(with = "super::serde::duration_ms")]
    pub advertise_interval: Duration,
    /// Maximum random offset added to or removed from the advertise interval
    #[serde(with = "super::serde::duration_ms")]
    pub advertise_jitter: Duration,
    /// Cap for the backoff applied after unexpected broadcast failures
    #[serde(with = "super::serde::duration_ms")]
    pub max_backoff: Duration,
    /// Receive timeout for each iteration of a room search
    #[serde(with = "super::serde::duration_ms")]
    pub search_poll: Duration,
    /// How long a client waits for a join acknowledgement before re-sending
    #[serde(with = "super::serde::duration_ms")]
    pub join_retry_interval: Duration,
    /// Number of join requests sent before the host is deemed unreachable
    pub join_attempts: u32,
    /// How long a client waits for the start signal
    #[serde(with = "super::serde::duration_ms")]
    pub start_timeout: Duration,
    /// Receive timeout while listening for scores
    #[serde(with = "super::serde::duration_ms")]
    pub score_poll: Duration,
    /// Range of the host-chosen start delay
    pub host_delay: DelayRange,
    /// Range of the single-player start delay
    pub solo_delay: DelayRange,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            advertise_interval: Duration::from_millis(2750),
            advertise_jitter: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
            search_poll: Duration::from_millis(500),
            join_retry_interval: Duration::from_secs(1),
            join_attempts: 10,
            start_timeout: Duration::from_secs(20),
            score_poll: Duration::from_millis(1500),
            host_delay: DelayRange::new(1000, 5000),
            solo_delay: DelayRange::new(700, 1000),
        }
    }
}

impl Config {
    /// Checks that every interval and range is usable
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("advertise_interval", self.advertise_interval),
            ("search_poll", self.search_poll),
            ("join_retry_interval", self.join_retry_interval),
            ("start_timeout", self.start_timeout),
            ("score_poll", self.score_poll),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be non-zero")));
            }
        }

        let shortest = self.advertise_interval.saturating_sub(self.advertise_jitter);
        let longest = self.advertise_interval.saturating_add(self.advertise_jitter);
        if shortest < ADVERTISE_GAP_MIN || longest > ADVERTISE_GAP_MAX {
            return Err(Error::config(format!(
                "advertise_interval ± advertise_jitter must stay within {ADVERTISE_GAP_MIN:?}..={ADVERTISE_GAP_MAX:?}"
            )));
        }
        if self.max_backoff < self.advertise_interval {
            return Err(Error::config("max_backoff must be at least advertise_interval"));
        }
        if self.join_attempts == 0 {
            return Err(Error::config("join_attempts must be at least 1"));
        }

        for (name, range) in [("host_delay", self.host_delay), ("solo_delay", self.solo_delay)] {
            if range.min_ms > range.max_ms {
                return Err(Error::config(format!("{name} range is inverted")));
            }
            if range.max_ms > super::MAX_START_DELAY_MS {
                return Err(Error::config(format!(
                    "{name} exceeds {} ms",
                    super::MAX_START_DELAY_MS
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_random() {
        let id1 = Identity::random();
        let id2 = Identity::random();
        assert_ne!(id1, id2);
        assert!(!id1.is_broadcast());
    }

    #[test]
    fn test_identity_text_forms() {
        let id: Identity = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(id, Identity([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert_eq!(id.to_string(), "aabbccddeeff");
        assert_eq!(id.short(), "aabb");
        assert_eq!("aabbccddeeff".parse::<Identity>().unwrap(), id);

        assert!("aabbcc".parse::<Identity>().is_err());
        assert!("aa:bb:cc:dd:ee".parse::<Identity>().is_err());
        assert!("zzbbccddeeff".parse::<Identity>().is_err());
    }

    #[test]
    fn test_identity_socket_mapping() {
        let addr: SocketAddrV4 = "192.168.1.20:4210".parse().unwrap();
        let id = Identity::from(addr);
        assert_eq!(id.to_hex(), "c0a80114106e");
        assert_eq!(SocketAddrV4::from(id), addr);
    }

    #[test]
    fn test_delay_range_sampling() {
        use rand::{rngs::StdRng, SeedableRng};
        let range = DelayRange::new(700, 1000);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(range.contains(range.sample(&mut rng)));
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.join_attempts = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.host_delay = DelayRange::new(5000, 1000);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.start_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.advertise_jitter = config.advertise_interval;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_advertise_gaps_stay_in_bounds() {
        let config = Config::default();
        assert!(config.advertise_interval + config.advertise_jitter <= ADVERTISE_GAP_MAX);
        assert!(config.advertise_interval - config.advertise_jitter >= ADVERTISE_GAP_MIN);

        let mut config = Config::default();
        config.advertise_interval = Duration::from_secs(3);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.advertise_interval = Duration::from_millis(600);
        config.advertise_jitter = Duration::from_millis(200);
        assert!(config.validate().is_err());

        config.advertise_jitter = Duration::from_millis(100);
        config.max_backoff = Duration::from_secs(30);
        assert!(config.validate().is_ok());
    }
}
