use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;

use relay_core::Relay;

// =============================================================================
// Unified config (figment-deserialized from defaults / relay.toml / env / CLI)
// =============================================================================
//
//   relay.toml:      port = 8080
//                    variant = "echo"
//
//   env var:         RELAY_PORT=8080   RELAY_MAX_MESSAGE_BYTES=512
//
//   CLI flag:        chat-relay --port 8080 --variant echo

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

/// Which relay to run.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Fan-out only; new clients receive nothing on connect
    Echo,
    /// Fan-out plus full history replay to each new client
    History,
}

/// Tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_variant")]
    pub variant: Variant,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Frames longer than this are dropped; also caps the chat page's input.
    #[serde(default)]
    pub max_message_bytes: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_message_bytes: None,
        }
    }
}

fn default_variant() -> Variant {
    Variant::History
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    80
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_bytes: Option<usize>,
}

/// Build a figment that layers: defaults → config file → RELAY_* env vars → CLI flags.
///
/// A missing config file is not an error; the layer is simply empty.
pub fn load_config(config_file: &Path, overrides: &CliOverrides) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_file))
        .merge(Env::prefixed("RELAY_"))
        .merge(Serialized::defaults(overrides))
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub variant: Variant,
    pub bind_addr: SocketAddr,
    pub log_level: LevelFilter,
    pub max_message_bytes: Option<usize>,
}

impl RelayConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let ip: IpAddr = fc
            .host
            .parse()
            .with_context(|| format!("Invalid bind host: {}", fc.host))?;
        let log_level: LevelFilter = fc
            .log_level
            .parse()
            .with_context(|| format!("Invalid log level: {}", fc.log_level))?;

        Ok(Self {
            variant: fc.variant,
            bind_addr: SocketAddr::new(ip, fc.port),
            log_level,
            max_message_bytes: fc.max_message_bytes,
        })
    }

    /// Extract and resolve a figment built by [`load_config`].
    pub fn from_figment(figment: &figment::Figment) -> Result<Self> {
        let fc: FileConfig = figment.extract().context("Failed to load configuration")?;
        Self::from_file(&fc)
    }

    /// Build the relay this configuration describes.
    pub fn build_relay(&self) -> Relay {
        let relay = match self.variant {
            Variant::Echo => Relay::echo(),
            Variant::History => Relay::with_history(),
        };
        match self.max_message_bytes {
            Some(limit) => relay.max_message_bytes(limit),
            None => relay,
        }
    }

    /// Default `EnvFilter` directive when RUST_LOG is unset.
    pub fn log_directive(&self, debug: bool) -> String {
        let level = if debug {
            LevelFilter::DEBUG
        } else {
            self.log_level
        };
        format!("chat_relay={level},relay_core={level},tower_http={level},warn")
            .to_lowercase()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], default_port())),
            log_level: LevelFilter::INFO,
            max_message_bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    /// Resolve `relay.toml` inside the jail's working directory.
    fn resolve(overrides: &CliOverrides) -> figment::Result<RelayConfig> {
        let figment = load_config(Path::new(DEFAULT_CONFIG_FILE), overrides);
        RelayConfig::from_figment(&figment).map_err(|e| format!("{e:#}").into())
    }

    // ── defaults ────────────────────────────────────────────────────────

    #[test]
    fn test_file_config_defaults() {
        let d = FileConfig::default();
        assert_eq!(d.variant, Variant::History);
        assert_eq!(d.host, "127.0.0.1");
        assert_eq!(d.port, 80);
        assert_eq!(d.log_level, "info");
        assert!(d.max_message_bytes.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = resolve(&CliOverrides::default())?;
            assert_eq!(config.bind_addr, "127.0.0.1:80".parse::<SocketAddr>().unwrap());
            assert_eq!(config.variant, Variant::History);
            assert_eq!(config.max_message_bytes, None);
            Ok(())
        });
    }

    // ── layering ────────────────────────────────────────────────────────

    #[test]
    fn test_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                "variant = \"echo\"\nport = 9000\nmax_message_bytes = 256\n",
            )?;
            let config = resolve(&CliOverrides::default())?;
            assert_eq!(config.variant, Variant::Echo);
            assert_eq!(config.bind_addr.port(), 9000);
            assert_eq!(config.max_message_bytes, Some(256));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "port = 9000\nmax_message_bytes = 256\n")?;
            jail.set_env("RELAY_PORT", "9200");
            jail.set_env("RELAY_MAX_MESSAGE_BYTES", "512");
            jail.set_env("RELAY_VARIANT", "echo");

            let config = resolve(&CliOverrides::default())?;
            assert_eq!(config.bind_addr.port(), 9200);
            assert_eq!(config.max_message_bytes, Some(512));
            assert_eq!(config.variant, Variant::Echo);
            Ok(())
        });
    }

    #[test]
    fn test_cli_overrides_env() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "port = 9000\n")?;
            jail.set_env("RELAY_PORT", "9200");
            jail.set_env("RELAY_MAX_MESSAGE_BYTES", "512");

            let overrides = CliOverrides {
                port: Some(9300),
                max_message_bytes: Some(1024),
                ..Default::default()
            };
            let config = resolve(&overrides)?;
            assert_eq!(config.bind_addr.port(), 9300);
            assert_eq!(config.max_message_bytes, Some(1024));
            Ok(())
        });
    }

    #[test]
    fn test_cli_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "port = 9000\nhost = \"0.0.0.0\"\n")?;
            let overrides = CliOverrides {
                port: Some(9100),
                variant: Some(Variant::Echo),
                ..Default::default()
            };
            let config = resolve(&overrides)?;
            assert_eq!(config.bind_addr, "0.0.0.0:9100".parse::<SocketAddr>().unwrap());
            assert_eq!(config.variant, Variant::Echo);
            Ok(())
        });
    }

    #[test]
    fn test_unset_cli_fields_do_not_clobber_lower_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "log_level = \"debug\"\n")?;
            jail.set_env("RELAY_MAX_MESSAGE_BYTES", "128");
            let overrides = CliOverrides {
                port: Some(1234),
                ..Default::default()
            };
            let config = resolve(&overrides)?;
            assert_eq!(config.log_level, LevelFilter::DEBUG);
            assert_eq!(config.max_message_bytes, Some(128));
            Ok(())
        });
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("RELAY_PORT", "not-a-port");
            assert!(resolve(&CliOverrides::default()).is_err());
            Ok(())
        });
    }

    // ── RelayConfig::from_file ──────────────────────────────────────────

    #[test]
    fn test_invalid_host_is_rejected() {
        let fc = FileConfig {
            host: "not an ip".to_string(),
            ..Default::default()
        };
        let err = RelayConfig::from_file(&fc).unwrap_err();
        assert!(err.to_string().contains("not an ip"));
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let fc = FileConfig {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(RelayConfig::from_file(&fc).is_err());
    }

    #[test]
    fn test_log_directive() {
        let config = RelayConfig::default();
        assert_eq!(
            config.log_directive(false),
            "chat_relay=info,relay_core=info,tower_http=info,warn"
        );
        assert_eq!(
            config.log_directive(true),
            "chat_relay=debug,relay_core=debug,tower_http=debug,warn"
        );
    }

    #[test]
    fn test_build_relay_matches_variant() {
        let history = RelayConfig::default().build_relay();
        assert!(history.keeps_history());

        let echo = RelayConfig {
            variant: Variant::Echo,
            max_message_bytes: Some(64),
            ..Default::default()
        }
        .build_relay();
        assert!(!echo.keeps_history());
        assert_eq!(echo.message_limit(), Some(64));
    }
}
