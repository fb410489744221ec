use anyhow::Error;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Parser, Debug)]
#[command(version = crate::version::get_short_version())]
pub struct Cli {
    #[clap(long, default_value = "agentdesk.toml")]
    pub conf: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub http_addr: String,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub console: Option<ConsoleConfig>,
    pub connect: Option<ConnectConfig>,
}

/// Console-side routing and event-bus sizing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Route the console jumps to once an originated call connects; the call
    /// id is appended.
    pub live_call_route: String,
    /// Route the console returns to after hanging up.
    pub return_route: String,
    pub event_buffer: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            live_call_route: "/live-calls".to_string(),
            return_route: "/missed-calls".to_string(),
            event_buffer: 64,
        }
    }
}

/// Which connect-signal provider confirms that a dialed call was picked up.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ConnectConfig {
    /// Fixed-delay stub, the default when no telephony gateway is wired up
    Delay { ms: u64 },
    /// POST to a telephony gateway and wait for its confirmation
    Webhook {
        url: String,
        method: Option<String>,
        headers: Option<HashMap<String, String>>,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            log_level: Some("info".to_string()),
            log_file: None,
            console: Some(ConsoleConfig::default()),
            connect: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
http_addr = "127.0.0.1:9090"
log_level = "debug"

[console]
live_call_route = "/calls/live"

[connect]
type = "delay"
ms = 250
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.http_addr, "127.0.0.1:9090");
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let console = config.console.unwrap();
        assert_eq!(console.live_call_route, "/calls/live");
        // unset keys fall back to their defaults
        assert_eq!(console.return_route, "/missed-calls");
        assert_eq!(console.event_buffer, 64);

        match config.connect {
            Some(ConnectConfig::Delay { ms }) => assert_eq!(ms, 250),
            other => panic!("unexpected connect config: {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("/nonexistent/agentdesk.toml").is_err());
    }
}
