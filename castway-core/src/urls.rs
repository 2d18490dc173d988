use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::LaunchConfig;
use crate::error::CastwayError;

/// Video decoder used by the external server's embeddable view.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    #[default]
    Mse,
    Broadway,
    Tinyh264,
    Webcodecs,
}

impl Player {
    pub fn as_str(&self) -> &'static str {
        match self {
            Player::Mse => "mse",
            Player::Broadway => "broadway",
            Player::Tinyh264 => "tinyh264",
            Player::Webcodecs => "webcodecs",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Player {
    type Err = CastwayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mse" => Ok(Player::Mse),
            "broadway" => Ok(Player::Broadway),
            "tinyh264" => Ok(Player::Tinyh264),
            "webcodecs" => Ok(Player::Webcodecs),
            other => Err(CastwayError::InvalidConfiguration(format!(
                "unknown player '{}', expected mse, broadway, tinyh264 or webcodecs",
                other
            ))),
        }
    }
}

/// Addresses exposed by the external screen-mirroring server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerUrls {
    pub host: String,
    pub port: u16,
}

impl ServerUrls {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// URL of the single-device embeddable view. Device identifiers may
    /// contain characters like `:` (ip:port serials), so they are
    /// percent-encoded.
    pub fn embed_url(&self, udid: Option<&str>, player: Option<Player>) -> String {
        let mut query = Vec::new();
        if let Some(udid) = udid {
            query.push(format!("udid={}", urlencoding::encode(udid)));
        }
        if let Some(player) = player {
            query.push(format!("player={}", player));
        }

        if query.is_empty() {
            format!("{}/embed.html", self.base_url())
        } else {
            format!("{}/embed.html?{}", self.base_url(), query.join("&"))
        }
    }
}

impl From<&LaunchConfig> for ServerUrls {
    fn from(config: &LaunchConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let urls = ServerUrls::new("localhost", 8009);
        assert_eq!(urls.base_url(), "http://localhost:8009");
    }

    #[test]
    fn test_embed_url_bare() {
        let urls = ServerUrls::new("localhost", 8009);
        assert_eq!(urls.embed_url(None, None), "http://localhost:8009/embed.html");
    }

    #[test]
    fn test_embed_url_encodes_device_id() {
        let urls = ServerUrls::new("localhost", 8009);
        assert_eq!(
            urls.embed_url(Some("192.168.1.100:5555"), Some(Player::Mse)),
            "http://localhost:8009/embed.html?udid=192.168.1.100%3A5555&player=mse"
        );
    }

    #[test]
    fn test_embed_url_player_only() {
        let urls = ServerUrls::new("0.0.0.0", 8000);
        assert_eq!(
            urls.embed_url(None, Some(Player::Broadway)),
            "http://0.0.0.0:8000/embed.html?player=broadway"
        );
    }

    #[test]
    fn test_player_round_trip() {
        for player in [
            Player::Mse,
            Player::Broadway,
            Player::Tinyh264,
            Player::Webcodecs,
        ] {
            assert_eq!(player.to_string().parse::<Player>().unwrap(), player);
        }
    }

    #[test]
    fn test_player_rejects_unknown() {
        assert!("quicktime".parse::<Player>().is_err());
    }

    #[test]
    fn test_player_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Player::Tinyh264).unwrap(), "\"tinyh264\"");
        let parsed: Player = serde_json::from_str("\"webcodecs\"").unwrap();
        assert_eq!(parsed, Player::Webcodecs);
    }

    #[test]
    fn test_urls_from_launch_config() {
        let config = LaunchConfig::new(9000, "0.0.0.0");
        let urls = ServerUrls::from(&config);
        assert_eq!(urls.base_url(), "http://0.0.0.0:9000");
    }
}
