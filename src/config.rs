// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::game::GameSettings;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Simulation tick interval.
    pub tick: Duration,
    /// Lobby countdown, in ticks.
    pub lobby_seconds: u32,
    /// Humans needed to start a match before the countdown runs out.
    pub max_players: usize,
    /// How long the end screen holds before returning to the lobby, in ticks.
    pub ended_seconds: u32,
    /// Seed for the simulation RNG. Random when unset.
    pub rng_seed: Option<u64>,
    /// JSON map definition to play on instead of the built-in Europe map.
    pub map_file: Option<PathBuf>,
    /// Where finished-match replays are written. Replays are off when unset.
    pub replay_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let settings = GameSettings::default();
        Config {
            port: 8080,
            tick: Duration::from_millis(1000),
            lobby_seconds: settings.lobby_seconds,
            max_players: settings.max_players,
            ended_seconds: settings.ended_seconds,
            rng_seed: None,
            map_file: None,
            replay_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `PORT` - HTTP server port (default: 8080)
    /// - `TICK_MS` - tick interval in milliseconds (default: 1000)
    /// - `LOBBY_SECONDS` - lobby countdown (default: 60)
    /// - `MAX_PLAYERS` - lobby capacity (default: 8)
    /// - `ENDED_SECONDS` - end screen cooldown (default: 10)
    /// - `RNG_SEED` - fixed simulation seed
    /// - `MAP_FILE` - JSON map definition
    /// - `REPLAY_DIR` - directory for match replays
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--seed <SEED>` - Override the RNG seed
    /// - `--map <FILE>` - Override the map file
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a config from explicit arguments and an environment lookup.
    /// CLI flags take precedence over environment variables.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let parsed = |flag: Option<&str>, key: &str| {
            flag.and_then(|f| Self::parse_cli_value(args, f))
                .or_else(|| env(key))
        };

        let port = parsed(Some("--port"), "PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let tick = parsed(None, "TICK_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick);

        let lobby_seconds = parsed(None, "LOBBY_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.lobby_seconds);

        let max_players = parsed(None, "MAX_PLAYERS")
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.max_players);

        let ended_seconds = parsed(None, "ENDED_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.ended_seconds);

        let rng_seed = parsed(Some("--seed"), "RNG_SEED").and_then(|v| v.parse().ok());
        let map_file = parsed(Some("--map"), "MAP_FILE").map(PathBuf::from);
        let replay_dir = parsed(None, "REPLAY_DIR").map(PathBuf::from);

        Config {
            port,
            tick,
            lobby_seconds,
            max_players,
            ended_seconds,
            rng_seed,
            map_file,
            replay_dir,
        }
    }

    /// Match settings derived from this config.
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            max_players: self.max_players,
            lobby_seconds: self.lobby_seconds,
            ended_seconds: self.ended_seconds,
            ..GameSettings::default()
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(&args(&["eras-server"]), |_| None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.tick, Duration::from_secs(1));
        assert_eq!(config.lobby_seconds, 60);
        assert_eq!(config.max_players, 8);
        assert_eq!(config.ended_seconds, 10);
        assert!(config.rng_seed.is_none());
        assert!(config.map_file.is_none());
        assert!(config.replay_dir.is_none());
    }

    #[test]
    fn test_env_values() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("TICK_MS", "250"),
            ("LOBBY_SECONDS", "5"),
            ("MAX_PLAYERS", "2"),
            ("RNG_SEED", "42"),
            ("REPLAY_DIR", "/tmp/replays"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_sources(&args(&["eras-server"]), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert_eq!(config.port, 9000);
        assert_eq!(config.tick, Duration::from_millis(250));
        assert_eq!(config.lobby_seconds, 5);
        assert_eq!(config.max_players, 2);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.replay_dir, Some(PathBuf::from("/tmp/replays")));

        let settings = config.game_settings();
        assert_eq!(settings.max_players, 2);
        assert_eq!(settings.lobby_seconds, 5);
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = Config::from_sources(
            &args(&["eras-server", "--port", "7000", "--seed", "9"]),
            |k| match k {
                "PORT" => Some("9000".into()),
                "RNG_SEED" => Some("1".into()),
                _ => None,
            },
        );
        assert_eq!(config.port, 7000);
        assert_eq!(config.rng_seed, Some(9));
    }

    #[test]
    fn test_garbage_falls_back_to_defaults() {
        let config = Config::from_sources(&args(&["eras-server"]), |k| match k {
            "PORT" => Some("not-a-port".into()),
            "TICK_MS" => Some("0".into()),
            "MAX_PLAYERS" => Some("0".into()),
            _ => None,
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.tick, Duration::from_secs(1));
        assert_eq!(config.max_players, 8);
    }
}
