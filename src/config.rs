//! Configuration of the server binary.
//!
//! The command line is `server <port> <idle_timeout_seconds>`.  The data
//! directory defaults to `./data` and can be moved with the
//! `CAUSERIE_DATA` environment variable.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const USAGE: &str = "usage: server <port> <idle_timeout_seconds>";

/// Everything the binary needs to start.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub idle_timeout: Duration,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Parses the command line.  The first item of `args` is the program
    /// name and is skipped.
    pub fn from_args<I>(mut args: I) -> Result<Config, String>
    where
        I: Iterator<Item = String>,
    {
        let _program = args.next();
        let port = args.next().ok_or(USAGE)?;
        let idle = args.next().ok_or(USAGE)?;
        if args.next().is_some() {
            return Err(USAGE.to_owned());
        }

        let port: u16 = port
            .parse()
            .map_err(|_| format!("bad port {:?}\n{}", port, USAGE))?;
        let idle: u64 = idle
            .parse()
            .map_err(|_| format!("bad idle timeout {:?}\n{}", idle, USAGE))?;

        let data_dir = match env::var_os("CAUSERIE_DATA") {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from("data"),
        };

        Ok(Config {
            port,
            idle_timeout: Duration::from_secs(idle),
            data_dir: Some(data_dir),
        })
    }

    pub fn state_config(&self) -> StateConfig {
        StateConfig {
            idle_timeout: self.idle_timeout,
            data_dir: self.data_dir.clone(),
        }
    }
}

/// The subset of the configuration the shared state cares about.
#[derive(Clone, Debug)]
pub struct StateConfig {
    pub idle_timeout: Duration,
    /// `None` runs the server without persistence.
    pub data_dir: Option<PathBuf>,
}

impl Default for StateConfig {
    fn default() -> StateConfig {
        StateConfig {
            idle_timeout: Duration::from_secs(3600),
            data_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("server".to_owned())
            .chain(items.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_valid_args() {
        let config = Config::from_args(args(&["4000", "30"])).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_args() {
        assert!(Config::from_args(args(&[])).is_err());
        assert!(Config::from_args(args(&["4000"])).is_err());
        assert!(Config::from_args(args(&["4000", "30", "extra"])).is_err());
    }

    #[test]
    fn test_bad_numbers() {
        assert!(Config::from_args(args(&["port", "30"])).is_err());
        assert!(Config::from_args(args(&["70000", "30"])).is_err());
        assert!(Config::from_args(args(&["4000", "-1"])).is_err());
    }
}
