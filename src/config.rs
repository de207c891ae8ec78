//! Server configuration.
//!
//! The whole configuration surface is the command line:
//! `irond [<port> [<password>]]`. With no arguments the server listens
//! on 6667 with the stock password; with only a port it requires no
//! password at all.

use thiserror::Error;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 6667;

/// Password applied when the server is started with no arguments.
pub const DEFAULT_PASSWORD: &str = "42";

/// Source string used in every server-originated message.
pub const DEFAULT_SERVER_NAME: &str = "ircserver";

/// Configuration errors; all of them are usage errors (exit code 1).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port: {0}")]
    BadPort(String),
    #[error("too many arguments")]
    TooManyArgs,
}

/// Runtime configuration assembled from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Connection password, if one is required.
    pub password: Option<String>,
    /// Server source string for replies and broadcasts.
    pub server_name: String,
    /// Message-of-the-day lines.
    pub motd: Vec<String>,
}

impl Config {
    /// Parse the argument list (program name already stripped).
    pub fn from_args<I>(args: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();

        let (port, password) = match args.as_slice() {
            [] => (DEFAULT_PORT, Some(DEFAULT_PASSWORD.to_string())),
            [port] => (parse_port(port)?, None),
            [port, password] => (parse_port(port)?, Some(password.clone())),
            _ => return Err(ConfigError::TooManyArgs),
        };

        Ok(Config {
            port,
            password,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            motd: default_motd(),
        })
    }

    /// Whether clients must present a PASS before registering.
    pub fn password_required(&self) -> bool {
        self.password.is_some()
    }
}

fn parse_port(s: &str) -> Result<u16, ConfigError> {
    s.parse::<u16>().map_err(|_| ConfigError::BadPort(s.to_string()))
}

fn default_motd() -> Vec<String> {
    vec![
        "Welcome to irond.".to_string(),
        "Nothing here is persisted; say what you came to say.".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from(args: &[&str]) -> Result<Config, ConfigError> {
        Config::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_args_uses_stock_port_and_password() {
        let config = from(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.password.as_deref(), Some(DEFAULT_PASSWORD));
    }

    #[test]
    fn port_alone_disables_the_password() {
        let config = from(&["7000"]).unwrap();
        assert_eq!(config.port, 7000);
        assert!(config.password.is_none());
        assert!(!config.password_required());
    }

    #[test]
    fn port_and_password() {
        let config = from(&["7000", "hunter2"]).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn rejects_junk() {
        assert!(matches!(from(&["notaport"]), Err(ConfigError::BadPort(_))));
        assert!(matches!(
            from(&["6667", "pw", "extra"]),
            Err(ConfigError::TooManyArgs)
        ));
    }
}
