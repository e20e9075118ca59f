//! Connection string parsing.
//!
//! Accepts `scheme://[user[:password]@]host[:port]/database` with scheme
//! `postgresql` or `postgres`. Percent-encoded user, password and database
//! names are decoded.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::error::{BackupError, Result};

pub const DEFAULT_PORT: u16 = 5432;
const SCHEMES: [&str; 2] = ["postgresql", "postgres"];

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
}

// hand written so the password never reaches a log line
impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionTarget {
    pub fn parse(dsn: &str) -> Result<Self> {
        let dsn = dsn.trim();
        if dsn.is_empty() {
            return Err(BackupError::Configuration(
                "database url cannot be empty".to_string(),
            ));
        }

        // the parse error never echoes the input, it may carry a password
        let url = Url::parse(dsn)
            .map_err(|e| BackupError::Configuration(format!("invalid database url: {e}")))?;

        if !SCHEMES.contains(&url.scheme()) {
            return Err(BackupError::Configuration(format!(
                "unsupported database url scheme '{}' (expected postgresql or postgres)",
                url.scheme()
            )));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => decode("host", domain)?,
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => {
                return Err(BackupError::Configuration(format!(
                    "database url names no host: {}",
                    redacted(&url)
                )));
            }
        };

        let database = url.path().strip_prefix('/').unwrap_or(url.path());
        if database.is_empty() {
            return Err(BackupError::Configuration(format!(
                "database url names no database: {}",
                redacted(&url)
            )));
        }

        let user = match url.username() {
            "" => None,
            user => Some(decode("user", user)?),
        };
        let password = match url.password() {
            None | Some("") => None,
            Some(password) => Some(decode("password", password)?),
        };

        Ok(ConnectionTarget {
            user,
            password,
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            database: decode("database", database)?,
        })
    }
}

fn decode(part: &str, raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| BackupError::Configuration(format!("database url {part} is not valid UTF-8")))
}

/// The url with its password masked, for error messages.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    if url.password().is_some() {
        let _ = url.set_password(Some("***"));
    }
    url.to_string()
}
