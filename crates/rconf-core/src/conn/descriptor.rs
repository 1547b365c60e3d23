//! Connection descriptor type and parser.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::error::{ConfigError, ParseError};

/// Port used when the connection string does not name one.
pub const DEFAULT_PORT: u16 = 22;

/// Scheme prepended when the connection string has none.
const DEFAULT_SCHEME: &str = "ssh://";

/// Option that controls privilege elevation (`?sudo=false`).
const SUDO_OPTION: &str = "sudo";

/// A parsed connection target.
///
/// Built once per connection string and never modified afterwards, so all
/// fields are private and exposed through accessors.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    user: String,
    password: Option<String>,
    host: String,
    port: u16,
    options: BTreeMap<String, Vec<String>>,
}

impl ConnectionDescriptor {
    /// Parse a connection string.
    ///
    /// Accepts `user[:password]@host[:port][?key=val&key=val...]`, with or
    /// without an explicit scheme. User and password are percent-decoded.
    /// Repeated option keys keep every value in order.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let raw = if input.contains("://") {
            Cow::Borrowed(input)
        } else {
            Cow::Owned(format!("{DEFAULT_SCHEME}{input}"))
        };
        let url = Url::parse(&raw).map_err(|e| match e {
            url::ParseError::EmptyHost => ParseError::MissingHost,
            other => ParseError::Syntax(other),
        })?;

        let user = decode(url.username());
        if user.is_empty() {
            return Err(ParseError::MissingUser);
        }

        let host = match url.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => String::new(),
        };
        if host.is_empty() {
            return Err(ParseError::MissingHost);
        }

        let password = url.password().map(decode).filter(|p| !p.is_empty());
        // Special schemes hide a port equal to their default (http://h:80).
        let port = match url.port() {
            Some(port) => port,
            None if has_explicit_port(&raw) => {
                url.port_or_known_default().unwrap_or(DEFAULT_PORT)
            }
            None => DEFAULT_PORT,
        };
        if port == 0 {
            return Err(ParseError::Syntax(url::ParseError::InvalidPort));
        }

        let mut options: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in url.query_pairs() {
            options
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }

        Ok(Self {
            user,
            password,
            host,
            port,
            options,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Password, if one was given. `None` means key-based authentication.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn options(&self) -> &BTreeMap<String, Vec<String>> {
        &self.options
    }

    /// Check whether option `key` carries `value` among its values.
    pub fn has_option(&self, key: &str, value: &str) -> bool {
        self.options
            .get(key)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    /// Whether scripts on this host run under `sudo`.
    ///
    /// Elevation is on unless the descriptor carries `sudo=false`.
    pub fn elevate(&self) -> bool {
        !self.has_option(SUDO_OPTION, "false")
    }

    /// Identity used as the key in the results: `user@host:port`.
    pub fn identity(&self) -> String {
        if self.host.contains(':') {
            format!("{}@[{}]:{}", self.user, self.host, self.port)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("options", &self.options)
            .finish()
    }
}

/// Parse every connection string of a run.
///
/// Fails on the first malformed string, and when two strings resolve to the
/// same identity (each host gets exactly one entry in the results).
pub fn parse_all<S: AsRef<str>>(
    conn_strings: &[S],
) -> Result<Vec<ConnectionDescriptor>, ConfigError> {
    let mut seen = HashSet::new();
    let mut descriptors = Vec::with_capacity(conn_strings.len());

    for (index, raw) in conn_strings.iter().enumerate() {
        let descriptor = ConnectionDescriptor::parse(raw.as_ref())
            .map_err(|source| ConfigError::Connection { index, source })?;
        let identity = descriptor.identity();
        if !seen.insert(identity.clone()) {
            return Err(ConfigError::DuplicateHost(identity));
        }
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Whether the authority of `raw` carries a non-empty `:port`.
fn has_explicit_port(raw: &str) -> bool {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);
    let after_host = match host_port.strip_prefix('[') {
        Some(bracketed) => bracketed.split_once(']').map_or("", |(_, tail)| tail),
        None => host_port,
    };
    after_host
        .split_once(':')
        .is_some_and(|(_, port)| !port.is_empty())
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
