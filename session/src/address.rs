use std::{fmt, str::FromStr};

use url::Url;

use crate::error::AddressError;

/// Where a replica joins: `trellis://host[:port][/session]`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JoinAddress {
    host: String,
    port: u16,
    session: Option<String>,
}

impl JoinAddress {
    pub const SCHEME: &'static str = "trellis";
    pub const DEFAULT_PORT: u16 = 12100;

    pub fn new(host: &str, port: u16) -> Result<Self, AddressError> {
        if host.is_empty() {
            return Err(AddressError::MissingHost);
        }
        Ok(Self {
            host: host.to_string(),
            port,
            session: None,
        })
    }

    pub fn with_session(mut self, session: &str) -> Self {
        self.session = (!session.is_empty()).then(|| session.to_string());
        self
    }

    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let url = Url::parse(input.trim())?;
        if url.scheme() != Self::SCHEME {
            return Err(AddressError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(AddressError::MissingHost),
        };
        let session = url.path().trim_matches('/');

        Ok(Self {
            host,
            port: url.port().unwrap_or(Self::DEFAULT_PORT),
            session: (!session.is_empty()).then(|| session.to_string()),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Named session on the host, if the address selects one
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// `host:port`, the form socket layers connect to
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for JoinAddress {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl fmt::Display for JoinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", Self::SCHEME, self.host, self.port)?;
        if let Some(session) = &self.session {
            write!(f, "/{}", session)?;
        }
        Ok(())
    }
}
