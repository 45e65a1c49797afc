//! Regional endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::errors::{AdvertisingError, AdvertisingResult};

/// Advertising API marketplace region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// North America.
    #[default]
    Na,
    /// Europe.
    Eu,
    /// Far East.
    Fe,
}

impl Region {
    /// Lower-case region code, also sent as `countryCode` when registering.
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Na => "na",
            Region::Eu => "eu",
            Region::Fe => "fe",
        }
    }

    fn hosts(self) -> &'static RegionHosts {
        match self {
            Region::Na => &REGION_TABLE[0],
            Region::Eu => &REGION_TABLE[1],
            Region::Fe => &REGION_TABLE[2],
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = AdvertisingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "na" => Ok(Region::Na),
            "eu" => Ok(Region::Eu),
            "fe" => Ok(Region::Fe),
            other => Err(AdvertisingError::configuration(format!(
                "Unknown region {other:?} (expected na, eu or fe)"
            ))),
        }
    }
}

/// Production or sandbox API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Live advertising data.
    #[default]
    Production,
    /// Amazon's test environment.
    Sandbox,
}

struct RegionHosts {
    production: &'static str,
    sandbox: &'static str,
    token_url: &'static str,
}

static REGION_TABLE: [RegionHosts; 3] = [
    RegionHosts {
        production: "advertising-api.amazon.com",
        sandbox: "advertising-api-test.amazon.com",
        token_url: "https://api.amazon.com/auth/o2/token",
    },
    RegionHosts {
        production: "advertising-api-eu.amazon.com",
        sandbox: "advertising-api-test.amazon.com",
        token_url: "https://api.amazon.co.uk/auth/o2/token",
    },
    RegionHosts {
        production: "advertising-api-fe.amazon.com",
        sandbox: "advertising-api-test.amazon.com",
        token_url: "https://api.amazon.com/auth/o2/token",
    },
];

/// Resolved API and token endpoints. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    region: Region,
    environment: Environment,
    base_url: Url,
    token_url: Url,
}

impl Endpoint {
    /// Resolves the endpoint for a region and environment.
    pub fn resolve(region: Region, environment: Environment) -> AdvertisingResult<Self> {
        let hosts = region.hosts();
        let host = match environment {
            Environment::Production => hosts.production,
            Environment::Sandbox => hosts.sandbox,
        };

        Ok(Self {
            region,
            environment,
            base_url: Url::parse(&format!("https://{host}/"))?,
            token_url: Url::parse(hosts.token_url)?,
        })
    }

    /// Replaces the API base URL.
    pub fn with_base_url(mut self, base_url: &str) -> AdvertisingResult<Self> {
        self.base_url = parse_base(base_url)?;
        Ok(self)
    }

    /// Replaces the token URL.
    pub fn with_token_url(mut self, token_url: &str) -> AdvertisingResult<Self> {
        self.token_url = Url::parse(token_url)?;
        Ok(self)
    }

    /// Region.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Environment.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// API host name.
    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    /// API base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// OAuth2 token URL.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Builds the absolute URL for an API path.
    pub fn api_url(&self, path: &str) -> AdvertisingResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

fn parse_base(raw: &str) -> AdvertisingResult<Url> {
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(AdvertisingError::configuration(format!(
            "Base URL {raw} cannot be used as a base"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
