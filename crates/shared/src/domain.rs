use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{UnknownRole, UrlRejection};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

id_newtype!(SessionHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    LocalBroadcaster,
    RemoteViewer,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::LocalBroadcaster => "local broadcaster",
            Role::RemoteViewer => "remote viewer",
        }
    }

    /// Broadcasters push to the publish URL, viewers pull from it.
    pub fn publishes(self) -> bool {
        matches!(self, Role::LocalBroadcaster)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" | "broadcaster" | "local_broadcaster" | "host" => Ok(Role::LocalBroadcaster),
            "remote" | "viewer" | "remote_viewer" | "audience" => Ok(Role::RemoteViewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Connecting,
    Active,
    Stopping,
}

impl SessionPhase {
    /// Role and URL are frozen while a session is live.
    pub fn is_live(self) -> bool {
        !matches!(self, SessionPhase::Idle)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Active => "active",
            SessionPhase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPolicy {
    allowed_schemes: Vec<String>,
}

impl UrlPolicy {
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_schemes: schemes
                .into_iter()
                .map(|scheme| scheme.into().trim().to_ascii_lowercase())
                .filter(|scheme| !scheme.is_empty())
                .collect(),
        }
    }

    pub fn allowed_schemes(&self) -> &[String] {
        &self.allowed_schemes
    }

    pub fn allows(&self, scheme: &str) -> bool {
        self.allowed_schemes
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(scheme))
    }
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::new(["rtmp", "rtmps", "http", "https"])
    }
}

/// A trimmed, parsed stream address that passed [`UrlPolicy`] checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishUrl(String);

impl PublishUrl {
    pub fn parse(raw: &str, policy: &UrlPolicy) -> Result<Self, UrlRejection> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UrlRejection::Empty);
        }

        let parsed =
            Url::parse(trimmed).map_err(|err| UrlRejection::Malformed(err.to_string()))?;
        if !policy.allows(parsed.scheme()) {
            return Err(UrlRejection::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(UrlRejection::MissingHost);
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublishUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
