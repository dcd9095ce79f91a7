//! Request actors and the access policy that admits them.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

const ANONYMOUS_SUBJECT: &str = "anonymous";

/// The party behind a request, resolved before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// A configured editor that presented a valid bearer key.
    Editor { name: String },
    /// A visitor that presented no credentials.
    Anonymous,
}

impl Actor {
    pub fn editor(name: impl Into<String>) -> Self {
        Self::Editor { name: name.into() }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Editor { .. })
    }

    /// Stable identifier that anti-forgery tokens are bound to.
    pub fn subject(&self) -> String {
        match self {
            Self::Editor { name } => format!("editor:{name}"),
            Self::Anonymous => ANONYMOUS_SUBJECT.to_string(),
        }
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.subject())
    }
}

/// Which kinds of actor may reach the preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Authenticated editors only.
    #[default]
    Private,
    /// Anonymous visitors only.
    Public,
    /// Editors and anonymous visitors alike.
    Both,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
            Self::Both => "both",
        }
    }

    pub fn admits(self, actor: &Actor) -> bool {
        match self {
            Self::Private => actor.is_authenticated(),
            Self::Public => !actor.is_authenticated(),
            Self::Both => true,
        }
    }
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "public" => Ok(Self::Public),
            "both" => Ok(Self::Both),
            other => Err(DomainError::validation(format!(
                "unknown access mode `{other}` (expected private, public or both)"
            ))),
        }
    }
}
