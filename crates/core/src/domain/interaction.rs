use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::ProductId;
use crate::errors::DomainError;

const GUEST_PREFIX: &str = "guest_";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque guest identity minted on first visit and carried client-side.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuestId(String);

impl GuestId {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidActor("guest id must not be empty".to_string()));
        }
        if !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') {
            return Err(DomainError::InvalidActor(format!(
                "guest id `{trimmed}` contains characters outside [A-Za-z0-9_-]"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Random, URL-safe guest id of the form `guest_<uuid-v4>`.
    pub fn mint() -> Self {
        Self(format!("{GUEST_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    User,
    Guest,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Guest => "guest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }
}

/// Whoever viewed a product: a registered user or an anonymous guest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    User(UserId),
    Guest(GuestId),
}

impl Actor {
    pub fn kind(&self) -> ActorKind {
        match self {
            Self::User(_) => ActorKind::User,
            Self::Guest(_) => ActorKind::Guest,
        }
    }

    /// Actor id rendered as text; numeric for users, the token for guests.
    pub fn id_string(&self) -> String {
        match self {
            Self::User(id) => id.0.to_string(),
            Self::Guest(id) => id.as_str().to_string(),
        }
    }

    pub fn from_parts(kind: ActorKind, id: &str) -> Result<Self, DomainError> {
        match kind {
            ActorKind::User => id
                .trim()
                .parse::<i64>()
                .map(|value| Self::User(UserId(value)))
                .map_err(|_| DomainError::InvalidActor(format!("user id `{id}` is not numeric"))),
            ActorKind::Guest => GuestId::new(id).map(Self::Guest),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id_string())
    }
}

/// One recorded product view. Repeated views are distinct rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub actor: Actor,
    pub product_id: ProductId,
    pub viewed_at: DateTime<Utc>,
}

/// A product viewed by an actor who also viewed the seed product.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CoView {
    pub actor: Actor,
    pub product_id: ProductId,
}
