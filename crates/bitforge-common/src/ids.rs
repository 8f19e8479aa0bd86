//! Internal identifiers for ingested bitstreams.
//!
//! Every input file gets a fresh [`InternalId`] when it is processed. The id
//! names all derivative artifacts so they never collide and never leak the
//! original filename.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Random, globally unique identifier assigned once per processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InternalId(Uuid);

impl InternalId {
    /// Generate a new random internal ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Simple (hyphen-free) lowercase hex form used in file names.
    pub fn as_token(&self) -> String {
        self.0.simple().to_string()
    }

    /// Parse a token produced by [`InternalId::as_token`].
    pub fn from_token(token: &str) -> Option<Self> {
        if token.len() != 32 {
            return None;
        }
        Uuid::try_parse(token).ok().map(Self)
    }

    /// First-level shard directory: the first two characters of the token.
    pub fn shard(&self) -> String {
        self.as_token()[..2].to_string()
    }

    /// Second-level shard directory: characters three and four of the token.
    pub fn sub_shard(&self) -> String {
        self.as_token()[2..4].to_string()
    }
}

impl Default for InternalId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for InternalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<InternalId> for Uuid {
    fn from(id: InternalId) -> Self {
        id.0
    }
}

impl std::fmt::Display for InternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
