//! Strongly-typed identifiers for cartage entities
//!
//! Identifiers are hierarchical paths of qualified segments, wrapped in
//! newtype structs for type safety. Equality is structural and every token
//! is totally ordered, so identifiers can key concurrent maps directly.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One qualified segment of a hierarchical identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenSegment {
    /// What the segment names (e.g. "node", "parcel", "episode").
    pub qualifier: String,

    /// The segment value.
    pub value: String,
}

impl TokenSegment {
    pub fn new(qualifier: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for TokenSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.qualifier, self.value)
    }
}

/// A hierarchical identifier: an ordered path of qualified segments.
///
/// Immutable once created. Ordering is lexicographic over the segment path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdToken(Vec<TokenSegment>);

impl IdToken {
    /// Create a single-segment token.
    pub fn root(qualifier: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![TokenSegment::new(qualifier, value)])
    }

    /// Create a token extending this one with a further segment.
    pub fn child(&self, qualifier: impl Into<String>, value: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(TokenSegment::new(qualifier, value));
        Self(segments)
    }

    /// The segment path.
    pub fn segments(&self) -> &[TokenSegment] {
        &self.0
    }

    /// The last (most specific) segment.
    pub fn leaf(&self) -> Option<&TokenSegment> {
        self.0.last()
    }
}

impl fmt::Display for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

macro_rules! token_id {
    ($(#[$doc:meta])* $name:ident, $qualifier:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(IdToken);

        impl $name {
            /// Mint a fresh, unique identifier.
            pub fn generate() -> Self {
                Self(IdToken::root($qualifier, Uuid::new_v4().to_string()))
            }

            /// Create an identifier from a caller-chosen value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(IdToken::root($qualifier, value))
            }

            /// Wrap an existing token.
            pub fn from_token(token: IdToken) -> Self {
                Self(token)
            }

            /// The underlying token.
            pub fn as_token(&self) -> &IdToken {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

token_id!(
    /// Unique identifier for a deployment node.
    NodeId,
    "node"
);

token_id!(
    /// Unique identifier for one running instance of a work unit processor.
    WupInstanceId,
    "wup"
);

token_id!(
    /// Identifier for a processing episode: the grouping shared by all
    /// parcels that represent attempts at the same logical unit of
    /// processing.
    EpisodeId,
    "episode"
);

token_id!(
    /// Unique identifier for a resilience parcel.
    ParcelId,
    "parcel"
);

token_id!(
    /// Unique identifier for a unit-of-work instance.
    UowId,
    "uow"
);

impl EpisodeId {
    /// Derive an episode identifier deterministically from a processor
    /// function and a unit-of-work type.
    ///
    /// The same function + type combination always maps to the same episode
    /// identifier, so an ingress stage that was handed no episode still lands
    /// retries of the same work in the same episode.
    pub fn derive(function: &WupFunctionToken, uow_type: &UowTypeId) -> Self {
        Self(
            function
                .as_token()
                .child("uow-type", uow_type.as_str())
                .child("scope", "episode"),
        )
    }
}

/// Identifies a work unit processor function together with its version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WupFunctionToken {
    /// Function name, e.g. "ingest".
    pub name: String,

    /// Function version.
    pub version: Version,
}

impl WupFunctionToken {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Lower the function token into a hierarchical identifier token.
    pub fn as_token(&self) -> IdToken {
        IdToken::root("function", &self.name).child("version", self.version.to_string())
    }
}

impl fmt::Display for WupFunctionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Type tag of a unit of work's payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UowTypeId(String);

impl UowTypeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UowTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topic a payload is published under; the unit of fan-out routing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicId(String);

impl TopicId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical route name the transport layer delivers packets to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointName(String);

impl EndpointName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The ingress endpoint name for a processor function.
    pub fn ingress_for(function: &WupFunctionToken) -> Self {
        Self(format!("{}.{}.ingress", function.name, function.version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
