use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a marketplace user.
///
/// # Examples
///
/// ```
/// use multiswap_engine::core::user::UserId;
///
/// let alice = UserId::new("alice");
/// let bob = UserId::new("bob");
/// assert_ne!(alice, bob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this user ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Highest trust score the user directory hands out.
pub const MAX_TRUST_SCORE: u8 = 100;

/// What the engine reads about a user from the user directory.
///
/// The trust score is a snapshot taken at request time; the engine never
/// writes it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    /// 0..=100, higher is more trustworthy.
    pub trust_score: u8,
    pub city: String,
    pub region: String,
    /// Blocked or suspended users never appear in a cycle.
    #[serde(default)]
    pub suspended: bool,
}

impl UserProfile {
    pub fn new(
        id: impl Into<UserId>,
        trust_score: u8,
        city: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            trust_score: trust_score.min(MAX_TRUST_SCORE),
            city: city.into(),
            region: region.into(),
            suspended: false,
        }
    }

    pub fn suspended(mut self) -> Self {
        self.suspended = true;
        self
    }

    /// Trust score mapped onto [0, 1].
    pub fn normalized_trust(&self) -> f64 {
        f64::from(self.trust_score.min(MAX_TRUST_SCORE)) / f64::from(MAX_TRUST_SCORE)
    }
}
