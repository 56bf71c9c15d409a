//! Domain types shared across the caststats workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Post count at or below which a user is a [`StatusTier::Newbie`].
pub const NEWBIE_MAX_POSTS: u64 = 100;

/// Post count at or below which a user is a [`StatusTier::Farcaster`].
pub const FARCASTER_MAX_POSTS: u64 = 250;

/// A Farcaster user identifier.
///
/// Always positive. Callers supply it untrusted, it is never altered after
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fid(u64);

impl Fid {
    /// Wrap a raw id, rejecting zero.
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Parse an untrusted identifier; empty, non-numeric and zero input yield `None`.
    pub fn parse(input: &str) -> Option<Self> {
        input.trim().parse::<u64>().ok().and_then(Self::new)
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the upstream provider a [`SourceResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Cast count paged from a Farcaster hub's HTTP API
    HubCasts,
    /// Cast count paged from Neynar's user feed
    NeynarCasts,
    /// Follower/following counts from Warpcast's user endpoint
    WarpcastGraph,
    /// Follower/following counts from Neynar's bulk user endpoint
    NeynarGraph,
}

impl SourceTag {
    /// Stable snake_case name used in logs and cache metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::HubCasts => "hub_casts",
            SourceTag::NeynarCasts => "neynar_casts",
            SourceTag::WarpcastGraph => "warpcast_graph",
            SourceTag::NeynarGraph => "neynar_graph",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follower and following counts reported by a graph provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

impl FollowCounts {
    pub fn new(followers: u64, following: u64) -> Self {
        Self { followers, following }
    }
}

/// Outcome of asking one upstream provider for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceResult<T> {
    /// The provider answered authoritatively. `has_more` is set when the
    /// answer was truncated by paging limits and the real value may be higher.
    RealCount { value: T, has_more: bool },
    /// A best-effort value (partial pages, missing fields).
    EstimatedCount { value: T },
    /// Nothing usable came back.
    Unavailable,
}

impl<T> SourceResult<T> {
    /// Shorthand for a complete, authoritative answer.
    pub fn real(value: T) -> Self {
        Self::RealCount {
            value,
            has_more: false,
        }
    }

    pub fn estimated(value: T) -> Self {
        Self::EstimatedCount { value }
    }

    /// The carried value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::RealCount { value, .. } | Self::EstimatedCount { value } => Some(value),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Self::RealCount { .. })
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self, Self::EstimatedCount { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RealCount { .. } => "real",
            Self::EstimatedCount { .. } => "estimated",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Status tier derived from a user's post count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusTier {
    Newbie,
    Farcaster,
    Megacaster,
}

impl StatusTier {
    /// Classify a post count: `≤100` Newbie, `≤250` Farcaster, else Megacaster.
    pub fn from_post_count(post_count: u64) -> Self {
        if post_count <= NEWBIE_MAX_POSTS {
            StatusTier::Newbie
        } else if post_count <= FARCASTER_MAX_POSTS {
            StatusTier::Farcaster
        } else {
            StatusTier::Megacaster
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusTier::Newbie => "Newbie",
            StatusTier::Farcaster => "Farcaster",
            StatusTier::Megacaster => "Megacaster",
        }
    }

    /// Label with the emoji shown on the frame card.
    pub fn badge(self) -> &'static str {
        match self {
            StatusTier::Newbie => "🌱 Newbie",
            StatusTier::Farcaster => "⭐ Farcaster",
            StatusTier::Megacaster => "🚀 Megacaster",
        }
    }
}

impl fmt::Display for StatusTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The aggregated statistics shown on the frame.
///
/// Always recomputed from fresh or cached [`SourceResult`]s; there is no
/// stored record to update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    pub fid: Fid,
    pub post_count: u64,
    pub follower_count: u64,
    pub following_count: u64,
    pub status_tier: StatusTier,
    /// The post count is not an authoritative upstream figure.
    pub is_estimated: bool,
    /// Follower/following numbers are a fallback or come from an incomplete document.
    pub follows_estimated: bool,
}

impl StatsRecord {
    /// One-line rendering used as the frame body text.
    pub fn summary_line(&self) -> String {
        format!(
            "{} posts - {} | {} followers | {} following",
            self.post_count,
            self.status_tier.badge(),
            self.follower_count,
            self.following_count
        )
    }
}
