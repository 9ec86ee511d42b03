//! Emotion categories that select a response sound family

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of emotional registers a command can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    /// Greetings, praise, good news
    Happy,
    /// Questions and novelty
    Curious,
    /// Requests for help, mild trouble
    Concerned,
    /// Danger and alarm
    Scared,
    /// Neutral or unclear intent; the fallback category
    Acknowledge,
}

impl EmotionCategory {
    /// Every category, in prompt order
    pub const ALL: [Self; 5] = [
        Self::Happy,
        Self::Curious,
        Self::Concerned,
        Self::Scared,
        Self::Acknowledge,
    ];

    /// Category used whenever an upstream stage cannot produce a confident result
    pub const FALLBACK: Self = Self::Acknowledge;

    /// Lowercase label used in prompts, model replies and asset directories
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Curious => "curious",
            Self::Concerned => "concerned",
            Self::Scared => "scared",
            Self::Acknowledge => "acknowledge",
        }
    }

    /// Position in [`Self::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Match a single normalized token against the category labels
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == token)
    }
}

impl fmt::Display for EmotionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(&s.trim().to_lowercase()).ok_or_else(|| {
            crate::Error::Config(format!(
                "unknown emotion category '{s}' (expected one of: happy, curious, concerned, scared, acknowledge)"
            ))
        })
    }
}
