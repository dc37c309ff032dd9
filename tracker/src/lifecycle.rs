//! Grant lifecycle state machine
//!
//! ```text
//! identified -> applying -> submitted -> awarded  -> reporting -> closed
//!                                     \           \_____________/
//!                                      -> rejected -------------> closed
//! ```
//!
//! `identified` is the only initial state and `closed` the only terminal one.
//! `reporting` is reachable from `awarded` alone; a rejected grant can only be
//! closed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Opportunity spotted, nothing written yet.
    Identified,
    /// Application being prepared.
    Applying,
    /// Application sent to the funder.
    Submitted,
    /// Funder accepted; award amount and reporting dates known.
    Awarded,
    /// Funder declined.
    Rejected,
    /// Post-award reporting under way.
    Reporting,
    /// Nothing left to do.
    Closed,
}

impl GrantStatus {
    /// Every status in lifecycle order.
    pub const ALL: [GrantStatus; 7] = [
        GrantStatus::Identified,
        GrantStatus::Applying,
        GrantStatus::Submitted,
        GrantStatus::Awarded,
        GrantStatus::Rejected,
        GrantStatus::Reporting,
        GrantStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identified => "identified",
            Self::Applying => "applying",
            Self::Submitted => "submitted",
            Self::Awarded => "awarded",
            Self::Rejected => "rejected",
            Self::Reporting => "reporting",
            Self::Closed => "closed",
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identified" => Some(Self::Identified),
            "applying" => Some(Self::Applying),
            "submitted" => Some(Self::Submitted),
            "awarded" => Some(Self::Awarded),
            "rejected" => Some(Self::Rejected),
            "reporting" => Some(Self::Reporting),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// States this one may move to.
    pub fn allowed_next(self) -> &'static [GrantStatus] {
        match self {
            Self::Identified => &[Self::Applying],
            Self::Applying => &[Self::Submitted],
            Self::Submitted => &[Self::Awarded, Self::Rejected],
            Self::Awarded => &[Self::Reporting, Self::Closed],
            Self::Rejected => &[Self::Closed],
            Self::Reporting => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    pub fn can_transition_to(self, next: GrantStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Whether this is the terminal state (no further transitions).
    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Whether the grant can still be worked on before submission.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Identified | Self::Applying)
    }

    /// Whether the grant carries open reporting obligations.
    pub fn has_reporting_obligations(self) -> bool {
        matches!(self, Self::Awarded | Self::Reporting)
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Funding source category.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    Federal,
    State,
    Private,
    #[default]
    Foundation,
    Corporate,
}

impl GrantType {
    pub const ALL: [GrantType; 5] = [
        GrantType::Federal,
        GrantType::State,
        GrantType::Private,
        GrantType::Foundation,
        GrantType::Corporate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Federal => "federal",
            Self::State => "state",
            Self::Private => "private",
            Self::Foundation => "foundation",
            Self::Corporate => "corporate",
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "federal" => Some(Self::Federal),
            "state" => Some(Self::State),
            "private" => Some(Self::Private),
            "foundation" => Some(Self::Foundation),
            "corporate" => Some(Self::Corporate),
            _ => None,
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested move from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: GrantStatus,
    pub to: GrantStatus,
}

impl Transition {
    /// Check `from -> to` against the transition table.
    ///
    /// Returns `None` when the move is not allowed.
    pub fn checked(from: GrantStatus, to: GrantStatus) -> Option<Self> {
        from.can_transition_to(to).then_some(Self { from, to })
    }
}
