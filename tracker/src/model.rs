//! Grant, submission and note records

use crate::errors::{Result, TrackerError};
use crate::lifecycle::{GrantStatus, GrantType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Storage and input format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A funding application tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grant {
    pub id: String,
    pub name: String,
    pub funder: String,
    /// Requested amount.
    pub amount: f64,
    pub grant_type: GrantType,
    pub status: GrantStatus,
    pub deadline: NaiveDate,
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assigned_to: String,
    /// Set by `award`, `None` before.
    pub award_amount: Option<f64>,
    /// Set by `award`, empty before. Ascending.
    pub reporting_dates: Vec<NaiveDate>,
    /// Note attached by the most recent transition that carried one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Grant {
    /// Whether the funder said yes at some point, even if the grant has
    /// since moved on to reporting or been closed.
    pub fn was_awarded(&self) -> bool {
        match self.status {
            GrantStatus::Awarded | GrantStatus::Reporting => true,
            GrantStatus::Closed => self.award_amount.is_some(),
            _ => false,
        }
    }

    /// Whether the funder said no, including rejected grants that were
    /// closed afterwards.
    pub fn was_rejected(&self) -> bool {
        match self.status {
            GrantStatus::Rejected => true,
            GrantStatus::Closed => self.award_amount.is_none(),
            _ => false,
        }
    }
}

/// Materials sent to a funder at the `submitted` transition. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub id: String,
    pub grant_id: String,
    pub submitted_by: String,
    pub documents: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
}

/// Free-form annotation on a grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantNote {
    pub id: String,
    pub grant_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// Input for `identify`.
#[derive(Debug, Clone, Default)]
pub struct NewGrant {
    pub name: String,
    pub funder: String,
    pub amount: f64,
    /// `YYYY-MM-DD`
    pub deadline: String,
    pub grant_type: GrantType,
    pub requirements: Vec<String>,
    pub purpose: String,
    pub contacts: Vec<String>,
    pub assigned_to: String,
}

impl NewGrant {
    pub fn new(
        name: impl Into<String>,
        funder: impl Into<String>,
        amount: f64,
        deadline: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            funder: funder.into(),
            amount,
            deadline: deadline.into(),
            ..Self::default()
        }
    }

    pub fn grant_type(mut self, grant_type: GrantType) -> Self {
        self.grant_type = grant_type;
        self
    }

    pub fn requirements<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements = requirements.into_iter().map(Into::into).collect();
        self
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    pub fn contacts<I, S>(mut self, contacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contacts = contacts.into_iter().map(Into::into).collect();
        self
    }

    pub fn assigned_to(mut self, assigned_to: impl Into<String>) -> Self {
        self.assigned_to = assigned_to.into();
        self
    }

    /// Validate the input and build an `identified` grant.
    pub fn into_grant(self, id: String, now: DateTime<Utc>) -> Result<Grant> {
        let name = require_text("name", self.name)?;
        let funder = require_text("funder", self.funder)?;
        require_positive("amount", self.amount)?;
        let deadline = parse_date(&self.deadline)?;

        Ok(Grant {
            id,
            name,
            funder,
            amount: self.amount,
            grant_type: self.grant_type,
            status: GrantStatus::Identified,
            deadline,
            requirements: self.requirements,
            purpose: self.purpose,
            contacts: self.contacts,
            assigned_to: self.assigned_to,
            award_amount: None,
            reporting_dates: Vec::new(),
            notes: String::new(),
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Optional filters for listing grants. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFilter {
    pub status: Option<GrantStatus>,
    pub grant_type: Option<GrantType>,
    pub funder: Option<String>,
}

impl GrantFilter {
    pub fn status(status: GrantStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn funder(funder: impl Into<String>) -> Self {
        Self {
            funder: Some(funder.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, grant: &Grant) -> bool {
        self.status.is_none_or(|s| s == grant.status)
            && self.grant_type.is_none_or(|t| t == grant.grant_type)
            && self.funder.as_deref().is_none_or(|f| f == grant.funder)
    }
}

/// Parse a `YYYY-MM-DD` date, reporting failures as validation errors.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| TrackerError::validation(format!("invalid date {raw:?}: {e}")))
}

/// Parse a list of dates into ascending order without duplicates.
pub fn parse_dates<S: AsRef<str>>(raw: &[S]) -> Result<Vec<NaiveDate>> {
    let mut dates = raw
        .iter()
        .map(|d| parse_date(d.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    dates.sort_unstable();
    dates.dedup();
    Ok(dates)
}

pub(crate) fn require_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackerError::validation(format!(
            "{field} must be a positive number, got {value}"
        )))
    }
}

pub(crate) fn require_text(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::validation(format!("{field} must not be blank")));
    }
    if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_string())
    }
}
