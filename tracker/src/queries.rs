//! Read-side projections over grants
//!
//! Every function here is pure: it takes the grants already loaded from the
//! store plus an explicit `today` where a date window is involved.

use crate::lifecycle::{GrantStatus, GrantType};
use crate::model::Grant;
use chrono::{Days, Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Count and money totals for one status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub count: usize,
    pub total_requested: f64,
    pub total_awarded: f64,
}

/// Distribution of grants across lifecycle statuses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    /// One entry per lifecycle status, zero-count statuses included.
    pub by_status: BTreeMap<GrantStatus, StatusSummary>,
    pub total_grants: usize,
    pub total_requested: f64,
    pub total_awarded: f64,
}

impl Pipeline {
    pub fn count(&self, status: GrantStatus) -> usize {
        self.by_status.get(&status).map_or(0, |s| s.count)
    }
}

/// Outcome ratio over decided grants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessRate {
    /// `None` means all funders.
    pub funder: Option<String>,
    /// Still waiting on the funder.
    pub submitted: usize,
    pub awarded: usize,
    pub rejected: usize,
    /// `awarded / (awarded + rejected)`, `None` when nothing is decided yet.
    pub rate: Option<f64>,
}

impl SuccessRate {
    pub fn decided(&self) -> usize {
        self.awarded + self.rejected
    }
}

/// A reporting date owed on an awarded grant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportingObligation {
    pub grant: Grant,
    pub reporting_date: NaiveDate,
}

/// Deadlines and reporting dates in the configured windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agenda {
    pub today: NaiveDate,
    pub deadlines: Vec<Grant>,
    pub reporting: Vec<ReportingObligation>,
}

pub fn pipeline(grants: &[Grant]) -> Pipeline {
    let mut by_status: BTreeMap<GrantStatus, StatusSummary> = GrantStatus::ALL
        .into_iter()
        .map(|s| (s, StatusSummary::default()))
        .collect();

    for grant in grants {
        let entry = by_status.entry(grant.status).or_default();
        entry.count += 1;
        entry.total_requested += grant.amount;
        entry.total_awarded += grant.award_amount.unwrap_or(0.0);
    }

    let total_requested = by_status.values().map(|s| s.total_requested).sum();
    let total_awarded = by_status.values().map(|s| s.total_awarded).sum();

    Pipeline {
        by_status,
        total_grants: grants.len(),
        total_requested,
        total_awarded,
    }
}

/// Share of decided grants that were awarded, optionally for one funder.
pub fn success_rate(grants: &[Grant], funder: Option<&str>) -> SuccessRate {
    let mut submitted = 0;
    let mut awarded = 0;
    let mut rejected = 0;

    for grant in grants
        .iter()
        .filter(|g| funder.is_none_or(|f| f == g.funder))
    {
        if grant.status == GrantStatus::Submitted {
            submitted += 1;
        } else if grant.was_awarded() {
            awarded += 1;
        } else if grant.was_rejected() {
            rejected += 1;
        }
    }

    let decided = awarded + rejected;
    let rate = (decided > 0).then(|| awarded as f64 / decided as f64);

    SuccessRate {
        funder: funder.map(str::to_string),
        submitted,
        awarded,
        rejected,
        rate,
    }
}

/// Reporting dates in `[today, today + months]` on grants still owing
/// reports, earliest first.
pub fn reporting_calendar(
    grants: &[Grant],
    months: u32,
    today: NaiveDate,
) -> Vec<ReportingObligation> {
    let cutoff = today
        .checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX);

    let mut obligations: Vec<ReportingObligation> = grants
        .iter()
        .filter(|g| g.status.has_reporting_obligations())
        .flat_map(|g| {
            g.reporting_dates
                .iter()
                .filter(|d| (today..=cutoff).contains(*d))
                .map(move |d| ReportingObligation {
                    grant: g.clone(),
                    reporting_date: *d,
                })
        })
        .collect();

    obligations.sort_by(|a, b| {
        a.reporting_date
            .cmp(&b.reporting_date)
            .then_with(|| a.grant.name.cmp(&b.grant.name))
    });
    obligations
}

/// Actionable grants with a deadline in `[today, today + days]`, earliest first.
pub fn upcoming_deadlines(grants: &[Grant], days: u32, today: NaiveDate) -> Vec<Grant> {
    let cutoff = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);

    let mut upcoming: Vec<Grant> = grants
        .iter()
        .filter(|g| g.status.is_actionable())
        .filter(|g| (today..=cutoff).contains(&g.deadline))
        .cloned()
        .collect();

    upcoming.sort_by(|a, b| a.deadline.cmp(&b.deadline).then_with(|| a.name.cmp(&b.name)));
    upcoming
}

/// Total awarded amount per grant type, over grants that were awarded.
pub fn funding_by_type(grants: &[Grant]) -> BTreeMap<GrantType, f64> {
    let mut totals = BTreeMap::new();
    for grant in grants.iter().filter(|g| g.was_awarded()) {
        *totals.entry(grant.grant_type).or_insert(0.0) += grant.award_amount.unwrap_or(0.0);
    }
    totals
}
