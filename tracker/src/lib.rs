//! Grant application tracker
//!
//! Tracks funding applications from the moment an opportunity is spotted
//! until the last report is filed:
//!
//! - A closed lifecycle state machine ([`GrantStatus`]) with an explicit
//!   transition table; every transition is validated and written inside one
//!   store transaction
//! - Immutable [`Submission`] records captured at the `submitted` transition
//! - Read-side projections: pipeline counts, success rate, upcoming
//!   deadlines and reporting obligations
//!
//! Storage sits behind the [`Repository`] trait; [`SqliteRepository`] is the
//! default backend.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod model;
pub mod queries;
pub mod repository;

pub use config::{StoreConfig, StoreLocation, TrackerConfig, WindowConfig};
pub use errors::{ErrorCategory, Result, TrackerError};
pub use lifecycle::{GrantStatus, GrantType, Transition};
pub use model::{Grant, GrantFilter, GrantNote, NewGrant, Submission};
pub use queries::{Agenda, Pipeline, ReportingObligation, StatusSummary, SuccessRate};
pub use repository::{GrantStore, MemoryRepository, Repository, SqliteRepository};

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use std::collections::BTreeMap;

/// Tracker version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Materials handed over at the `submitted` transition.
#[derive(Debug, Clone, Default)]
pub struct SubmissionDraft {
    pub submitted_by: String,
    pub documents: Vec<String>,
    pub notes: String,
}

impl SubmissionDraft {
    pub fn new(submitted_by: impl Into<String>) -> Self {
        Self {
            submitted_by: submitted_by.into(),
            ..Self::default()
        }
    }

    pub fn documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents = documents.into_iter().map(Into::into).collect();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Main entry point for grant tracking
pub struct GrantTracker<R = SqliteRepository> {
    repo: R,
    windows: WindowConfig,
}

impl GrantTracker<SqliteRepository> {
    /// Create a tracker, loading config and opening the configured store
    pub fn new() -> Result<Self> {
        let cfg = TrackerConfig::load()?;
        Self::with_config(&cfg)
    }

    /// Create a tracker with a specific config
    pub fn with_config(cfg: &TrackerConfig) -> Result<Self> {
        let location = cfg.store_location();
        let repo = SqliteRepository::open(&location, cfg.store.busy_timeout())?;

        tracing::info!(
            version = VERSION,
            location = %location.display(),
            "Grant tracker initialized"
        );

        Ok(Self::with_repository(repo, cfg.windows.clone()))
    }

    /// Open a tracker over `location` with default windows
    pub fn open(location: &StoreLocation) -> Result<Self> {
        let repo = SqliteRepository::open(location, StoreConfig::default().busy_timeout())?;
        Ok(Self::with_repository(repo, WindowConfig::default()))
    }

    /// Open a tracker over a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreLocation::InMemory)
    }
}

impl<R: Repository> GrantTracker<R> {
    /// Create a tracker over any repository backend
    pub fn with_repository(repo: R, windows: WindowConfig) -> Self {
        Self { repo, windows }
    }

    /// Get a reference to the underlying repository
    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn windows(&self) -> &WindowConfig {
        &self.windows
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    /// Record a newly identified grant opportunity.
    pub fn identify(&mut self, new: NewGrant) -> Result<Grant> {
        let grant = new.into_grant(new_id(), now())?;
        self.repo.insert_grant(&grant)?;

        tracing::info!(
            grant_id = %grant.id,
            funder = %grant.funder,
            amount = grant.amount,
            deadline = %grant.deadline,
            "Grant identified"
        );

        Ok(grant)
    }

    /// `identified -> applying`
    pub fn apply(&mut self, grant_id: &str) -> Result<Grant> {
        self.apply_with_note(grant_id, "")
    }

    /// `identified -> applying`, recording `note` on the grant when non-empty.
    pub fn apply_with_note(&mut self, grant_id: &str, note: &str) -> Result<Grant> {
        let note = note.trim();
        let (grant, ()) = self.transition(grant_id, GrantStatus::Applying, |_, grant| {
            if !note.is_empty() {
                grant.notes = note.to_string();
            }
            Ok(())
        })?;
        Ok(grant)
    }

    /// `applying -> submitted`, recording the submission in the same
    /// transaction.
    pub fn submit(
        &mut self,
        grant_id: &str,
        draft: SubmissionDraft,
    ) -> Result<(Grant, Submission)> {
        let submitted_at = now();
        self.transition(grant_id, GrantStatus::Submitted, move |store, grant| {
            let submission = Submission {
                id: new_id(),
                grant_id: grant.id.clone(),
                submitted_by: draft.submitted_by.trim().to_string(),
                documents: draft.documents,
                notes: draft.notes,
                submitted_at,
            };
            store.insert_submission(&submission)?;
            Ok(submission)
        })
    }

    /// `submitted -> awarded`
    ///
    /// `award_amount` defaults to the requested amount. Reporting dates are
    /// `YYYY-MM-DD` strings, stored ascending without duplicates.
    pub fn award<S: AsRef<str>>(
        &mut self,
        grant_id: &str,
        award_amount: Option<f64>,
        reporting_dates: &[S],
    ) -> Result<Grant> {
        if let Some(amount) = award_amount {
            model::require_positive("award_amount", amount)?;
        }
        let reporting_dates = model::parse_dates(reporting_dates)?;

        let (grant, ()) = self.transition(grant_id, GrantStatus::Awarded, |_, grant| {
            grant.award_amount = Some(award_amount.unwrap_or(grant.amount));
            grant.reporting_dates = reporting_dates;
            Ok(())
        })?;
        Ok(grant)
    }

    /// `submitted -> rejected`
    pub fn reject(&mut self, grant_id: &str, reason: &str) -> Result<Grant> {
        let reason = reason.trim();
        let (grant, ()) = self.transition(grant_id, GrantStatus::Rejected, |_, grant| {
            grant.rejection_reason = (!reason.is_empty()).then(|| reason.to_string());
            Ok(())
        })?;
        Ok(grant)
    }

    /// `awarded -> reporting`
    pub fn start_reporting(&mut self, grant_id: &str) -> Result<Grant> {
        let (grant, ()) = self.transition(grant_id, GrantStatus::Reporting, |_, _| Ok(()))?;
        Ok(grant)
    }

    /// `reporting | awarded | rejected -> closed`
    pub fn close(&mut self, grant_id: &str) -> Result<Grant> {
        let (grant, ()) = self.transition(grant_id, GrantStatus::Closed, |_, _| Ok(()))?;
        Ok(grant)
    }

    /// Load, check, update and save a grant in one transaction.
    ///
    /// `update` runs after the transition check and before the status is
    /// written; any error it returns rolls back everything it wrote.
    fn transition<T, F>(
        &mut self,
        grant_id: &str,
        to: GrantStatus,
        update: F,
    ) -> Result<(Grant, T)>
    where
        F: FnOnce(&dyn GrantStore, &mut Grant) -> Result<T>,
    {
        let updated_at = now();
        let (grant, transition, out) = self.repo.transaction(|store| {
            let mut grant = store
                .load_grant(grant_id)?
                .ok_or_else(|| TrackerError::not_found(grant_id))?;
            let transition = Transition::checked(grant.status, to)
                .ok_or_else(|| TrackerError::invalid_transition(grant_id, grant.status, to))?;

            let out = update(store, &mut grant)?;
            grant.status = transition.to;
            grant.updated_at = updated_at;

            if !store.save_grant(&grant)? {
                return Err(TrackerError::internal(format!(
                    "grant {grant_id} vanished during transition"
                )));
            }
            Ok((grant, transition, out))
        })?;

        tracing::info!(
            grant_id,
            from = %transition.from,
            to = %transition.to,
            "Grant transitioned"
        );

        Ok((grant, out))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn get_grant(&self, grant_id: &str) -> Result<Option<Grant>> {
        self.repo.load_grant(grant_id)
    }

    /// Like [`Self::get_grant`] but reports a missing grant as `NotFound`.
    pub fn require_grant(&self, grant_id: &str) -> Result<Grant> {
        self.get_grant(grant_id)?
            .ok_or_else(|| TrackerError::not_found(grant_id))
    }

    /// Grants matching `filter`, ordered by deadline then name.
    pub fn list_grants(&self, filter: &GrantFilter) -> Result<Vec<Grant>> {
        self.repo.list_grants(filter)
    }

    /// Submissions for a grant, newest first.
    pub fn get_submissions(&self, grant_id: &str) -> Result<Vec<Submission>> {
        self.require_grant(grant_id)?;
        self.repo.list_submissions(grant_id)
    }

    /// Attach a free-form note to a grant.
    pub fn add_note(&mut self, grant_id: &str, content: &str, author: &str) -> Result<GrantNote> {
        let content = model::require_text("content", content.to_string())?;
        let note = GrantNote {
            id: new_id(),
            grant_id: grant_id.to_string(),
            content,
            author: author.trim().to_string(),
            created_at: now(),
        };

        self.repo.transaction(|store| {
            if store.load_grant(grant_id)?.is_none() {
                return Err(TrackerError::not_found(grant_id));
            }
            store.insert_note(&note)
        })?;

        tracing::debug!(grant_id, note_id = %note.id, "Note added");
        Ok(note)
    }

    /// Notes for a grant, newest first.
    pub fn get_notes(&self, grant_id: &str) -> Result<Vec<GrantNote>> {
        self.require_grant(grant_id)?;
        self.repo.list_notes(grant_id)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Grant counts and totals for every lifecycle status.
    pub fn get_pipeline(&self) -> Result<Pipeline> {
        Ok(queries::pipeline(&self.all_grants()?))
    }

    /// Share of decided grants that were awarded, optionally for one funder.
    pub fn success_rate(&self, funder: Option<&str>) -> Result<SuccessRate> {
        Ok(queries::success_rate(&self.all_grants()?, funder))
    }

    /// Reporting dates due within `months` calendar months from today.
    pub fn reporting_calendar(&self, months: u32) -> Result<Vec<ReportingObligation>> {
        self.reporting_calendar_at(months, today())
    }

    pub fn reporting_calendar_at(
        &self,
        months: u32,
        today: NaiveDate,
    ) -> Result<Vec<ReportingObligation>> {
        Ok(queries::reporting_calendar(&self.all_grants()?, months, today))
    }

    /// Actionable grants whose deadline falls within `days` days from today.
    pub fn upcoming_deadlines(&self, days: u32) -> Result<Vec<Grant>> {
        self.upcoming_deadlines_at(days, today())
    }

    pub fn upcoming_deadlines_at(&self, days: u32, today: NaiveDate) -> Result<Vec<Grant>> {
        Ok(queries::upcoming_deadlines(&self.all_grants()?, days, today))
    }

    /// Total awarded amount per grant type.
    pub fn funding_by_type(&self) -> Result<BTreeMap<GrantType, f64>> {
        Ok(queries::funding_by_type(&self.all_grants()?))
    }

    /// Deadlines and reporting dates in the configured windows.
    pub fn agenda(&self) -> Result<Agenda> {
        self.agenda_at(today())
    }

    pub fn agenda_at(&self, today: NaiveDate) -> Result<Agenda> {
        let grants = self.all_grants()?;
        Ok(Agenda {
            today,
            deadlines: queries::upcoming_deadlines(&grants, self.windows.deadline_days, today),
            reporting: queries::reporting_calendar(&grants, self.windows.reporting_months, today),
        })
    }

    fn all_grants(&self) -> Result<Vec<Grant>> {
        self.repo.list_grants(&GrantFilter::default())
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time at the precision the store keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
