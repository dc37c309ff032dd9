//! Lifecycle Acceptance Tests for the grant tracker
//!
//! These tests drive the public API end to end:
//! - The identify -> apply -> submit -> award golden path
//! - Failed transitions leave the stored grant untouched
//! - Aggregates over a mixed portfolio
//! - Both repository backends behave identically
//! - File-backed stores survive a reopen

#![allow(clippy::expect_used)]

use chrono::{Days, NaiveDate, Utc};
use grants_tracker::{
    ErrorCategory, GrantFilter, GrantStatus, GrantStore, GrantTracker, GrantType, MemoryRepository,
    NewGrant, Repository, SqliteRepository, SubmissionDraft, TrackerConfig, WindowConfig,
};
use pretty_assertions::assert_eq;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn sqlite_tracker() -> GrantTracker<SqliteRepository> {
    GrantTracker::open_in_memory().expect("in-memory tracker")
}

fn memory_tracker() -> GrantTracker<MemoryRepository> {
    GrantTracker::with_repository(MemoryRepository::new(), WindowConfig::default())
}

/// Identify a grant and move it up to `submitted`.
fn submitted<R: Repository>(t: &mut GrantTracker<R>, name: &str, funder: &str) -> String {
    let g = t
        .identify(NewGrant::new(name, funder, 50_000.0, "2025-04-30"))
        .expect("identify");
    t.apply(&g.id).expect("apply");
    t.submit(&g.id, SubmissionDraft::new("Alice")).expect("submit");
    g.id
}

/// identify -> apply -> submit -> award, as the NSF example describes it.
fn nsf_golden_path<R: Repository>(t: &mut GrantTracker<R>) {
    let g = t
        .identify(
            NewGrant::new("NSF Grant", "NSF", 250_000.0, "2025-04-30")
                .grant_type(GrantType::Federal)
                .requirements(["IRS 501c3", "Budget narrative"]),
        )
        .expect("identify");
    assert_eq!(g.status, GrantStatus::Identified);

    let g = t.apply(&g.id).expect("apply");
    assert_eq!(g.status, GrantStatus::Applying);

    let draft = SubmissionDraft::new("Alice").documents(["budget.pdf"]);
    let (g, submission) = t.submit(&g.id, draft).expect("submit");
    assert_eq!(g.status, GrantStatus::Submitted);
    assert_eq!(submission.grant_id, g.id);
    assert_eq!(submission.submitted_by, "Alice");
    assert_eq!(submission.documents, vec!["budget.pdf"]);

    let subs = t.get_submissions(&g.id).expect("submissions");
    assert_eq!(subs, vec![submission]);

    let g = t
        .award(&g.id, Some(200_000.0), &["2025-12-31"])
        .expect("award");
    assert_eq!(g.status, GrantStatus::Awarded);
    assert_eq!(g.award_amount, Some(200_000.0));
    assert_eq!(g.reporting_dates, vec![date(2025, 12, 31)]);

    let stored = t.require_grant(&g.id).expect("load");
    assert_eq!(stored, g);
    assert_eq!(stored.requirements, vec!["IRS 501c3", "Budget narrative"]);
}

fn failed_submit_records_nothing<R: Repository>(t: &mut GrantTracker<R>) {
    let g = t
        .identify(NewGrant::new("G", "F", 10.0, "2025-04-30"))
        .expect("identify");

    // Still identified: submit must not leave a submission behind
    let err = t
        .submit(&g.id, SubmissionDraft::new("Alice").documents(["a.pdf"]))
        .expect_err("not applying");
    assert_eq!(err.category(), ErrorCategory::InvalidTransitionError);
    assert!(t.get_submissions(&g.id).expect("submissions").is_empty());
    assert_eq!(t.require_grant(&g.id).expect("load"), g);
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn nsf_golden_path_sqlite() {
    nsf_golden_path(&mut sqlite_tracker());
}

#[test]
fn nsf_golden_path_memory() {
    nsf_golden_path(&mut memory_tracker());
}

#[test]
fn failed_submit_records_nothing_sqlite() {
    failed_submit_records_nothing(&mut sqlite_tracker());
}

#[test]
fn failed_submit_records_nothing_memory() {
    failed_submit_records_nothing(&mut memory_tracker());
}

#[test]
fn full_lifecycle_to_closed() {
    let mut t = sqlite_tracker();
    let id = submitted(&mut t, "G", "F");

    t.award(&id, None, &["2026-06-30", "2025-12-31"]).expect("award");
    let g = t.start_reporting(&id).expect("reporting");
    assert_eq!(g.status, GrantStatus::Reporting);
    assert_eq!(g.reporting_dates, vec![date(2025, 12, 31), date(2026, 6, 30)]);

    let g = t.close(&id).expect("close");
    assert_eq!(g.status, GrantStatus::Closed);
    assert!(g.status.is_terminal());

    for err in [
        t.apply(&id).expect_err("apply"),
        t.start_reporting(&id).expect_err("reporting"),
        t.close(&id).expect_err("close"),
    ] {
        assert_eq!(err.category(), ErrorCategory::InvalidTransitionError);
    }
    assert_eq!(t.require_grant(&id).expect("load").status, GrantStatus::Closed);
}

#[test]
fn no_skipped_states() {
    let mut t = sqlite_tracker();
    let g = t
        .identify(NewGrant::new("G", "F", 10.0, "2025-04-30"))
        .expect("identify");

    let err = t
        .award(&g.id, Some(5.0), &["2025-12-31"])
        .expect_err("award before submit");
    assert_eq!(err.category(), ErrorCategory::InvalidTransitionError);
    let err = t.start_reporting(&g.id).expect_err("reporting before award");
    assert_eq!(err.category(), ErrorCategory::InvalidTransitionError);

    let stored = t.require_grant(&g.id).expect("load");
    assert_eq!(stored.status, GrantStatus::Identified);
    assert!(stored.award_amount.is_none());
    assert!(stored.reporting_dates.is_empty());
}

#[test]
fn identify_validates_input() {
    let mut t = sqlite_tracker();
    for new in [
        NewGrant::new("G", "F", 0.0, "2025-04-30"),
        NewGrant::new("G", "F", -1.0, "2025-04-30"),
        NewGrant::new("G", "F", 10.0, "2025-04-31"),
        NewGrant::new("", "F", 10.0, "2025-04-30"),
    ] {
        let err = t.identify(new).expect_err("invalid");
        assert_eq!(err.category(), ErrorCategory::ValidationError);
    }
    assert_eq!(t.repository().grant_count().expect("count"), 0);
}

#[test]
fn list_grants_by_status_and_type() {
    let mut t = sqlite_tracker();
    t.identify(NewGrant::new("G1", "F1", 100_000.0, "2025-05-01"))
        .expect("identify");
    t.identify(
        NewGrant::new("G2", "F2", 50_000.0, "2025-04-01").grant_type(GrantType::State),
    )
    .expect("identify");
    let id = submitted(&mut t, "G3", "F1");
    t.award(&id, None, &[] as &[&str]).expect("award");

    let awarded = t
        .list_grants(&GrantFilter::status(GrantStatus::Awarded))
        .expect("list");
    assert_eq!(awarded.len(), 1);
    assert_eq!(awarded[0].id, id);

    let state = t
        .list_grants(&GrantFilter {
            grant_type: Some(GrantType::State),
            ..GrantFilter::default()
        })
        .expect("list");
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].name, "G2");

    let names: Vec<String> = t
        .list_grants(&GrantFilter::default())
        .expect("list")
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["G2", "G3", "G1"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregates
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn pipeline_counts_sum_to_total() {
    let mut t = sqlite_tracker();
    t.identify(NewGrant::new("G1", "F1", 100_000.0, "2025-04-30"))
        .expect("identify");
    let applying = t
        .identify(NewGrant::new("G2", "F1", 200_000.0, "2025-04-30"))
        .expect("identify");
    t.apply(&applying.id).expect("apply");
    let id = submitted(&mut t, "G3", "F2");
    t.award(&id, Some(40_000.0), &["2025-12-31"]).expect("award");

    let pipeline = t.get_pipeline().expect("pipeline");
    assert_eq!(pipeline.total_grants, 3);
    assert_eq!(pipeline.by_status.len(), GrantStatus::ALL.len());
    let sum: usize = pipeline.by_status.values().map(|s| s.count).sum();
    assert_eq!(sum, pipeline.total_grants);
    assert_eq!(pipeline.count(GrantStatus::Identified), 1);
    assert_eq!(pipeline.count(GrantStatus::Applying), 1);
    assert_eq!(pipeline.count(GrantStatus::Awarded), 1);
    assert_eq!(pipeline.count(GrantStatus::Rejected), 0);
    assert_eq!(pipeline.total_requested, 350_000.0);
    assert_eq!(pipeline.total_awarded, 40_000.0);
}

#[test]
fn success_rate_half() {
    let mut t = sqlite_tracker();
    assert_eq!(t.success_rate(None).expect("rate").rate, None);

    let won = submitted(&mut t, "Won", "NSF");
    let lost = submitted(&mut t, "Lost", "NSF");
    assert_eq!(t.success_rate(None).expect("rate").rate, None);

    t.award(&won, None, &["2025-12-31"]).expect("award");
    t.reject(&lost, "Missed priorities").expect("reject");

    let rate = t.success_rate(None).expect("rate");
    assert_eq!(rate.rate, Some(0.5));
    assert_eq!((rate.awarded, rate.rejected, rate.submitted), (1, 1, 0));

    // Closing does not change the historical outcome
    t.start_reporting(&won).expect("reporting");
    t.close(&won).expect("close");
    t.close(&lost).expect("close");
    assert_eq!(t.success_rate(Some("NSF")).expect("rate").rate, Some(0.5));
    assert_eq!(t.success_rate(Some("Gates")).expect("rate").rate, None);
}

#[test]
fn reporting_calendar_three_month_window() {
    let mut t = sqlite_tracker();
    let today = date(2025, 1, 15);

    let near = submitted(&mut t, "Near", "NSF");
    t.award(&near, None, &["2025-03-15"]).expect("award");
    let far = submitted(&mut t, "Far", "NSF");
    t.award(&far, None, &["2025-07-15"]).expect("award");

    let calendar = t.reporting_calendar_at(3, today).expect("calendar");
    let got: Vec<(&str, NaiveDate)> = calendar
        .iter()
        .map(|o| (o.grant.name.as_str(), o.reporting_date))
        .collect();
    assert_eq!(got, vec![("Near", date(2025, 3, 15))]);

    // Closed grants carry no open obligations
    t.close(&near).expect("close");
    assert!(t.reporting_calendar_at(3, today).expect("calendar").is_empty());
}

#[test]
fn reporting_calendar_relative_to_today() {
    let mut t = sqlite_tracker();
    let today = Utc::now().date_naive();
    let two_months = today.checked_add_days(Days::new(60)).expect("date");
    let six_months = today.checked_add_days(Days::new(180)).expect("date");

    let id = submitted(&mut t, "G", "NSF");
    let dates = [two_months.to_string(), six_months.to_string()];
    t.award(&id, None, &dates).expect("award");

    let calendar = t.reporting_calendar(3).expect("calendar");
    assert_eq!(calendar.len(), 1);
    assert_eq!(calendar[0].reporting_date, two_months);
    assert_eq!(calendar[0].grant.id, id);
}

#[test]
fn upcoming_deadlines_skip_submitted() {
    let mut t = sqlite_tracker();
    let soon = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(7))
        .expect("date")
        .to_string();

    let open = t
        .identify(NewGrant::new("Soon", "F", 10_000.0, soon.clone()))
        .expect("identify");
    let sent = t
        .identify(NewGrant::new("Sent", "F", 10_000.0, soon))
        .expect("identify");
    t.apply(&sent.id).expect("apply");
    t.submit(&sent.id, SubmissionDraft::new("Bob")).expect("submit");

    let deadlines = t.upcoming_deadlines(30).expect("deadlines");
    assert_eq!(deadlines.len(), 1);
    assert_eq!(deadlines[0].id, open.id);
}

#[test]
fn funding_by_type_totals_awards() {
    let mut t = sqlite_tracker();
    let federal = t
        .identify(
            NewGrant::new("Fed", "NSF", 250_000.0, "2025-04-30").grant_type(GrantType::Federal),
        )
        .expect("identify");
    t.apply(&federal.id).expect("apply");
    t.submit(&federal.id, SubmissionDraft::new("Alice")).expect("submit");
    t.award(&federal.id, Some(200_000.0), &["2025-12-31"]).expect("award");
    let lost = submitted(&mut t, "Lost", "Gates");
    t.reject(&lost, "").expect("reject");

    let totals = t.funding_by_type().expect("totals");
    assert_eq!(totals.get(&GrantType::Federal), Some(&200_000.0));
    assert_eq!(totals.get(&GrantType::Foundation), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("grants.db");
    let cfg = TrackerConfig::with_db_path(path.to_string_lossy());

    let id = {
        let mut t = GrantTracker::with_config(&cfg).expect("open");
        let id = submitted(&mut t, "Durable", "NSF");
        t.add_note(&id, "Program officer call on Friday", "Alice")
            .expect("note");
        id
    };

    let repo = SqliteRepository::open_at_path(&path).expect("reopen");
    assert_eq!(repo.grant_count().expect("count"), 1);
    let t = GrantTracker::with_repository(repo, WindowConfig::default());
    let g = t.require_grant(&id).expect("load");
    assert_eq!(g.status, GrantStatus::Submitted);
    assert_eq!(t.get_submissions(&id).expect("submissions").len(), 1);
    let notes = t.get_notes(&id).expect("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].author, "Alice");
}

#[test]
fn deleting_grant_removes_submissions() {
    let mut t = sqlite_tracker();
    let id = submitted(&mut t, "G", "F");
    assert_eq!(t.repository().submission_count().expect("count"), 1);

    assert!(t.repository().delete_grant(&id).expect("delete"));
    assert_eq!(t.repository().submission_count().expect("count"), 0);
    assert!(t.get_grant(&id).expect("load").is_none());
}

#[test]
fn configured_windows_drive_agenda() {
    let cfg = TrackerConfig::parse(
        r#"
        db_path = ":memory:"

        [windows]
        deadline_days = 7
        reporting_months = 1
        "#,
    )
    .expect("config");
    let mut t = GrantTracker::with_config(&cfg).expect("open");
    assert_eq!(t.windows().deadline_days, 7);
    assert_eq!(t.windows().reporting_months, 1);

    t.identify(NewGrant::new("In", "F", 1.0, "2025-01-05")).expect("identify");
    t.identify(NewGrant::new("Out", "F", 1.0, "2025-01-20")).expect("identify");
    let id = submitted(&mut t, "Award", "F");
    t.award(&id, None, &["2025-01-25", "2025-03-01"]).expect("award");

    let agenda = t.agenda_at(date(2025, 1, 1)).expect("agenda");
    let deadlines: Vec<&str> = agenda.deadlines.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(deadlines, vec!["In"]);
    assert_eq!(agenda.reporting.len(), 1);
    assert_eq!(agenda.reporting[0].reporting_date, date(2025, 1, 25));
}
