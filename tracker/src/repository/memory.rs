//! In-process repository
//!
//! Same contract as the SQLite backend without touching disk. Transactions
//! snapshot the tables and restore the snapshot when the closure fails.

use super::{GrantStore, Repository};
use crate::errors::{Result, TrackerError};
use crate::model::{Grant, GrantFilter, GrantNote, Submission};
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Tables {
    grants: BTreeMap<String, Grant>,
    /// Insertion order is kept so ties on timestamp sort newest-inserted first.
    submissions: Vec<Submission>,
    notes: Vec<GrantNote>,
}

/// Repository backed by in-memory maps
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RefCell<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GrantStore for MemoryRepository {
    fn insert_grant(&self, grant: &Grant) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        if tables.grants.contains_key(&grant.id) {
            return Err(TrackerError::store(format!(
                "grant {} already exists",
                grant.id
            )));
        }
        tables.grants.insert(grant.id.clone(), grant.clone());
        Ok(())
    }

    fn load_grant(&self, id: &str) -> Result<Option<Grant>> {
        Ok(self.tables.borrow().grants.get(id).cloned())
    }

    fn save_grant(&self, grant: &Grant) -> Result<bool> {
        let mut tables = self.tables.borrow_mut();
        match tables.grants.get_mut(&grant.id) {
            Some(existing) => {
                *existing = grant.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_grants(&self, filter: &GrantFilter) -> Result<Vec<Grant>> {
        let tables = self.tables.borrow();
        let mut grants: Vec<Grant> = tables
            .grants
            .values()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect();
        grants.sort_by(|a, b| a.deadline.cmp(&b.deadline).then_with(|| a.name.cmp(&b.name)));
        Ok(grants)
    }

    fn insert_submission(&self, submission: &Submission) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        if !tables.grants.contains_key(&submission.grant_id) {
            return Err(TrackerError::store(format!(
                "submission {} references unknown grant {}",
                submission.id, submission.grant_id
            )));
        }
        tables.submissions.push(submission.clone());
        Ok(())
    }

    fn list_submissions(&self, grant_id: &str) -> Result<Vec<Submission>> {
        let tables = self.tables.borrow();
        let mut submissions: Vec<Submission> = tables
            .submissions
            .iter()
            .rev()
            .filter(|s| s.grant_id == grant_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep newest-inserted first
        submissions.sort_by_key(|s| Reverse(s.submitted_at));
        Ok(submissions)
    }

    fn insert_note(&self, note: &GrantNote) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        if !tables.grants.contains_key(&note.grant_id) {
            return Err(TrackerError::store(format!(
                "note {} references unknown grant {}",
                note.id, note.grant_id
            )));
        }
        tables.notes.push(note.clone());
        Ok(())
    }

    fn list_notes(&self, grant_id: &str) -> Result<Vec<GrantNote>> {
        let tables = self.tables.borrow();
        let mut notes: Vec<GrantNote> = tables
            .notes
            .iter()
            .rev()
            .filter(|n| n.grant_id == grant_id)
            .cloned()
            .collect();
        notes.sort_by_key(|n| Reverse(n.created_at));
        Ok(notes)
    }

    fn delete_grant(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.borrow_mut();
        if tables.grants.remove(id).is_none() {
            return Ok(false);
        }
        tables.submissions.retain(|s| s.grant_id != id);
        tables.notes.retain(|n| n.grant_id != id);
        Ok(true)
    }
}

impl Repository for MemoryRepository {
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn GrantStore) -> Result<T>,
    {
        let snapshot = self.tables.get_mut().clone();
        let result = f(&*self);
        if result.is_err() {
            *self.tables.get_mut() = snapshot;
        }
        result
    }
}
