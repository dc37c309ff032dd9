//! Persistence seam for grants, submissions and notes
//!
//! Lifecycle and query code only ever see [`GrantStore`] and
//! [`Repository`]; SQL lives in [`sqlite`].
//!
//! Mutating lifecycle operations run inside [`Repository::transaction`]:
//! the closure reads the current status, validates and writes, and the
//! whole closure commits or rolls back as one unit.

pub mod memory;
pub mod sqlite;

use crate::errors::Result;
use crate::model::{Grant, GrantFilter, GrantNote, Submission};

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// Record-level access to the grant tables.
pub trait GrantStore {
    /// Insert a new grant. Fails if the id already exists.
    fn insert_grant(&self, grant: &Grant) -> Result<()>;

    /// Load a grant by id.
    fn load_grant(&self, id: &str) -> Result<Option<Grant>>;

    /// Overwrite an existing grant. Returns `false` when no row matched.
    fn save_grant(&self, grant: &Grant) -> Result<bool>;

    /// Grants matching `filter`, ordered by deadline then name.
    fn list_grants(&self, filter: &GrantFilter) -> Result<Vec<Grant>>;

    fn insert_submission(&self, submission: &Submission) -> Result<()>;

    /// Submissions for a grant, newest first.
    fn list_submissions(&self, grant_id: &str) -> Result<Vec<Submission>>;

    fn insert_note(&self, note: &GrantNote) -> Result<()>;

    /// Notes for a grant, newest first.
    fn list_notes(&self, grant_id: &str) -> Result<Vec<GrantNote>>;

    /// Remove a grant together with its submissions and notes.
    ///
    /// Not used by the lifecycle; exposed for callers that own retention.
    fn delete_grant(&self, id: &str) -> Result<bool>;
}

/// A store that can run a closure atomically.
pub trait Repository: GrantStore {
    /// Run `f` in a single transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back every write made by `f`
    /// when it returns `Err`.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn GrantStore) -> Result<T>;
}
