//! # redb-backed Slice Storage
//!
//! A disk-backed slice store using the redb embedded database.
//!
//! Each slice is one JSON document in the `slices` table, keyed by its ID.
//! redb gives us:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! The single-writer property is what makes `insert` and `update` atomic:
//! each runs its read-check-write inside one write transaction, and redb
//! serializes write transactions.

use crate::store::{FieldUpdate, SliceStore};
use crate::{InsertOutcome, Slice, SliceError, SliceFilter, SliceId};
use rand::seq::SliceRandom;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::Path;

/// Table for slices: SliceId(u64) -> JSON document bytes
const SLICES: TableDefinition<u64, &[u8]> = TableDefinition::new("slices");

fn io_err(e: impl Display) -> SliceError {
    SliceError::IoError(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<Slice, SliceError> {
    serde_json::from_slice(bytes).map_err(|e| SliceError::SerializationError(e.to_string()))
}

fn encode(slice: &Slice) -> Result<Vec<u8>, SliceError> {
    serde_json::to_vec(slice).map_err(|e| SliceError::SerializationError(e.to_string()))
}

/// A disk-backed slice store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a slice database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SliceError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize the table if it doesn't exist
        let write_txn = db.begin_write().map_err(io_err)?;
        {
            let _ = write_txn.open_table(SLICES).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        Ok(Self { db })
    }

    /// Visit every stored slice in ID order inside one read transaction.
    fn for_each(&self, mut visit: impl FnMut(Slice)) -> Result<(), SliceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SLICES).map_err(io_err)?;
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            visit(decode(value.value())?);
        }
        Ok(())
    }
}

// =============================================================================
// SLICESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl SliceStore for RedbStore {
    fn get_many(&self, ids: &BTreeSet<SliceId>) -> Result<Vec<Slice>, SliceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SLICES).map_err(io_err)?;

        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(data) = table.get(id.0).map_err(io_err)? {
                found.push(decode(data.value())?);
            }
        }
        Ok(found)
    }

    fn all(&self) -> Result<Vec<Slice>, SliceError> {
        let mut slices = Vec::new();
        self.for_each(|slice| slices.push(slice))?;
        Ok(slices)
    }

    fn scan(&self, filter: SliceFilter) -> Result<Vec<Slice>, SliceError> {
        let mut slices = Vec::new();
        self.for_each(|slice| {
            if filter.matches(&slice) {
                slices.push(slice);
            }
        })?;
        Ok(slices)
    }

    fn sample(&self, amount: usize) -> Result<Vec<Slice>, SliceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SLICES).map_err(io_err)?;

        // Keys first, then fetch only the chosen documents.
        let mut keys = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            keys.push(key.value());
        }

        let mut rng = rand::thread_rng();
        let mut sampled = Vec::with_capacity(amount.min(keys.len()));
        for key in keys.choose_multiple(&mut rng, amount) {
            if let Some(data) = table.get(*key).map_err(io_err)? {
                sampled.push(decode(data.value())?);
            }
        }
        Ok(sampled)
    }

    fn count_by_id(&self, id: SliceId) -> Result<usize, SliceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SLICES).map_err(io_err)?;
        let exists = table.get(id.0).map_err(io_err)?.is_some();
        Ok(usize::from(exists))
    }

    fn insert(&self, slice: &Slice) -> Result<InsertOutcome, SliceError> {
        let bytes = encode(slice)?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        let inserted = {
            let mut table = write_txn.open_table(SLICES).map_err(io_err)?;
            let exists = table.get(slice.slice_id.0).map_err(io_err)?.is_some();
            if !exists {
                table
                    .insert(slice.slice_id.0, bytes.as_slice())
                    .map_err(io_err)?;
            }
            !exists
        };

        if !inserted {
            write_txn.abort().map_err(io_err)?;
            return Ok(InsertOutcome::Conflict(slice.slice_id));
        }
        write_txn.commit().map_err(io_err)?;
        Ok(InsertOutcome::Inserted(slice.clone()))
    }

    fn update(&self, id: SliceId, update: FieldUpdate) -> Result<Option<Slice>, SliceError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let updated = {
            let mut table = write_txn.open_table(SLICES).map_err(io_err)?;
            let current = match table.get(id.0).map_err(io_err)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            match current {
                Some(mut slice) => {
                    update.apply(&mut slice);
                    let bytes = encode(&slice)?;
                    table.insert(id.0, bytes.as_slice()).map_err(io_err)?;
                    Some(slice)
                }
                None => None,
            }
        };

        match updated {
            Some(slice) => {
                write_txn.commit().map_err(io_err)?;
                Ok(Some(slice))
            }
            None => {
                write_txn.abort().map_err(io_err)?;
                Ok(None)
            }
        }
    }

    fn len(&self) -> Result<usize, SliceError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SLICES).map_err(io_err)?;
        let count = table.len().map_err(io_err)?;
        Ok(count as usize)
    }
}
