//! # CLI Command Implementations

use super::Backend;
use crate::api::{self, AppState};
use crate::config::SlicesConfig;
use slices_core::{
    CancelFlag, GraphResolver, InsertOutcome, MemoryStore, Mutator, RedbStore, Slice, SliceError,
    SliceId, SliceStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum import file size (100 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 100 * 1024 * 1024;

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    config: &SlicesConfig,
    backend: Backend,
    host: &str,
    port: u16,
) -> Result<(), SliceError> {
    let store = open_store(config, backend)?;
    let state = AppState::from_config(store, config)
        .map_err(|e| SliceError::IoError(format!("search gateway: {e}")))?;

    println!("Configuration:");
    println!("  Host:      {}", host);
    println!("  Port:      {}", port);
    println!("  Backend:   {}", backend);
    println!("  Database:  {:?}", config.database);
    println!("  Search:    {}", state.search.endpoint());
    println!("  Timeout:   {} ms", config.resolver.timeout_ms);
    println!();
    println!("Endpoints:");
    println!("  GET  /api/slices/{{ids}}       - Slices and everything they reference");
    println!("  GET  /api/slices/{{id}}/refs   - References only");
    println!("  POST /api/slices               - Insert a slice");
    println!("  POST /api/slices/{{id}}/upvote - Vote (also /downvote, /like)");
    println!("  GET  /api/slices/search/{{w}}  - Full-text search");
    println!("  GET  /health                  - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show slice counts.
pub fn cmd_status(
    config: &SlicesConfig,
    backend: Backend,
    json_mode: bool,
) -> Result<(), SliceError> {
    let store = open_store(config, backend)?;
    let resolver = GraphResolver::new(store.as_ref());

    let total = store.len()?;
    let with_references = resolver.with_references()?.len();
    let with_instances = resolver.with_instances()?.len();
    let liked = resolver.liked()?.len();

    if json_mode {
        let output = serde_json::json!({
            "database": config.database.to_string_lossy(),
            "backend": backend.to_string(),
            "slices": total,
            "with_references": with_references,
            "without_references": total.saturating_sub(with_references),
            "with_instances": with_instances,
            "liked": liked,
        });
        println!("{}", pretty(&output)?);
        return Ok(());
    }

    println!("Slices Status");
    println!("=============");
    println!("Database: {:?}", config.database);
    println!("Backend:  {}", backend);
    println!();
    println!("Slices:             {}", total);
    println!("With references:    {}", with_references);
    println!("Without references: {}", total.saturating_sub(with_references));
    println!("With instances:     {}", with_instances);
    println!("Liked:              {}", liked);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Tally of one import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub conflicted: usize,
    pub rejected: usize,
}

/// Insert every slice in `slices`, keeping existing IDs and skipping invalid
/// slices.
pub fn import_slices(
    store: &dyn SliceStore,
    slices: Vec<Slice>,
) -> Result<ImportReport, SliceError> {
    let mutator = Mutator::new(store);
    let mut report = ImportReport::default();
    for slice in slices {
        let id = slice.slice_id;
        match mutator.insert(slice) {
            Ok(InsertOutcome::Inserted(_)) => report.inserted += 1,
            Ok(InsertOutcome::Conflict(_)) => report.conflicted += 1,
            Err(SliceError::InvalidSlice(reason)) => {
                tracing::warn!(slice_id = %id, %reason, "skipping invalid slice");
                report.rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Bulk insert slices from a JSON array file.
pub fn cmd_import(
    config: &SlicesConfig,
    backend: Backend,
    json_mode: bool,
    file: &Path,
) -> Result<(), SliceError> {
    if backend == Backend::Memory {
        return Err(SliceError::IoError(
            "Import into the memory backend would be lost on exit. Use redb.".to_string(),
        ));
    }

    let path = validate_file_path(file)?;
    let size = std::fs::metadata(&path)
        .map_err(|e| SliceError::IoError(format!("Cannot read file metadata: {}", e)))?
        .len();
    if size > MAX_IMPORT_FILE_SIZE {
        return Err(SliceError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            size, MAX_IMPORT_FILE_SIZE
        )));
    }

    let data = std::fs::read(&path)
        .map_err(|e| SliceError::IoError(format!("Read file: {}", e)))?;
    let slices: Vec<Slice> = serde_json::from_slice(&data)
        .map_err(|e| SliceError::SerializationError(format!("Parse {:?}: {}", path, e)))?;

    let store = open_store(config, backend)?;
    let report = import_slices(store.as_ref(), slices)?;

    if json_mode {
        let output = serde_json::json!({
            "inserted": report.inserted,
            "conflicted": report.conflicted,
            "rejected": report.rejected,
        });
        println!("{}", pretty(&output)?);
    } else {
        println!(
            "Imported {} slices ({} already present, {} invalid)",
            report.inserted, report.conflicted, report.rejected
        );
    }

    Ok(())
}

// =============================================================================
// RESOLVE COMMAND
// =============================================================================

/// Print the closure of `ids`.
pub fn cmd_resolve(
    config: &SlicesConfig,
    backend: Backend,
    json_mode: bool,
    ids: &str,
    refs_only: bool,
) -> Result<(), SliceError> {
    let seeds = SliceId::parse_list(ids)?;
    let store = open_store(config, backend)?;
    let resolver =
        GraphResolver::with_limits(store.as_ref(), config.resolver.limits(CancelFlag::new()));

    let slices = if refs_only {
        let seed = match (seeds.len(), seeds.first()) {
            (1, Some(&seed)) => seed,
            _ => {
                return Err(SliceError::MalformedId(format!(
                    "--refs-only takes a single ID, got {ids:?}"
                )));
            }
        };
        resolver.references_only(seed)?
    } else {
        resolver.resolve_closure(&seeds)?.into_slices()
    };

    if json_mode {
        println!("{}", pretty(&slices)?);
        return Ok(());
    }

    if slices.is_empty() {
        println!("No slices found for {}", ids);
        return Ok(());
    }
    for slice in &slices {
        let targets: Vec<String> = slice.referenced_ids().map(|id| id.to_string()).collect();
        println!(
            "{:>8}  {:<40}  -> [{}]",
            slice.slice_id,
            truncate(&slice.fragment, 40),
            targets.join(", ")
        );
    }
    println!();
    println!("{} slice(s)", slices.len());

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(config: &SlicesConfig, backend: Backend, force: bool) -> Result<(), SliceError> {
    if backend == Backend::Memory {
        println!("Memory backend needs no initialization");
        return Ok(());
    }

    let db_path = &config.database;
    if db_path.exists() {
        if !force {
            return Err(SliceError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| SliceError::IoError(format!("Remove {:?}: {}", db_path, e)))?;
    }

    RedbStore::open(db_path)?;
    println!("Initialized new redb database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured store.
pub fn open_store(
    config: &SlicesConfig,
    backend: Backend,
) -> Result<Arc<dyn SliceStore>, SliceError> {
    match backend {
        Backend::Redb => Ok(Arc::new(RedbStore::open(&config.database)?)),
        Backend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, SliceError> {
    let canonical = path.canonicalize().map_err(|e| {
        SliceError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(SliceError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String, SliceError> {
    serde_json::to_string_pretty(value).map_err(|e| SliceError::SerializationError(e.to_string()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn import_counts_outcomes() {
        let store = MemoryStore::with_slices([Slice::new(SliceId(1), "existing")]);
        let report = import_slices(
            &store,
            vec![
                Slice::new(SliceId(1), "duplicate"),
                Slice::new(SliceId(2), "new").with_reference(SliceId(1)),
                Slice::new(SliceId(0), "invalid"),
            ],
        )
        .expect("import");

        assert_eq!(
            report,
            ImportReport {
                inserted: 1,
                conflicted: 1,
                rejected: 1,
            }
        );
        assert_eq!(store.len().expect("len"), 2);
    }

    #[test]
    fn init_refuses_existing_without_force() {
        let dir = TempDir::new().expect("temp dir");
        let config = SlicesConfig {
            database: dir.path().join("slices.db"),
            ..SlicesConfig::default()
        };

        cmd_init(&config, Backend::Redb, false).expect("first init");
        assert!(cmd_init(&config, Backend::Redb, false).is_err());
        cmd_init(&config, Backend::Redb, true).expect("forced init");
    }

    #[test]
    fn forced_init_clears_slices() {
        let dir = TempDir::new().expect("temp dir");
        let config = SlicesConfig {
            database: dir.path().join("slices.db"),
            ..SlicesConfig::default()
        };
        {
            let store = open_store(&config, Backend::Redb).expect("open");
            import_slices(store.as_ref(), vec![Slice::new(SliceId(1), "a")]).expect("import");
        }

        cmd_init(&config, Backend::Redb, true).expect("forced init");
        let store = open_store(&config, Backend::Redb).expect("reopen");
        assert!(store.is_empty().expect("empty"));
    }

    #[test]
    fn import_rejects_missing_file() {
        let config = SlicesConfig::default();
        let result = cmd_import(
            &config,
            Backend::Redb,
            false,
            Path::new("/nonexistent/slices.json"),
        );
        assert!(matches!(result, Err(SliceError::IoError(_))));
    }

    #[test]
    fn truncate_keeps_first_line() {
        assert_eq!(truncate("short\nsecond", 40), "short");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
