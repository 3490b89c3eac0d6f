//! Migration Catalog - Discovers migration units on the filesystem
//!
//! A unit is a pair of `<id>.apply.sql` / `<id>.revert.sql` files anywhere
//! under an application root. Discovery collects every identifier first and
//! sorts afterwards, so directory traversal order never affects the result.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::definitions::{Direction, MigrationId};
use crate::error::{MigrateError, MigrateResult};

/// Scan `root` and return its ordered migration list.
pub fn discover(root: impl AsRef<Path>) -> MigrateResult<Vec<MigrationId>> {
    let root = root.as_ref();

    let metadata = fs::metadata(root).map_err(|source| MigrateError::CatalogAccess {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(MigrateError::CatalogAccess {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    let mut identifiers = BTreeSet::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|err| MigrateError::CatalogAccess {
            path: err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source: io::Error::from(err),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        match MigrationId::from_relative_path(relative) {
            Some(id) => {
                identifiers.insert(id);
            }
            None if relative.to_str().is_none() => {
                warn!(path = %entry.path().display(), "Skipping migration file with a non UTF-8 path");
            }
            None => {}
        }
    }

    let migrations: Vec<MigrationId> = identifiers.into_iter().collect();
    for migration in &migrations {
        for direction in Direction::BOTH {
            if !migration.file_path(root, direction).is_file() {
                return Err(MigrateError::IncompleteMigrationUnit {
                    root: root.to_path_buf(),
                    migration: migration.to_string(),
                    missing: direction,
                });
            }
        }
    }

    debug!(root = %root.display(), count = migrations.len(), "Discovered migrations");
    Ok(migrations)
}
