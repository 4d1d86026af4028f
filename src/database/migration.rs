//! Single-file migration format
//!
//! Loads all migrations from one embedded SQL file so the binary stays
//! self contained. A migration starts at a header line comment:
//! ```text
//! --##1 initial schema
//! ```
//! naming the version (1) and description (initial schema); each following
//! header should increase the version by one.
use std::{borrow::Cow, future::Future, pin::Pin};

use sqlx::{
    error::BoxDynError,
    migrate::{Migration, MigrationSource, MigrationType},
};

#[derive(Debug)]
pub struct MigrationScript<'s> {
    data: &'s str,
}

impl<'s> MigrationSource<'s> for MigrationScript<'s> {
    fn resolve(self) -> Pin<Box<dyn Future<Output = Result<Vec<Migration>, BoxDynError>> + Send + 's>> {
        Box::pin(async move {
            let mut result: Vec<Migration> = Vec::new();

            for line in self.data.lines() {
                if line.trim().is_empty() {
                    continue;
                }

                if let Some(header) = line.strip_prefix("--##") {
                    let (version_str, description) =
                        header.split_once(' ').unwrap_or((header, ""));
                    let version = version_str.parse().map_err(|e| {
                        format!("cannot parse migration version from '{version_str}': {e}")
                    })?;
                    result.push(Migration::new(
                        version,
                        Cow::Owned(description.to_owned()),
                        MigrationType::Simple,
                        Cow::Owned(String::new()),
                    ));
                    continue;
                }

                match result.last_mut() {
                    Some(migration) => {
                        migration.sql.to_mut().push_str(line);
                        migration.sql.to_mut().push('\n');
                    }
                    None => {
                        // allow comments before the first header
                        if !line.starts_with("--") {
                            Err(format!(
                                "migration script does not start with a migration header, got: {line}"
                            ))?;
                        }
                    }
                }
            }

            Ok(result)
        })
    }
}

pub fn postgresql_migrations() -> MigrationScript<'static> {
    MigrationScript {
        data: include_str!("./sql/migrations.pg.sql"),
    }
}
