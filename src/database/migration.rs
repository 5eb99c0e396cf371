//! Single-file migration format
//!
//! All migrations live in one sql file that is embedded into the binary.
//! A migration starts with a line comment of the form:
//! ```
//! --##1 initial schema
//! ```
//! naming its version (1) and description. Versions increase by one per
//! migration, every following line up to the next header belongs to it.
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
                    let (version, description) = header.split_once(' ').unwrap_or((header, ""));
                    let version = version.parse().map_err(|err| {
                        format!("cannot parse migration version '{}': {}", version, err)
                    })?;
                    result.push(Migration::new(
                        version,
                        Cow::Owned(description.to_string()),
                        MigrationType::Simple,
                        Cow::Owned(String::new()),
                    ));
                    continue;
                }

                let migration = match result.last_mut() {
                    Some(migration) => migration,
                    None => {
                        // allow comments at beginning of file
                        if line.starts_with("--") {
                            continue;
                        }
                        Err(format!(
                            "migration script does not start with a migration header, got: {}",
                            line
                        ))?
                    }
                };
                migration.sql.to_mut().push_str(line);
                migration.sql.to_mut().push('\n');
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
