//! Example: Planning DDL for a live database
//!
//! This example builds statements for a handful of diffs and prints what
//! would run, without connecting anywhere. No option depends on table
//! size, so no metadata queries are needed.
//!
//! Run with: cargo run --example online_alter -p oxide-ddl

use oxide_ddl::prelude::*;

// =============================================================================
// Diffs
// =============================================================================

fn diffs() -> Vec<PlannedDiff> {
    vec![
        PlannedDiff::new(
            ObjectKey::new(ObjectType::Table, "comments"),
            DiffType::Create,
            "CREATE TABLE `comments` (\n  `id` bigint NOT NULL AUTO_INCREMENT,\n  `post_id` bigint NOT NULL,\n  `body` text,\n  PRIMARY KEY (`id`)\n)",
        ),
        PlannedDiff::new(
            ObjectKey::new(ObjectType::Table, "posts"),
            DiffType::Alter,
            "ALTER TABLE `posts` ADD COLUMN `published_at` timestamp NULL, ADD KEY `idx_published` (`published_at`)",
        ),
        PlannedDiff::new(
            ObjectKey::new(ObjectType::Table, "comments"),
            DiffType::Alter,
            "ALTER TABLE `comments` ADD CONSTRAINT `fk_post` FOREIGN KEY (`post_id`) REFERENCES `posts` (`id`)",
        )
        .with_foreign_keys(),
        PlannedDiff::new(
            ObjectKey::new(ObjectType::Proc, "archive_posts"),
            DiffType::Create,
            "CREATE PROCEDURE `archive_posts`()\nBEGIN\n  UPDATE posts SET archived = 1 WHERE published_at < NOW() - INTERVAL 1 YEAR;\nEND",
        ),
        PlannedDiff::new(
            ObjectKey::new(ObjectType::Table, "legacy_sessions"),
            DiffType::Drop,
            "DROP TABLE `legacy_sessions`",
        )
        .unsafe_statement(),
    ]
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = OptionSet::new()
        .with(
            OptionName::AlterWrapper,
            "pt-online-schema-change --execute --alter {CLAUSES} D={SCHEMA},t={TABLE},h={HOST},P={PORT},u={USER},p={PASSWORD}",
        )
        .with(OptionName::User, "deploy")
        .with(OptionName::Password, "hunter2")
        .with(OptionName::ForeignKeyChecks, "1");

    let instance: Arc<dyn Instance> = Arc::new(MySqlInstance::new("127.0.0.1", 3306));
    let target = Target::new(instance, "blog", Arc::new(Dir::new("schemas/blog", options)));
    let mods = StatementModifiers::new().algorithm("INPLACE").lock("NONE");

    println!("=== Statements for {} ===\n", target.instance);
    for diff in diffs() {
        match DdlStatement::new(&diff, &mods, &target).await {
            Ok(Some(ddl)) => {
                let state = ddl.client_state();
                println!("-- {} {} (delimiter {:?})", diff.diff_type, diff.key, state.delimiter);
                if !ddl.connect_params().is_empty() {
                    println!("-- session params: {}", ddl.connect_params());
                }
                println!("{}\n", ddl.statement());
            }
            Ok(None) => println!("-- {} {}: nothing to do\n", diff.diff_type, diff.key),
            Err(e) if e.is_forbidden() => println!("-- {} {} skipped:\n{e}\n", diff.diff_type, diff.key),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
