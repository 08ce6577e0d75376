use anyhow::Context;

use lineage_migrate::{
    MigrationBackend, MigrationEnvironment, MigrationRunResult, RevisionSpec,
};

use super::GlobalArgs;

pub async fn upgrade(
    env: &MigrationEnvironment,
    args: &GlobalArgs,
    revision: &str,
    sql: bool,
    tag: Option<&str>,
) -> anyhow::Result<()> {
    let target: RevisionSpec = revision.parse()?;
    let runner = env.runner(tag);

    if sql {
        print!("{}", runner.upgrade_sql(&target)?);
        return Ok(());
    }

    let backend = env.connect().await?;
    let result = runner.upgrade(&backend, &target).await;
    backend.close().await?;
    report(args, &result?)
}

pub async fn downgrade(
    env: &MigrationEnvironment,
    args: &GlobalArgs,
    revision: &str,
    sql: bool,
    tag: Option<&str>,
) -> anyhow::Result<()> {
    let target: RevisionSpec = revision.parse()?;
    let runner = env.runner(tag);

    if sql {
        print!("{}", runner.downgrade_sql(&target)?);
        return Ok(());
    }

    let backend = env.connect().await?;
    let result = runner.downgrade(&backend, &target).await;
    backend.close().await?;
    report(args, &result?)
}

pub async fn stamp(
    env: &MigrationEnvironment,
    args: &GlobalArgs,
    revisions: &[String],
    purge: bool,
    sql: bool,
) -> anyhow::Result<()> {
    let targets = revisions
        .iter()
        .map(|r| r.parse::<RevisionSpec>())
        .collect::<Result<Vec<_>, _>>()?;
    let runner = env.runner(None);

    if sql {
        print!("{}", runner.stamp_sql(&targets, purge)?);
        return Ok(());
    }

    let backend = env.connect().await?;
    let result = runner.stamp(&backend, &targets, purge).await;
    backend.close().await?;
    report(args, &result?)
}

fn report(args: &GlobalArgs, result: &MigrationRunResult) -> anyhow::Result<()> {
    if args.json {
        let line = serde_json::to_string(result).context("failed to serialize run result")?;
        println!("{}", line);
        return Ok(());
    }

    let heads = if result.heads.is_empty() {
        "base".to_string()
    } else {
        result.heads.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    match result.direction {
        Some(direction) if result.revisions.is_empty() => {
            println!("Nothing to {}; heads: {}", direction, heads);
        }
        Some(direction) => println!(
            "Ran {} of {} revision(s) in {}ms; heads: {}",
            direction,
            result.revisions.len(),
            result.execution_time_ms,
            heads
        ),
        None => println!("Stamped heads: {}", heads),
    }
    Ok(())
}
