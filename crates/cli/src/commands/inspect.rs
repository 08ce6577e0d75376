use std::collections::BTreeSet;

use lineage_migrate::{
    format_entry, MigrationBackend, MigrationEnvironment, Revision, RevisionSpec,
};

use super::display_path;

/// Heads recorded in the configured database
async fn recorded_heads(env: &MigrationEnvironment) -> anyhow::Result<BTreeSet<String>> {
    let backend = env.connect().await?;
    let heads = env.current(&backend).await;
    backend.close().await?;
    Ok(heads?)
}

fn needs_database(spec: &RevisionSpec) -> bool {
    match spec {
        RevisionSpec::Current | RevisionSpec::Offset(_) => true,
        RevisionSpec::Range(from, to) => needs_database(from) || needs_database(to),
        _ => false,
    }
}

pub async fn history(
    env: &MigrationEnvironment,
    range: &str,
    indicate_current: bool,
) -> anyhow::Result<()> {
    let range: RevisionSpec = range.parse()?;
    let current = if indicate_current || needs_database(&range) {
        Some(recorded_heads(env).await?)
    } else {
        None
    };

    let history = env.introspect().history(&range, current.as_ref())?;
    for line in history.lines() {
        println!("{}", line);
    }
    Ok(())
}

pub fn heads(env: &MigrationEnvironment, resolve_dependencies: bool) {
    let introspect = env.introspect();
    for revision in introspect.heads(resolve_dependencies) {
        print_entry(env, revision, &BTreeSet::new());
    }
}

pub fn branches(env: &MigrationEnvironment) {
    let graph = env.graph();
    for revision in env.introspect().branches() {
        print_entry(env, revision, &BTreeSet::new());
        if let Ok(children) = graph.children(revision.id()) {
            for child in children {
                println!("    -> {}", child.id());
            }
        }
    }
}

pub async fn current(env: &MigrationEnvironment) -> anyhow::Result<()> {
    let heads = recorded_heads(env).await?;
    let introspect = env.introspect();
    for revision in introspect.current(&heads)? {
        print_entry(env, revision, &heads);
    }
    Ok(())
}

pub async fn show(env: &MigrationEnvironment, revision: &str) -> anyhow::Result<()> {
    let spec: RevisionSpec = revision.parse()?;
    let current = if needs_database(&spec) {
        Some(recorded_heads(env).await?)
    } else {
        None
    };

    for revision in env.introspect().show(&spec, current.as_ref())? {
        print_details(env, revision);
    }
    Ok(())
}

fn print_entry(env: &MigrationEnvironment, revision: &Revision, current: &BTreeSet<String>) {
    match env.introspect().annotation(revision, current) {
        Ok(annotation) => println!("{}", format_entry(revision, &annotation)),
        Err(_) => println!("{}", revision.lineage()),
    }
}

fn print_details(env: &MigrationEnvironment, revision: &Revision) {
    let graph = env.graph();
    print_entry(env, revision, &BTreeSet::new());

    let parents = if revision.is_base() {
        "<base>".to_string()
    } else {
        revision.parent_ids().join(", ")
    };
    println!("Parent: {}", parents);
    if !revision.dependency_ids().is_empty() {
        println!("Also depends on: {}", revision.dependency_ids().join(", "));
    }
    if let Ok(children) = graph.children(revision.id()) {
        if !children.is_empty() {
            let ids: Vec<&str> = children.iter().map(|c| c.id()).collect();
            println!("Branches into: {}", ids.join(", "));
        }
    }
    if !revision.labels().is_empty() {
        let labels: Vec<&str> = revision.labels().iter().map(String::as_str).collect();
        println!("Branch names: {}", labels.join(", "));
    }
    if let Some(path) = revision.source_path() {
        println!("Path: {}", display_path(path));
    }
    if let Some(created) = revision.created() {
        println!("Create Date: {}", created);
    }
    println!();
    println!("    {}", revision.doc().unwrap_or("empty message"));
    println!();
}
