use anyhow::Context;
use migrate_set::{create_migration, Direction, MigrateConfig, MigrationSet, RunReport, StepStatus, Target};
use serde_json::json;

pub async fn up(config: &MigrateConfig, name: Option<String>) -> anyhow::Result<()> {
    run(config, Direction::Up, name).await
}

pub async fn down(config: &MigrateConfig, name: Option<String>) -> anyhow::Result<()> {
    run(config, Direction::Down, name).await
}

async fn run(config: &MigrateConfig, direction: Direction, name: Option<String>) -> anyhow::Result<()> {
    let mut set = load(config).await?;
    let target = name
        .map(Target::Named)
        .unwrap_or_else(|| Target::default_for(direction));

    let report = set.run(direction, target).await?;
    println!("{}", summarize(&report));
    Ok(())
}

pub async fn status(config: &MigrateConfig, as_json: bool) -> anyhow::Result<()> {
    let set = load(config).await?;
    let statuses = set.status();

    if as_json {
        let output = json!({
            "position": set.current_position(),
            "migrations": statuses
                .iter()
                .map(|s| json!({ "name": s.name, "applied": s.applied }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Migration Status:");
    println!("=================");
    for line in status_lines(&statuses) {
        println!("{}", line);
    }
    println!();
    println!("Current: {}", set.current_position().unwrap_or("<none>"));
    Ok(())
}

pub async fn create(config: &MigrateConfig, title: &str) -> anyhow::Result<()> {
    let path = create_migration(&config.migrations_dir, title, &config.extension).await?;
    println!("Created migration: {}", path.display());
    Ok(())
}

async fn load(config: &MigrateConfig) -> anyhow::Result<MigrationSet> {
    MigrationSet::load_with_shell(config)
        .await
        .with_context(|| format!("Failed to load migrations from {}", config.migrations_dir.display()))
}

fn summarize(report: &RunReport) -> String {
    let verb = match report.direction {
        Direction::Up => "Applied",
        Direction::Down => "Reverted",
    };
    let position = report.position.as_deref().unwrap_or("<none>");

    if report.is_noop() {
        format!("Nothing to migrate (current: {})", position)
    } else {
        format!(
            "{} {} migration(s) in {}ms (current: {})",
            verb,
            report.executed.len(),
            report.execution_time_ms,
            position
        )
    }
}

fn status_lines(statuses: &[StepStatus]) -> Vec<String> {
    if statuses.is_empty() {
        return vec!["  No migrations found".to_string()];
    }

    statuses
        .iter()
        .map(|s| format!("  [{}] {}", if s.applied { "x" } else { " " }, s.name))
        .collect()
}
