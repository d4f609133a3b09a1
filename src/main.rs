use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use shardgraph::db::{migrate, Db};
use shardgraph::Config;

#[derive(Parser)]
#[command(name = "shardgraph", about = "Relationship graph engine maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply migrations and verify the schema (default)
    Verify,
    /// Print per-tenant edge counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Verify) {
        Command::Verify => run_verify().await,
        Command::Stats => run_stats().await,
    }
}

async fn run_verify() -> Result<()> {
    let config = Config::load()?;
    let db = Arc::new(Db::new(config.db_path()));

    let migrations_dir = Path::new("migrations").to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;

    let tables = db
        .with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok(names)
        })
        .await?;

    for required in ["edges", "shards", "shard_types", "schema_migrations"] {
        if !tables.iter().any(|t| t == required) {
            anyhow::bail!("schema verification failed: missing table {}", required);
        }
    }

    println!("Schema OK ({} tables)", tables.len());
    Ok(())
}

async fn run_stats() -> Result<()> {
    let config = Config::load()?;
    let db = Db::new(config.db_path());

    let stats = db
        .with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT
                    tenant_id,
                    COUNT(*) as edge_count,
                    COUNT(DISTINCT relationship_type) as type_count,
                    SUM(bidirectional) as bidirectional_count
                FROM edges
                GROUP BY tenant_id
                ORDER BY edge_count DESC
                "#,
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ));
            }
            Ok(results)
        })
        .await?;

    if stats.is_empty() {
        println!("No edges stored yet.");
        return Ok(());
    }

    println!("\n=== Shardgraph Edge Statistics ===\n");
    println!(
        "{:<30} {:>10} {:>10} {:>14}",
        "Tenant", "Edges", "Types", "Bidirectional"
    );
    println!("{:-<68}", "");
    for (tenant, edges, types, bidi) in &stats {
        println!(
            "{:<30} {:>10} {:>10} {:>14}",
            tenant,
            edges,
            types,
            bidi.unwrap_or(0)
        );
    }
    Ok(())
}
