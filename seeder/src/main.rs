mod data;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "seeder")]
#[command(about = "Seeds configuration bands and sample opportunities for resource forecasting")]
struct Args {
    #[arg(long, default_value = "20")]
    count: usize,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "postgresql://localhost/resource_forecasting")]
    database_url: String,

    /// Seed configuration bands only; skip sample opportunities.
    #[arg(long)]
    config_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    println!("{}", "=".repeat(80).cyan());
    println!("{}", "Resource Forecasting Database Seeder".bold().cyan());
    println!("{}", "=".repeat(80).cyan());
    println!();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await
        .context("failed to connect to database")?;

    let mut rng = if let Some(seed) = args.seed {
        println!("{} using seed: {}", "i".blue(), seed);
        rand::rngs::StdRng::seed_from_u64(seed)
    } else {
        rand::rngs::StdRng::from_entropy()
    };

    let start = Instant::now();

    data::seed_config(&pool).await?;
    println!("{} seeded TCV bands, stage-effort templates, and offering multipliers", "✓".green());

    if !args.config_only {
        let ids = data::seed_opportunities(&pool, args.count, &mut rng).await?;
        println!("{} seeded {} sample opportunities", "✓".green(), ids.len());
    }

    println!();
    println!("{}", "=".repeat(80).cyan());
    println!("{} seeding completed in {:.2}s", "✓".green().bold(), start.elapsed().as_secs_f64());
    println!("{}", "=".repeat(80).cyan());

    Ok(())
}
