//! tablewright CLI
//!
//! Inspects a snapshot and a live database. Applications that want
//! `migrate` to apply their migrations call `tablewright_migrate::cli::run`
//! from their own binary with the migrations registered.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tablewright_migrate::cli::run(&[]).await?;
    Ok(())
}
