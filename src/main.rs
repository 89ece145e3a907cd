//! ledger-tx - operator entry point
//!
//! ```text
//! ledger-tx [--env dev] [--init-schema]
//!           [--open OWNER CURRENCY BALANCE]
//!           [--transfer FROM TO AMOUNT [--ref CLIENT_REF]]
//! ```
//!
//! Results are printed as JSON on stdout.

use anyhow::{Context, bail};

use ledger_tx::config::AppConfig;
use ledger_tx::db::Database;
use ledger_tx::ledger::{CreateAccountParams, PgLedger, schema};
use ledger_tx::transfer::{TransactionCoordinator, TransferRequest, TransferService};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Values following `flag`, if present
fn flag_values(flag: &str, count: usize) -> anyhow::Result<Option<Vec<String>>> {
    let args: Vec<String> = std::env::args().collect();
    match args.iter().position(|a| a == flag) {
        Some(i) if i + count < args.len() => Ok(Some(args[i + 1..=i + count].to_vec())),
        Some(_) => bail!("{} expects {} value(s)", flag, count),
        None => Ok(None),
    }
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = ledger_tx::logging::init_logging(&app_config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        "Starting ledger-tx in {} mode",
        env
    );

    let db = Database::connect(&app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.health_check().await?;

    if has_flag("--init-schema") {
        schema::ensure_schema(db.pool()).await?;
    }

    let mut ledger = PgLedger::new(db.pool().clone());
    if let Some(lock_timeout) = app_config.database.lock_timeout() {
        ledger = ledger.with_lock_timeout(lock_timeout);
    }

    if let Some(values) = flag_values("--open", 3)? {
        let account = ledger
            .create_account(CreateAccountParams {
                owner: values[0].clone(),
                currency: values[1].clone(),
                balance: values[2].parse().context("BALANCE must be an integer")?,
            })
            .await?;
        println!("{}", serde_json::to_string_pretty(&account)?);
    }

    if let Some(values) = flag_values("--transfer", 3)? {
        let mut request = TransferRequest::new(
            values[0].parse().context("FROM must be an account id")?,
            values[1].parse().context("TO must be an account id")?,
            values[2].parse().context("AMOUNT must be an integer")?,
        );
        if let Some(client_ref) = flag_values("--ref", 1)? {
            request = request.with_client_ref(client_ref[0].clone());
        }

        let mut coordinator = TransactionCoordinator::new(ledger);
        if let Some(tx_timeout) = app_config.database.tx_timeout() {
            coordinator = coordinator.with_timeout(tx_timeout);
        }
        let service = TransferService::new(coordinator);

        let outcome = service.transfer(request).await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(())
}
