mod simulation;

use anyhow::Context;

use orderdesk_infra::Config;

use crate::simulation::{Settings, Simulation};

const USAGE: &str = "usage: orderdesk-simulator [products] [stock] [workers] [orders-per-worker]";

fn main() -> anyhow::Result<()> {
    orderdesk_observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return Ok(());
    }

    let settings = Settings::from_args(&args).context(USAGE)?;
    let config = Config::from_env().context("invalid ORDERDESK_* configuration")?;

    tracing::info!(
        products = settings.products,
        stock = settings.stock,
        workers = settings.workers,
        orders_per_worker = settings.orders_per_worker,
        lock_timeout_ms = config.lock_timeout.as_millis() as u64,
        "starting simulation"
    );

    let report = Simulation::seed(settings, config)?.run()?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    anyhow::ensure!(
        report.invariant_holds,
        "stock invariant violated: {}",
        report.violations.join("; ")
    );
    Ok(())
}
