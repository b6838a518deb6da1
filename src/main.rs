use std::env;
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;

use gsprop::{RequestLoader, Response};

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

fn parse_args() -> Result<String> {
    let mut args = env::args().skip(1);
    let Some(request) = args.next() else {
        anyhow::bail!("Usage: gsprop <request.json>");
    };
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected extra argument: {extra}");
    }
    Ok(request)
}

fn main() -> Result<()> {
    init_logging();
    let path = parse_args()?;
    let request = RequestLoader::default().load(&path)?;

    let start = Instant::now();
    let response = request
        .execute()
        .with_context(|| format!("execute {} request from {}", request.mode(), path))?;
    match &response {
        Response::Estimate(estimate) => info!(
            "Estimated {} positions (rank {}) in {:?}",
            estimate.values.len(),
            estimate.rank,
            start.elapsed()
        ),
        Response::Cluster(cluster) => info!(
            "Clustered {} events into {} clusters in {:?}",
            cluster.events.len(),
            cluster.clusters.len(),
            start.elapsed()
        ),
        Response::Disaggregate(disaggregate) => info!(
            "Found {} appliances in {:?}",
            disaggregate.num_appliances,
            start.elapsed()
        ),
    }

    let json = serde_json::to_string_pretty(&response).context("serialize response")?;
    println!("{json}");
    Ok(())
}
