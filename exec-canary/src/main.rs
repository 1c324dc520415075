use clap::Parser;
use env_logger::Env;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::signal;
use tokio::signal::unix::{Signal, SignalKind};

use crate::alert::{AlertStage, SystemResolver};
use crate::config::{Args, Config};
use crate::setup::{check_permission, load_program, raise_memlock_limit};
use crate::source::{PerfRecordSource, SourceCloser};

mod alert;
mod capture;
mod config;
mod encoder;
mod pipeline;
mod record;
mod setup;
mod source;
#[cfg(test)]
mod testing;
mod watch;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = Config::from_args(Args::parse())?;
    check_permission()?;
    raise_memlock_limit();

    let mut bpf = load_program(&config.bpf_object)?;
    let (source, closer) = PerfRecordSource::open(&mut bpf)?;

    let terminate = signal::unix::signal(SignalKind::terminate())?;
    let shutdown = tokio::spawn(close_on_signal(terminate, closer));

    for path in config.watch_list.iter() {
        info!("watching {}", path);
    }
    let alert = AlertStage::new(
        config.canary_hostname,
        SystemResolver,
        StdRng::from_entropy(),
        config.dns_timeout,
    );
    let pipeline = pipeline::spawn(source, config.watch_list, alert);
    info!("Listening for events..");

    let (captured, alerts) = pipeline.wait().await?;
    shutdown.await?;
    info!(
        "Exiting... {} of {} alerts failed, {} samples seen",
        alerts.failed, alerts.attempted, captured.samples
    );
    drop(bpf);
    Ok(())
}

/// Closes the record source on SIGINT or SIGTERM, which lets the capture
/// stage finish and the pipeline drain.
async fn close_on_signal(mut terminate: Signal, closer: SourceCloser) {
    tokio::select! {
        res = signal::ctrl_c() => {
            if let Err(err) = res {
                error!("listening for interrupt: {}", err);
                terminate.recv().await;
            }
        }
        _ = terminate.recv() => {}
    }
    info!("Received signal, exiting program..");
    if let Err(err) = closer.close() {
        error!("closing perf event reader: {}", err);
        std::process::exit(1);
    }
}
