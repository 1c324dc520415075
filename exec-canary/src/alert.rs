use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::{debug, error, info};
use rand::Rng;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::encoder::hostname_with_payload;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("DNS request failed: {0}")]
    Lookup(#[from] io::Error),
    #[error("DNS request returned no addresses")]
    NoAddress,
    #[error("DNS request timed out after {0:?}")]
    Timeout(Duration),
}

/// Resolves a hostname. Only the attempt matters to the canary, the answer
/// is discarded.
pub trait Resolver {
    fn lookup(&self, hostname: &str) -> impl Future<Output = Result<(), ResolveError>> + Send;
}

/// A/AAAA lookup through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    async fn lookup(&self, hostname: &str) -> Result<(), ResolveError> {
        let mut addrs = tokio::net::lookup_host((hostname, 0)).await?;
        match addrs.next() {
            Some(addr) => {
                debug!("{} resolved to {}", hostname, addr.ip());
                Ok(())
            }
            None => Err(ResolveError::NoAddress),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlertStats {
    pub attempted: u64,
    pub failed: u64,
}

/// Turns matched pathnames into DNS lookups against the canary hostname.
pub struct AlertStage<R, G> {
    canary_hostname: String,
    resolver: R,
    rng: G,
    dns_timeout: Duration,
}

impl<R: Resolver, G: Rng> AlertStage<R, G> {
    pub fn new(canary_hostname: String, resolver: R, rng: G, dns_timeout: Duration) -> Self {
        Self {
            canary_hostname,
            resolver,
            rng,
            dns_timeout,
        }
    }

    /// Alerts on every pathname received until `link` closes, then reports
    /// on `done`.
    pub async fn run(mut self, mut link: mpsc::Receiver<String>, done: oneshot::Sender<AlertStats>) {
        let mut stats = AlertStats::default();
        while let Some(pathname) = link.recv().await {
            info!("triggering DNS token for: {}", pathname);
            stats.attempted += 1;
            if let Err(err) = self.alert(&pathname).await {
                stats.failed += 1;
                error!("{}", err);
            }
        }
        debug!("pipeline channel closed after {} alerts", stats.attempted);
        if done.send(stats).is_err() {
            debug!("nobody waiting for alert stage completion");
        }
    }

    async fn alert(&mut self, pathname: &str) -> Result<(), ResolveError> {
        let hostname = hostname_with_payload(
            &self.canary_hostname,
            executable_name(pathname),
            &mut self.rng,
        );
        debug!("looking up {}", hostname);
        match tokio::time::timeout(self.dns_timeout, self.resolver.lookup(&hostname)).await {
            Ok(res) => res,
            Err(_) => Err(ResolveError::Timeout(self.dns_timeout)),
        }
    }
}

/// Final path component, or the whole pathname when it has none.
fn executable_name(pathname: &str) -> &str {
    Path::new(pathname)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(pathname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Answer, RecordingResolver};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const CANARY: &str = "nosuchtoken.example.com";

    fn stage(resolver: RecordingResolver, timeout: Duration) -> AlertStage<RecordingResolver, StdRng> {
        AlertStage::new(CANARY.to_string(), resolver, StdRng::seed_from_u64(7), timeout)
    }

    async fn feed(stage: AlertStage<RecordingResolver, StdRng>, paths: &[&str]) -> AlertStats {
        let (tx, rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let task = tokio::spawn(stage.run(rx, done_tx));
        for path in paths {
            tx.send(path.to_string()).await.unwrap();
        }
        drop(tx);
        let stats = done_rx.await.unwrap();
        task.await.unwrap();
        stats
    }

    #[test]
    fn executable_name_is_last_component() {
        assert_eq!(executable_name("/usr/bin/whoami"), "whoami");
        assert_eq!(executable_name("id"), "id");
        assert_eq!(executable_name("/usr/bin/"), "bin");
        assert_eq!(executable_name("/"), "/");
    }

    #[tokio::test]
    async fn one_lookup_per_pathname_in_order() {
        let resolver = RecordingResolver::default();
        let stats = feed(
            stage(resolver.clone(), Duration::from_secs(5)),
            &["/usr/bin/id", "/usr/bin/whoami"],
        )
        .await;
        assert_eq!(stats, AlertStats { attempted: 2, failed: 0 });

        let lookups = resolver.lookups();
        assert_eq!(lookups.len(), 2);
        // base32("id") and base32("whoami")
        assert!(lookups[0].starts_with("NFSA.G"), "{}", lookups[0]);
        assert!(lookups[1].starts_with("O5UG6YLNNE.G"), "{}", lookups[1]);
        assert!(lookups.iter().all(|host| host.ends_with(".nosuchtoken.example.com")));
    }

    #[tokio::test]
    async fn failed_lookups_do_not_stop_the_stage() {
        let resolver = RecordingResolver::answering(Answer::Fail);
        let stats = feed(
            stage(resolver.clone(), Duration::from_secs(5)),
            &["/usr/bin/id", "/usr/bin/id", "/usr/bin/id"],
        )
        .await;
        assert_eq!(stats, AlertStats { attempted: 3, failed: 3 });
        assert_eq!(resolver.lookups().len(), 3);
    }

    #[tokio::test]
    async fn hung_lookup_times_out() {
        let resolver = RecordingResolver::answering(Answer::Hang);
        let stats = feed(
            stage(resolver.clone(), Duration::from_millis(20)),
            &["/usr/bin/id", "/usr/bin/hostname"],
        )
        .await;
        assert_eq!(stats, AlertStats { attempted: 2, failed: 2 });
        assert_eq!(resolver.lookups().len(), 2);
    }

    #[tokio::test]
    async fn completion_is_signalled_on_empty_channel() {
        let stats = feed(stage(RecordingResolver::default(), Duration::from_secs(5)), &[]).await;
        assert_eq!(stats, AlertStats::default());
    }
}
