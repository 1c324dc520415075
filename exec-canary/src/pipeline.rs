use anyhow::Context;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::alert::{AlertStage, AlertStats, Resolver};
use crate::capture::{self, CaptureStats};
use crate::source::RecordSource;
use crate::watch::WatchList;

/// Capture and alert stages connected by a single slot channel.
pub struct Pipeline {
    capture: JoinHandle<CaptureStats>,
    alert: JoinHandle<()>,
    done: oneshot::Receiver<AlertStats>,
}

pub fn spawn<S, R, G>(source: S, watch_list: WatchList, alert: AlertStage<R, G>) -> Pipeline
where
    S: RecordSource + Send + 'static,
    R: Resolver + Send + 'static,
    G: Rng + Send + 'static,
{
    let (link_tx, link_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = oneshot::channel();
    let capture = tokio::spawn(capture::run(source, watch_list, link_tx));
    let alert = tokio::spawn(alert.run(link_rx, done_tx));
    Pipeline {
        capture,
        alert,
        done: done_rx,
    }
}

impl Pipeline {
    /// Waits for the alert stage to report completion, which happens once
    /// the source is closed and every matched event has been alerted on.
    pub async fn wait(self) -> Result<(CaptureStats, AlertStats), anyhow::Error> {
        let alerts = self
            .done
            .await
            .context("alert stage exited without signalling completion")?;
        let captured = self.capture.await.context("joining capture stage")?;
        self.alert.await.context("joining alert stage")?;
        Ok((captured, alerts))
    }
}
