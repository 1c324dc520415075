use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::record::decode_pathname;
use crate::source::{RawRecord, RecordSource, SourceError};
use crate::watch::WatchList;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub samples: u64,
    pub lost: u64,
    pub read_errors: u64,
    pub decode_errors: u64,
    pub matched: u64,
}

/// Pulls records from `source` and forwards watched pathnames on `link`
/// until the source reports it is closed.
///
/// Every other failure is logged and skipped. `link` is dropped on return,
/// which closes the channel for the alert stage.
pub async fn run<S: RecordSource>(
    mut source: S,
    watch_list: WatchList,
    link: mpsc::Sender<String>,
) -> CaptureStats {
    let mut stats = CaptureStats::default();
    loop {
        let record = match source.next_record().await {
            Ok(record) => record,
            Err(SourceError::Closed) => break,
            Err(err) => {
                stats.read_errors += 1;
                warn!("{}", err);
                continue;
            }
        };
        let sample = match record {
            RawRecord::Sample(sample) => sample,
            RawRecord::Lost(count) => {
                stats.lost += count;
                warn!("perf event ring buffer full, dropped {} samples", count);
                continue;
            }
        };
        stats.samples += 1;
        let pathname = match decode_pathname(&sample) {
            Ok(pathname) => pathname,
            Err(err) => {
                stats.decode_errors += 1;
                warn!("parsing perf event: {}", err);
                continue;
            }
        };
        if !watch_list.contains(&pathname) {
            debug!("ignoring exec of {}", pathname);
            continue;
        }
        stats.matched += 1;
        info!("read perf event value: {}", pathname);
        // single consumer, blocks while an alert is in flight
        if link.send(pathname).await.is_err() {
            warn!("alert stage is gone, stopping capture");
            break;
        }
    }
    drop(link);
    info!(
        "capture stopped: {} samples, {} matched, {} lost, {} read errors, {} decode errors",
        stats.samples, stats.matched, stats.lost, stats.read_errors, stats.decode_errors
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample;
    use crate::testing::ScriptedSource;

    fn watch_id() -> WatchList {
        WatchList::new(["/usr/bin/id"]).unwrap()
    }

    async fn collect(mut rx: mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(pathname) = rx.recv().await {
            out.push(pathname);
        }
        out
    }

    #[tokio::test]
    async fn forwards_only_watched_paths_in_order() {
        let source = ScriptedSource::samples(["/usr/bin/id", "/bin/ls", "/usr/bin/id"]);
        let (tx, rx) = mpsc::channel(1);
        let consumer = tokio::spawn(collect(rx));
        let stats = run(source, watch_id(), tx).await;
        assert_eq!(consumer.await.unwrap(), ["/usr/bin/id", "/usr/bin/id"]);
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.matched, 2);
    }

    #[tokio::test]
    async fn lost_samples_are_counted_and_skipped() {
        let source = ScriptedSource::new([
            Ok(RawRecord::Lost(3)),
            Ok(RawRecord::Sample(sample("/usr/bin/id").into())),
        ]);
        let (tx, rx) = mpsc::channel(1);
        let consumer = tokio::spawn(collect(rx));
        let stats = run(source, watch_id(), tx).await;
        assert_eq!(consumer.await.unwrap(), ["/usr/bin/id"]);
        assert_eq!(stats.lost, 3);
        assert_eq!(stats.samples, 1);
    }

    #[tokio::test]
    async fn bad_records_do_not_stop_capture() {
        let mut not_utf8 = sample("/usr/bin/id");
        not_utf8[0] = 0xFF;
        let source = ScriptedSource::new([
            Err(SourceError::Read("transient".into())),
            Ok(RawRecord::Sample(b"short".to_vec().into())),
            Ok(RawRecord::Sample(not_utf8.into())),
            Err(SourceError::AlreadyClosed),
            Ok(RawRecord::Sample(sample("/usr/bin/id").into())),
        ]);
        let (tx, rx) = mpsc::channel(1);
        let consumer = tokio::spawn(collect(rx));
        let stats = run(source, watch_id(), tx).await;
        assert_eq!(consumer.await.unwrap(), ["/usr/bin/id"]);
        assert_eq!(stats.read_errors, 2);
        assert_eq!(stats.decode_errors, 2);
        assert_eq!(stats.matched, 1);
    }

    #[tokio::test]
    async fn closed_source_closes_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let stats = run(ScriptedSource::new(Vec::new()), watch_id(), tx).await;
        assert_eq!(stats, CaptureStats::default());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_when_alert_stage_is_gone() {
        let source = ScriptedSource::samples(["/usr/bin/id", "/usr/bin/id"]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let stats = run(source, watch_id(), tx).await;
        assert_eq!(stats.matched, 1);
    }
}
