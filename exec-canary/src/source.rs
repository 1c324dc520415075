use std::future::Future;
use std::sync::Arc;

use aya::maps::AsyncPerfEventArray;
use aya::util::online_cpus;
use aya::Ebpf;
use bytes::{Bytes, BytesMut};
use log::{debug, error};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use exec_canary_common::{ExecEvent, EVENTS_MAP};

/// Buffers handed to each per-cpu read.
const READ_BATCH: usize = 10;
/// Records queued between the per-cpu readers and the capture stage.
const QUEUE_DEPTH: usize = 256;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The source was closed; no further records will arrive.
    #[error("event source closed")]
    Closed,
    #[error("event source already closed")]
    AlreadyClosed,
    #[error("reading from perf event reader: {0}")]
    Read(BoxError),
}

/// One read from the kernel transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    Sample(Bytes),
    /// The ring buffer overflowed and this many samples were dropped.
    Lost(u64),
}

pub trait RecordSource {
    fn next_record(&mut self) -> impl Future<Output = Result<RawRecord, SourceError>> + Send;
}

/// Closes a record source from another task.
#[derive(Debug, Clone)]
pub struct SourceCloser {
    closed: Arc<watch::Sender<bool>>,
}

/// Observes a [`SourceCloser`].
#[derive(Debug, Clone)]
pub struct CloseSignal {
    closed: watch::Receiver<bool>,
}

pub fn close_channel() -> (SourceCloser, CloseSignal) {
    let (tx, rx) = watch::channel(false);
    (
        SourceCloser {
            closed: Arc::new(tx),
        },
        CloseSignal { closed: rx },
    )
}

impl SourceCloser {
    pub fn close(&self) -> Result<(), SourceError> {
        let changed = self.closed.send_if_modified(|closed| {
            if *closed {
                return false;
            }
            *closed = true;
            true
        });
        match changed {
            true => Ok(()),
            false => Err(SourceError::AlreadyClosed),
        }
    }
}

impl CloseSignal {
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the source is closed, or once every closer is gone.
    pub async fn closed(&mut self) {
        while !*self.closed.borrow_and_update() {
            if self.closed.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Reads [`ExecEvent`] samples from the `EVENTS` perf event array on every
/// online cpu.
pub struct PerfRecordSource {
    records: mpsc::Receiver<Result<RawRecord, SourceError>>,
    signal: CloseSignal,
    readers: Vec<JoinHandle<()>>,
}

impl PerfRecordSource {
    pub fn open(bpf: &mut Ebpf) -> Result<(Self, SourceCloser), anyhow::Error> {
        let cpus = online_cpus().map_err(|err| anyhow::anyhow!("{:?}", err))?;
        let map = bpf
            .take_map(EVENTS_MAP)
            .ok_or_else(|| anyhow::anyhow!("missing {} map", EVENTS_MAP))?;
        let mut events = AsyncPerfEventArray::try_from(map)?;
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let (closer, signal) = close_channel();
        let mut readers = Vec::with_capacity(cpus.len());
        for cpu in cpus {
            let mut buf = events.open(cpu, None)?;
            let tx = tx.clone();
            let mut signal = signal.clone();
            readers.push(tokio::task::spawn(async move {
                let mut buffers = (0..READ_BATCH)
                    .map(|_| BytesMut::with_capacity(ExecEvent::SIZE))
                    .collect::<Vec<_>>();
                loop {
                    let read = tokio::select! {
                        _ = signal.closed() => break,
                        read = buf.read_events(&mut buffers) => read,
                    };
                    let mut out = Vec::with_capacity(READ_BATCH + 1);
                    match read {
                        Ok(events) => {
                            debug!(
                                "fetch {} entrys, lost {} entrys on cpu {}",
                                events.read, events.lost, cpu
                            );
                            if events.lost > 0 {
                                out.push(Ok(RawRecord::Lost(events.lost as u64)));
                            }
                            for slot in buffers.iter_mut().take(events.read) {
                                out.push(Ok(RawRecord::Sample(Bytes::copy_from_slice(slot))));
                                slot.clear();
                            }
                        }
                        Err(err) => {
                            error!("failed to fetch events on cpu {}: {}", cpu, err);
                            out.push(Err(SourceError::Read(Box::new(err))));
                        }
                    }
                    for record in out {
                        if tx.send(record).await.is_err() {
                            return;
                        }
                    }
                }
                debug!("perf reader on cpu {} stopped", cpu);
            }));
        }
        Ok((
            Self {
                records: rx,
                signal,
                readers,
            },
            closer,
        ))
    }
}

impl RecordSource for PerfRecordSource {
    async fn next_record(&mut self) -> Result<RawRecord, SourceError> {
        if self.signal.is_closed() {
            return Err(SourceError::Closed);
        }
        tokio::select! {
            biased;
            _ = self.signal.closed() => Err(SourceError::Closed),
            record = self.records.recv() => record.unwrap_or(Err(SourceError::Closed)),
        }
    }
}

impl Drop for PerfRecordSource {
    fn drop(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}
