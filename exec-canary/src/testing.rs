//! In-memory stand-ins for the kernel transport and the DNS resolver.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::alert::{ResolveError, Resolver};
use crate::record::sample;
use crate::source::{CloseSignal, RawRecord, RecordSource, SourceError};

/// Replays scripted reads, then reports `Closed`. With a close signal
/// attached it instead waits for the signal once the script runs out.
pub struct ScriptedSource {
    script: VecDeque<Result<RawRecord, SourceError>>,
    signal: Option<CloseSignal>,
}

impl ScriptedSource {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<RawRecord, SourceError>>,
    {
        Self {
            script: script.into_iter().collect(),
            signal: None,
        }
    }

    pub fn samples<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::new(
            paths
                .into_iter()
                .map(|path| Ok(RawRecord::Sample(sample(path).into()))),
        )
    }

    pub fn until_closed(mut self, signal: CloseSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

impl RecordSource for ScriptedSource {
    async fn next_record(&mut self) -> Result<RawRecord, SourceError> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }
        if let Some(signal) = self.signal.as_mut() {
            signal.closed().await;
        }
        Err(SourceError::Closed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Answer {
    #[default]
    Resolve,
    Fail,
    Hang,
}

/// Records every hostname it is asked to resolve.
#[derive(Debug, Clone, Default)]
pub struct RecordingResolver {
    pub lookups: Arc<Mutex<Vec<String>>>,
    pub answer: Answer,
}

impl RecordingResolver {
    pub fn answering(answer: Answer) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl Resolver for RecordingResolver {
    async fn lookup(&self, hostname: &str) -> Result<(), ResolveError> {
        self.lookups.lock().unwrap().push(hostname.to_string());
        match self.answer {
            Answer::Resolve => Ok(()),
            Answer::Fail => Err(ResolveError::NoAddress),
            Answer::Hang => std::future::pending().await,
        }
    }
}
