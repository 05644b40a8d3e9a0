//! FileService wrapper that records calls and injects faults.

use std::sync::Mutex;

use async_trait::async_trait;

use rfio_core::error::{Error, Result};
use rfio_core::protocol::{ReadResponse, RemoteError, StatResponse};
use rfio_core::FileService;

/// A call observed by [`RecordingService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Create(String),
    Stat(String),
    Read { id: u64, offset: u64, size: u64 },
    Write { id: u64, offset: u64, len: usize },
    Close(u64),
}

/// A failure to inject instead of forwarding a call.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail the first `Read` at this offset.
    ReadAt { offset: u64, error: RemoteError },
    /// Fail the first `Write` at this offset.
    WriteAt { offset: u64, error: RemoteError },
    /// Fail the first `Close`.
    Close(RemoteError),
}

/// Wraps a [`FileService`], logging every call and optionally failing some.
///
/// Calls are recorded before faults are applied, so a failed call still
/// shows up in [`calls`](RecordingService::calls).
pub struct RecordingService<S> {
    inner: S,
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Vec<Fault>>,
}

impl<S: FileService> RecordingService<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Arm a one-shot fault.
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().unwrap().push(fault);
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded `Read` calls as `(offset, size)`.
    pub fn reads(&self) -> Vec<(u64, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Read { offset, size, .. } => Some((offset, size)),
                _ => None,
            })
            .collect()
    }

    /// Recorded `Write` calls as `(offset, len)`.
    pub fn writes(&self) -> Vec<(u64, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write { offset, len, .. } => Some((offset, len)),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded `Close` calls.
    pub fn closes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Close(_)))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_fault(&self, pick: impl Fn(&Fault) -> Option<RemoteError>) -> Option<Error> {
        let mut faults = self.faults.lock().unwrap();
        let idx = faults.iter().position(|f| pick(f).is_some())?;
        let fault = faults.remove(idx);
        pick(&fault).map(Error::from)
    }
}

#[async_trait]
impl<S: FileService> FileService for RecordingService<S> {
    async fn open(&self, filename: &str) -> Result<u64> {
        self.record(Call::Open(filename.to_string()));
        self.inner.open(filename).await
    }

    async fn create(&self, filename: &str) -> Result<u64> {
        self.record(Call::Create(filename.to_string()));
        self.inner.create(filename).await
    }

    async fn stat(&self, filename: &str) -> Result<StatResponse> {
        self.record(Call::Stat(filename.to_string()));
        self.inner.stat(filename).await
    }

    async fn read(&self, id: u64, offset: u64, size: u64) -> Result<ReadResponse> {
        self.record(Call::Read { id, offset, size });
        if let Some(err) = self.take_fault(|f| match f {
            Fault::ReadAt { offset: at, error } if *at == offset => Some(error.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        self.inner.read(id, offset, size).await
    }

    async fn write(&self, id: u64, offset: u64, data: Vec<u8>) -> Result<u64> {
        self.record(Call::Write {
            id,
            offset,
            len: data.len(),
        });
        if let Some(err) = self.take_fault(|f| match f {
            Fault::WriteAt { offset: at, error } if *at == offset => Some(error.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        self.inner.write(id, offset, data).await
    }

    async fn close(&self, id: u64) -> Result<()> {
        self.record(Call::Close(id));
        if let Some(err) = self.take_fault(|f| match f {
            Fault::Close(error) => Some(error.clone()),
            _ => None,
        }) {
            return Err(err);
        }
        self.inner.close(id).await
    }
}
