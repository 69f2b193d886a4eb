use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::protocol::models::{CallSession, CallStatus, TranscriptTurn, TurnRole};

/// In-memory registry of call records.
///
/// The map and insertion order sit behind one `RwLock`; each record sits
/// behind its own `Mutex`, so status and transcript updates to different
/// calls never block each other. Records are retained for the process
/// lifetime; there is no persistence.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Arc<Mutex<CallSession>>>,
    order: Vec<String>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created call. Normally called by the orchestrator
    /// after the provider accepted the call.
    pub fn insert(&self, session: CallSession) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = session.id.clone();
        if inner
            .records
            .insert(id.clone(), Arc::new(Mutex::new(session)))
            .is_none()
        {
            inner.order.push(id);
        }
    }

    /// # Errors
    /// Returns `NotFound` for an unknown call id.
    #[allow(clippy::result_large_err)]
    pub fn get(&self, id: &str) -> Result<CallSession> {
        let record = self.record(id)?;
        let session = lock(&record);
        Ok(session.clone())
    }

    /// All call records in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<CallSession> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .map(|record| lock(record).clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a call's status with whatever the provider reported.
    /// No transition constraints are enforced; repeated and out-of-order
    /// updates are accepted as-is.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown call id.
    #[allow(clippy::result_large_err)]
    pub fn update_status(&self, id: &str, status: CallStatus) -> Result<()> {
        let record = self.record(id)?;
        let mut session = lock(&record);
        tracing::debug!("Call {id} status: {} -> {status}", session.status);
        session.status = status;
        Ok(())
    }

    /// Append one conversation turn. Append-only: prior turns are never
    /// reordered or deleted.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown call id.
    #[allow(clippy::result_large_err)]
    pub fn append_transcript_turn(
        &self,
        id: &str,
        role: TurnRole,
        text: impl Into<String>,
    ) -> Result<()> {
        let record = self.record(id)?;
        let mut session = lock(&record);
        session.transcript.push(TranscriptTurn::new(role, text));
        Ok(())
    }

    /// # Errors
    /// Returns `NotFound` for an unknown call id.
    #[allow(clippy::result_large_err)]
    pub fn transcript(&self, id: &str) -> Result<Vec<TranscriptTurn>> {
        let record = self.record(id)?;
        let session = lock(&record);
        Ok(session.transcript.clone())
    }

    #[allow(clippy::result_large_err)]
    fn record(&self, id: &str) -> Result<Arc<Mutex<CallSession>>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("call {id}")))
    }
}

fn lock(record: &Mutex<CallSession>) -> MutexGuard<'_, CallSession> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}
