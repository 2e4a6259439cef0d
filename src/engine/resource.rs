use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};

use crate::board::position::Position;
use crate::engine::client::{Analysis, ClientError, Evaluator, SearchLimit, UciClient};

/// Evaluator-side settings forwarded at spawn time.
#[derive(Clone, Debug)]
pub struct EngineParams {
    pub path: PathBuf,
    pub threads: u32,
    pub hash_mb: u32,
}

struct EngineSlot {
    client: Option<UciClient>,
    params: EngineParams,
    dirty: bool,
    confirmed: bool,
}

impl EngineSlot {
    fn ensure(&mut self) -> Result<(), ClientError> {
        if self.dirty {
            if let Some(old) = self.client.take() {
                drop(old);
            }
            self.dirty = false;
            self.confirmed = false;
        }
        if self.client.is_none() {
            self.client = Some(UciClient::spawn(
                &self.params.path,
                self.params.threads,
                self.params.hash_mb,
            )?);
            self.confirmed = false;
        }
        if !self.confirmed {
            // One liveness confirmation per process lifetime.
            if let Some(client) = self.client.as_mut() {
                client.ping()?;
            }
            self.confirmed = true;
        }
        Ok(())
    }

    fn respawn(&mut self) -> Result<(), ClientError> {
        warn!("restarting evaluator '{}'", self.params.path.display());
        self.client = None;
        self.confirmed = false;
        self.ensure()
    }
}

/// Owned evaluator handle, scoped to the service lifetime. The evaluator
/// processes one request at a time, so a lease holds the slot's lock for the
/// whole search and concurrent searches serialize on it.
pub struct EngineResource {
    slot: Mutex<EngineSlot>,
}

impl EngineResource {
    pub fn new(params: EngineParams) -> Self {
        Self {
            slot: Mutex::new(EngineSlot { client: None, params, dirty: false, confirmed: false }),
        }
    }

    pub fn acquire(&self) -> EngineLease<'_> {
        EngineLease { slot: self.slot.lock().unwrap() }
    }

    /// Record new evaluator settings; the running process is replaced on the
    /// next acquire.
    pub fn reconfigure(&self, params: EngineParams) {
        let mut slot = self.slot.lock().unwrap();
        debug!("evaluator reconfigured: {} threads, {} MB hash", params.threads, params.hash_mb);
        slot.params = params;
        slot.dirty = true;
    }

    pub fn shutdown(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.client = None;
        slot.confirmed = false;
    }
}

pub struct EngineLease<'a> {
    slot: MutexGuard<'a, EngineSlot>,
}

impl Evaluator for EngineLease<'_> {
    fn ensure_ready(&mut self) -> Result<(), ClientError> {
        self.slot.ensure()
    }

    fn restart(&mut self) -> Result<(), ClientError> {
        self.slot.respawn()
    }

    fn analyse(&mut self, pos: &Position, limit: &SearchLimit) -> Result<Analysis, ClientError> {
        self.slot.ensure()?;
        match self.slot.client.as_mut() {
            Some(client) => client.analyse_fen(&pos.fen(), limit),
            None => Err(ClientError::NotRunning),
        }
    }
}
