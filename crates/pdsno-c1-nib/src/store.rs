//! # `NibStore` — the Network Information Base port (spec §4.1)
//!
//! One object-safe trait shared by every tier's controller process, backed
//! by either [`crate::MemoryNib`] (tests, ephemeral Local controllers) or
//! [`crate::RocksNib`] (production). Methods take `&self`: backends own their
//! interior mutability (`parking_lot::RwLock` / `rocksdb::DB`, itself
//! internally synchronized) so the trait object can be shared via `Arc`
//! across async tasks without an outer mutex.
//!
//! Grounded on `qc-02-block-storage::ports::outbound::KeyValueStore` for the
//! shape of the port (sync trait, `Result<_, Error>`, atomic batch), adapted
//! from a raw byte KV port to typed per-entity methods per spec §4.1's note
//! that its listed operations are representative of a per-entity pattern.

use pdsno_types::{
    ConfigRequest, Controller, Device, Event, ExecutionToken, Id, Lock,
};

use crate::error::NibError;
use crate::filters::{ConfigRequestFilter, ControllerFilter, DeviceFilter};
use crate::outcomes::{LockOutcome, ReleaseOutcome, UpsertOutcome};

/// A single operation inside an atomic, multi-entity `transaction` call.
#[derive(Debug, Clone)]
pub enum Write {
    UpsertDevice {
        device: Device,
        expected_version: Option<u64>,
    },
    UpsertController {
        controller: Controller,
        expected_version: Option<u64>,
    },
    UpsertConfigRequest {
        request: ConfigRequest,
        expected_version: Option<u64>,
    },
    UpsertExecutionToken {
        token: ExecutionToken,
    },
    /// Mark a single-use execution token consumed in the same atomic batch
    /// as the state transition it authorizes (spec §4.6). Fails the whole
    /// transaction if the token is already consumed, expired, or unknown.
    ConsumeExecutionToken {
        token_id: Id,
        now: i64,
    },
    AppendEvent {
        event: Event,
    },
}

/// Per-write outcome returned in the same order as the submitted `Write`s.
#[derive(Debug, Clone)]
pub enum WriteResult {
    Upsert(UpsertOutcome),
    Consumed(ExecutionToken),
    Appended { event_id: Id },
}

pub trait NibStore: Send + Sync {
    // -- Devices --------------------------------------------------------
    fn get_device(&self, device_id: &Id) -> Result<Option<Device>, NibError>;
    fn upsert_device(
        &self,
        device: Device,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError>;
    fn query_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, NibError>;

    // -- Controllers ------------------------------------------------------
    fn get_controller(&self, controller_id: &Id) -> Result<Option<Controller>, NibError>;
    fn upsert_controller(
        &self,
        controller: Controller,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError>;
    fn query_controllers(&self, filter: &ControllerFilter) -> Result<Vec<Controller>, NibError>;

    // -- Config requests --------------------------------------------------
    fn get_config_request(&self, request_id: &Id) -> Result<Option<ConfigRequest>, NibError>;
    fn upsert_config_request(
        &self,
        request: ConfigRequest,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError>;
    fn query_config_requests(
        &self,
        filter: &ConfigRequestFilter,
    ) -> Result<Vec<ConfigRequest>, NibError>;

    // -- Execution tokens ---------------------------------------------------
    fn get_execution_token(&self, token_id: &Id) -> Result<Option<ExecutionToken>, NibError>;
    fn put_execution_token(&self, token: ExecutionToken) -> Result<(), NibError>;
    /// Atomically mark a token consumed iff it has remaining uses and has
    /// not expired; returns the updated token. Grounded on spec §4.5's
    /// single-use/scope-bound execution token requirement.
    fn consume_execution_token(
        &self,
        token_id: &Id,
        now: i64,
    ) -> Result<ExecutionToken, NibError>;

    // -- Events (append-only) ----------------------------------------------
    fn append_event(&self, event: Event) -> Result<(), NibError>;
    fn events_since(&self, since_ts: i64, limit: usize) -> Result<Vec<Event>, NibError>;

    // -- Locks (fencing tokens) ---------------------------------------------
    fn acquire_lock(
        &self,
        resource_key: &Id,
        holder_id: &Id,
        now: i64,
        ttl_secs: i64,
    ) -> Result<LockOutcome, NibError>;
    fn release_lock(
        &self,
        resource_key: &Id,
        fencing_token: u64,
        now: i64,
    ) -> Result<ReleaseOutcome, NibError>;
    fn get_lock(&self, resource_key: &Id) -> Result<Option<Lock>, NibError>;

    // -- Multi-entity atomic transaction -------------------------------------
    fn transaction(&self, writes: Vec<Write>) -> Result<Vec<WriteResult>, NibError>;
}
