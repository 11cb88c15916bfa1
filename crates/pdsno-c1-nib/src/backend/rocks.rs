//! Production `NibStore` backed by RocksDB (spec §6: "a single relational
//! store … column-family-per-table is an acceptable concrete realization").
//! Grounded on `node-runtime::adapters::storage::rocksdb_adapter::RocksDbStore`
//! for column-family layout, Snappy compression, and `WriteBatch` usage;
//! checksum envelope grounded on `qc-02-block-storage`'s
//! `DefaultChecksumProvider`.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use pdsno_types::{ConfigRequest, Controller, Device, Event, ExecutionToken, Id, Lock};
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};

use crate::cas;
use crate::checksum::ChecksummedRecord;
use crate::error::NibError;
use crate::filelock::DatabaseLock;
use crate::filters::{ConfigRequestFilter, ControllerFilter, DeviceFilter};
use crate::lockfile;
use crate::outcomes::{LockOutcome, ReleaseOutcome, UpsertOutcome};
use crate::schema;
use crate::store::{NibStore, Write, WriteResult};

const CF_DEVICES: &str = "devices";
const CF_CONTROLLERS: &str = "controllers";
const CF_CONFIG_REQUESTS: &str = "config_requests";
const CF_EXECUTION_TOKENS: &str = "execution_tokens";
const CF_EVENTS: &str = "events";
const CF_LOCKS: &str = "locks";
const CF_FENCING_COUNTERS: &str = "fencing_counters";
const CF_META: &str = "meta";

const COLUMN_FAMILIES: &[&str] = &[
    CF_DEVICES,
    CF_CONTROLLERS,
    CF_CONFIG_REQUESTS,
    CF_EXECUTION_TOKENS,
    CF_EVENTS,
    CF_LOCKS,
    CF_FENCING_COUNTERS,
    CF_META,
];

/// Production RocksDB configuration. Mirrors `RocksDbConfig`'s shape, scaled
/// down for a control-plane metadata store rather than a block archive.
#[derive(Debug, Clone)]
pub struct RocksNibConfig {
    pub path: String,
    pub block_cache_bytes: usize,
    pub sync_writes: bool,
}

impl Default for RocksNibConfig {
    fn default() -> Self {
        Self {
            path: "./data/nib".to_string(),
            block_cache_bytes: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksNibConfig {
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_bytes: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksNib {
    db: DB,
    config: RocksNibConfig,
    /// Serializes the read-then-write critical section of every CAS
    /// operation; the underlying `WriteBatch` commit gives atomicity, this
    /// lock gives isolation between concurrent callers.
    write_lock: Mutex<()>,
    /// Held for the lifetime of the store; guards the data directory
    /// against a second process opening it concurrently.
    _directory_lock: DatabaseLock,
}

impl RocksNib {
    pub fn open(config: RocksNibConfig) -> Result<Self, NibError> {
        let directory_lock = DatabaseLock::acquire(Path::new(&config.path))
            .map_err(|e| NibError::Unavailable(format!("failed to lock nib data directory: {e}")))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_bytes));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| NibError::Unavailable(format!("failed to open nib database: {e}")))?;

        let nib = Self {
            db,
            config,
            write_lock: Mutex::new(()),
            _directory_lock: directory_lock,
        };
        nib.check_schema()?;
        Ok(nib)
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, NibError> {
        Self::open(RocksNibConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    fn check_schema(&self) -> Result<(), NibError> {
        let on_disk: Option<u32> = self.get_typed(CF_META, schema::META_KEY_SCHEMA_VERSION_STR)?;
        let version = schema::check_compatible(on_disk)?;
        if on_disk.is_none() {
            self.put_typed(CF_META, schema::META_KEY_SCHEMA_VERSION_STR, &version)?;
        }
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, NibError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| NibError::Unavailable(format!("missing column family {name}")))
    }

    fn get_typed<T: DeserializeOwned>(&self, cf: &str, key: &str) -> Result<Option<T>, NibError> {
        let handle = self.cf(cf)?;
        let raw = self
            .db
            .get_cf(handle, key.as_bytes())
            .map_err(|e| NibError::Unavailable(format!("get failed: {e}")))?;
        match raw {
            None => Ok(None),
            Some(bytes) => {
                let record: ChecksummedRecord = bincode::deserialize(&bytes)
                    .map_err(|e| NibError::Invalid { kind: cf_kind(cf), reason: e.to_string() })?;
                let verified = record
                    .unwrap_verified()
                    .map_err(|e| NibError::Invalid { kind: cf_kind(cf), reason: e })?;
                let value = bincode::deserialize(&verified)
                    .map_err(|e| NibError::Invalid { kind: cf_kind(cf), reason: e.to_string() })?;
                Ok(Some(value))
            }
        }
    }

    fn put_typed<T: Serialize>(&self, cf: &str, key: &str, value: &T) -> Result<(), NibError> {
        let handle = self.cf(cf)?;
        let inner =
            bincode::serialize(value).map_err(|e| NibError::Invalid { kind: cf_kind(cf), reason: e.to_string() })?;
        let record = ChecksummedRecord::wrap(inner);
        let bytes = bincode::serialize(&record)
            .map_err(|e| NibError::Invalid { kind: cf_kind(cf), reason: e.to_string() })?;
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db
            .put_cf_opt(handle, key.as_bytes(), &bytes, &write_opts)
            .map_err(|e| NibError::Unavailable(format!("put failed: {e}")))
    }

    fn batch_put<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &str,
        value: &T,
    ) -> Result<(), NibError> {
        let handle = self.cf(cf)?;
        let inner =
            bincode::serialize(value).map_err(|e| NibError::Invalid { kind: cf_kind(cf), reason: e.to_string() })?;
        let record = ChecksummedRecord::wrap(inner);
        let bytes = bincode::serialize(&record)
            .map_err(|e| NibError::Invalid { kind: cf_kind(cf), reason: e.to_string() })?;
        batch.put_cf(handle, key.as_bytes(), &bytes);
        Ok(())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), NibError> {
        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| NibError::Unavailable(format!("batch commit failed: {e}")))
    }

    fn next_fencing_token(&self, resource_key: &Id) -> Result<u64, NibError> {
        let current: Option<u64> = self.get_typed(CF_FENCING_COUNTERS, resource_key)?;
        let next = current.unwrap_or(0) + 1;
        self.put_typed(CF_FENCING_COUNTERS, resource_key, &next)?;
        Ok(next)
    }

    fn event_key(event: &Event) -> String {
        format!("{:020}:{}", event.timestamp.max(0), event.event_id)
    }

    fn apply_in_batch(
        &self,
        batch: &mut WriteBatch,
        write: Write,
    ) -> Result<WriteResult, NibError> {
        match write {
            Write::UpsertDevice { device, expected_version } => {
                let existing: Option<Device> = self.get_typed(CF_DEVICES, &device.device_id)?;
                let outcome = cas::check_and_bump(
                    "device",
                    &device.device_id,
                    existing.map(|d| d.version),
                    expected_version,
                )?;
                let mut device = device;
                device.version = outcome.version;
                self.batch_put(batch, CF_DEVICES, &device.device_id.clone(), &device)?;
                Ok(WriteResult::Upsert(outcome))
            }
            Write::UpsertController { controller, expected_version } => {
                let existing: Option<Controller> =
                    self.get_typed(CF_CONTROLLERS, &controller.controller_id)?;
                let outcome = cas::check_and_bump(
                    "controller",
                    &controller.controller_id,
                    existing.map(|c| c.version),
                    expected_version,
                )?;
                let mut controller = controller;
                controller.version = outcome.version;
                self.batch_put(batch, CF_CONTROLLERS, &controller.controller_id.clone(), &controller)?;
                Ok(WriteResult::Upsert(outcome))
            }
            Write::UpsertConfigRequest { request, expected_version } => {
                let existing: Option<ConfigRequest> =
                    self.get_typed(CF_CONFIG_REQUESTS, &request.request_id)?;
                let outcome = cas::check_and_bump(
                    "config_request",
                    &request.request_id,
                    existing.map(|r| r.version),
                    expected_version,
                )?;
                let mut request = request;
                request.version = outcome.version;
                self.batch_put(batch, CF_CONFIG_REQUESTS, &request.request_id.clone(), &request)?;
                Ok(WriteResult::Upsert(outcome))
            }
            Write::UpsertExecutionToken { token } => {
                self.batch_put(batch, CF_EXECUTION_TOKENS, &token.token_id.clone(), &token)?;
                Ok(WriteResult::Upsert(UpsertOutcome { version: 1, created: true }))
            }
            Write::ConsumeExecutionToken { token_id, now } => {
                let mut token: ExecutionToken = self
                    .get_typed(CF_EXECUTION_TOKENS, &token_id)?
                    .ok_or_else(|| NibError::not_found("execution_token", token_id.clone()))?;
                if now >= token.expires_at {
                    return Err(NibError::Invalid {
                        kind: "execution_token",
                        reason: "token has expired".into(),
                    });
                }
                let uses_consumed = token.consumed_at.is_some() as u32;
                if uses_consumed >= token.max_uses {
                    return Err(NibError::Invalid {
                        kind: "execution_token",
                        reason: "token has no remaining uses".into(),
                    });
                }
                token.consumed_at = Some(now);
                self.batch_put(batch, CF_EXECUTION_TOKENS, &token_id.clone(), &token)?;
                Ok(WriteResult::Consumed(token))
            }
            Write::AppendEvent { event } => {
                let key = Self::event_key(&event);
                let event_id = event.event_id.clone();
                self.batch_put(batch, CF_EVENTS, &key, &event)?;
                Ok(WriteResult::Appended { event_id })
            }
        }
    }
}

fn cf_kind(cf: &str) -> &'static str {
    match cf {
        CF_DEVICES => "device",
        CF_CONTROLLERS => "controller",
        CF_CONFIG_REQUESTS => "config_request",
        CF_EXECUTION_TOKENS => "execution_token",
        CF_EVENTS => "event",
        CF_LOCKS => "lock",
        CF_FENCING_COUNTERS => "fencing_counter",
        _ => "meta",
    }
}

impl NibStore for RocksNib {
    fn get_device(&self, device_id: &Id) -> Result<Option<Device>, NibError> {
        self.get_typed(CF_DEVICES, device_id)
    }

    fn upsert_device(&self, device: Device, expected_version: Option<u64>) -> Result<UpsertOutcome, NibError> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let result = self.apply_in_batch(&mut batch, Write::UpsertDevice { device, expected_version })?;
        self.commit(batch)?;
        match result {
            WriteResult::Upsert(outcome) => Ok(outcome),
            _ => unreachable!(),
        }
    }

    fn query_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, NibError> {
        let handle = self.cf(CF_DEVICES)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::Start) {
            let (_, bytes) = item.map_err(|e| NibError::Unavailable(e.to_string()))?;
            let record: ChecksummedRecord = bincode::deserialize(&bytes)
                .map_err(|e| NibError::Invalid { kind: "device", reason: e.to_string() })?;
            let verified = record
                .unwrap_verified()
                .map_err(|e| NibError::Invalid { kind: "device", reason: e })?;
            let device: Device = bincode::deserialize(&verified)
                .map_err(|e| NibError::Invalid { kind: "device", reason: e.to_string() })?;
            if filter.matches(&device) {
                out.push(device);
            }
        }
        Ok(out)
    }

    fn get_controller(&self, controller_id: &Id) -> Result<Option<Controller>, NibError> {
        self.get_typed(CF_CONTROLLERS, controller_id)
    }

    fn upsert_controller(
        &self,
        controller: Controller,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let result =
            self.apply_in_batch(&mut batch, Write::UpsertController { controller, expected_version })?;
        self.commit(batch)?;
        match result {
            WriteResult::Upsert(outcome) => Ok(outcome),
            _ => unreachable!(),
        }
    }

    fn query_controllers(&self, filter: &ControllerFilter) -> Result<Vec<Controller>, NibError> {
        let handle = self.cf(CF_CONTROLLERS)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::Start) {
            let (_, bytes) = item.map_err(|e| NibError::Unavailable(e.to_string()))?;
            let record: ChecksummedRecord = bincode::deserialize(&bytes)
                .map_err(|e| NibError::Invalid { kind: "controller", reason: e.to_string() })?;
            let verified = record
                .unwrap_verified()
                .map_err(|e| NibError::Invalid { kind: "controller", reason: e })?;
            let controller: Controller = bincode::deserialize(&verified)
                .map_err(|e| NibError::Invalid { kind: "controller", reason: e.to_string() })?;
            if filter.matches(&controller) {
                out.push(controller);
            }
        }
        Ok(out)
    }

    fn get_config_request(&self, request_id: &Id) -> Result<Option<ConfigRequest>, NibError> {
        self.get_typed(CF_CONFIG_REQUESTS, request_id)
    }

    fn upsert_config_request(
        &self,
        request: ConfigRequest,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let result =
            self.apply_in_batch(&mut batch, Write::UpsertConfigRequest { request, expected_version })?;
        self.commit(batch)?;
        match result {
            WriteResult::Upsert(outcome) => Ok(outcome),
            _ => unreachable!(),
        }
    }

    fn query_config_requests(&self, filter: &ConfigRequestFilter) -> Result<Vec<ConfigRequest>, NibError> {
        let handle = self.cf(CF_CONFIG_REQUESTS)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::Start) {
            let (_, bytes) = item.map_err(|e| NibError::Unavailable(e.to_string()))?;
            let record: ChecksummedRecord = bincode::deserialize(&bytes)
                .map_err(|e| NibError::Invalid { kind: "config_request", reason: e.to_string() })?;
            let verified = record
                .unwrap_verified()
                .map_err(|e| NibError::Invalid { kind: "config_request", reason: e })?;
            let request: ConfigRequest = bincode::deserialize(&verified)
                .map_err(|e| NibError::Invalid { kind: "config_request", reason: e.to_string() })?;
            if filter.matches(&request) {
                out.push(request);
            }
        }
        Ok(out)
    }

    fn get_execution_token(&self, token_id: &Id) -> Result<Option<ExecutionToken>, NibError> {
        self.get_typed(CF_EXECUTION_TOKENS, token_id)
    }

    fn put_execution_token(&self, token: ExecutionToken) -> Result<(), NibError> {
        self.put_typed(CF_EXECUTION_TOKENS, &token.token_id.clone(), &token)
    }

    fn consume_execution_token(&self, token_id: &Id, now: i64) -> Result<ExecutionToken, NibError> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let result = self.apply_in_batch(
            &mut batch,
            Write::ConsumeExecutionToken { token_id: token_id.clone(), now },
        )?;
        self.commit(batch)?;
        match result {
            WriteResult::Consumed(token) => Ok(token),
            _ => unreachable!(),
        }
    }

    fn append_event(&self, event: Event) -> Result<(), NibError> {
        let key = Self::event_key(&event);
        self.put_typed(CF_EVENTS, &key, &event)
    }

    fn events_since(&self, since_ts: i64, limit: usize) -> Result<Vec<Event>, NibError> {
        let handle = self.cf(CF_EVENTS)?;
        let prefix_from = format!("{:020}", since_ts.max(0));
        let mut out = Vec::new();
        let iter = self
            .db
            .iterator_cf(handle, rocksdb::IteratorMode::From(prefix_from.as_bytes(), rocksdb::Direction::Forward));
        for item in iter {
            if out.len() >= limit {
                break;
            }
            let (_, bytes) = item.map_err(|e| NibError::Unavailable(e.to_string()))?;
            let record: ChecksummedRecord = bincode::deserialize(&bytes)
                .map_err(|e| NibError::Invalid { kind: "event", reason: e.to_string() })?;
            let verified = record
                .unwrap_verified()
                .map_err(|e| NibError::Invalid { kind: "event", reason: e })?;
            let event: Event = bincode::deserialize(&verified)
                .map_err(|e| NibError::Invalid { kind: "event", reason: e.to_string() })?;
            if event.timestamp >= since_ts {
                out.push(event);
            }
        }
        Ok(out)
    }

    fn acquire_lock(
        &self,
        resource_key: &Id,
        holder_id: &Id,
        now: i64,
        ttl_secs: i64,
    ) -> Result<LockOutcome, NibError> {
        let _guard = self.write_lock.lock();
        let existing: Option<Lock> = self.get_typed(CF_LOCKS, resource_key)?;
        let next_token = self.next_fencing_token(resource_key)?;
        let lock = lockfile::try_acquire(existing.as_ref(), resource_key, holder_id, now, ttl_secs, next_token)?;
        self.put_typed(CF_LOCKS, resource_key, &lock)?;
        Ok(LockOutcome { lock })
    }

    fn release_lock(&self, resource_key: &Id, fencing_token: u64, now: i64) -> Result<ReleaseOutcome, NibError> {
        let _guard = self.write_lock.lock();
        let existing: Option<Lock> = self.get_typed(CF_LOCKS, resource_key)?;
        let outcome = lockfile::try_release(existing.as_ref(), fencing_token, now);
        if outcome == ReleaseOutcome::Released {
            let handle = self.cf(CF_LOCKS)?;
            self.db
                .delete_cf(handle, resource_key.as_bytes())
                .map_err(|e| NibError::Unavailable(e.to_string()))?;
        }
        Ok(outcome)
    }

    fn get_lock(&self, resource_key: &Id) -> Result<Option<Lock>, NibError> {
        self.get_typed(CF_LOCKS, resource_key)
    }

    fn transaction(&self, writes: Vec<Write>) -> Result<Vec<WriteResult>, NibError> {
        let _guard = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let mut results = Vec::with_capacity(writes.len());
        for write in writes {
            // Any failure aborts before `commit` is ever called, so nothing
            // queued in `batch` so far has touched the database.
            results.push(self.apply_in_batch(&mut batch, write)?);
        }
        self.commit(batch)?;
        Ok(results)
    }
}

/// Open a `RocksNib` wrapped for shared ownership across tasks.
pub fn open_shared(config: RocksNibConfig) -> Result<Arc<RocksNib>, NibError> {
    Ok(Arc::new(RocksNib::open(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdsno_types::DeviceStatus;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_device(id: &str) -> Device {
        Device {
            device_id: id.to_string(),
            region: "zone-a".to_string(),
            mac: "00:11:22:33:44:55".to_string(),
            ip: "10.0.0.5".to_string(),
            hostname: None,
            status: DeviceStatus::Discovered,
            last_seen_by: "lc_zone_a_1".to_string(),
            last_seen_at: 1000,
            version: 0,
            attributes: BTreeMap::new(),
        }
    }

    fn open_test_db(dir: &TempDir) -> RocksNib {
        RocksNib::open(RocksNibConfig::for_testing(dir.path().to_string_lossy().to_string())).unwrap()
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let nib = open_test_db(&dir);
        nib.upsert_device(sample_device("d1"), None).unwrap();
        let fetched = nib.get_device(&"d1".to_string()).unwrap().unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.mac, "00:11:22:33:44:55");
    }

    #[test]
    fn version_conflict_is_rejected() {
        let dir = TempDir::new().unwrap();
        let nib = open_test_db(&dir);
        nib.upsert_device(sample_device("d1"), None).unwrap();
        let err = nib.upsert_device(sample_device("d1"), Some(99)).unwrap_err();
        assert!(matches!(err, NibError::Conflict { .. }));
    }

    #[test]
    fn reopening_existing_database_passes_schema_check() {
        let dir = TempDir::new().unwrap();
        {
            let nib = open_test_db(&dir);
            nib.upsert_device(sample_device("d1"), None).unwrap();
        }
        let nib = open_test_db(&dir);
        assert!(nib.get_device(&"d1".to_string()).unwrap().is_some());
    }

    #[test]
    fn transaction_commits_nothing_on_failure() {
        let dir = TempDir::new().unwrap();
        let nib = open_test_db(&dir);
        nib.upsert_device(sample_device("d1"), None).unwrap();

        let writes = vec![
            Write::UpsertDevice { device: sample_device("d2"), expected_version: None },
            Write::UpsertDevice { device: sample_device("d1"), expected_version: Some(99) },
        ];
        assert!(nib.transaction(writes).is_err());
        assert!(nib.get_device(&"d2".to_string()).unwrap().is_none());
    }

    #[test]
    fn lock_fencing_token_is_durable_across_acquisitions() {
        let dir = TempDir::new().unwrap();
        let nib = open_test_db(&dir);
        let first = nib.acquire_lock(&"device:d1".to_string(), &"rc_a".to_string(), 100, 10).unwrap();
        nib.release_lock(&"device:d1".to_string(), first.lock.fencing_token, 105).unwrap();
        let second = nib.acquire_lock(&"device:d1".to_string(), &"rc_b".to_string(), 106, 10).unwrap();
        assert!(second.lock.fencing_token > first.lock.fencing_token);
    }

    #[test]
    fn release_with_stale_fencing_token_is_rejected() {
        let dir = TempDir::new().unwrap();
        let nib = open_test_db(&dir);
        let first = nib.acquire_lock(&"device:d1".to_string(), &"rc_a".to_string(), 100, 10).unwrap();
        nib.release_lock(&"device:d1".to_string(), first.lock.fencing_token, 105).unwrap();
        nib.acquire_lock(&"device:d1".to_string(), &"rc_b".to_string(), 106, 60).unwrap();
        let outcome = nib.release_lock(&"device:d1".to_string(), first.lock.fencing_token, 110).unwrap();
        assert_eq!(outcome, ReleaseOutcome::StaleToken);
    }
}
