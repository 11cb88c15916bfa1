//! In-memory `NibStore` (spec §4.1): unit tests and ephemeral Local-tier
//! controllers that don't need durability across restarts. Grounded on
//! `qc-02-block-storage::ports::outbound::InMemoryKVStore`, generalized from
//! a raw byte map to typed per-entity tables under one `RwLock`.

use std::collections::HashMap;

use parking_lot::RwLock;
use pdsno_types::{ConfigRequest, Controller, Device, Event, ExecutionToken, Id, Lock};

use crate::cas;
use crate::error::NibError;
use crate::filters::{ConfigRequestFilter, ControllerFilter, DeviceFilter};
use crate::lockfile;
use crate::outcomes::{LockOutcome, ReleaseOutcome, UpsertOutcome};
use crate::store::{NibStore, Write, WriteResult};

#[derive(Default)]
struct Tables {
    devices: HashMap<Id, Device>,
    controllers: HashMap<Id, Controller>,
    config_requests: HashMap<Id, ConfigRequest>,
    execution_tokens: HashMap<Id, ExecutionToken>,
    events: Vec<Event>,
    locks: HashMap<Id, Lock>,
    fencing_counters: HashMap<Id, u64>,
}

pub struct MemoryNib {
    tables: RwLock<Tables>,
}

impl Default for MemoryNib {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNib {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn next_fencing_token(tables: &mut Tables, resource_key: &Id) -> u64 {
        let counter = tables.fencing_counters.entry(resource_key.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    fn apply(tables: &mut Tables, write: Write) -> Result<WriteResult, NibError> {
        match write {
            Write::UpsertDevice {
                device,
                expected_version,
            } => {
                let existing = tables.devices.get(&device.device_id).map(|d| d.version);
                let outcome =
                    cas::check_and_bump("device", &device.device_id, existing, expected_version)?;
                let mut device = device;
                device.version = outcome.version;
                tables.devices.insert(device.device_id.clone(), device);
                Ok(WriteResult::Upsert(outcome))
            }
            Write::UpsertController {
                controller,
                expected_version,
            } => {
                let existing = tables
                    .controllers
                    .get(&controller.controller_id)
                    .map(|c| c.version);
                let outcome = cas::check_and_bump(
                    "controller",
                    &controller.controller_id,
                    existing,
                    expected_version,
                )?;
                let mut controller = controller;
                controller.version = outcome.version;
                tables
                    .controllers
                    .insert(controller.controller_id.clone(), controller);
                Ok(WriteResult::Upsert(outcome))
            }
            Write::UpsertConfigRequest {
                request,
                expected_version,
            } => {
                let existing = tables
                    .config_requests
                    .get(&request.request_id)
                    .map(|r| r.version);
                let outcome = cas::check_and_bump(
                    "config_request",
                    &request.request_id,
                    existing,
                    expected_version,
                )?;
                let mut request = request;
                request.version = outcome.version;
                tables
                    .config_requests
                    .insert(request.request_id.clone(), request);
                Ok(WriteResult::Upsert(outcome))
            }
            Write::UpsertExecutionToken { token } => {
                tables.execution_tokens.insert(token.token_id.clone(), token);
                Ok(WriteResult::Upsert(UpsertOutcome {
                    version: 1,
                    created: true,
                }))
            }
            Write::ConsumeExecutionToken { token_id, now } => {
                let token = tables
                    .execution_tokens
                    .get_mut(&token_id)
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
                Ok(WriteResult::Consumed(token.clone()))
            }
            Write::AppendEvent { event } => {
                let event_id = event.event_id.clone();
                tables.events.push(event);
                Ok(WriteResult::Appended { event_id })
            }
        }
    }
}

impl NibStore for MemoryNib {
    fn get_device(&self, device_id: &Id) -> Result<Option<Device>, NibError> {
        Ok(self.tables.read().devices.get(device_id).cloned())
    }

    fn upsert_device(
        &self,
        device: Device,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError> {
        let mut tables = self.tables.write();
        match Self::apply(
            &mut tables,
            Write::UpsertDevice {
                device,
                expected_version,
            },
        )? {
            WriteResult::Upsert(outcome) => Ok(outcome),
            _ => unreachable!(),
        }
    }

    fn query_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, NibError> {
        Ok(self
            .tables
            .read()
            .devices
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    fn get_controller(&self, controller_id: &Id) -> Result<Option<Controller>, NibError> {
        Ok(self.tables.read().controllers.get(controller_id).cloned())
    }

    fn upsert_controller(
        &self,
        controller: Controller,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError> {
        let mut tables = self.tables.write();
        match Self::apply(
            &mut tables,
            Write::UpsertController {
                controller,
                expected_version,
            },
        )? {
            WriteResult::Upsert(outcome) => Ok(outcome),
            _ => unreachable!(),
        }
    }

    fn query_controllers(&self, filter: &ControllerFilter) -> Result<Vec<Controller>, NibError> {
        Ok(self
            .tables
            .read()
            .controllers
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    fn get_config_request(&self, request_id: &Id) -> Result<Option<ConfigRequest>, NibError> {
        Ok(self
            .tables
            .read()
            .config_requests
            .get(request_id)
            .cloned())
    }

    fn upsert_config_request(
        &self,
        request: ConfigRequest,
        expected_version: Option<u64>,
    ) -> Result<UpsertOutcome, NibError> {
        let mut tables = self.tables.write();
        match Self::apply(
            &mut tables,
            Write::UpsertConfigRequest {
                request,
                expected_version,
            },
        )? {
            WriteResult::Upsert(outcome) => Ok(outcome),
            _ => unreachable!(),
        }
    }

    fn query_config_requests(
        &self,
        filter: &ConfigRequestFilter,
    ) -> Result<Vec<ConfigRequest>, NibError> {
        Ok(self
            .tables
            .read()
            .config_requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn get_execution_token(&self, token_id: &Id) -> Result<Option<ExecutionToken>, NibError> {
        Ok(self.tables.read().execution_tokens.get(token_id).cloned())
    }

    fn put_execution_token(&self, token: ExecutionToken) -> Result<(), NibError> {
        self.tables
            .write()
            .execution_tokens
            .insert(token.token_id.clone(), token);
        Ok(())
    }

    fn consume_execution_token(
        &self,
        token_id: &Id,
        now: i64,
    ) -> Result<ExecutionToken, NibError> {
        let mut tables = self.tables.write();
        match Self::apply(&mut tables, Write::ConsumeExecutionToken { token_id: token_id.clone(), now })? {
            WriteResult::Consumed(token) => Ok(token),
            _ => unreachable!(),
        }
    }

    fn append_event(&self, event: Event) -> Result<(), NibError> {
        self.tables.write().events.push(event);
        Ok(())
    }

    fn events_since(&self, since_ts: i64, limit: usize) -> Result<Vec<Event>, NibError> {
        let tables = self.tables.read();
        Ok(tables
            .events
            .iter()
            .filter(|e| e.timestamp >= since_ts)
            .take(limit)
            .cloned()
            .collect())
    }

    fn acquire_lock(
        &self,
        resource_key: &Id,
        holder_id: &Id,
        now: i64,
        ttl_secs: i64,
    ) -> Result<LockOutcome, NibError> {
        let mut tables = self.tables.write();
        let existing = tables.locks.get(resource_key).cloned();
        let next_token = Self::next_fencing_token(&mut tables, resource_key);
        let lock = lockfile::try_acquire(
            existing.as_ref(),
            resource_key,
            holder_id,
            now,
            ttl_secs,
            next_token,
        )?;
        tables.locks.insert(resource_key.clone(), lock.clone());
        Ok(LockOutcome { lock })
    }

    fn release_lock(
        &self,
        resource_key: &Id,
        fencing_token: u64,
        now: i64,
    ) -> Result<ReleaseOutcome, NibError> {
        let mut tables = self.tables.write();
        let existing = tables.locks.get(resource_key).cloned();
        let outcome = lockfile::try_release(existing.as_ref(), fencing_token, now);
        if outcome == ReleaseOutcome::Released {
            tables.locks.remove(resource_key);
        }
        Ok(outcome)
    }

    fn get_lock(&self, resource_key: &Id) -> Result<Option<Lock>, NibError> {
        Ok(self.tables.read().locks.get(resource_key).cloned())
    }

    fn transaction(&self, writes: Vec<Write>) -> Result<Vec<WriteResult>, NibError> {
        let mut tables = self.tables.write();
        // Snapshot for rollback: spec §4.1 "transaction is all-or-nothing".
        let snapshot = Tables {
            devices: tables.devices.clone(),
            controllers: tables.controllers.clone(),
            config_requests: tables.config_requests.clone(),
            execution_tokens: tables.execution_tokens.clone(),
            events: tables.events.clone(),
            locks: tables.locks.clone(),
            fencing_counters: tables.fencing_counters.clone(),
        };
        let mut results = Vec::with_capacity(writes.len());
        for write in writes {
            match Self::apply(&mut tables, write) {
                Ok(result) => results.push(result),
                Err(err) => {
                    *tables = snapshot;
                    return Err(err);
                }
            }
        }
        Ok(results)
    }
}

impl Clone for Tables {
    fn clone(&self) -> Self {
        Tables {
            devices: self.devices.clone(),
            controllers: self.controllers.clone(),
            config_requests: self.config_requests.clone(),
            execution_tokens: self.execution_tokens.clone(),
            events: self.events.clone(),
            locks: self.locks.clone(),
            fencing_counters: self.fencing_counters.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdsno_types::DeviceStatus;
    use std::collections::BTreeMap;

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

    #[test]
    fn upsert_creates_then_requires_matching_version() {
        let nib = MemoryNib::new();
        let outcome = nib.upsert_device(sample_device("d1"), None).unwrap();
        assert_eq!(outcome.version, 1);

        let mut updated = sample_device("d1");
        updated.status = DeviceStatus::Active;
        let outcome = nib.upsert_device(updated, Some(1)).unwrap();
        assert_eq!(outcome.version, 2);

        let stale = sample_device("d1");
        let err = nib.upsert_device(stale, Some(1)).unwrap_err();
        assert!(matches!(err, NibError::Conflict { .. }));
    }

    #[test]
    fn query_devices_filters_by_region_and_status() {
        let nib = MemoryNib::new();
        nib.upsert_device(sample_device("d1"), None).unwrap();
        let mut other = sample_device("d2");
        other.region = "zone-b".to_string();
        nib.upsert_device(other, None).unwrap();

        let results = nib
            .query_devices(&DeviceFilter {
                region: Some("zone-a".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].device_id, "d1");
    }

    #[test]
    fn acquire_lock_conflicts_for_other_live_holder() {
        let nib = MemoryNib::new();
        nib.acquire_lock(&"device:d1".to_string(), &"rc_a".to_string(), 100, 60)
            .unwrap();
        let err = nib
            .acquire_lock(&"device:d1".to_string(), &"rc_b".to_string(), 110, 60)
            .unwrap_err();
        assert!(matches!(err, NibError::Locked { .. }));
    }

    #[test]
    fn fencing_token_increases_across_reacquisitions() {
        let nib = MemoryNib::new();
        let first = nib
            .acquire_lock(&"device:d1".to_string(), &"rc_a".to_string(), 100, 10)
            .unwrap();
        nib.release_lock(&"device:d1".to_string(), first.lock.fencing_token, 105)
            .unwrap();
        let second = nib
            .acquire_lock(&"device:d1".to_string(), &"rc_b".to_string(), 106, 10)
            .unwrap();
        assert!(second.lock.fencing_token > first.lock.fencing_token);
    }

    #[test]
    fn release_with_stale_token_is_rejected_and_keeps_the_lock() {
        let nib = MemoryNib::new();
        let first = nib
            .acquire_lock(&"device:d1".to_string(), &"rc_a".to_string(), 100, 10)
            .unwrap();
        nib.release_lock(&"device:d1".to_string(), first.lock.fencing_token, 105)
            .unwrap();
        let second = nib
            .acquire_lock(&"device:d1".to_string(), &"rc_b".to_string(), 106, 60)
            .unwrap();
        let outcome = nib
            .release_lock(&"device:d1".to_string(), first.lock.fencing_token, 110)
            .unwrap();
        assert_eq!(outcome, ReleaseOutcome::StaleToken);
        assert_eq!(
            nib.get_lock(&"device:d1".to_string()).unwrap().unwrap().fencing_token,
            second.lock.fencing_token
        );
    }

    #[test]
    fn release_of_never_acquired_resource_is_not_held() {
        let nib = MemoryNib::new();
        let outcome = nib.release_lock(&"device:ghost".to_string(), 1, 100).unwrap();
        assert_eq!(outcome, ReleaseOutcome::NotHeld);
    }

    #[test]
    fn transaction_rolls_back_entirely_on_any_failure() {
        let nib = MemoryNib::new();
        nib.upsert_device(sample_device("d1"), None).unwrap();

        let writes = vec![
            Write::UpsertDevice {
                device: sample_device("d2"),
                expected_version: None,
            },
            Write::UpsertDevice {
                device: sample_device("d1"),
                expected_version: Some(99), // wrong version, forces failure
            },
        ];
        let err = nib.transaction(writes).unwrap_err();
        assert!(matches!(err, NibError::Conflict { .. }));
        assert!(nib.get_device(&"d2".to_string()).unwrap().is_none());
    }

    #[test]
    fn execution_token_cannot_be_consumed_twice() {
        let nib = MemoryNib::new();
        let token = ExecutionToken {
            token_id: "tok1".into(),
            request_id: "req1".into(),
            config_hash: "hash".into(),
            scope: vec!["d1".into()],
            issuer_id: "gc".into(),
            issued_at: 0,
            expires_at: 1000,
            max_uses: 1,
            consumed_at: None,
            constraints: Default::default(),
            signature: vec![],
        };
        nib.put_execution_token(token).unwrap();
        nib.consume_execution_token(&"tok1".to_string(), 10).unwrap();
        let err = nib
            .consume_execution_token(&"tok1".to_string(), 11)
            .unwrap_err();
        assert!(matches!(err, NibError::Invalid { .. }));
    }
}
