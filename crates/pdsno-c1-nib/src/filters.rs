//! Query predicates for `NibStore::query_*` (spec §4.1 "query").
//!
//! Kept as concrete, per-entity structs rather than a generic predicate
//! closure: closures aren't object-safe across a `dyn NibStore`, and the
//! set of filterable fields per entity is small and stable.

use pdsno_types::{ControllerRole, ControllerStatus, DeviceStatus, Id, RequestState, Sensitivity};

#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub region: Option<Id>,
    pub status: Option<DeviceStatus>,
    pub mac: Option<String>,
}

impl DeviceFilter {
    pub fn matches(&self, device: &pdsno_types::Device) -> bool {
        if let Some(region) = &self.region {
            if &device.region != region {
                return false;
            }
        }
        if let Some(status) = self.status {
            if device.status != status {
                return false;
            }
        }
        if let Some(mac) = &self.mac {
            if &device.mac != mac {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControllerFilter {
    pub role: Option<ControllerRole>,
    pub region: Option<Id>,
    pub status: Option<ControllerStatus>,
}

impl ControllerFilter {
    pub fn matches(&self, controller: &pdsno_types::Controller) -> bool {
        if let Some(role) = self.role {
            if controller.role != role {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if controller.region.as_ref() != Some(region) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if controller.status != status {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigRequestFilter {
    pub state: Option<RequestState>,
    pub min_sensitivity: Option<Sensitivity>,
    pub created_by: Option<Id>,
}

impl ConfigRequestFilter {
    pub fn matches(&self, request: &pdsno_types::ConfigRequest) -> bool {
        if let Some(state) = self.state {
            if request.state != state {
                return false;
            }
        }
        if let Some(min) = self.min_sensitivity {
            if request.declared_sensitivity < min {
                return false;
            }
        }
        if let Some(created_by) = &self.created_by {
            if &request.created_by != created_by {
                return false;
            }
        }
        true
    }
}
