//! Graduation policy (spec §4.5 "New devices enter `quarantined` status;
//! they graduate to `active` only via an explicit policy decision", and
//! Open Question (a): "implementers should expose this as a policy hook
//! and document the default as no automatic graduation").

use pdsno_types::entities::Device;

pub trait GraduationPolicy: Send + Sync {
    /// Whether `device`, currently `quarantined`, should graduate to
    /// `active`. Called once per cycle per quarantined device.
    fn should_graduate(&self, device: &Device, now: i64) -> bool;
}

/// The documented default: nothing graduates automatically.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAutoGraduation;

impl GraduationPolicy for NoAutoGraduation {
    fn should_graduate(&self, _device: &Device, _now: i64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdsno_types::entities::DeviceStatus;
    use std::collections::BTreeMap;

    #[test]
    fn no_auto_graduation_never_graduates() {
        let device = Device {
            device_id: "d1".into(),
            region: "zone-a".into(),
            mac: "aa:bb".into(),
            ip: "10.0.0.1".into(),
            hostname: None,
            status: DeviceStatus::Quarantined,
            last_seen_by: "lc1".into(),
            last_seen_at: 0,
            version: 1,
            attributes: BTreeMap::new(),
        };
        assert!(!NoAutoGraduation.should_graduate(&device, 1000));
    }
}
