//! Bootstrap token: `HMAC_secret(temp_id, region, role)` (spec §4.4 step 3,
//! GLOSSARY "Bootstrap token"). The first-contact proof a candidate holds a
//! secret pre-shared out of band with its parent, before any per-peer HMAC
//! key from C2's keyring exists.

use pdsno_types::entities::ControllerRole;

fn role_tag(role: ControllerRole) -> &'static str {
    match role {
        ControllerRole::Global => "global",
        ControllerRole::Regional => "regional",
        ControllerRole::Local => "local",
    }
}

fn canonical_message(temp_id: &str, region: Option<&str>, role: ControllerRole) -> Vec<u8> {
    format!("{temp_id}|{}|{}", region.unwrap_or(""), role_tag(role)).into_bytes()
}

pub fn compute(temp_id: &str, region: Option<&str>, role: ControllerRole, secret: &[u8]) -> String {
    pdsno_crypto::hmac_sign(secret, &canonical_message(temp_id, region, role))
}

pub fn verify(
    token: &str,
    temp_id: &str,
    region: Option<&str>,
    role: ControllerRole,
    secret: &[u8],
) -> bool {
    pdsno_crypto::hmac_verify(secret, &canonical_message(temp_id, region, role), token)
}
