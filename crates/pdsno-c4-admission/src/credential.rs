//! Delegation credentials (spec §4.4 "Delegation"): a signed assertion a
//! regional controller presents to authorize admitting local controllers in
//! its region. Grounded on the teacher's certificate/identity-assertion
//! shape used for `VALIDATION_RESULT`'s `certificate` field, generalized to
//! carry `scope` and `permitted_actions`.

use pdsno_crypto::{ed25519_verify, Ed25519Error, Ed25519KeyPair};
use pdsno_types::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationCredential {
    pub credential_id: Id,
    pub issuer_id: Id,
    pub holder_id: Id,
    pub region: Option<Id>,
    pub scope: Vec<String>,
    pub permitted_actions: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub signature: Vec<u8>,
}

impl DelegationCredential {
    fn canonical_bytes(
        credential_id: &str,
        issuer_id: &str,
        holder_id: &str,
        region: Option<&str>,
        scope: &[String],
        permitted_actions: &[String],
        issued_at: i64,
        expires_at: i64,
    ) -> Vec<u8> {
        #[derive(Serialize)]
        struct Unsigned<'a> {
            credential_id: &'a str,
            issuer_id: &'a str,
            holder_id: &'a str,
            region: Option<&'a str>,
            scope: &'a [String],
            permitted_actions: &'a [String],
            issued_at: i64,
            expires_at: i64,
        }
        serde_json::to_vec(&Unsigned {
            credential_id,
            issuer_id,
            holder_id,
            region,
            scope,
            permitted_actions,
            issued_at,
            expires_at,
        })
        .expect("credential fields always serialize")
    }

    /// Issue and sign a credential as `issuer_id`, using `keypair`'s private
    /// half. The issuer's public key (stored on its `Controller` row) is
    /// what a later `verify` call checks against.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        credential_id: impl Into<Id>,
        issuer_id: impl Into<Id>,
        holder_id: impl Into<Id>,
        region: Option<Id>,
        scope: Vec<String>,
        permitted_actions: Vec<String>,
        issued_at: i64,
        expires_at: i64,
        keypair: &Ed25519KeyPair,
    ) -> Self {
        let credential_id = credential_id.into();
        let issuer_id = issuer_id.into();
        let holder_id = holder_id.into();
        let message = Self::canonical_bytes(
            &credential_id,
            &issuer_id,
            &holder_id,
            region.as_deref(),
            &scope,
            &permitted_actions,
            issued_at,
            expires_at,
        );
        let signature = keypair.sign(&message).to_vec();
        Self {
            credential_id,
            issuer_id,
            holder_id,
            region,
            scope,
            permitted_actions,
            issued_at,
            expires_at,
            signature,
        }
    }

    /// Verify the credential's signature against the claimed issuer's
    /// public key. Does not check `expires_at`; callers compare that
    /// against their own clock.
    pub fn verify(&self, issuer_public_key: &[u8]) -> Result<(), Ed25519Error> {
        let message = Self::canonical_bytes(
            &self.credential_id,
            &self.issuer_id,
            &self.holder_id,
            self.region.as_deref(),
            &self.scope,
            &self.permitted_actions,
            self.issued_at,
            self.expires_at,
        );
        ed25519_verify(issuer_public_key, &message, &self.signature)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
