//! Hash-chained audit ledger.
//!
//! Every mutation to a governed entity is appended as an [`AuditEntry`]
//! whose `currentHash` binds it to the previous entry in that entity's
//! chain. The chain can be walked and independently re-verified, so a
//! tampered or reordered entry is detectable without a trusted third party.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

type HmacSha256 = Hmac<Sha256>;

/// Hash used for entry 0's `previousHash`: 32 zero bytes, hex-encoded.
fn genesis_hash() -> String {
    "0".repeat(64)
}

/// The kind of mutation an [`AuditEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
    Custom,
}

/// Lifecycle of one entity's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainStatus {
    Open,
    LegalHold,
    Purged,
}

/// One immutable record in an entity's hash chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub entity_id: String,
    pub entity_model: String,
    pub event_type: EventType,
    pub payload: Value,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
    pub previous_hash: String,
    pub current_hash: String,
    pub signature: String,
    /// Forensic context: ip, session id, request id, risk score, etc.
    #[serde(default)]
    pub metadata: Value,
}

/// Result of walking and re-verifying a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub broken_at: Option<u64>,
    pub reason: Option<String>,
}

impl ChainVerification {
    fn ok() -> Self {
        Self {
            valid: true,
            broken_at: None,
            reason: None,
        }
    }

    fn broken(sequence: u64, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            broken_at: Some(sequence),
            reason: Some(reason.into()),
        }
    }
}

/// Filters accepted by [`AuditLedger::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub entity_id: Option<String>,
    pub performed_by: Option<String>,
    pub event_type: Option<EventType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("entity {entity_id} has no chain")]
    NotFound { entity_id: String },

    #[error("sequence conflict on {entity_id}: expected head {expected}, found {actual}")]
    SequenceConflict {
        entity_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("chain for {entity_id} broken at sequence {broken_at}: {reason}")]
    ChainBroken {
        entity_id: String,
        broken_at: u64,
        reason: String,
    },

    #[error("entity {entity_id} is under legal hold")]
    UnderLegalHold { entity_id: String },

    #[error("entity {entity_id} chain has already been purged")]
    AlreadyPurged { entity_id: String },
}

/// Append-only, hash-chained, tamper-evident audit ledger.
///
/// The ledger owns every [`AuditEntry`] it holds exclusively: nothing
/// outside this module constructs one.
pub struct AuditLedger {
    chains: Arc<RwLock<HashMap<String, Vec<AuditEntry>>>>,
    status: Arc<RwLock<HashMap<String, ChainStatus>>>,
    signing_key: Vec<u8>,
}

impl AuditLedger {
    pub fn new(signing_key: impl Into<Vec<u8>>) -> Self {
        Self {
            chains: Arc::new(RwLock::new(HashMap::new())),
            status: Arc::new(RwLock::new(HashMap::new())),
            signing_key: signing_key.into(),
        }
    }

    /// Canonicalize a JSON value: object keys sorted lexicographically,
    /// recursively. Array order and scalar representations are preserved
    /// since `serde_json` already renders numbers without trailing zeros.
    pub fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::canonicalize(v)))
                    .collect();
                let mut out = serde_json::Map::new();
                for (k, v) in sorted {
                    out.insert(k, v);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(Self::canonicalize).collect()),
            other => other.clone(),
        }
    }

    fn compute_hash(
        previous_hash: &str,
        canonical_payload: &Value,
        sequence: u64,
        timestamp: &DateTime<Utc>,
        entity_id: &str,
        event_type: EventType,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(previous_hash.as_bytes());
        hasher.update(canonical_payload.to_string().as_bytes());
        hasher.update(sequence.to_string().as_bytes());
        hasher.update(timestamp.to_rfc3339().as_bytes());
        hasher.update(entity_id.as_bytes());
        hasher.update(format!("{event_type:?}").as_bytes());
        hex::encode(hasher.finalize())
    }

    fn sign(&self, current_hash: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.signing_key).expect("HMAC accepts any key length");
        mac.update(current_hash.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify_signature(&self, current_hash: &str, signature: &str) -> bool {
        let mut mac = match HmacSha256::new_from_slice(&self.signing_key) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(current_hash.as_bytes());
        let expected = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        mac.verify_slice(&expected).is_ok()
    }

    /// Append a new entry to `entity_id`'s chain.
    pub async fn append(
        &self,
        entity_id: &str,
        entity_model: &str,
        event_type: EventType,
        payload: Value,
        performed_by: &str,
    ) -> Result<AuditEntry, LedgerError> {
        self.append_with_metadata(
            entity_id,
            entity_model,
            event_type,
            payload,
            performed_by,
            Value::Null,
        )
        .await
    }

    pub async fn append_with_metadata(
        &self,
        entity_id: &str,
        entity_model: &str,
        event_type: EventType,
        payload: Value,
        performed_by: &str,
        metadata: Value,
    ) -> Result<AuditEntry, LedgerError> {
        if let Some(ChainStatus::Purged) = self.status.read().await.get(entity_id).copied() {
            return Err(LedgerError::AlreadyPurged {
                entity_id: entity_id.to_string(),
            });
        }

        let mut chains = self.chains.write().await;
        let chain = chains.entry(entity_id.to_string()).or_default();

        let sequence = chain.last().map(|e| e.sequence + 1).unwrap_or(0);
        let previous_hash = chain
            .last()
            .map(|e| e.current_hash.clone())
            .unwrap_or_else(genesis_hash);
        let timestamp = Utc::now();
        let canonical_payload = Self::canonicalize(&payload);
        let current_hash = Self::compute_hash(
            &previous_hash,
            &canonical_payload,
            sequence,
            &timestamp,
            entity_id,
            event_type,
        );
        let signature = self.sign(&current_hash);

        let entry = AuditEntry {
            sequence,
            entity_id: entity_id.to_string(),
            entity_model: entity_model.to_string(),
            event_type,
            payload,
            performed_by: performed_by.to_string(),
            timestamp,
            previous_hash,
            current_hash,
            signature,
            metadata,
        };

        chain.push(entry.clone());
        tracing::info!(
            entity_id,
            sequence,
            event_type = ?event_type,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Walk `entity_id`'s chain from sequence 0, recomputing every hash and
    /// signature. Returns the first break encountered, if any.
    pub async fn audit_chain(&self, entity_id: &str) -> ChainVerification {
        let chains = self.chains.read().await;
        let Some(chain) = chains.get(entity_id) else {
            return ChainVerification::ok();
        };

        let mut expected_previous = genesis_hash();
        for (idx, entry) in chain.iter().enumerate() {
            if entry.sequence != idx as u64 {
                return ChainVerification::broken(
                    entry.sequence,
                    format!("expected contiguous sequence {idx}, found {}", entry.sequence),
                );
            }
            if entry.previous_hash != expected_previous {
                return ChainVerification::broken(entry.sequence, "previousHash does not link to prior entry");
            }
            let recomputed = Self::compute_hash(
                &entry.previous_hash,
                &Self::canonicalize(&entry.payload),
                entry.sequence,
                &entry.timestamp,
                &entry.entity_id,
                entry.event_type,
            );
            if recomputed != entry.current_hash {
                return ChainVerification::broken(entry.sequence, "currentHash mismatch on recompute");
            }
            if !self.verify_signature(&entry.current_hash, &entry.signature) {
                return ChainVerification::broken(entry.sequence, "signature verification failed");
            }
            expected_previous = entry.current_hash.clone();
        }

        ChainVerification::ok()
    }

    /// Fold the chain's events into the entity's state as of `at_sequence`
    /// (inclusive), or the full chain if `None`.
    pub async fn reconstruct_state(
        &self,
        entity_id: &str,
        at_sequence: Option<u64>,
    ) -> Result<Value, LedgerError> {
        let verification = self.audit_chain(entity_id).await;
        if !verification.valid {
            return Err(LedgerError::ChainBroken {
                entity_id: entity_id.to_string(),
                broken_at: verification.broken_at.unwrap_or(0),
                reason: verification.reason.unwrap_or_default(),
            });
        }

        let chains = self.chains.read().await;
        let chain = chains
            .get(entity_id)
            .ok_or_else(|| LedgerError::NotFound {
                entity_id: entity_id.to_string(),
            })?;

        let mut state = serde_json::Map::new();
        for entry in chain {
            if let Some(limit) = at_sequence {
                if entry.sequence > limit {
                    break;
                }
            }
            match entry.event_type {
                EventType::Created => {
                    if let Value::Object(obj) = &entry.payload {
                        state = obj.clone();
                    }
                }
                EventType::Updated => {
                    if let Value::Object(delta) = &entry.payload {
                        for (field, change) in delta {
                            if let Some(new_value) = change.get("new") {
                                state.insert(field.clone(), new_value.clone());
                            }
                        }
                    }
                }
                EventType::Deleted => {
                    state.insert("_deleted".to_string(), Value::Bool(true));
                }
                EventType::Custom => {}
            }
        }

        Ok(Value::Object(state))
    }

    /// Query entries across all chains for forensic review.
    pub async fn query(&self, filters: &QueryFilters, paging: Paging) -> Vec<AuditEntry> {
        let chains = self.chains.read().await;
        let mut matches: Vec<AuditEntry> = chains
            .values()
            .flatten()
            .filter(|entry| {
                filters
                    .entity_id
                    .as_ref()
                    .map(|id| &entry.entity_id == id)
                    .unwrap_or(true)
                    && filters
                        .performed_by
                        .as_ref()
                        .map(|actor| &entry.performed_by == actor)
                        .unwrap_or(true)
                    && filters
                        .event_type
                        .map(|t| t == entry.event_type)
                        .unwrap_or(true)
                    && filters.since.map(|s| entry.timestamp >= s).unwrap_or(true)
                    && filters.until.map(|u| entry.timestamp <= u).unwrap_or(true)
            })
            .cloned()
            .collect();

        matches.sort_by_key(|e| e.timestamp);
        matches
            .into_iter()
            .skip(paging.offset)
            .take(paging.limit)
            .collect()
    }

    /// Toggle legal hold on an entity's chain. Does not mutate content.
    pub async fn legal_hold(
        &self,
        entity_id: &str,
        on: bool,
        reason: &str,
        actor: &str,
    ) -> Result<(), LedgerError> {
        let mut status = self.status.write().await;
        let current = status
            .entry(entity_id.to_string())
            .or_insert(ChainStatus::Open);

        if *current == ChainStatus::Purged {
            return Err(LedgerError::AlreadyPurged {
                entity_id: entity_id.to_string(),
            });
        }

        *current = if on {
            ChainStatus::LegalHold
        } else {
            ChainStatus::Open
        };

        tracing::info!(entity_id, on, reason, actor, "legal hold toggled");
        Ok(())
    }

    pub async fn chain_status(&self, entity_id: &str) -> ChainStatus {
        self.status
            .read()
            .await
            .get(entity_id)
            .copied()
            .unwrap_or(ChainStatus::Open)
    }

    /// Irreversibly remove a chain past its retention window. Fails if the
    /// chain is under legal hold.
    pub async fn purge(&self, entity_id: &str) -> Result<(), LedgerError> {
        let mut status = self.status.write().await;
        match status.get(entity_id).copied().unwrap_or(ChainStatus::Open) {
            ChainStatus::LegalHold => {
                return Err(LedgerError::UnderLegalHold {
                    entity_id: entity_id.to_string(),
                })
            }
            ChainStatus::Purged => {
                return Err(LedgerError::AlreadyPurged {
                    entity_id: entity_id.to_string(),
                })
            }
            ChainStatus::Open => {}
        }
        self.chains.write().await.remove(entity_id);
        status.insert(entity_id.to_string(), ChainStatus::Purged);
        Ok(())
    }
}
