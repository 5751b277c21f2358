//! Leased advisory locks giving single-flight execution across processes.
//!
//! A job may run on exactly one node at a time. The node acquires a lease
//! keyed by job name; the lease expires after at least 2x the job's expected
//! runtime, so a crashed holder never wedges the job permanently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{JobLease, JobName};

pub struct LeaseManager {
    leases: Arc<RwLock<HashMap<JobName, JobLease>>>,
}

impl Default for LeaseManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseManager {
    pub fn new() -> Self {
        Self {
            leases: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Acquire (or renew) the lease for `job_name`. Succeeds if unheld, held
    /// by `holder` already, or expired.
    pub async fn acquire(
        &self,
        job_name: JobName,
        holder: &str,
        ttl: Duration,
    ) -> Result<JobLease, LeaseError> {
        let mut leases = self.leases.write().await;

        if let Some(existing) = leases.get(&job_name) {
            if !existing.is_expired() && existing.holder != holder {
                return Err(LeaseError::Held {
                    job_name,
                    holder: existing.holder.clone(),
                    remaining_secs: existing.remaining().num_seconds().max(0),
                });
            }
        }

        let lease = JobLease {
            id: Uuid::new_v4(),
            job_name,
            holder: holder.to_string(),
            acquired_at: Utc::now(),
            expires_at: Utc::now() + ttl,
        };
        leases.insert(job_name, lease.clone());
        Ok(lease)
    }

    pub async fn release(&self, job_name: JobName, holder: &str) -> Result<(), LeaseError> {
        let mut leases = self.leases.write().await;
        match leases.get(&job_name) {
            Some(existing) if existing.holder == holder => {
                leases.remove(&job_name);
                Ok(())
            }
            Some(existing) => Err(LeaseError::NotHolder {
                job_name,
                holder: existing.holder.clone(),
            }),
            None => Err(LeaseError::NotFound { job_name }),
        }
    }

    pub async fn status(&self, job_name: JobName) -> Option<JobLease> {
        let leases = self.leases.read().await;
        leases.get(&job_name).filter(|l| !l.is_expired()).cloned()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    #[error("job {job_name} leased by {holder} for {remaining_secs}s")]
    Held {
        job_name: JobName,
        holder: String,
        remaining_secs: i64,
    },
    #[error("job {job_name} lease not held by {holder}")]
    NotHolder { job_name: JobName, holder: String },
    #[error("no lease found for job {job_name}")]
    NotFound { job_name: JobName },
}
