use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::partition::PartitionName;

/// Row of the `tenants` directory table in the shared partition
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantRecord {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub subdomain: String,
    pub schema_name: String,
    pub is_active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantRecord {
    pub fn partition(&self) -> Result<PartitionName, DatabaseError> {
        PartitionName::parse(&self.schema_name)
    }

    /// Flip the active flag, keeping exactly one of the two timestamps set.
    /// Setting the current value again leaves the timestamps untouched.
    pub fn apply_active(&mut self, active: bool, now: DateTime<Utc>) {
        if self.is_active != active {
            let stamps = ActivationStamps::for_state(active, now);
            self.activated_at = stamps.activated_at;
            self.deactivated_at = stamps.deactivated_at;
            self.is_active = active;
        }
        self.updated_at = now;
    }
}

/// Values for a tenant row about to be inserted
#[derive(Debug, Clone)]
pub struct NewTenantRecord {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub subdomain: String,
    pub partition: PartitionName,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationStamps {
    pub activated_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl ActivationStamps {
    pub fn for_state(active: bool, now: DateTime<Utc>) -> Self {
        if active {
            Self { activated_at: Some(now), deactivated_at: None }
        } else {
            Self { activated_at: None, deactivated_at: Some(now) }
        }
    }
}
