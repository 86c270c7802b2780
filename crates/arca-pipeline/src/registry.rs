//! Tenant-to-namespace resolution with idempotent provisioning.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use arca_core::{Result, TenantRepository, VectorIndex};

/// Resolves a tenant id to its index namespace, provisioning the
/// namespace on first use.
///
/// The provisioned set is an owned cache, not shared state: a cold
/// registry re-provisions on first resolution, which is harmless because
/// `ensure_namespace` is idempotent.
pub struct TenantIndexRegistry {
    tenants: Arc<dyn TenantRepository>,
    index: Arc<dyn VectorIndex>,
    provisioned: RwLock<HashSet<Uuid>>,
}

impl TenantIndexRegistry {
    pub fn new(tenants: Arc<dyn TenantRepository>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            tenants,
            index,
            provisioned: RwLock::new(HashSet::new()),
        }
    }

    /// Resolve the tenant's namespace, provisioning it in the index if
    /// this registry has not seen the tenant before.
    pub async fn namespace_for(&self, tenant_id: Uuid) -> Result<String> {
        let tenant = self.tenants.fetch(tenant_id).await?;

        if self.provisioned.read().await.contains(&tenant_id) {
            return Ok(tenant.namespace);
        }

        self.index.ensure_namespace(&tenant.namespace).await?;
        self.provisioned.write().await.insert(tenant_id);
        info!(tenant_id = %tenant_id, namespace = %tenant.namespace, "Provisioned index namespace");
        Ok(tenant.namespace)
    }

    /// Forget a tenant so the next resolution re-provisions. Used after
    /// a namespace is dropped out-of-band.
    pub async fn invalidate(&self, tenant_id: Uuid) {
        self.provisioned.write().await.remove(&tenant_id);
    }
}
