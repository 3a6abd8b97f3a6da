//! Per-connection partition state.
//!
//! A `SchemaContext` owns one database connection together with the name of the partition
//! that connection currently points at. All partition switches go through `activate` or one
//! of the scoped acquisitions, which restore the previous partition when the enclosed work
//! finishes, whether it returned `Ok` or `Err`.

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::database::{DatabaseError, PartitionBackend, PartitionName};

/// Outcome of an `activate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The requested partition was already active; nothing was issued
    Unchanged,
    /// The connection now points at the requested partition
    Switched,
    /// The requested partition does not exist; the shared partition is active instead
    FellBack { requested: PartitionName },
}

/// Entry and exit behaviour of `SchemaContext::with_partition`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeOptions {
    pub create_if_missing: bool,
    pub restore_to_shared: bool,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            restore_to_shared: true,
        }
    }
}

impl ScopeOptions {
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn restore_to_shared(mut self, restore: bool) -> Self {
        self.restore_to_shared = restore;
        self
    }
}

enum ExitTarget {
    Shared,
    Partition(PartitionName),
}

pub struct SchemaContext<B> {
    conn: B,
    current: PartitionName,
}

impl<B: PartitionBackend> SchemaContext<B> {
    /// Wrap a connection that currently points at the shared partition
    pub fn new(conn: B) -> Self {
        Self {
            conn,
            current: PartitionName::shared(),
        }
    }

    pub fn current_partition(&self) -> &PartitionName {
        &self.current
    }

    /// The underlying connection, for running queries against the active partition.
    /// Switching partitions through it directly bypasses the context's bookkeeping.
    pub fn connection(&mut self) -> &mut B {
        &mut self.conn
    }

    pub async fn partition_exists(&mut self, partition: &PartitionName) -> Result<bool, DatabaseError> {
        self.conn.partition_exists(partition).await
    }

    /// Point the connection at `partition`, or at the shared partition when `partition`
    /// does not exist. Only database failures are returned as errors.
    pub async fn activate(&mut self, partition: &PartitionName) -> Result<Activation, DatabaseError> {
        if self.current == *partition {
            return Ok(Activation::Unchanged);
        }

        let (target, outcome) =
            if partition.is_shared() || self.conn.partition_exists(partition).await? {
                (partition.clone(), Activation::Switched)
            } else {
                warn!("Partition {} does not exist, falling back to shared partition", partition);
                (
                    PartitionName::shared(),
                    Activation::FellBack {
                        requested: partition.clone(),
                    },
                )
            };

        if self.current != target {
            self.conn.set_active_partition(&target).await?;
            debug!("Activated partition {} (was {})", target, self.current);
            self.current = target;
        }

        Ok(outcome)
    }

    /// Run `body` with `partition` active.
    ///
    /// On entry the partition is created first when `options.create_if_missing` is set. On
    /// exit the shared partition is restored when `options.restore_to_shared` is set,
    /// otherwise the partition that was active before entry. The restore runs exactly once,
    /// also when entry or `body` fails; the body's error takes precedence over a restore error.
    pub async fn with_partition<T, E, F>(
        &mut self,
        partition: &PartitionName,
        options: ScopeOptions,
        body: F,
    ) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut SchemaContext<B>) -> BoxFuture<'c, Result<T, E>> + Send,
        E: From<DatabaseError> + Send,
        T: Send,
    {
        let exit = if options.restore_to_shared {
            ExitTarget::Shared
        } else {
            ExitTarget::Partition(self.current.clone())
        };

        let outcome = match self.enter(partition, options.create_if_missing).await {
            Ok(()) => body(&mut *self).await,
            Err(err) => Err(E::from(err)),
        };

        self.exit(exit, outcome).await
    }

    /// Run `body` with the shared partition active, then activate `restore_to` when it names
    /// a tenant partition. Without one the shared partition stays active.
    pub async fn with_shared_partition<T, E, F>(
        &mut self,
        restore_to: Option<PartitionName>,
        body: F,
    ) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut SchemaContext<B>) -> BoxFuture<'c, Result<T, E>> + Send,
        E: From<DatabaseError> + Send,
        T: Send,
    {
        let exit = match restore_to {
            Some(partition) if !partition.is_shared() => ExitTarget::Partition(partition),
            _ => ExitTarget::Shared,
        };

        let outcome = match self.activate(&PartitionName::shared()).await {
            Ok(_) => body(&mut *self).await,
            Err(err) => Err(E::from(err)),
        };

        self.exit(exit, outcome).await
    }

    async fn enter(&mut self, partition: &PartitionName, create_if_missing: bool) -> Result<(), DatabaseError> {
        if create_if_missing && !partition.is_shared() && !self.conn.partition_exists(partition).await? {
            self.conn.create_partition(partition).await?;
            info!("Created partition {}", partition);
        }
        self.activate(partition).await?;
        Ok(())
    }

    async fn exit<T, E>(&mut self, target: ExitTarget, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<DatabaseError>,
    {
        let target = match target {
            ExitTarget::Shared => PartitionName::shared(),
            ExitTarget::Partition(partition) => partition,
        };

        match (outcome, self.activate(&target).await) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(restore_err)) => Err(E::from(restore_err)),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(restore_err)) => {
                warn!("Failed to restore partition {}: {}", target, restore_err);
                Err(err)
            }
        }
    }
}
