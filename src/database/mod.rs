pub mod directory;
pub mod manager;
pub mod migrations;
pub mod models;
pub mod partition;
pub mod statements;

pub use directory::{PgTenantDirectory, TenantDirectory};
pub use manager::{ConnectionSource, DatabaseError, DatabaseManager, PgPartitionConnection};
pub use migrations::{Migration, SchemaMigrator};
pub use partition::{PartitionBackend, PartitionName};
