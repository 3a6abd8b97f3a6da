// SQL issued by the partition primitives. Identifiers cannot be bound as parameters,
// so partition names are validated by `PartitionName` and quoted here.

use crate::database::partition::PartitionName;

pub const PARTITION_EXISTS_SQL: &str =
    "SELECT schema_name FROM information_schema.schemata WHERE schema_name = $1";

pub const RESET_SEARCH_PATH_SQL: &str = "SET search_path TO public";

pub fn create_partition_sql(partition: &PartitionName) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(partition.as_str()))
}

pub fn activate_partition_sql(partition: &PartitionName) -> String {
    format!("SET search_path TO {}", quote_identifier(partition.as_str()))
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
