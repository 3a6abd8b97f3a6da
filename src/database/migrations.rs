// Schema migrations. Statements are unqualified and land in whichever partition is active,
// so they must only run inside a scoped acquisition of the intended partition.

use async_trait::async_trait;
use tracing::debug;

use crate::database::manager::{DatabaseError, PgPartitionConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Tables living only in the shared partition
pub const SHARED_MIGRATIONS: &[Migration] = &[Migration {
    name: "0001_create_tenants",
    sql: r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id              UUID PRIMARY KEY,
            owner_id        UUID NULL,
            subdomain       VARCHAR(60) NOT NULL UNIQUE,
            schema_name     VARCHAR(63) NOT NULL UNIQUE,
            is_active       BOOLEAN NOT NULL DEFAULT TRUE,
            activated_at    TIMESTAMPTZ NULL,
            deactivated_at  TIMESTAMPTZ NULL,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (activated_at IS NULL OR deactivated_at IS NULL)
        )
    "#,
}];

/// Tables created inside every tenant partition
pub const TENANT_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_departments",
        sql: r#"
            CREATE TABLE IF NOT EXISTS departments (
                id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name        VARCHAR(100) NOT NULL UNIQUE,
                description TEXT NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
    },
    Migration {
        name: "0002_create_employee_profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS employee_profiles (
                id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                account_id    UUID NOT NULL UNIQUE,
                department_id UUID NULL REFERENCES departments(id) ON DELETE SET NULL,
                total_leaves  INTEGER NOT NULL DEFAULT 20
            )
        "#,
    },
    Migration {
        name: "0003_create_hr_profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS hr_profiles (
                id         UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                account_id UUID NOT NULL UNIQUE,
                is_admin   BOOLEAN NOT NULL DEFAULT FALSE
            )
        "#,
    },
    Migration {
        name: "0004_create_hr_approvals",
        sql: r#"
            CREATE TABLE IF NOT EXISTS hr_approvals (
                id               UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                username         VARCHAR(150) NOT NULL UNIQUE,
                email            VARCHAR(254) NOT NULL UNIQUE,
                is_admin         BOOLEAN NOT NULL DEFAULT FALSE,
                status           VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                applied_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                reviewed_at      TIMESTAMPTZ NULL,
                reviewed_by      UUID NULL,
                rejection_reason TEXT NULL
            )
        "#,
    },
    Migration {
        name: "0005_create_employee_approvals",
        sql: r#"
            CREATE TABLE IF NOT EXISTS employee_approvals (
                id               UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                username         VARCHAR(150) NOT NULL UNIQUE,
                email            VARCHAR(254) NOT NULL UNIQUE,
                department_id    UUID NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
                total_leaves     INTEGER NOT NULL DEFAULT 20,
                status           VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                applied_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                reviewed_at      TIMESTAMPTZ NULL,
                reviewed_by      UUID NULL,
                rejection_reason TEXT NULL
            )
        "#,
    },
    Migration {
        name: "0006_create_attendance",
        sql: r#"
            CREATE TABLE IF NOT EXISTS attendance (
                id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                employee_id UUID NOT NULL REFERENCES employee_profiles(id) ON DELETE CASCADE,
                date        DATE NOT NULL,
                status      VARCHAR(10) NOT NULL,
                marked_by   UUID NULL REFERENCES hr_profiles(id) ON DELETE SET NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (employee_id, date)
            )
        "#,
    },
    Migration {
        name: "0007_create_attendance_requests",
        sql: r#"
            CREATE TABLE IF NOT EXISTS attendance_requests (
                id               UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                employee_id      UUID NOT NULL REFERENCES employee_profiles(id) ON DELETE CASCADE,
                date             DATE NOT NULL,
                requested_status VARCHAR(10) NOT NULL,
                reason           TEXT NOT NULL,
                status           VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                reviewed_by      UUID NULL REFERENCES hr_profiles(id) ON DELETE SET NULL,
                reviewed_at      TIMESTAMPTZ NULL,
                created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
    },
];

pub const SEED_DEFAULT_DEPARTMENTS: Migration = Migration {
    name: "seed_default_departments",
    sql: r#"
        INSERT INTO departments (name, description) VALUES
            ('Engineering', 'Software development and technical teams'),
            ('Sales', 'Sales and business development'),
            ('Marketing', 'Marketing and communications'),
            ('Operations', 'Operations and logistics'),
            ('Human Resources', 'HR and people operations'),
            ('Finance', 'Finance and accounting'),
            ('Customer Support', 'Customer service and support')
        ON CONFLICT (name) DO NOTHING
    "#,
};

/// Runs migrations against whatever partition the connection currently points at
#[async_trait]
pub trait SchemaMigrator: Send {
    async fn run_migrations(&mut self, migrations: &[Migration]) -> Result<usize, DatabaseError>;
}

#[async_trait]
impl SchemaMigrator for PgPartitionConnection {
    async fn run_migrations(&mut self, migrations: &[Migration]) -> Result<usize, DatabaseError> {
        for migration in migrations {
            debug!("Applying migration {}", migration.name);
            sqlx::query(migration.sql).execute(&mut **self).await?;
        }
        Ok(migrations.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_rerunnable() {
        for migration in SHARED_MIGRATIONS.iter().chain(TENANT_MIGRATIONS) {
            assert!(
                migration.sql.contains("IF NOT EXISTS"),
                "{} must be idempotent",
                migration.name
            );
        }
        assert!(SEED_DEFAULT_DEPARTMENTS.sql.contains("ON CONFLICT (name) DO NOTHING"));
    }

    #[test]
    fn migrations_do_not_qualify_schemas() {
        for migration in TENANT_MIGRATIONS {
            assert!(!migration.sql.contains("public."), "{}", migration.name);
        }
    }
}
