//! Gate scope and resident lookup: database-backed implementations of the
//! collaborator traits, plus the pre-write authorization check used by
//! gate-initiated edits.

use std::collections::HashSet;

use domain::services::{LocationScope, ResidentDirectory};
use domain::VisitError;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::VisitingEntity;
use crate::metrics::QueryTimer;

/// Whether the gate keeper's assigned buildings cover the destination.
/// Runs on the caller's connection so writes can check scope inside
/// their own transaction.
pub(crate) async fn gate_scope_covers(
    conn: &mut PgConnection,
    gate_keeper_id: Uuid,
    destination_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM gate_keeper_posts p
            JOIN destinations d ON d.building_id = p.building_id
            WHERE p.gate_keeper_id = $1 AND d.id = $2 AND d.is_active
        )
        "#,
    )
    .bind(gate_keeper_id)
    .bind(destination_id)
    .fetch_one(conn)
    .await
}

/// Repository for gate-keeper authorization checks.
#[derive(Clone)]
pub struct GateScopeRepository {
    pool: PgPool,
}

impl GateScopeRepository {
    /// Creates a new GateScopeRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolves a visiting and verifies the gate keeper's building scope
    /// covers its destination.
    ///
    /// Transitions re-check scope inside their own transaction; this entry
    /// point guards the non-transition gate operations (visitor detail
    /// edits, code lookups).
    pub async fn authorize(
        &self,
        visiting_id: Uuid,
        gate_keeper_id: Uuid,
    ) -> Result<VisitingEntity, VisitError> {
        let timer = QueryTimer::new("authorize_gate_keeper");
        let result = self.authorize_inner(visiting_id, gate_keeper_id).await;
        timer.record();
        result
    }

    async fn authorize_inner(
        &self,
        visiting_id: Uuid,
        gate_keeper_id: Uuid,
    ) -> Result<VisitingEntity, VisitError> {
        let visiting = sqlx::query_as::<_, VisitingEntity>(
            r#"
            SELECT id, destination_id, category_id, visitor_id, resident_id, display_name,
                   headcount, leave_package, details, is_active, created_at, updated_at
            FROM visitings
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(visiting_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(VisitError::from)?
        .ok_or_else(|| VisitError::NotFound(format!("visiting {visiting_id} not found")))?;

        let mut conn = self.pool.acquire().await.map_err(VisitError::from)?;
        let in_scope = gate_scope_covers(&mut conn, gate_keeper_id, visiting.destination_id)
            .await
            .map_err(VisitError::from)?;

        if in_scope {
            Ok(visiting)
        } else {
            Err(VisitError::Unauthorized)
        }
    }
}

/// Database-backed gate-keeper destination scope.
#[derive(Clone)]
pub struct PgLocationScope {
    pool: PgPool,
}

impl PgLocationScope {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LocationScope for PgLocationScope {
    async fn assigned_destinations(
        &self,
        gate_keeper_id: Uuid,
    ) -> Result<HashSet<Uuid>, VisitError> {
        let timer = QueryTimer::new("assigned_destinations");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT d.id
            FROM destinations d
            JOIN gate_keeper_posts p ON p.building_id = d.building_id
            WHERE p.gate_keeper_id = $1 AND d.is_active
            "#,
        )
        .bind(gate_keeper_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(result.map_err(VisitError::from)?.into_iter().collect())
    }
}

/// Database-backed resident lookup.
#[derive(Clone)]
pub struct PgResidentDirectory {
    pool: PgPool,
}

impl PgResidentDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ResidentDirectory for PgResidentDirectory {
    async fn resident_for_destination(
        &self,
        destination_id: Uuid,
    ) -> Result<Option<Uuid>, VisitError> {
        let timer = QueryTimer::new("resident_for_destination");
        let result = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT resident_id FROM destinations WHERE id = $1 AND is_active",
        )
        .bind(destination_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result
            .map_err(VisitError::from)?
            .ok_or_else(|| VisitError::NotFound(format!("destination {destination_id} not found")))
    }
}
