//! Visiting record store: creation, preapproval edits, soft delete, and
//! gate lookups.
//!
//! Creation paths are single transactions covering the visitor upsert,
//! the visiting row, and (for preapprovals) the window, so a failure
//! leaves nothing half-created.

use chrono::{DateTime, Utc};
use domain::models::visiting::{CreatePreapprovedRequest, CreateWalkInRequest, UpdatePreapprovalRequest};
use domain::VisitError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{
    CategoryClassDb, StatusEventEntity, VisitingEntity, VisitingStatusDb, VisitingWithWindowEntity,
    WindowEntity,
};
use crate::metrics::QueryTimer;
use crate::repositories::ledger::insert_status_event;
use crate::repositories::visitor::upsert_visitor;

const VIEW_COLUMNS: &str = r#"
    v.id, v.destination_id, v.category_id, v.visitor_id, v.resident_id,
    v.display_name, v.headcount, v.leave_package, v.details, v.is_active,
    v.created_at, v.updated_at,
    w.id AS window_id, w.in_time, w.out_time, w.is_frequent, w.visitor_code,
    w.created_at AS window_created_at, w.updated_at AS window_updated_at,
    e.status AS last_status
"#;

/// Repository for visiting-record database operations.
#[derive(Clone)]
pub struct VisitingRepository {
    pool: PgPool,
}

impl VisitingRepository {
    /// Creates a new VisitingRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Generate a visitor code not already assigned to a window.
    pub async fn generate_unique_code<F>(&self, generator: F) -> Result<String, VisitError>
    where
        F: Fn() -> String,
    {
        let mut code = generator();
        let mut attempts = 0;

        while self.code_exists(&code).await? {
            code = generator();
            attempts += 1;
            if attempts > 100 {
                return Err(VisitError::Store(sqlx::Error::Protocol(
                    "Could not generate unique visitor code".to_string(),
                )));
            }
        }

        Ok(code)
    }

    async fn code_exists(&self, code: &str) -> Result<bool, VisitError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM preapproved_windows WHERE visitor_code = $1)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(VisitError::from)?;
        Ok(exists)
    }

    /// Create a preapproved visiting with its window (and visitor upsert,
    /// when an identity was supplied) in one transaction.
    ///
    /// `in_time`/`out_time` must already be resolved and validated;
    /// `visitor_code` is required for one-off windows.
    pub async fn create_preapproved(
        &self,
        request: &CreatePreapprovedRequest,
        in_time: DateTime<Utc>,
        out_time: DateTime<Utc>,
        visitor_code: Option<String>,
    ) -> Result<(VisitingEntity, WindowEntity), VisitError> {
        let timer = QueryTimer::new("create_preapproved_visiting");
        let result = self
            .create_preapproved_inner(request, in_time, out_time, visitor_code)
            .await;
        timer.record();
        result
    }

    async fn create_preapproved_inner(
        &self,
        request: &CreatePreapprovedRequest,
        in_time: DateTime<Utc>,
        out_time: DateTime<Utc>,
        visitor_code: Option<String>,
    ) -> Result<(VisitingEntity, WindowEntity), VisitError> {
        let mut tx = self.pool.begin().await.map_err(VisitError::from)?;

        check_destination(&mut tx, request.destination_id).await?;
        check_category(&mut tx, request.category_id).await?;

        let visitor_id = match &request.visitor {
            Some(identity) => Some(
                upsert_visitor(&mut tx, identity)
                    .await
                    .map_err(VisitError::from)?
                    .id,
            ),
            None => None,
        };

        let visiting = sqlx::query_as::<_, VisitingEntity>(
            r#"
            INSERT INTO visitings (destination_id, category_id, visitor_id, resident_id,
                                   display_name, headcount, leave_package, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, destination_id, category_id, visitor_id, resident_id, display_name,
                      headcount, leave_package, details, is_active, created_at, updated_at
            "#,
        )
        .bind(request.destination_id)
        .bind(request.category_id)
        .bind(visitor_id)
        .bind(request.resident_id)
        .bind(request.display_name.trim())
        .bind(request.headcount)
        .bind(request.leave_package)
        .bind(non_null(&request.details))
        .fetch_one(&mut *tx)
        .await
        .map_err(VisitError::from)?;

        let window = sqlx::query_as::<_, WindowEntity>(
            r#"
            INSERT INTO preapproved_windows (visiting_id, in_time, out_time, is_frequent, visitor_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, visiting_id, in_time, out_time, is_frequent, visitor_code,
                      created_at, updated_at
            "#,
        )
        .bind(visiting.id)
        .bind(in_time)
        .bind(out_time)
        .bind(request.window.is_frequent)
        .bind(visitor_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(VisitError::from)?;

        tx.commit().await.map_err(VisitError::from)?;
        Ok((visiting, window))
    }

    /// Create a walk-in visiting and seed its initial ledger event in one
    /// transaction.
    pub async fn create_walk_in(
        &self,
        request: &CreateWalkInRequest,
        initial_status: VisitingStatusDb,
    ) -> Result<(VisitingEntity, StatusEventEntity), VisitError> {
        let timer = QueryTimer::new("create_walk_in_visiting");
        let result = self.create_walk_in_inner(request, initial_status).await;
        timer.record();
        result
    }

    async fn create_walk_in_inner(
        &self,
        request: &CreateWalkInRequest,
        initial_status: VisitingStatusDb,
    ) -> Result<(VisitingEntity, StatusEventEntity), VisitError> {
        let mut tx = self.pool.begin().await.map_err(VisitError::from)?;

        check_destination(&mut tx, request.destination_id).await?;
        check_category(&mut tx, request.category_id).await?;

        let visitor_id = match &request.visitor {
            Some(identity) => Some(
                upsert_visitor(&mut tx, identity)
                    .await
                    .map_err(VisitError::from)?
                    .id,
            ),
            None => None,
        };

        let visiting = sqlx::query_as::<_, VisitingEntity>(
            r#"
            INSERT INTO visitings (destination_id, category_id, visitor_id,
                                   display_name, headcount, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, destination_id, category_id, visitor_id, resident_id, display_name,
                      headcount, leave_package, details, is_active, created_at, updated_at
            "#,
        )
        .bind(request.destination_id)
        .bind(request.category_id)
        .bind(visitor_id)
        .bind(request.display_name.trim())
        .bind(request.headcount)
        .bind(non_null(&request.details))
        .fetch_one(&mut *tx)
        .await
        .map_err(VisitError::from)?;

        let event = insert_status_event(
            &mut tx,
            visiting.id,
            initial_status,
            Some(request.gate_keeper_id),
        )
        .await
        .map_err(VisitError::from)?;

        tx.commit().await.map_err(VisitError::from)?;
        Ok((visiting, event))
    }

    /// A visiting with its window and latest status.
    pub async fn find_view(
        &self,
        visiting_id: Uuid,
    ) -> Result<Option<VisitingWithWindowEntity>, VisitError> {
        let timer = QueryTimer::new("find_visiting_view");
        let sql = format!(
            r#"
            SELECT {VIEW_COLUMNS}
            FROM visitings v
            LEFT JOIN preapproved_windows w ON w.visiting_id = v.id
            LEFT JOIN LATERAL (
                SELECT status FROM visiting_status_events
                WHERE visiting_id = v.id ORDER BY seq DESC LIMIT 1
            ) e ON TRUE
            WHERE v.id = $1 AND v.is_active
            "#
        );
        let result = sqlx::query_as::<_, VisitingWithWindowEntity>(&sql)
            .bind(visiting_id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result.map_err(VisitError::from)
    }

    /// Gate lookup by shareable visitor code.
    pub async fn find_by_code(
        &self,
        code: &str,
    ) -> Result<Option<VisitingWithWindowEntity>, VisitError> {
        let timer = QueryTimer::new("find_visiting_by_code");
        let sql = format!(
            r#"
            SELECT {VIEW_COLUMNS}
            FROM visitings v
            JOIN preapproved_windows w ON w.visiting_id = v.id
            LEFT JOIN LATERAL (
                SELECT status FROM visiting_status_events
                WHERE visiting_id = v.id ORDER BY seq DESC LIMIT 1
            ) e ON TRUE
            WHERE w.visitor_code = $1 AND v.is_active
            "#
        );
        let result = sqlx::query_as::<_, VisitingWithWindowEntity>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result.map_err(VisitError::from)
    }

    /// Cursor-paginated feed of a destination's visitings, newest first.
    pub async fn feed_for_destination(
        &self,
        destination_id: Uuid,
        cursor: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<VisitingWithWindowEntity>, VisitError> {
        let timer = QueryTimer::new("visiting_feed_for_destination");

        let result = if let Some((before_at, before_id)) = cursor {
            let sql = format!(
                r#"
                SELECT {VIEW_COLUMNS}
                FROM visitings v
                LEFT JOIN preapproved_windows w ON w.visiting_id = v.id
                LEFT JOIN LATERAL (
                    SELECT status FROM visiting_status_events
                    WHERE visiting_id = v.id ORDER BY seq DESC LIMIT 1
                ) e ON TRUE
                WHERE v.destination_id = $1 AND v.is_active
                  AND (v.created_at, v.id) < ($2, $3)
                ORDER BY v.created_at DESC, v.id DESC
                LIMIT $4
                "#
            );
            sqlx::query_as::<_, VisitingWithWindowEntity>(&sql)
                .bind(destination_id)
                .bind(before_at)
                .bind(before_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        } else {
            let sql = format!(
                r#"
                SELECT {VIEW_COLUMNS}
                FROM visitings v
                LEFT JOIN preapproved_windows w ON w.visiting_id = v.id
                LEFT JOIN LATERAL (
                    SELECT status FROM visiting_status_events
                    WHERE visiting_id = v.id ORDER BY seq DESC LIMIT 1
                ) e ON TRUE
                WHERE v.destination_id = $1 AND v.is_active
                ORDER BY v.created_at DESC, v.id DESC
                LIMIT $2
                "#
            );
            sqlx::query_as::<_, VisitingWithWindowEntity>(&sql)
                .bind(destination_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        };
        timer.record();
        result.map_err(VisitError::from)
    }

    /// Point updates to a preapproval before any gate activity.
    ///
    /// `window_times` carries the already-validated replacement window,
    /// when the caller supplied one.
    pub async fn update_preapproval(
        &self,
        visiting_id: Uuid,
        request: &UpdatePreapprovalRequest,
        window_times: Option<(DateTime<Utc>, DateTime<Utc>, bool)>,
    ) -> Result<(VisitingEntity, Option<WindowEntity>), VisitError> {
        let timer = QueryTimer::new("update_preapproval");
        let result = self
            .update_preapproval_inner(visiting_id, request, window_times)
            .await;
        timer.record();
        result
    }

    async fn update_preapproval_inner(
        &self,
        visiting_id: Uuid,
        request: &UpdatePreapprovalRequest,
        window_times: Option<(DateTime<Utc>, DateTime<Utc>, bool)>,
    ) -> Result<(VisitingEntity, Option<WindowEntity>), VisitError> {
        let mut tx = self.pool.begin().await.map_err(VisitError::from)?;

        let existing = sqlx::query_as::<_, VisitingEntity>(
            r#"
            SELECT id, destination_id, category_id, visitor_id, resident_id, display_name,
                   headcount, leave_package, details, is_active, created_at, updated_at
            FROM visitings
            WHERE id = $1 AND is_active
            FOR UPDATE
            "#,
        )
        .bind(visiting_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(VisitError::from)?
        .ok_or_else(|| VisitError::NotFound(format!("visiting {visiting_id} not found")))?;

        if existing.resident_id != Some(request.resident_id) {
            return Err(VisitError::Unauthorized);
        }

        let has_events: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM visiting_status_events WHERE visiting_id = $1)",
        )
        .bind(visiting_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(VisitError::from)?;
        if has_events {
            return Err(VisitError::Validation(
                "preapproval cannot be edited after gate activity".into(),
            ));
        }

        if let Some(new_category_id) = request.category_id {
            if new_category_id != existing.category_id {
                check_same_category_class(&mut tx, existing.category_id, new_category_id).await?;
            }
        }

        let visiting = sqlx::query_as::<_, VisitingEntity>(
            r#"
            UPDATE visitings
            SET category_id = COALESCE($2, category_id),
                headcount = COALESCE($3, headcount),
                leave_package = COALESCE($4, leave_package),
                details = COALESCE($5, details),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, destination_id, category_id, visitor_id, resident_id, display_name,
                      headcount, leave_package, details, is_active, created_at, updated_at
            "#,
        )
        .bind(visiting_id)
        .bind(request.category_id)
        .bind(request.headcount)
        .bind(request.leave_package)
        .bind(request.details.clone())
        .fetch_one(&mut *tx)
        .await
        .map_err(VisitError::from)?;

        let window = if let Some((in_time, out_time, is_frequent)) = window_times {
            let updated = sqlx::query_as::<_, WindowEntity>(
                r#"
                UPDATE preapproved_windows
                SET in_time = $2, out_time = $3, is_frequent = $4, updated_at = NOW()
                WHERE visiting_id = $1
                RETURNING id, visiting_id, in_time, out_time, is_frequent, visitor_code,
                          created_at, updated_at
                "#,
            )
            .bind(visiting_id)
            .bind(in_time)
            .bind(out_time)
            .bind(is_frequent)
            .fetch_optional(&mut *tx)
            .await
            .map_err(VisitError::from)?;

            Some(updated.ok_or_else(|| {
                VisitError::NotFound(format!("visiting {visiting_id} has no preapproval window"))
            })?)
        } else {
            None
        };

        tx.commit().await.map_err(VisitError::from)?;
        Ok((visiting, window))
    }

    /// Gate edit of the visitor identity attached to a visiting.
    ///
    /// The gate keeper's scope is checked inside the same transaction as
    /// the upsert and the link, so a mid-operation reassignment cannot
    /// slip through.
    pub async fn update_visitor_details(
        &self,
        visiting_id: Uuid,
        gate_keeper_id: Uuid,
        identity: &domain::models::visiting::VisitorIdentityRequest,
    ) -> Result<crate::entities::VisitorEntity, VisitError> {
        let timer = QueryTimer::new("update_visitor_details");
        let result = self
            .update_visitor_details_inner(visiting_id, gate_keeper_id, identity)
            .await;
        timer.record();
        result
    }

    async fn update_visitor_details_inner(
        &self,
        visiting_id: Uuid,
        gate_keeper_id: Uuid,
        identity: &domain::models::visiting::VisitorIdentityRequest,
    ) -> Result<crate::entities::VisitorEntity, VisitError> {
        let mut tx = self.pool.begin().await.map_err(VisitError::from)?;

        let destination_id: Uuid = sqlx::query_scalar(
            "SELECT destination_id FROM visitings WHERE id = $1 AND is_active FOR UPDATE",
        )
        .bind(visiting_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(VisitError::from)?
        .ok_or_else(|| VisitError::NotFound(format!("visiting {visiting_id} not found")))?;

        let in_scope = crate::repositories::gate_scope::gate_scope_covers(
            &mut tx,
            gate_keeper_id,
            destination_id,
        )
        .await
        .map_err(VisitError::from)?;
        if !in_scope {
            return Err(VisitError::Unauthorized);
        }

        let visitor = upsert_visitor(&mut tx, identity)
            .await
            .map_err(VisitError::from)?;

        sqlx::query("UPDATE visitings SET visitor_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(visiting_id)
            .bind(visitor.id)
            .execute(&mut *tx)
            .await
            .map_err(VisitError::from)?;

        tx.commit().await.map_err(VisitError::from)?;
        Ok(visitor)
    }

    /// Soft-delete a preapproval. Only the resident who created it may
    /// delete it; queued notices are revoked by the caller.
    pub async fn soft_delete(
        &self,
        visiting_id: Uuid,
        resident_id: Uuid,
    ) -> Result<(), VisitError> {
        let timer = QueryTimer::new("soft_delete_visiting");
        let result = self.soft_delete_inner(visiting_id, resident_id).await;
        timer.record();
        result
    }

    async fn soft_delete_inner(&self, visiting_id: Uuid, resident_id: Uuid) -> Result<(), VisitError> {
        let mut tx = self.pool.begin().await.map_err(VisitError::from)?;

        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT resident_id FROM visitings WHERE id = $1 AND is_active FOR UPDATE",
        )
        .bind(visiting_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(VisitError::from)?
        .ok_or_else(|| VisitError::NotFound(format!("visiting {visiting_id} not found")))?;

        if owner != Some(resident_id) {
            return Err(VisitError::Unauthorized);
        }

        sqlx::query("UPDATE visitings SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(visiting_id)
            .execute(&mut *tx)
            .await
            .map_err(VisitError::from)?;

        tx.commit().await.map_err(VisitError::from)?;
        Ok(())
    }
}

fn non_null(details: &serde_json::Value) -> serde_json::Value {
    if details.is_null() {
        serde_json::json!({})
    } else {
        details.clone()
    }
}

async fn check_destination(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    destination_id: Uuid,
) -> Result<(), VisitError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM destinations WHERE id = $1 AND is_active)")
            .bind(destination_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(VisitError::from)?;
    if exists {
        Ok(())
    } else {
        Err(VisitError::NotFound(format!(
            "destination {destination_id} not found"
        )))
    }
}

async fn check_category(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    category_id: Uuid,
) -> Result<(), VisitError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM visit_categories WHERE id = $1)")
            .bind(category_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(VisitError::from)?;
    if exists {
        Ok(())
    } else {
        Err(VisitError::NotFound(format!(
            "visit category {category_id} not found"
        )))
    }
}

async fn check_same_category_class(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    current_category_id: Uuid,
    new_category_id: Uuid,
) -> Result<(), VisitError> {
    let current_class: CategoryClassDb =
        sqlx::query_scalar("SELECT class FROM visit_categories WHERE id = $1")
            .bind(current_category_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(VisitError::from)?;

    let new_class: Option<CategoryClassDb> =
        sqlx::query_scalar("SELECT class FROM visit_categories WHERE id = $1")
            .bind(new_category_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(VisitError::from)?;

    match new_class {
        None => Err(VisitError::NotFound(format!(
            "visit category {new_category_id} not found"
        ))),
        Some(class) if class == current_class => Ok(()),
        Some(_) => Err(VisitError::Validation(
            "category class cannot change after creation".into(),
        )),
    }
}
