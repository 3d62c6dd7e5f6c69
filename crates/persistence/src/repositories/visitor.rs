//! Visitor registry repository.
//!
//! Visitors are keyed by mobile number: the registry upserts, never
//! duplicates.

use domain::models::visiting::VisitorIdentityRequest;
use domain::VisitError;
use sqlx::{PgConnection, PgPool};

use crate::entities::VisitorEntity;
use crate::metrics::QueryTimer;

/// Upsert a visitor inside an existing connection or transaction.
///
/// Document fields and the profile picture only ever gain information:
/// an absent value in the incoming identity does not clear a stored one.
pub(crate) async fn upsert_visitor(
    conn: &mut PgConnection,
    identity: &VisitorIdentityRequest,
) -> Result<VisitorEntity, sqlx::Error> {
    let details = if identity.details.is_null() {
        serde_json::json!({})
    } else {
        identity.details.clone()
    };

    sqlx::query_as::<_, VisitorEntity>(
        r#"
        INSERT INTO visitors (country_code, mobile_number, name, document_id, document_type,
                              document_country, document_expiry, document_issued, details,
                              profile_picture_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (mobile_number) DO UPDATE SET
            country_code = EXCLUDED.country_code,
            name = EXCLUDED.name,
            document_id = COALESCE(EXCLUDED.document_id, visitors.document_id),
            document_type = COALESCE(EXCLUDED.document_type, visitors.document_type),
            document_country = COALESCE(EXCLUDED.document_country, visitors.document_country),
            document_expiry = COALESCE(EXCLUDED.document_expiry, visitors.document_expiry),
            document_issued = COALESCE(EXCLUDED.document_issued, visitors.document_issued),
            details = visitors.details || EXCLUDED.details,
            profile_picture_url = COALESCE(EXCLUDED.profile_picture_url, visitors.profile_picture_url),
            updated_at = NOW()
        RETURNING id, country_code, mobile_number, name, document_id, document_type,
                  document_country, document_expiry, document_issued, details,
                  profile_picture_url, is_active, created_at, updated_at
        "#,
    )
    .bind(&identity.country_code)
    .bind(&identity.mobile_number)
    .bind(&identity.name)
    .bind(&identity.document_id)
    .bind(&identity.document_type)
    .bind(&identity.document_country)
    .bind(identity.document_expiry)
    .bind(identity.document_issued)
    .bind(details)
    .bind(&identity.profile_picture_url)
    .fetch_one(conn)
    .await
}

/// Repository for visitor-registry database operations.
#[derive(Clone)]
pub struct VisitorRepository {
    pool: PgPool,
}

impl VisitorRepository {
    /// Creates a new VisitorRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a visitor by mobile number and return the stored record.
    pub async fn upsert(&self, identity: &VisitorIdentityRequest) -> Result<VisitorEntity, VisitError> {
        let timer = QueryTimer::new("upsert_visitor");
        let mut conn = self.pool.acquire().await.map_err(VisitError::from)?;
        let result = upsert_visitor(&mut conn, identity).await;
        timer.record();
        result.map_err(VisitError::from)
    }

    /// Find a visitor by mobile number.
    pub async fn find_by_mobile(&self, mobile_number: &str) -> Result<Option<VisitorEntity>, VisitError> {
        let timer = QueryTimer::new("find_visitor_by_mobile");
        let result = sqlx::query_as::<_, VisitorEntity>(
            r#"
            SELECT id, country_code, mobile_number, name, document_id, document_type,
                   document_country, document_expiry, document_issued, details,
                   profile_picture_url, is_active, created_at, updated_at
            FROM visitors
            WHERE mobile_number = $1 AND is_active
            "#,
        )
        .bind(mobile_number)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result.map_err(VisitError::from)
    }
}
