//! # Role Upgrade Repository
//!
//! Requests to be elevated to `horizon_planner` or `venue_manager`, and the
//! admin decision on them. At most one request per user and role may be
//! pending; a partial unique index enforces it.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::MAX_CAS_ATTEMPTS;
use crate::error::{DbError, DbResult};
use horizon_core::identity::new_id;
use horizon_core::lifecycle::{plan_transition, Outcome, Transition};
use horizon_core::validation::{validate_text, MAX_TEXT_LEN};
use horizon_core::{
    ApprovalStatus, CoreError, Decision, RoleUpgradeRequest, User, UserRole, ValidationError,
};

#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RoleRepository { pool }
    }

    pub async fn create_request(
        &self,
        user_id: &str,
        role: UserRole,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DbResult<RoleUpgradeRequest> {
        if !role.is_requestable() {
            return Err(ValidationError::InvalidFormat {
                field: "requested_role".to_string(),
                reason: format!("{role} cannot be requested"),
            }
            .into());
        }
        validate_text("reason", reason, MAX_TEXT_LEN)?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", user_id))?;
        if user.role == role {
            return Err(CoreError::invalid_state("user", user_id, user.role, role).into());
        }

        let request = RoleUpgradeRequest {
            id: new_id(),
            user_id: user_id.to_string(),
            requested_role: role,
            reason: reason.trim().to_string(),
            status: ApprovalStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO role_upgrade_requests (id, user_id, requested_role, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(&request.user_id)
        .bind(request.requested_role)
        .bind(&request.reason)
        .bind(request.status)
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from);

        if let Err(err) = inserted {
            if err.is_unique_violation_on("role_upgrade_requests") {
                return Err(CoreError::UniquenessViolation {
                    field: "pending role request".to_string(),
                    value: format!("{user_id}:{role}"),
                }
                .into());
            }
            return Err(err);
        }

        info!(request_id = %request.id, user_id = %user_id, role = %role, "Role upgrade requested");
        Ok(request)
    }

    /// Approves or rejects a pending request. Approval changes the user's
    /// role in the same transaction.
    pub async fn decide(
        &self,
        request_id: &str,
        decision: Decision,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Outcome<RoleUpgradeRequest>> {
        let target = decision.approval_status();

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.require(request_id).await?;

            if plan_transition("role_upgrade_request", request_id, current.status, target)?
                == Transition::Duplicate
            {
                debug!(request_id = %request_id, status = %target, "Role request already decided");
                return Ok(Outcome::Duplicate(current));
            }

            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE role_upgrade_requests
                   SET status = ?, reviewed_by = ?, reviewed_at = ?
                 WHERE id = ? AND status = ?
                "#,
            )
            .bind(target)
            .bind(reviewer_id)
            .bind(now)
            .bind(request_id)
            .bind(current.status)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(request_id = %request_id, attempt, "Role request changed concurrently, retrying");
                continue;
            }

            if target == ApprovalStatus::Approved {
                sqlx::query("UPDATE users SET role = ? WHERE id = ?")
                    .bind(current.requested_role)
                    .bind(&current.user_id)
                    .execute(&mut *tx)
                    .await?;
            }

            tx.commit().await?;

            info!(
                request_id = %request_id,
                user_id = %current.user_id,
                decision = %target,
                reviewer = %reviewer_id,
                "Role request decided"
            );

            return Ok(Outcome::Applied(RoleUpgradeRequest {
                status: target,
                reviewed_by: Some(reviewer_id.to_string()),
                reviewed_at: Some(now),
                ..current
            }));
        }

        Err(DbError::TransactionFailed(format!(
            "role request {request_id} kept changing during review"
        )))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<RoleUpgradeRequest>> {
        let request =
            sqlx::query_as::<_, RoleUpgradeRequest>("SELECT * FROM role_upgrade_requests WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(request)
    }

    pub async fn require(&self, id: &str) -> DbResult<RoleUpgradeRequest> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Role request", id))
    }

    pub async fn list_pending(&self) -> DbResult<Vec<RoleUpgradeRequest>> {
        let requests = sqlx::query_as::<_, RoleUpgradeRequest>(
            "SELECT * FROM role_upgrade_requests WHERE status = ? ORDER BY created_at, id",
        )
        .bind(ApprovalStatus::Pending)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }
}
