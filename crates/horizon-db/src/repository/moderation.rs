//! # Moderation Repository
//!
//! Reviews, comments, helpfulness votes and the per-target aggregates
//! derived from them.
//!
//! ## Aggregates are rebuilt, never adjusted
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  status change touching `approved` (old or new)                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  SELECT COUNT(*), SUM(rating) FROM reviews  WHERE target AND approved  │
//! │  SELECT COUNT(*)              FROM comments WHERE event  AND approved  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  UPSERT target_aggregates (same transaction as the status write)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! approve -> reject -> approve therefore always lands on the same numbers.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::MAX_CAS_ATTEMPTS;
use crate::error::{DbError, DbResult};
use horizon_core::identity::new_id;
use horizon_core::lifecycle::{plan_transition, Outcome, Transition};
use horizon_core::rating::{RatingSummary, VoteSummary};
use horizon_core::validation::{validate_rating, validate_text, MAX_TEXT_LEN, MAX_TITLE_LEN};
use horizon_core::{
    Comment, CoreError, ModeratedItem, ModerationStatus, NewComment, NewReview, Review,
    ReviewTarget, TargetAggregate, TargetKind, ValidationError,
};

/// What a moderation decision changed.
#[derive(Debug, Clone)]
pub struct ModerationChange {
    pub item: ModeratedItem,
    pub previous: ModerationStatus,
    pub status: ModerationStatus,
    /// The rebuilt aggregate, when the change affected it.
    pub aggregate: Option<TargetAggregate>,
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: String,
    user_id: String,
    target_kind: TargetKind,
    target_id: String,
    rating: i64,
    title: String,
    content: String,
    status: ModerationStatus,
    helpful_votes: i64,
    total_votes: i64,
    moderated_by: Option<String>,
    moderation_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            user_id: row.user_id,
            target: ReviewTarget::from_parts(row.target_kind, row.target_id),
            rating: row.rating,
            title: row.title,
            content: row.content,
            status: row.status,
            helpful_votes: row.helpful_votes,
            total_votes: row.total_votes,
            moderated_by: row.moderated_by,
            moderation_notes: row.moderation_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModerationRepository {
    pool: SqlitePool,
}

impl ModerationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ModerationRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Reviews
    // -------------------------------------------------------------------------

    /// Stores a review awaiting moderation. One review per user and target.
    pub async fn submit_review(&self, new: NewReview, now: DateTime<Utc>) -> DbResult<Review> {
        validate_rating(new.rating)?;
        validate_text("title", &new.title, MAX_TITLE_LEN)?;
        validate_text("content", &new.content, MAX_TEXT_LEN)?;
        self.require_target(&new.target).await?;

        let review = Review {
            id: new_id(),
            user_id: new.user_id,
            target: new.target,
            rating: new.rating,
            title: new.title.trim().to_string(),
            content: new.content.trim().to_string(),
            status: ModerationStatus::Pending,
            helpful_votes: 0,
            total_votes: 0,
            moderated_by: None,
            moderation_notes: None,
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO reviews (
                id, user_id, target_kind, target_id, rating, title, content, status,
                helpful_votes, total_votes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&review.id)
        .bind(&review.user_id)
        .bind(review.target.kind())
        .bind(review.target.id())
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.content)
        .bind(review.status)
        .bind(review.helpful_votes)
        .bind(review.total_votes)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) => {
                let err = DbError::from(err);
                if err.is_unique_violation_on("reviews.user_id") {
                    return Err(CoreError::UniquenessViolation {
                        field: "review".to_string(),
                        value: format!("{} on {}", review.user_id, review.target),
                    }
                    .into());
                }
                return Err(err);
            }
        }

        debug!(review_id = %review.id, target = %review.target, "Review submitted");
        Ok(review)
    }

    pub async fn get_review(&self, id: &str) -> DbResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Review::from))
    }

    /// Records or changes a user's helpfulness vote and recounts the review.
    ///
    /// Authors cannot vote on their own reviews.
    pub async fn vote_review(
        &self,
        review_id: &str,
        user_id: &str,
        helpful: bool,
        now: DateTime<Utc>,
    ) -> DbResult<VoteSummary> {
        let review = self
            .get_review(review_id)
            .await?
            .ok_or_else(|| DbError::not_found("Review", review_id))?;
        if review.user_id == user_id {
            return Err(CoreError::forbidden("vote on own review").into());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO review_votes (review_id, user_id, is_helpful, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (review_id, user_id) DO UPDATE SET is_helpful = excluded.is_helpful
            "#,
        )
        .bind(review_id)
        .bind(user_id)
        .bind(helpful)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let (total_votes, helpful_votes): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(is_helpful), 0) FROM review_votes WHERE review_id = ?",
        )
        .bind(review_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE reviews SET helpful_votes = ?, total_votes = ? WHERE id = ?")
            .bind(helpful_votes)
            .bind(total_votes)
            .bind(review_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(review_id = %review_id, helpful_votes, total_votes, "Review vote recorded");
        Ok(VoteSummary {
            helpful_votes,
            total_votes,
        })
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    /// Stores a comment. Comments are visible immediately, so the event's
    /// comment count is rebuilt in the same transaction.
    pub async fn submit_comment(&self, new: NewComment, now: DateTime<Utc>) -> DbResult<Comment> {
        validate_text("content", &new.content, MAX_TEXT_LEN)?;
        self.require_target(&ReviewTarget::Event(new.event_id.clone()))
            .await?;

        if let Some(parent_id) = &new.parent_id {
            let parent = self
                .get_comment(parent_id)
                .await?
                .ok_or_else(|| DbError::not_found("Comment", parent_id))?;
            if parent.event_id != new.event_id {
                return Err(ValidationError::InvalidFormat {
                    field: "parent_id".to_string(),
                    reason: "reply must be on the same event as its parent".to_string(),
                }
                .into());
            }
        }

        let comment = Comment {
            id: new_id(),
            event_id: new.event_id,
            user_id: new.user_id,
            parent_id: new.parent_id,
            content: new.content.trim().to_string(),
            status: ModerationStatus::Approved,
            likes: 0,
            moderated_by: None,
            moderation_notes: None,
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO comments (id, event_id, user_id, parent_id, content, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.event_id)
        .bind(&comment.user_id)
        .bind(&comment.parent_id)
        .bind(&comment.content)
        .bind(comment.status)
        .bind(comment.created_at)
        .execute(&mut *tx)
        .await?;

        recompute_in(&mut *tx, &ReviewTarget::Event(comment.event_id.clone()), now).await?;
        tx.commit().await?;

        debug!(comment_id = %comment.id, event_id = %comment.event_id, "Comment submitted");
        Ok(comment)
    }

    pub async fn get_comment(&self, id: &str) -> DbResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    /// Likes a comment. A second like by the same user changes nothing.
    /// Returns the recounted likes.
    pub async fn like_comment(
        &self,
        comment_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        self.get_comment(comment_id)
            .await?
            .ok_or_else(|| DbError::not_found("Comment", comment_id))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO comment_likes (comment_id, user_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (comment_id, user_id) DO NOTHING
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let likes = recount_likes_in(&mut *tx, comment_id).await?;
        tx.commit().await?;

        debug!(comment_id = %comment_id, likes, "Comment liked");
        Ok(likes)
    }

    /// Withdraws a like. Unliking a comment the user never liked is a no-op.
    pub async fn unlike_comment(&self, comment_id: &str, user_id: &str) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let likes = recount_likes_in(&mut *tx, comment_id).await?;
        tx.commit().await?;

        debug!(comment_id = %comment_id, likes, "Comment unliked");
        Ok(likes)
    }

    // -------------------------------------------------------------------------
    // Moderation
    // -------------------------------------------------------------------------

    /// Sets the moderation status of a review or comment.
    pub async fn set_status(
        &self,
        item: &ModeratedItem,
        status: ModerationStatus,
        moderator: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<Outcome<ModerationChange>> {
        let (entity, id) = match item {
            ModeratedItem::Review(id) => ("review", id.as_str()),
            ModeratedItem::Comment(id) => ("comment", id.as_str()),
        };

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (previous, target) = self.snapshot(item).await?;

            if plan_transition(entity, id, previous, status)? == Transition::Duplicate {
                debug!(item = %entity, id = %id, status = %status, "Moderation status unchanged");
                return Ok(Outcome::Duplicate(ModerationChange {
                    item: item.clone(),
                    previous,
                    status,
                    aggregate: None,
                }));
            }

            let mut tx = self.pool.begin().await?;

            let updated = match item {
                ModeratedItem::Review(_) => {
                    sqlx::query(
                        r#"
                        UPDATE reviews
                           SET status = ?, moderated_by = ?, moderation_notes = ?, updated_at = ?
                         WHERE id = ? AND status = ?
                        "#,
                    )
                    .bind(status)
                    .bind(moderator)
                    .bind(notes)
                    .bind(now)
                    .bind(id)
                    .bind(previous)
                    .execute(&mut *tx)
                    .await?
                }
                ModeratedItem::Comment(_) => {
                    sqlx::query(
                        r#"
                        UPDATE comments
                           SET status = ?, moderated_by = ?, moderation_notes = ?
                         WHERE id = ? AND status = ?
                        "#,
                    )
                    .bind(status)
                    .bind(moderator)
                    .bind(notes)
                    .bind(id)
                    .bind(previous)
                    .execute(&mut *tx)
                    .await?
                }
            };

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(item = %entity, id = %id, attempt, "Moderated item changed concurrently, retrying");
                continue;
            }

            let aggregate = if previous == ModerationStatus::Approved
                || status == ModerationStatus::Approved
            {
                Some(recompute_in(&mut *tx, &target, now).await?)
            } else {
                None
            };

            tx.commit().await?;

            info!(
                item = %entity,
                id = %id,
                from = %previous,
                to = %status,
                moderator = %moderator,
                "Moderation status changed"
            );

            return Ok(Outcome::Applied(ModerationChange {
                item: item.clone(),
                previous,
                status,
                aggregate,
            }));
        }

        Err(DbError::TransactionFailed(format!(
            "{entity} {id} kept changing during moderation"
        )))
    }

    /// Current aggregate for a target; zeros if nothing was ever approved.
    pub async fn aggregate(&self, target: &ReviewTarget) -> DbResult<TargetAggregate> {
        let aggregate = sqlx::query_as::<_, TargetAggregate>(
            r#"
            SELECT target_kind, target_id, reviews_count, rating_total, average_rating, comments_count
              FROM target_aggregates
             WHERE target_kind = ? AND target_id = ?
            "#,
        )
        .bind(target.kind())
        .bind(target.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(aggregate.unwrap_or_else(|| TargetAggregate::empty(target)))
    }

    async fn snapshot(&self, item: &ModeratedItem) -> DbResult<(ModerationStatus, ReviewTarget)> {
        match item {
            ModeratedItem::Review(id) => {
                let row: Option<(ModerationStatus, TargetKind, String)> = sqlx::query_as(
                    "SELECT status, target_kind, target_id FROM reviews WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
                row.map(|(status, kind, target_id)| {
                    (status, ReviewTarget::from_parts(kind, target_id))
                })
                .ok_or_else(|| DbError::not_found("Review", id))
            }
            ModeratedItem::Comment(id) => {
                let row: Option<(ModerationStatus, String)> =
                    sqlx::query_as("SELECT status, event_id FROM comments WHERE id = ?")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                row.map(|(status, event_id)| (status, ReviewTarget::Event(event_id)))
                    .ok_or_else(|| DbError::not_found("Comment", id))
            }
        }
    }

    async fn require_target(&self, target: &ReviewTarget) -> DbResult<()> {
        let (sql, entity) = match target {
            ReviewTarget::Event(_) => ("SELECT COUNT(*) FROM events WHERE id = ?", "Event"),
            ReviewTarget::Venue(_) => ("SELECT COUNT(*) FROM venues WHERE id = ?", "Venue"),
        };
        let found: i64 = sqlx::query_scalar(sql)
            .bind(target.id())
            .fetch_one(&self.pool)
            .await?;
        if found == 0 {
            return Err(DbError::not_found(entity, target.id()));
        }
        Ok(())
    }
}

/// Rebuilds a target's aggregate from its currently approved rows.
async fn recount_likes_in(conn: &mut SqliteConnection, comment_id: &str) -> DbResult<i64> {
    let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?")
        .bind(comment_id)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query("UPDATE comments SET likes = ? WHERE id = ?")
        .bind(likes)
        .bind(comment_id)
        .execute(&mut *conn)
        .await?;
    Ok(likes)
}

pub(crate) async fn recompute_in(
    conn: &mut SqliteConnection,
    target: &ReviewTarget,
    now: DateTime<Utc>,
) -> DbResult<TargetAggregate> {
    let (reviews_count, rating_total): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(rating), 0) FROM reviews
         WHERE target_kind = ? AND target_id = ? AND status = ?
        "#,
    )
    .bind(target.kind())
    .bind(target.id())
    .bind(ModerationStatus::Approved)
    .fetch_one(&mut *conn)
    .await?;

    let comments_count: i64 = match target {
        ReviewTarget::Event(event_id) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE event_id = ? AND status = ?")
                .bind(event_id)
                .bind(ModerationStatus::Approved)
                .fetch_one(&mut *conn)
                .await?
        }
        ReviewTarget::Venue(_) => 0,
    };

    let aggregate = TargetAggregate {
        target_kind: target.kind(),
        target_id: target.id().to_string(),
        reviews_count,
        rating_total,
        average_rating: RatingSummary::new(reviews_count, rating_total).average(),
        comments_count,
    };

    sqlx::query(
        r#"
        INSERT INTO target_aggregates (
            target_kind, target_id, reviews_count, rating_total, average_rating,
            comments_count, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (target_kind, target_id) DO UPDATE SET
            reviews_count = excluded.reviews_count,
            rating_total = excluded.rating_total,
            average_rating = excluded.average_rating,
            comments_count = excluded.comments_count,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(aggregate.target_kind)
    .bind(&aggregate.target_id)
    .bind(aggregate.reviews_count)
    .bind(aggregate.rating_total)
    .bind(aggregate.average_rating)
    .bind(aggregate.comments_count)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(target = %target, reviews_count, rating_total, comments_count, "Aggregate rebuilt");
    Ok(aggregate)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{setup, ts, user, Fixture};
    use horizon_core::UserRole;

    async fn review(fx: &Fixture, author: &str, rating: i64) -> Review {
        let author = user(&fx.db, author, UserRole::Basic).await;
        fx.db
            .moderation()
            .submit_review(
                NewReview {
                    user_id: author.id,
                    target: ReviewTarget::Event(fx.event.id.clone()),
                    rating,
                    title: "Loved it".to_string(),
                    content: "Great sound, long queues.".to_string(),
                },
                ts(1),
            )
            .await
            .unwrap()
    }

    async fn approve(fx: &Fixture, review: &Review) -> Outcome<ModerationChange> {
        fx.db
            .moderation()
            .set_status(
                &ModeratedItem::Review(review.id.clone()),
                ModerationStatus::Approved,
                &fx.admin.id,
                None,
                ts(2),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_review_starts_pending_and_is_not_counted() {
        let fx = setup(10).await;
        let r = review(&fx, "critic", 4).await;
        assert_eq!(r.status, ModerationStatus::Pending);

        let agg = fx
            .db
            .moderation()
            .aggregate(&ReviewTarget::Event(fx.event.id.clone()))
            .await
            .unwrap();
        assert_eq!(agg.reviews_count, 0);
        assert_eq!(agg.average_rating, 0.0);
    }

    #[tokio::test]
    async fn test_approve_reject_approve_round_trips_aggregate() {
        let fx = setup(10).await;
        let a = review(&fx, "alice", 5).await;
        let b = review(&fx, "bob", 2).await;
        approve(&fx, &a).await;
        let first = approve(&fx, &b).await.into_inner().aggregate.unwrap();
        assert_eq!(first.reviews_count, 2);
        assert_eq!(first.rating_total, 7);
        assert_eq!(first.average_rating, 3.5);

        let rejected = fx
            .db
            .moderation()
            .set_status(
                &ModeratedItem::Review(b.id.clone()),
                ModerationStatus::Rejected,
                &fx.admin.id,
                Some("off topic"),
                ts(3),
            )
            .await
            .unwrap()
            .into_inner();
        let mid = rejected.aggregate.unwrap();
        assert_eq!(mid.reviews_count, 1);
        assert_eq!(mid.average_rating, 5.0);

        let again = approve(&fx, &b).await.into_inner().aggregate.unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn test_repeated_status_is_duplicate() {
        let fx = setup(10).await;
        let r = review(&fx, "carol", 3).await;
        assert!(approve(&fx, &r).await.is_applied());
        let again = approve(&fx, &r).await;
        assert!(!again.is_applied());
        assert!(again.value().aggregate.is_none());
    }

    #[tokio::test]
    async fn test_one_review_per_user_and_target() {
        let fx = setup(10).await;
        let target = ReviewTarget::Venue(fx.venue.id.clone());
        let new = NewReview {
            user_id: fx.buyer.id.clone(),
            target,
            rating: 4,
            title: "Nice venue".to_string(),
            content: "Good seats".to_string(),
        };
        let moderation = fx.db.moderation();
        moderation.submit_review(new.clone(), ts(1)).await.unwrap();
        let err = moderation.submit_review(new, ts(2)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::UniquenessViolation { .. })));
    }

    #[tokio::test]
    async fn test_review_rating_out_of_range() {
        let fx = setup(10).await;
        let err = fx
            .db
            .moderation()
            .submit_review(
                NewReview {
                    user_id: fx.buyer.id.clone(),
                    target: ReviewTarget::Event(fx.event.id.clone()),
                    rating: 6,
                    title: "Too good".to_string(),
                    content: "Off the scale".to_string(),
                },
                ts(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_comments_counted_and_replies_checked() {
        let fx = setup(10).await;
        let moderation = fx.db.moderation();
        let root = moderation
            .submit_comment(
                NewComment {
                    event_id: fx.event.id.clone(),
                    user_id: fx.buyer.id.clone(),
                    parent_id: None,
                    content: "Is parking available?".to_string(),
                },
                ts(1),
            )
            .await
            .unwrap();
        moderation
            .submit_comment(
                NewComment {
                    event_id: fx.event.id.clone(),
                    user_id: fx.manager.id.clone(),
                    parent_id: Some(root.id.clone()),
                    content: "Yes, level B.".to_string(),
                },
                ts(2),
            )
            .await
            .unwrap();

        let target = ReviewTarget::Event(fx.event.id.clone());
        assert_eq!(moderation.aggregate(&target).await.unwrap().comments_count, 2);

        let change = moderation
            .set_status(
                &ModeratedItem::Comment(root.id.clone()),
                ModerationStatus::Rejected,
                &fx.admin.id,
                None,
                ts(3),
            )
            .await
            .unwrap()
            .into_inner();
        assert_eq!(change.aggregate.unwrap().comments_count, 1);
    }

    #[tokio::test]
    async fn test_comment_likes_counted_once_per_user() {
        let fx = setup(10).await;
        let moderation = fx.db.moderation();
        let comment = moderation
            .submit_comment(
                NewComment {
                    event_id: fx.event.id.clone(),
                    user_id: fx.buyer.id.clone(),
                    parent_id: None,
                    content: "Doors open at seven.".to_string(),
                },
                ts(1),
            )
            .await
            .unwrap();
        assert_eq!(comment.likes, 0);

        assert_eq!(moderation.like_comment(&comment.id, &fx.admin.id, ts(2)).await.unwrap(), 1);
        assert_eq!(moderation.like_comment(&comment.id, &fx.admin.id, ts(3)).await.unwrap(), 1);
        assert_eq!(moderation.like_comment(&comment.id, &fx.manager.id, ts(4)).await.unwrap(), 2);

        assert_eq!(moderation.unlike_comment(&comment.id, &fx.admin.id).await.unwrap(), 1);
        assert_eq!(moderation.unlike_comment(&comment.id, &fx.admin.id).await.unwrap(), 1);

        let stored = moderation.get_comment(&comment.id).await.unwrap().unwrap();
        assert_eq!(stored.likes, 1);

        let err = moderation.like_comment("nope", &fx.admin.id, ts(5)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reply_to_missing_parent() {
        let fx = setup(10).await;
        let err = fx
            .db
            .moderation()
            .submit_comment(
                NewComment {
                    event_id: fx.event.id.clone(),
                    user_id: fx.buyer.id.clone(),
                    parent_id: Some("nope".to_string()),
                    content: "Replying".to_string(),
                },
                ts(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_votes_recounted_and_revotes_replace() {
        let fx = setup(10).await;
        let r = review(&fx, "dave", 4).await;
        let moderation = fx.db.moderation();

        moderation.vote_review(&r.id, &fx.buyer.id, true, ts(3)).await.unwrap();
        let summary = moderation.vote_review(&r.id, &fx.manager.id, false, ts(4)).await.unwrap();
        assert_eq!((summary.helpful_votes, summary.total_votes), (1, 2));

        let summary = moderation.vote_review(&r.id, &fx.manager.id, true, ts(5)).await.unwrap();
        assert_eq!((summary.helpful_votes, summary.total_votes), (2, 2));

        let stored = moderation.get_review(&r.id).await.unwrap().unwrap();
        assert_eq!(stored.helpful_votes, 2);
    }

    #[tokio::test]
    async fn test_author_cannot_vote_own_review() {
        let fx = setup(10).await;
        let r = review(&fx, "erin", 4).await;
        let err = fx
            .db
            .moderation()
            .vote_review(&r.id, &r.user_id, true, ts(3))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Forbidden { .. })));
    }
}
