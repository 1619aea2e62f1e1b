//! Reviews, comments, helpfulness votes, comment likes and moderation.
//!
//! Target aggregates are rebuilt by the database layer from approved rows
//! whenever an approval is gained or lost; nothing here counts by hand.

use crate::box_office::{BoxOffice, Reviewer};
use crate::error::EngineResult;
use horizon_core::rating::VoteSummary;
use horizon_core::{
    Comment, ModeratedItem, ModerationStatus, NewComment, NewReview, Outcome, Review,
    ReviewTarget, TargetAggregate,
};
use horizon_db::ModerationChange;

impl BoxOffice {
    /// Stores a review as `pending`. One per user and target.
    pub async fn submit_review(&self, new: NewReview) -> EngineResult<Review> {
        Ok(self.db().moderation().submit_review(new, self.now()).await?)
    }

    /// Stores an approved comment and recounts the event's comments.
    pub async fn submit_comment(&self, new: NewComment) -> EngineResult<Comment> {
        Ok(self.db().moderation().submit_comment(new, self.now()).await?)
    }

    pub async fn vote_review(
        &self,
        review_id: &str,
        user_id: &str,
        helpful: bool,
    ) -> EngineResult<VoteSummary> {
        Ok(self
            .db()
            .moderation()
            .vote_review(review_id, user_id, helpful, self.now())
            .await?)
    }

    /// One like per user; returns the comment's like count.
    pub async fn like_comment(&self, comment_id: &str, user_id: &str) -> EngineResult<i64> {
        Ok(self
            .db()
            .moderation()
            .like_comment(comment_id, user_id, self.now())
            .await?)
    }

    pub async fn unlike_comment(&self, comment_id: &str, user_id: &str) -> EngineResult<i64> {
        Ok(self.db().moderation().unlike_comment(comment_id, user_id).await?)
    }

    pub async fn set_moderation_status(
        &self,
        item: &ModeratedItem,
        status: ModerationStatus,
        moderator: &Reviewer,
        notes: Option<&str>,
    ) -> EngineResult<Outcome<ModerationChange>> {
        let moderator_id = moderator.require("moderate content")?;
        Ok(self
            .db()
            .moderation()
            .set_status(item, status, moderator_id, notes, self.now())
            .await?)
    }

    pub async fn target_aggregate(&self, target: &ReviewTarget) -> EngineResult<TargetAggregate> {
        Ok(self.db().moderation().aggregate(target).await?)
    }
}
