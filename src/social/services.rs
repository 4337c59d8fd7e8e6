use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::repo;

/// Add `target` to the user's following set and the user to `target`'s
/// followers set. The two updates are independent and each is idempotent;
/// there is no transaction, so a failure of the second half leaves the
/// graph asymmetric and surfaces as [`AppError::PartialMutation`].
pub async fn follow(state: &AppState, user_id: Uuid, target: Uuid) -> AppResult<()> {
    if user_id == target {
        return Err(AppError::Validation("cannot follow yourself".into()));
    }

    repo::add_following(&state.db, user_id, target).await?;

    repo::add_follower(&state.db, target, user_id)
        .await
        .map_err(|err| AppError::PartialMutation {
            step: "add follower after following succeeded",
            source: err.into(),
        })?;

    debug!(%user_id, %target, "follow recorded");
    Ok(())
}

/// Symmetric removal; removing a non-member is a no-op.
pub async fn unfollow(state: &AppState, user_id: Uuid, target: Uuid) -> AppResult<()> {
    if user_id == target {
        return Err(AppError::Validation("cannot unfollow yourself".into()));
    }

    repo::remove_following(&state.db, user_id, target).await?;

    repo::remove_follower(&state.db, target, user_id)
        .await
        .map_err(|err| AppError::PartialMutation {
            step: "remove follower after unfollowing succeeded",
            source: err.into(),
        })?;

    debug!(%user_id, %target, "unfollow recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn self_follow_is_rejected_before_touching_the_store() {
        let state = AppState::fake();
        let me = Uuid::new_v4();

        let err = follow(&state, me, me).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = unfollow(&state, me, me).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
