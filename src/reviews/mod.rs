//! Employer ratings of freelancers.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::find_user_with_role;
use crate::core::shared::schema::{freelancer_details, reviews};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::core::urls::ApiUrls;
use crate::security::Caller;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = reviews)]
pub struct Review {
    pub id: i32,
    pub rating: i32,
    pub employer_clerk_id: String,
    pub freelancer_clerk_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub rating: i32,
    pub employer_clerk_id: String,
    pub freelancer_clerk_id: String,
}

impl NewReview {
    pub fn validate(&self) -> ApiResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::bad_request("Rating must be between 1 and 5"));
        }
        if self.employer_clerk_id == self.freelancer_clerk_id {
            return Err(ApiError::bad_request("Users cannot review themselves"));
        }
        Ok(())
    }
}

/// Average rating shown on profiles, one decimal place.
pub fn average_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let average = sum as f64 / ratings.len() as f64;
    Some((average * 10.0).round() / 10.0)
}

/// Reviews are left by the employer who hired the freelancer.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<NewReview>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    req.validate()?;
    caller.ensure_is(&req.employer_clerk_id)?;

    let (review, average) = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            find_user_with_role(conn, &req.employer_clerk_id, Role::Employer)?;
            find_user_with_role(conn, &req.freelancer_clerk_id, Role::Freelancer)?;

            let review = diesel::insert_into(reviews::table)
                .values(&req)
                .returning(Review::as_returning())
                .get_result::<Review>(conn)?;

            let ratings: Vec<i32> = reviews::table
                .filter(reviews::freelancer_clerk_id.eq(&review.freelancer_clerk_id))
                .select(reviews::rating)
                .load(conn)?;
            let average = average_rating(&ratings);
            if let Some(average) = average {
                diesel::update(
                    freelancer_details::table
                        .filter(freelancer_details::clerk_id.eq(&review.freelancer_clerk_id)),
                )
                .set(freelancer_details::average_rating.eq(average))
                .execute(conn)?;
            }
            Ok((review, average))
        })
    })
    .await?;

    info!(
        "Review {} ({}/5) left for {}; average now {:?}",
        review.id, review.rating, review.freelancer_clerk_id, average
    );
    Ok((StatusCode::CREATED, Json(review)))
}

pub fn configure_reviews_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::REVIEWS, post(create_review))
        .route(ApiUrls::REVIEWS_SLASH, post(create_review))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: i32) -> NewReview {
        NewReview {
            rating,
            employer_clerk_id: "emp_1".into(),
            freelancer_clerk_id: "free_1".into(),
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(review(1).validate().is_ok());
        assert!(review(5).validate().is_ok());
        assert_eq!(
            review(0).validate().unwrap_err().message(),
            "Rating must be between 1 and 5"
        );
        assert!(review(6).validate().is_err());
    }

    #[test]
    fn test_self_review_is_rejected() {
        let mut r = review(4);
        r.freelancer_clerk_id = "emp_1".into();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(average_rating(&[4]), Some(4.0));
        assert_eq!(average_rating(&[5, 4, 4]), Some(4.3));
        assert_eq!(average_rating(&[5, 5, 4]), Some(4.7));
    }
}
