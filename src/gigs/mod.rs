//! Gig postings, applications and milestone escrow.

pub mod active;
pub mod escrow;
pub mod filter;
pub mod models;
pub mod requests;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::enums::{GigStatus, Role};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{find_user, find_user_with_role};
use crate::core::shared::schema::gigs;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{amounts_match, with_conn};
use crate::security::Caller;
use crate::core::urls::ApiUrls;

pub use filter::{GigQuery, GigSearch};
pub use models::{ActiveGig, Gig, GigRequest, MilestoneLinks};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGigRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub skills_needed: Vec<String>,
    pub project_deadline: DateTime<Utc>,
    pub milestones: Vec<String>,
    pub milestone_payments: Vec<f64>,
    pub total_payment: f64,
    #[serde(rename = "employerClerkId")]
    pub employer_clerk_id: String,
}

impl CreateGigRequest {
    pub fn validate(self) -> ApiResult<models::NewGig> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(ApiError::bad_request("title and description are required"));
        }
        if self.milestones.is_empty() {
            return Err(ApiError::bad_request("At least one milestone is required"));
        }
        if self.milestones.len() != self.milestone_payments.len() {
            return Err(ApiError::bad_request(format!(
                "Number of milestones ({}) must match number of milestone payments ({})",
                self.milestones.len(),
                self.milestone_payments.len()
            )));
        }
        if self
            .milestone_payments
            .iter()
            .any(|p| !p.is_finite() || *p <= 0.0)
        {
            return Err(ApiError::bad_request("Milestone payments must be positive"));
        }
        let sum: f64 = self.milestone_payments.iter().sum();
        if !amounts_match(sum, self.total_payment) {
            return Err(ApiError::bad_request(format!(
                "Sum of milestone payments ({sum:.2}) must equal total payment ({:.2})",
                self.total_payment
            )));
        }

        Ok(models::NewGig {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            skills_needed: self
                .skills_needed
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            project_deadline: self.project_deadline,
            milestones: self.milestones,
            milestone_payments: self.milestone_payments,
            total_payment: self.total_payment,
            status: GigStatus::Open,
            employer_clerk_id: self.employer_clerk_id,
        })
    }
}

pub async fn create_gig(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateGigRequest>,
) -> ApiResult<(StatusCode, Json<Gig>)> {
    caller.ensure_is(&req.employer_clerk_id)?;
    let new_gig = req.validate()?;
    let gig = with_conn(&state.conn, move |conn| {
        let employer = find_user_with_role(conn, &new_gig.employer_clerk_id, Role::Employer)?;
        if employer.is_banned {
            return Err(ApiError::Forbidden("Banned users cannot post gigs".into()));
        }
        Ok(diesel::insert_into(gigs::table)
            .values(&new_gig)
            .returning(Gig::as_returning())
            .get_result::<Gig>(conn)?)
    })
    .await?;

    info!(
        "Gig {} posted by {} ({} milestones, {:.2} total)",
        gig.id,
        gig.employer_clerk_id,
        gig.milestone_count(),
        gig.total_payment
    );
    Ok((StatusCode::CREATED, Json(gig)))
}

pub async fn list_gigs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GigQuery>,
) -> ApiResult<Json<Vec<Gig>>> {
    let search = query.into_search()?;
    let list = with_conn(&state.conn, move |conn| filter::search_gigs(conn, &search)).await?;
    Ok(Json(list))
}

pub async fn get_gig(
    State(state): State<Arc<AppState>>,
    Path(gig_id): Path<i32>,
) -> ApiResult<Json<Gig>> {
    let gig = with_conn(&state.conn, move |conn| models::load_gig(conn, gig_id)).await?;
    Ok(Json(gig))
}

pub async fn gigs_by_employer(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<Vec<Gig>>> {
    let list = with_conn(&state.conn, move |conn| {
        find_user(conn, &clerk_id)?;
        Ok(gigs::table
            .filter(gigs::employer_clerk_id.eq(&clerk_id))
            .order(gigs::created_at.desc())
            .select(Gig::as_select())
            .load(conn)?)
    })
    .await?;
    Ok(Json(list))
}

pub fn configure_gigs_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::GIGS, get(list_gigs).post(create_gig))
        .route(ApiUrls::GIGS_SLASH, get(list_gigs).post(create_gig))
        .route(ApiUrls::GIG_BY_ID, get(get_gig))
        .route(ApiUrls::GIGS_BY_EMPLOYER, get(gigs_by_employer))
        .route(ApiUrls::GIG_REQUEST, post(requests::apply_to_gig))
        .route(ApiUrls::GIG_REQUEST_BY_ID, put(requests::decide_request))
        .route(ApiUrls::GIG_REQUESTS_FOR_GIG, get(requests::requests_for_gig))
        .route(ApiUrls::GIG_ACTIVE_FOR_GIG, get(active::active_gig_for_gig))
        .route(ApiUrls::GIG_REQUESTS_BY_EMPLOYER, get(requests::requests_by_employer))
        .route(ApiUrls::GIG_REQUESTS_BY_FREELANCER, get(requests::requests_by_freelancer))
        .route(ApiUrls::ACTIVE_GIGS_BY_ROLE, get(active::active_gigs_by_role))
        .route(ApiUrls::ACTIVE_GIG_MILESTONE, post(active::submit_milestone))
        .route(ApiUrls::ACTIVE_GIG_MILESTONE_APPROVE, put(active::approve_milestone))
        .route(ApiUrls::ACTIVE_GIG_MILESTONE_REJECT, put(active::reject_milestone))
        .route(ApiUrls::ACTIVE_GIG_MILESTONE_LINKS, get(active::milestone_links))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(payments: Vec<f64>, total: f64) -> CreateGigRequest {
        CreateGigRequest {
            title: "Marketing site".into(),
            description: "Three pages and a blog".into(),
            skills_needed: vec![" react ".into(), "".into()],
            project_deadline: Utc::now(),
            milestones: payments.iter().map(|p| format!("pay {p}")).collect(),
            milestone_payments: payments,
            total_payment: total,
            employer_clerk_id: "emp_1".into(),
        }
    }

    #[test]
    fn test_valid_gig_starts_open() {
        let gig = request(vec![100.0, 150.5], 250.5).validate().unwrap();
        assert_eq!(gig.status, GigStatus::Open);
        assert_eq!(gig.skills_needed, vec!["react"]);
    }

    #[test]
    fn test_rejects_empty_milestones() {
        let err = request(vec![], 0.0).validate().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_rejects_count_mismatch() {
        let mut req = request(vec![100.0, 100.0], 200.0);
        req.milestones.pop();
        assert!(req.validate().unwrap_err().message().contains("must match"));
    }

    #[test]
    fn test_payment_sum_tolerance() {
        assert!(request(vec![33.33, 33.33, 33.34], 100.0).validate().is_ok());
        assert!(request(vec![100.0, 100.0], 200.009).validate().is_ok());
        let err = request(vec![100.0, 100.0], 200.5).validate().unwrap_err();
        assert!(err.message().contains("Sum of milestone payments"));
    }

    #[test]
    fn test_rejects_non_positive_payment() {
        assert!(request(vec![100.0, 0.0], 100.0).validate().is_err());
    }

    #[test]
    fn test_gig_json_uses_employer_clerk_id() {
        let json = serde_json::json!({
            "title": "t", "description": "d", "project_deadline": "2026-12-01T00:00:00Z",
            "milestones": ["a"], "milestone_payments": [10.0], "total_payment": 10.0,
            "employerClerkId": "emp_9"
        });
        let req: CreateGigRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.employer_clerk_id, "emp_9");
        assert!(req.skills_needed.is_empty());
    }
}
