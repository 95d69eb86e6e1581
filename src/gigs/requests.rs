//! Applications to gigs and the employer's decision on them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::escrow;
use super::models::{insert_active, load_gig, load_request, set_gig_status, GigRequest, NewGigRequest};
use crate::billing::ledger::{self, Account};
use crate::core::shared::enums::{GigStatus, RequestStatus, Role};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{find_phone, find_user, find_user_with_role};
use crate::core::shared::schema::gig_requests;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::notify::Notification;
use crate::security::Caller;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub gig_id: i32,
    #[serde(rename = "freelancerClerkId")]
    pub freelancer_clerk_id: String,
    #[serde(default)]
    pub freelancer_wallet_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionQuery {
    pub request_status: Option<String>,
    #[serde(default)]
    pub payment_verified: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GigRequestsQuery {
    pub clerk_id: Option<String>,
    pub request_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDecision {
    #[serde(flatten)]
    pub request: GigRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_gig_id: Option<i32>,
}

/// The employer's decision may only accept or reject.
pub fn parse_decision(raw: Option<&str>) -> ApiResult<RequestStatus> {
    let raw = raw.ok_or_else(|| ApiError::bad_request("request_status is required"))?;
    match raw.parse::<RequestStatus>() {
        Ok(status @ (RequestStatus::Accepted | RequestStatus::Rejected)) => Ok(status),
        _ => Err(ApiError::bad_request(format!(
            "Invalid request_status: {raw}. Use ACCEPTED or REJECTED"
        ))),
    }
}

pub fn parse_status_filter(raw: Option<&str>) -> ApiResult<Option<RequestStatus>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<RequestStatus>().map(Some).map_err(|_| {
            ApiError::bad_request(format!(
                "Invalid status: {raw}. Use PENDING, ACCEPTED or REJECTED"
            ))
        }),
    }
}

fn conflict_on_duplicate(err: DieselError) -> ApiError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ApiError::Conflict("You have already applied to this gig".into())
        }
        other => other.into(),
    }
}

pub async fn apply_to_gig(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<ApplyRequest>,
) -> ApiResult<(StatusCode, Json<GigRequest>)> {
    caller.ensure_is(&req.freelancer_clerk_id)?;
    if req.freelancer_wallet_address.trim().is_empty() {
        return Err(ApiError::bad_request("freelancer_wallet_address is required"));
    }

    let (request, note, phone) = with_conn(&state.conn, move |conn| {
        let gig = load_gig(conn, req.gig_id)?;
        if gig.status != GigStatus::Open {
            return Err(ApiError::bad_request(format!(
                "Gig {} is not open for applications",
                gig.id
            )));
        }
        let freelancer = find_user_with_role(conn, &req.freelancer_clerk_id, Role::Freelancer)?;
        if freelancer.is_banned {
            return Err(ApiError::Forbidden("Banned users cannot apply to gigs".into()));
        }

        let existing = gig_requests::table
            .filter(gig_requests::gig_id.eq(gig.id))
            .filter(gig_requests::freelancer_clerk_id.eq(&freelancer.clerk_id))
            .count()
            .get_result::<i64>(conn)?;
        if existing > 0 {
            return Err(ApiError::Conflict("You have already applied to this gig".into()));
        }

        let request = diesel::insert_into(gig_requests::table)
            .values(&NewGigRequest {
                gig_id: gig.id,
                freelancer_clerk_id: freelancer.clerk_id.clone(),
                freelancer_wallet_address: req.freelancer_wallet_address.trim().to_string(),
                employer_clerk_id: gig.employer_clerk_id.clone(),
                status: RequestStatus::Pending,
            })
            .returning(GigRequest::as_returning())
            .get_result::<GigRequest>(conn)
            .map_err(conflict_on_duplicate)?;

        let phone = find_phone(conn, &gig.employer_clerk_id)?;
        let note = Notification::NewGigRequest {
            freelancer_name: freelancer.display_name(),
            gig_title: gig.title,
        };
        Ok((request, note, phone))
    })
    .await?;

    info!(
        "Freelancer {} applied to gig {}",
        request.freelancer_clerk_id, request.gig_id
    );
    state.notify(phone.as_deref(), note).await;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn decide_request(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(request_id): Path<i32>,
    Query(query): Query<DecisionQuery>,
) -> ApiResult<Json<RequestDecision>> {
    let decision = parse_decision(query.request_status.as_deref())?;
    let payment_verified = query.payment_verified;

    let (outcome, note, phone) = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let request = load_request(conn, request_id)?;
            caller.ensure_is(&request.employer_clerk_id)?;
            if request.status != RequestStatus::Pending {
                return Err(ApiError::bad_request(format!(
                    "Gig request {request_id} has already been {}",
                    request.status
                )));
            }
            let gig = load_gig(conn, request.gig_id)?;
            let employer = find_user(conn, &gig.employer_clerk_id)?;

            let mut active_gig_id = None;
            if decision == RequestStatus::Accepted {
                let escrow = escrow::escrow_on_accept(&gig, payment_verified)?;
                let employer_account = Account::User(employer.clerk_id.clone());
                ledger::transfer(conn, &employer_account, &Account::Company, escrow)?;

                set_gig_status(conn, gig.id, GigStatus::InProgress)?;
                let active = insert_active(conn, &gig, &request.freelancer_clerk_id)?;
                active_gig_id = Some(active.id);

                let others = diesel::update(
                    gig_requests::table
                        .filter(gig_requests::gig_id.eq(gig.id))
                        .filter(gig_requests::id.ne(request.id))
                        .filter(gig_requests::status.eq(RequestStatus::Pending)),
                )
                .set(gig_requests::status.eq(RequestStatus::Rejected))
                .execute(conn)?;
                if others > 0 {
                    info!("Closed {others} other pending requests for gig {}", gig.id);
                }
            }

            let request = diesel::update(gig_requests::table.find(request.id))
                .set(gig_requests::status.eq(decision))
                .returning(GigRequest::as_returning())
                .get_result::<GigRequest>(conn)?;

            let note = match decision {
                RequestStatus::Accepted => Notification::RequestAccepted {
                    gig_title: gig.title,
                    employer_name: employer.display_name(),
                },
                _ => Notification::RequestRejected {
                    gig_title: gig.title,
                    employer_name: employer.display_name(),
                },
            };
            let phone = find_phone(conn, &request.freelancer_clerk_id)?;
            Ok((
                RequestDecision {
                    request,
                    active_gig_id,
                },
                note,
                phone,
            ))
        })
    })
    .await?;

    info!(
        "Gig request {} {} by employer {}",
        outcome.request.id, outcome.request.status, outcome.request.employer_clerk_id
    );
    state.notify(phone.as_deref(), note).await;
    Ok(Json(outcome))
}

/// Requests on one gig. With `clerk_id`, the gig's employer sees every
/// request and a freelancer sees only their own.
pub async fn requests_for_gig(
    State(state): State<Arc<AppState>>,
    Path(gig_id): Path<i32>,
    Query(query): Query<GigRequestsQuery>,
) -> ApiResult<Json<Vec<GigRequest>>> {
    let status = parse_status_filter(query.request_status.as_deref())?;

    let list = with_conn(&state.conn, move |conn| {
        let gig = load_gig(conn, gig_id)?;
        let mut select = gig_requests::table
            .filter(gig_requests::gig_id.eq(gig.id))
            .select(GigRequest::as_select())
            .into_boxed();

        if let Some(clerk_id) = &query.clerk_id {
            let viewer = find_user(conn, clerk_id)?;
            if viewer.has_role(Role::Freelancer) {
                select = select.filter(gig_requests::freelancer_clerk_id.eq(viewer.clerk_id));
            } else if viewer.clerk_id != gig.employer_clerk_id && !viewer.has_role(Role::Admin) {
                return Err(ApiError::Forbidden(format!(
                    "User {clerk_id} cannot view requests for gig {gig_id}"
                )));
            }
        }
        if let Some(status) = status {
            select = select.filter(gig_requests::status.eq(status));
        }
        Ok(select.order(gig_requests::created_at.desc()).load(conn)?)
    })
    .await?;
    Ok(Json(list))
}

pub async fn requests_by_employer(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<Vec<GigRequest>>> {
    let status = parse_status_filter(query.status.as_deref())?;
    let list = with_conn(&state.conn, move |conn| {
        find_user_with_role(conn, &clerk_id, Role::Employer)?;
        let mut select = gig_requests::table
            .filter(gig_requests::employer_clerk_id.eq(&clerk_id))
            .select(GigRequest::as_select())
            .into_boxed();
        if let Some(status) = status {
            select = select.filter(gig_requests::status.eq(status));
        }
        Ok(select.order(gig_requests::created_at.desc()).load(conn)?)
    })
    .await?;
    Ok(Json(list))
}

pub async fn requests_by_freelancer(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<Vec<GigRequest>>> {
    let list = with_conn(&state.conn, move |conn| {
        find_user_with_role(conn, &clerk_id, Role::Freelancer)?;
        Ok(gig_requests::table
            .filter(gig_requests::freelancer_clerk_id.eq(&clerk_id))
            .order(gig_requests::created_at.desc())
            .select(GigRequest::as_select())
            .load(conn)?)
    })
    .await?;
    Ok(Json(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_decision_only_accepts_or_rejects() {
        assert_eq!(parse_decision(Some("accepted")).unwrap(), RequestStatus::Accepted);
        assert_eq!(parse_decision(Some("REJECTED")).unwrap(), RequestStatus::Rejected);
        assert!(parse_decision(Some("PENDING")).is_err());
        assert!(parse_decision(None).is_err());
    }

    #[test]
    fn test_status_filter() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("pending")).unwrap(),
            Some(RequestStatus::Pending)
        );
        assert!(parse_status_filter(Some("maybe")).is_err());
    }

    #[test]
    fn test_decision_serializes_flat() {
        let decision = RequestDecision {
            request: GigRequest {
                id: 4,
                gig_id: 2,
                freelancer_clerk_id: "free_1".into(),
                freelancer_wallet_address: "0xabc".into(),
                employer_clerk_id: "emp_1".into(),
                status: RequestStatus::Accepted,
                created_at: Utc::now(),
            },
            active_gig_id: Some(11),
        };
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["id"], 4);
        assert_eq!(value["freelancerClerkId"], "free_1");
        assert_eq!(value["status"], "ACCEPTED");
        assert_eq!(value["active_gig_id"], 11);
    }

    #[test]
    fn test_apply_request_reads_camel_case_ids() {
        let req: ApplyRequest = serde_json::from_str(
            r#"{"gig_id": 3, "freelancerClerkId": "free_2", "freelancer_wallet_address": "0x1"}"#,
        )
        .unwrap();
        assert_eq!(req.freelancer_clerk_id, "free_2");
        assert_eq!(req.gig_id, 3);
    }
}
