//! Milestone submission, review and payout on active gigs.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::escrow;
use super::models::{
    load_active, load_gig, save_active, set_gig_status, ActiveGig, ActiveGigRow, MilestoneLinks,
};
use crate::billing::ledger::{self, Account};
use crate::core::shared::enums::{ActiveGigStatus, GigStatus, MilestoneStatus, Role};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{find_phone, find_user};
use crate::core::shared::schema::active_gigs;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::notify::Notification;
use crate::security::Caller;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMilestoneRequest {
    pub milestone_index: usize,
    pub links: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalQuery {
    #[serde(default)]
    pub payment_verified: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewerQuery {
    pub clerk_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    pub active_gig_id: i32,
    pub gig_id: i32,
    pub milestone_index: usize,
    pub links: Vec<String>,
    pub milestone_links: MilestoneLinks,
    pub milestone_status: Vec<MilestoneStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub success: bool,
    pub message: String,
    pub active_gig_id: i32,
    pub gig_id: i32,
    pub milestone_index: usize,
    pub milestone_links: MilestoneLinks,
    pub milestone_status: Vec<MilestoneStatus>,
    pub payment_amount: f64,
    pub status: ActiveGigStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneLinksResponse {
    pub active_gig_id: i32,
    pub gig_id: i32,
    pub milestone_links: MilestoneLinks,
    pub milestone_status: Vec<MilestoneStatus>,
    pub milestone_count: usize,
    pub gig_title: String,
    pub gig_milestones: Vec<String>,
}

/// Path segment naming which side of the gig to list.
pub fn parse_side(raw: &str) -> ApiResult<Role> {
    match raw.parse::<Role>() {
        Ok(role @ (Role::Employer | Role::Freelancer)) => Ok(role),
        _ => Err(ApiError::bad_request(format!(
            "Invalid role: {raw}. Use 'employer' or 'freelancer'"
        ))),
    }
}

pub async fn active_gigs_by_role(
    State(state): State<Arc<AppState>>,
    Path((side, clerk_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<ActiveGig>>> {
    let side = parse_side(&side)?;
    let list = with_conn(&state.conn, move |conn| {
        find_user(conn, &clerk_id)?;
        let select = active_gigs::table
            .select(ActiveGigRow::as_select())
            .order(active_gigs::created_at.desc())
            .into_boxed();
        let select = match side {
            Role::Employer => select.filter(active_gigs::employer_clerk_id.eq(&clerk_id)),
            _ => select.filter(active_gigs::freelancer_clerk_id.eq(&clerk_id)),
        };
        select
            .load::<ActiveGigRow>(conn)?
            .into_iter()
            .map(ActiveGig::try_from)
            .collect::<ApiResult<Vec<_>>>()
    })
    .await?;
    Ok(Json(list))
}

/// Most recent active gig of a gig, if it was ever accepted.
pub async fn active_gig_for_gig(
    State(state): State<Arc<AppState>>,
    Path(gig_id): Path<i32>,
    Query(query): Query<ViewerQuery>,
) -> ApiResult<Json<Option<ActiveGig>>> {
    let active = with_conn(&state.conn, move |conn| {
        load_gig(conn, gig_id)?;
        let row = active_gigs::table
            .filter(active_gigs::gig_id.eq(gig_id))
            .order((active_gigs::created_at.desc(), active_gigs::id.desc()))
            .select(ActiveGigRow::as_select())
            .first::<ActiveGigRow>(conn)
            .optional()?;
        let active = row.map(ActiveGig::try_from).transpose()?;
        if let (Some(active), Some(viewer)) = (&active, &query.clerk_id) {
            if !active.involves(viewer) {
                return Err(ApiError::Forbidden(format!(
                    "User {viewer} is not part of gig {gig_id}"
                )));
            }
        }
        Ok(active)
    })
    .await?;
    Ok(Json(active))
}

pub async fn submit_milestone(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(active_id): Path<i32>,
    Json(req): Json<SubmitMilestoneRequest>,
) -> ApiResult<Json<SubmissionResponse>> {
    let links = escrow::parse_links(&req.links)?;
    let index = req.milestone_index;

    let (response, note, phone) = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let active = load_active(conn, active_id)?;
            caller.ensure_is(&active.freelancer_clerk_id)?;
            let plan = escrow::plan_submission(&active, index, links.clone())?;
            let saved = save_active(
                conn,
                active.id,
                &plan.milestone_status,
                &plan.milestone_links,
                active.status,
            )?;

            let gig = load_gig(conn, saved.gig_id)?;
            let freelancer = find_user(conn, &saved.freelancer_clerk_id)?;
            let phone = find_phone(conn, &saved.employer_clerk_id)?;
            let note = Notification::MilestoneSubmitted {
                freelancer_name: freelancer.display_name(),
                gig_title: gig.title,
                milestone_number: index + 1,
            };
            Ok((
                SubmissionResponse {
                    success: true,
                    message: format!("Milestone {} submitted for review", index + 1),
                    active_gig_id: saved.id,
                    gig_id: saved.gig_id,
                    milestone_index: index,
                    links,
                    milestone_links: saved.milestone_links,
                    milestone_status: saved.milestone_status,
                },
                note,
                phone,
            ))
        })
    })
    .await?;

    info!(
        "Milestone {} submitted on active gig {}",
        response.milestone_index, response.active_gig_id
    );
    state.notify(phone.as_deref(), note).await;
    Ok(Json(response))
}

pub async fn approve_milestone(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((active_id, index)): Path<(i32, usize)>,
    Query(query): Query<ApprovalQuery>,
) -> ApiResult<Json<ApprovalResponse>> {
    let payment_verified = query.payment_verified;

    let (response, notes) = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let active = load_active(conn, active_id)?;
            caller.ensure_is(&active.employer_clerk_id)?;
            let gig = load_gig(conn, active.gig_id)?;
            let plan = escrow::plan_approval(&gig, &active, index, payment_verified)?;

            let freelancer = Account::User(active.freelancer_clerk_id.clone());
            let employer = Account::User(active.employer_clerk_id.clone());
            ledger::lock_accounts(conn, &[&Account::Company, &freelancer, &employer])?;
            ledger::transfer(conn, &Account::Company, &freelancer, plan.payout)?;
            if let Some(next) = plan.next_escrow {
                ledger::transfer(conn, &employer, &Account::Company, next)?;
            }

            let saved = save_active(
                conn,
                active.id,
                &plan.milestone_status,
                &active.milestone_links,
                plan.status,
            )?;
            if plan.completes() {
                set_gig_status(conn, gig.id, GigStatus::Closed)?;
            }

            let freelancer_phone = find_phone(conn, &active.freelancer_clerk_id)?;
            let mut notes = vec![(
                freelancer_phone.clone(),
                Notification::MilestoneApproved {
                    gig_title: gig.title.clone(),
                    milestone_number: index + 1,
                    payment_amount: plan.payout,
                },
            )];
            if plan.completes() {
                let freelancer_user = find_user(conn, &active.freelancer_clerk_id)?;
                notes.push((
                    freelancer_phone,
                    Notification::FreelancerGigCompleted {
                        gig_title: gig.title.clone(),
                        total_payment: gig.total_payment,
                    },
                ));
                notes.push((
                    find_phone(conn, &active.employer_clerk_id)?,
                    Notification::EmployerGigCompleted {
                        gig_title: gig.title.clone(),
                        freelancer_name: freelancer_user.display_name(),
                    },
                ));
            }

            let message = if plan.completes() {
                format!("Milestone {} approved. Gig completed", index + 1)
            } else {
                format!("Milestone {} approved and payment released", index + 1)
            };
            Ok((
                ApprovalResponse {
                    success: true,
                    message,
                    active_gig_id: saved.id,
                    gig_id: saved.gig_id,
                    milestone_index: index,
                    milestone_links: saved.milestone_links,
                    milestone_status: saved.milestone_status,
                    payment_amount: plan.payout,
                    status: saved.status,
                },
                notes,
            ))
        })
    })
    .await?;

    info!(
        "Milestone {} approved on active gig {} ({:.2} paid out, now {})",
        response.milestone_index, response.active_gig_id, response.payment_amount, response.status
    );
    for (phone, note) in notes {
        state.notify(phone.as_deref(), note).await;
    }
    Ok(Json(response))
}

/// Rejecting a submission ends the engagement: the gig reopens and the
/// escrowed payment for that milestone goes back to the employer.
pub async fn reject_milestone(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((active_id, index)): Path<(i32, usize)>,
) -> ApiResult<Json<ActiveGig>> {
    let (saved, note, phone) = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            let active = load_active(conn, active_id)?;
            caller.ensure_is(&active.employer_clerk_id)?;
            let gig = load_gig(conn, active.gig_id)?;
            let plan = escrow::plan_rejection(&gig, &active, index)?;

            ledger::transfer(
                conn,
                &Account::Company,
                &Account::User(active.employer_clerk_id.clone()),
                plan.refund,
            )?;
            let saved = save_active(
                conn,
                active.id,
                &plan.milestone_status,
                &active.milestone_links,
                ActiveGigStatus::Terminated,
            )?;
            set_gig_status(conn, gig.id, GigStatus::Open)?;

            let phone = find_phone(conn, &active.freelancer_clerk_id)?;
            Ok((saved, Notification::MilestoneRejected { gig_title: gig.title }, phone))
        })
    })
    .await?;

    info!(
        "Milestone {index} rejected on active gig {}; gig {} reopened",
        saved.id, saved.gig_id
    );
    state.notify(phone.as_deref(), note).await;
    Ok(Json(saved))
}

pub async fn milestone_links(
    State(state): State<Arc<AppState>>,
    Path(active_id): Path<i32>,
) -> ApiResult<Json<MilestoneLinksResponse>> {
    let response = with_conn(&state.conn, move |conn| {
        let active = load_active(conn, active_id)?;
        let gig = load_gig(conn, active.gig_id)?;
        Ok(MilestoneLinksResponse {
            active_gig_id: active.id,
            gig_id: gig.id,
            milestone_count: active.milestone_status.len(),
            milestone_links: active.milestone_links,
            milestone_status: active.milestone_status,
            gig_title: gig.title,
            gig_milestones: gig.milestones,
        })
    })
    .await?;
    Ok(Json(response))
}
