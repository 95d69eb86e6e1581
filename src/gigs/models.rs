use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::shared::enums::{ActiveGigStatus, GigStatus, MilestoneStatus, RequestStatus};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{active_gigs, gig_requests, gigs};

/// Submitted links per milestone, keyed by the milestone index as text.
pub type MilestoneLinks = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = gigs)]
pub struct Gig {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub skills_needed: Vec<String>,
    pub project_deadline: DateTime<Utc>,
    pub milestones: Vec<String>,
    pub milestone_payments: Vec<f64>,
    pub total_payment: f64,
    pub status: GigStatus,
    #[serde(rename = "employerClerkId")]
    pub employer_clerk_id: String,
    pub created_at: DateTime<Utc>,
}

impl Gig {
    pub fn milestone_count(&self) -> usize {
        self.milestones.len()
    }

    pub fn payment_for(&self, index: usize) -> ApiResult<f64> {
        self.milestone_payments.get(index).copied().ok_or_else(|| {
            ApiError::Internal(format!("gig {} has no payment for milestone {index}", self.id))
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = gigs)]
pub struct NewGig {
    pub title: String,
    pub description: String,
    pub skills_needed: Vec<String>,
    pub project_deadline: DateTime<Utc>,
    pub milestones: Vec<String>,
    pub milestone_payments: Vec<f64>,
    pub total_payment: f64,
    pub status: GigStatus,
    pub employer_clerk_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = gig_requests)]
pub struct GigRequest {
    pub id: i32,
    pub gig_id: i32,
    #[serde(rename = "freelancerClerkId")]
    pub freelancer_clerk_id: String,
    pub freelancer_wallet_address: String,
    #[serde(rename = "employerClerkId")]
    pub employer_clerk_id: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = gig_requests)]
pub struct NewGigRequest {
    pub gig_id: i32,
    pub freelancer_clerk_id: String,
    pub freelancer_wallet_address: String,
    pub employer_clerk_id: String,
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = active_gigs)]
pub struct ActiveGigRow {
    pub id: i32,
    pub gig_id: i32,
    pub freelancer_clerk_id: String,
    pub employer_clerk_id: String,
    pub milestone_status: Vec<String>,
    pub milestone_links: serde_json::Value,
    pub status: ActiveGigStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Execution record of an accepted gig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveGig {
    pub id: i32,
    pub gig_id: i32,
    #[serde(rename = "freelancerClerkId")]
    pub freelancer_clerk_id: String,
    #[serde(rename = "employerClerkId")]
    pub employer_clerk_id: String,
    pub milestone_status: Vec<MilestoneStatus>,
    pub milestone_links: MilestoneLinks,
    pub status: ActiveGigStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActiveGig {
    pub fn involves(&self, clerk_id: &str) -> bool {
        self.freelancer_clerk_id == clerk_id || self.employer_clerk_id == clerk_id
    }
}

impl TryFrom<ActiveGigRow> for ActiveGig {
    type Error = ApiError;

    fn try_from(row: ActiveGigRow) -> Result<Self, Self::Error> {
        let milestone_status = row
            .milestone_status
            .iter()
            .map(|s| s.parse::<MilestoneStatus>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::Internal(format!("active gig {}: {e}", row.id)))?;
        let milestone_links = match serde_json::from_value::<MilestoneLinks>(row.milestone_links) {
            Ok(links) => links,
            Err(e) => {
                warn!("Active gig {} has unreadable milestone links: {e}", row.id);
                MilestoneLinks::new()
            }
        };
        Ok(Self {
            id: row.id,
            gig_id: row.gig_id,
            freelancer_clerk_id: row.freelancer_clerk_id,
            employer_clerk_id: row.employer_clerk_id,
            milestone_status,
            milestone_links,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub fn status_texts(statuses: &[MilestoneStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

pub fn links_value(links: &MilestoneLinks) -> ApiResult<serde_json::Value> {
    serde_json::to_value(links).map_err(|e| ApiError::Internal(e.to_string()))
}

pub fn load_gig(conn: &mut PgConnection, gig_id: i32) -> ApiResult<Gig> {
    gigs::table
        .find(gig_id)
        .select(Gig::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("Gig {gig_id} not found")))
}

pub fn set_gig_status(conn: &mut PgConnection, gig_id: i32, status: GigStatus) -> ApiResult<()> {
    diesel::update(gigs::table.find(gig_id))
        .set(gigs::status.eq(status))
        .execute(conn)?;
    Ok(())
}

/// Row-locked for the rest of the caller's transaction.
pub fn load_request(conn: &mut PgConnection, request_id: i32) -> ApiResult<GigRequest> {
    gig_requests::table
        .find(request_id)
        .select(GigRequest::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("Gig request {request_id} not found")))
}

/// Row-locked for the rest of the caller's transaction.
pub fn load_active(conn: &mut PgConnection, active_id: i32) -> ApiResult<ActiveGig> {
    active_gigs::table
        .find(active_id)
        .select(ActiveGigRow::as_select())
        .for_update()
        .first::<ActiveGigRow>(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("Active gig {active_id} not found")))?
        .try_into()
}

pub fn insert_active(
    conn: &mut PgConnection,
    gig: &Gig,
    freelancer_clerk_id: &str,
) -> ApiResult<ActiveGig> {
    let statuses = vec![MilestoneStatus::Pending; gig.milestone_count()];
    diesel::insert_into(active_gigs::table)
        .values((
            active_gigs::gig_id.eq(gig.id),
            active_gigs::freelancer_clerk_id.eq(freelancer_clerk_id),
            active_gigs::employer_clerk_id.eq(&gig.employer_clerk_id),
            active_gigs::milestone_status.eq(status_texts(&statuses)),
            active_gigs::milestone_links.eq(links_value(&MilestoneLinks::new())?),
            active_gigs::status.eq(ActiveGigStatus::Active),
        ))
        .returning(ActiveGigRow::as_returning())
        .get_result::<ActiveGigRow>(conn)?
        .try_into()
}

/// Writes milestone progress and the overall status back to the row.
pub fn save_active(
    conn: &mut PgConnection,
    active_id: i32,
    statuses: &[MilestoneStatus],
    links: &MilestoneLinks,
    status: ActiveGigStatus,
) -> ApiResult<ActiveGig> {
    diesel::update(active_gigs::table.find(active_id))
        .set((
            active_gigs::milestone_status.eq(status_texts(statuses)),
            active_gigs::milestone_links.eq(links_value(links)?),
            active_gigs::status.eq(status),
            active_gigs::updated_at.eq(Utc::now()),
        ))
        .returning(ActiveGigRow::as_returning())
        .get_result::<ActiveGigRow>(conn)?
        .try_into()
}
