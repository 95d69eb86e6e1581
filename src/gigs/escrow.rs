//! Milestone state machine and the money it moves.
//!
//! The functions here only decide; callers apply the result inside a
//! transaction through `billing::ledger`.
//!
//! Money flow for a gig with payments `p0..pn`:
//! accepting a request escrows `p0` from the employer into the company
//! balance; approving milestone `i` pays `pi` from the company to the
//! freelancer and, unless `i` is the last one, escrows `p(i+1)` from the
//! employer. Rejecting a submitted milestone refunds its escrow to the
//! employer and terminates the active gig.

use serde_json::Value;

use super::models::{ActiveGig, Gig, MilestoneLinks};
use crate::core::shared::enums::{ActiveGigStatus, GigStatus, MilestoneStatus};
use crate::core::shared::error::{ApiError, ApiResult};

/// Amount escrowed from the employer when a request is accepted.
pub fn escrow_on_accept(gig: &Gig, payment_verified: bool) -> ApiResult<f64> {
    if gig.status != GigStatus::Open {
        return Err(ApiError::bad_request(format!(
            "Gig {} is not open (status: {})",
            gig.id, gig.status
        )));
    }
    if !payment_verified {
        return Err(ApiError::bad_request(
            "Payment verification is required to accept a request",
        ));
    }
    gig.milestone_payments
        .first()
        .copied()
        .ok_or_else(|| ApiError::bad_request(format!("Gig {} has no milestones", gig.id)))
}

/// Accepts links as a JSON array, a string holding a JSON array, or a
/// single URL string.
pub fn parse_links(raw: &Value) -> ApiResult<Vec<String>> {
    let invalid = || ApiError::bad_request("links must be a list of URLs or a single URL");
    let links: Vec<String> = match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<ApiResult<_>>()?,
        Value::String(text) if text.trim_start().starts_with('[') => {
            serde_json::from_str(text.trim()).map_err(|_| invalid())?
        }
        Value::String(text) => vec![text.clone()],
        _ => return Err(invalid()),
    };
    let links: Vec<String> = links
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if links.is_empty() {
        return Err(ApiError::bad_request("At least one link is required"));
    }
    Ok(links)
}

fn ensure_running(active: &ActiveGig) -> ApiResult<()> {
    if active.status != ActiveGigStatus::Active {
        return Err(ApiError::bad_request(format!(
            "Active gig {} is {}",
            active.id, active.status
        )));
    }
    Ok(())
}

fn milestone_at(active: &ActiveGig, index: usize) -> ApiResult<MilestoneStatus> {
    active.milestone_status.get(index).copied().ok_or_else(|| {
        ApiError::bad_request(format!(
            "Invalid milestone index {index}; gig has {} milestones",
            active.milestone_status.len()
        ))
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub milestone_status: Vec<MilestoneStatus>,
    pub milestone_links: MilestoneLinks,
}

/// Milestones are submitted in order; a submitted milestone may be
/// resubmitted until it is approved.
pub fn plan_submission(active: &ActiveGig, index: usize, links: Vec<String>) -> ApiResult<Submission> {
    ensure_running(active)?;
    let current = milestone_at(active, index)?;
    if let Some(blocking) = active.milestone_status[..index]
        .iter()
        .position(|s| *s != MilestoneStatus::Approved)
    {
        return Err(ApiError::bad_request(format!(
            "Milestone {blocking} must be approved before submitting milestone {index}"
        )));
    }
    if current == MilestoneStatus::Approved {
        return Err(ApiError::bad_request(format!("Milestone {index} is already approved")));
    }

    let mut milestone_status = active.milestone_status.clone();
    milestone_status[index] = MilestoneStatus::Submitted;
    let mut milestone_links = active.milestone_links.clone();
    milestone_links.insert(index.to_string(), links);
    Ok(Submission {
        milestone_status,
        milestone_links,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub payout: f64,
    pub next_escrow: Option<f64>,
    pub milestone_status: Vec<MilestoneStatus>,
    pub status: ActiveGigStatus,
}

impl Approval {
    pub fn completes(&self) -> bool {
        self.status == ActiveGigStatus::Completed
    }
}

pub fn plan_approval(
    gig: &Gig,
    active: &ActiveGig,
    index: usize,
    payment_verified: bool,
) -> ApiResult<Approval> {
    ensure_running(active)?;
    match milestone_at(active, index)? {
        MilestoneStatus::Submitted => {}
        MilestoneStatus::Approved => {
            return Err(ApiError::bad_request(format!("Milestone {index} is already approved")))
        }
        _ => {
            return Err(ApiError::bad_request(format!(
                "Milestone {index} has not been submitted"
            )))
        }
    }

    let payout = gig.payment_for(index)?;
    let is_last = index + 1 == active.milestone_status.len();
    let next_escrow = if is_last {
        None
    } else {
        if !payment_verified {
            return Err(ApiError::bad_request(
                "Payment verification is required to fund the next milestone",
            ));
        }
        Some(gig.payment_for(index + 1)?)
    };

    let mut milestone_status = active.milestone_status.clone();
    milestone_status[index] = MilestoneStatus::Approved;
    Ok(Approval {
        payout,
        next_escrow,
        milestone_status,
        status: if is_last {
            ActiveGigStatus::Completed
        } else {
            ActiveGigStatus::Active
        },
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub refund: f64,
    pub milestone_status: Vec<MilestoneStatus>,
}

pub fn plan_rejection(gig: &Gig, active: &ActiveGig, index: usize) -> ApiResult<Rejection> {
    ensure_running(active)?;
    match milestone_at(active, index)? {
        MilestoneStatus::Submitted => {}
        MilestoneStatus::Approved => {
            return Err(ApiError::bad_request(format!(
                "Milestone {index} is already approved and cannot be rejected"
            )))
        }
        _ => {
            return Err(ApiError::bad_request(format!(
                "Milestone {index} has not been submitted"
            )))
        }
    }
    let mut milestone_status = active.milestone_status.clone();
    milestone_status[index] = MilestoneStatus::Rejected;
    Ok(Rejection {
        refund: gig.payment_for(index)?,
        milestone_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;

    fn gig(payments: &[f64]) -> Gig {
        Gig {
            id: 1,
            title: "Landing page".into(),
            description: "Build it".into(),
            skills_needed: vec!["rust".into()],
            project_deadline: Utc::now(),
            milestones: payments.iter().enumerate().map(|(i, _)| format!("m{i}")).collect(),
            milestone_payments: payments.to_vec(),
            total_payment: payments.iter().sum(),
            status: GigStatus::Open,
            employer_clerk_id: "emp_1".into(),
            created_at: Utc::now(),
        }
    }

    fn active(statuses: &[MilestoneStatus]) -> ActiveGig {
        ActiveGig {
            id: 9,
            gig_id: 1,
            freelancer_clerk_id: "free_1".into(),
            employer_clerk_id: "emp_1".into(),
            milestone_status: statuses.to_vec(),
            milestone_links: MilestoneLinks::new(),
            status: ActiveGigStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    use MilestoneStatus::{Approved, Pending, Submitted};

    #[test]
    fn test_accepting_escrows_first_payment() {
        assert_eq!(escrow_on_accept(&gig(&[40.0, 60.0]), true).unwrap(), 40.0);
        assert!(escrow_on_accept(&gig(&[40.0]), false).is_err());
        let mut closed = gig(&[40.0]);
        closed.status = GigStatus::InProgress;
        assert!(escrow_on_accept(&closed, true).is_err());
    }

    #[test]
    fn test_parse_links_accepts_three_shapes() {
        assert_eq!(
            parse_links(&json!(["https://a.dev", " https://b.dev "])).unwrap(),
            vec!["https://a.dev", "https://b.dev"]
        );
        assert_eq!(
            parse_links(&json!("[\"https://a.dev\"]")).unwrap(),
            vec!["https://a.dev"]
        );
        assert_eq!(parse_links(&json!("https://a.dev")).unwrap(), vec!["https://a.dev"]);
        assert!(parse_links(&json!([])).is_err());
        assert!(parse_links(&json!(42)).is_err());
        assert!(parse_links(&json!("[not json")).is_err());
    }

    #[test]
    fn test_submission_requires_prior_approval() {
        let err = plan_submission(&active(&[Pending, Pending]), 1, vec!["x".into()]).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let plan = plan_submission(&active(&[Approved, Pending]), 1, vec!["x".into()]).unwrap();
        assert_eq!(plan.milestone_status, vec![Approved, Submitted]);
        assert_eq!(plan.milestone_links["1"], vec!["x"]);
    }

    #[test]
    fn test_submission_index_and_state_checks() {
        assert!(plan_submission(&active(&[Pending]), 3, vec!["x".into()]).is_err());
        assert!(plan_submission(&active(&[Approved]), 0, vec!["x".into()]).is_err());
        let mut finished = active(&[Pending]);
        finished.status = ActiveGigStatus::Terminated;
        assert!(plan_submission(&finished, 0, vec!["x".into()]).is_err());
        // resubmission replaces the links
        let again = plan_submission(&active(&[Submitted]), 0, vec!["y".into()]).unwrap();
        assert_eq!(again.milestone_links["0"], vec!["y"]);
    }

    #[test]
    fn test_approving_middle_milestone_escrows_next() {
        let plan = plan_approval(&gig(&[40.0, 60.0]), &active(&[Submitted, Pending]), 0, true).unwrap();
        assert_eq!(plan.payout, 40.0);
        assert_eq!(plan.next_escrow, Some(60.0));
        assert_eq!(plan.status, ActiveGigStatus::Active);
        assert!(!plan.completes());

        let err = plan_approval(&gig(&[40.0, 60.0]), &active(&[Submitted, Pending]), 0, false)
            .unwrap_err();
        assert!(err.message().contains("Payment verification"));
    }

    #[test]
    fn test_approving_last_milestone_completes() {
        let plan = plan_approval(&gig(&[40.0, 60.0]), &active(&[Approved, Submitted]), 1, false).unwrap();
        assert_eq!(plan.payout, 60.0);
        assert_eq!(plan.next_escrow, None);
        assert!(plan.completes());
        assert_eq!(plan.milestone_status, vec![Approved, Approved]);
    }

    #[test]
    fn test_cannot_approve_twice_or_unsubmitted() {
        let g = gig(&[10.0]);
        assert!(plan_approval(&g, &active(&[Approved]), 0, true).is_err());
        assert!(plan_approval(&g, &active(&[Pending]), 0, true).is_err());
    }

    #[test]
    fn test_rejection_refunds_escrow() {
        let plan = plan_rejection(&gig(&[40.0, 60.0]), &active(&[Approved, Submitted]), 1).unwrap();
        assert_eq!(plan.refund, 60.0);
        assert_eq!(plan.milestone_status, vec![Approved, MilestoneStatus::Rejected]);
        assert!(plan_rejection(&gig(&[40.0]), &active(&[Approved]), 0).is_err());
        assert!(plan_rejection(&gig(&[40.0]), &active(&[Pending]), 0).is_err());
    }
}
