//! Profile details attached to a user: basic contact info plus the
//! freelancer or employer specific record.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{find_user, find_user_with_role};
use crate::core::shared::schema::{employer_details, freelancer_details, user_details};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::core::urls::ApiUrls;
use crate::security::Caller;

fn duplicate_as_conflict(kind: &'static str) -> impl Fn(DieselError) -> ApiError {
    move |err| match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ApiError::Conflict(format!("{kind} already exist for this user"))
        }
        other => other.into(),
    }
}

fn details_not_found(kind: &str, clerk_id: &str) -> ApiError {
    ApiError::not_found(format!("{kind} not found for user {clerk_id}"))
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// BASIC
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = user_details)]
#[serde(rename_all = "camelCase")]
pub struct BasicDetails {
    pub id: i32,
    pub clerk_id: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = user_details)]
#[serde(rename_all = "camelCase")]
pub struct NewBasicDetails {
    pub clerk_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = user_details)]
#[serde(rename_all = "camelCase")]
pub struct BasicDetailsUpdate {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

impl BasicDetailsUpdate {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.address.is_none()
            && self.bio.is_none()
            && self.profile_picture.is_none()
    }
}

fn load_basic(conn: &mut PgConnection, clerk_id: &str) -> ApiResult<BasicDetails> {
    user_details::table
        .filter(user_details::clerk_id.eq(clerk_id))
        .select(BasicDetails::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| details_not_found("User details", clerk_id))
}

pub async fn create_basic(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<NewBasicDetails>,
) -> ApiResult<(StatusCode, Json<BasicDetails>)> {
    caller.ensure_is(&req.clerk_id)?;
    let details = with_conn(&state.conn, move |conn| {
        find_user(conn, &req.clerk_id)?;
        Ok(diesel::insert_into(user_details::table)
            .values(&req)
            .returning(BasicDetails::as_returning())
            .get_result::<BasicDetails>(conn)
            .map_err(duplicate_as_conflict("User details"))?)
    })
    .await?;
    info!("Basic details created for {}", details.clerk_id);
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn get_basic(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<BasicDetails>> {
    let details = with_conn(&state.conn, move |conn| load_basic(conn, &clerk_id)).await?;
    Ok(Json(details))
}

pub async fn update_basic(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(changes): Json<BasicDetailsUpdate>,
) -> ApiResult<Json<BasicDetails>> {
    caller.ensure_is_or_admin(&clerk_id)?;
    let details = with_conn(&state.conn, move |conn| {
        let current = load_basic(conn, &clerk_id)?;
        if changes.is_empty() {
            return Ok(current);
        }
        Ok(diesel::update(user_details::table.find(current.id))
            .set(&changes)
            .returning(BasicDetails::as_returning())
            .get_result::<BasicDetails>(conn)?)
    })
    .await?;
    Ok(Json(details))
}

pub async fn delete_basic(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.ensure_is_or_admin(&clerk_id)?;
    with_conn(&state.conn, move |conn| {
        let removed = diesel::delete(user_details::table.filter(user_details::clerk_id.eq(&clerk_id)))
            .execute(conn)?;
        if removed == 0 {
            return Err(details_not_found("User details", &clerk_id));
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// FREELANCER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = freelancer_details)]
#[serde(rename_all = "camelCase")]
pub struct FreelancerDetails {
    pub id: i32,
    pub clerk_id: String,
    pub occupation: String,
    pub skills: Vec<String>,
    pub average_rating: f64,
    pub portfolio_links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = freelancer_details)]
#[serde(rename_all = "camelCase")]
pub struct NewFreelancerDetails {
    pub clerk_id: String,
    pub occupation: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub portfolio_links: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, AsChangeset)]
#[diesel(table_name = freelancer_details)]
#[serde(rename_all = "camelCase")]
pub struct FreelancerDetailsUpdate {
    pub occupation: Option<String>,
    pub skills: Option<Vec<String>>,
    pub portfolio_links: Option<Vec<String>>,
}

impl FreelancerDetailsUpdate {
    pub fn is_empty(&self) -> bool {
        self.occupation.is_none() && self.skills.is_none() && self.portfolio_links.is_none()
    }
}

fn load_freelancer(conn: &mut PgConnection, clerk_id: &str) -> ApiResult<FreelancerDetails> {
    freelancer_details::table
        .filter(freelancer_details::clerk_id.eq(clerk_id))
        .select(FreelancerDetails::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| details_not_found("Freelancer details", clerk_id))
}

pub async fn create_freelancer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(mut req): Json<NewFreelancerDetails>,
) -> ApiResult<(StatusCode, Json<FreelancerDetails>)> {
    caller.ensure_is(&req.clerk_id)?;
    if req.occupation.trim().is_empty() {
        return Err(ApiError::bad_request("occupation is required"));
    }
    req.skills = clean_list(req.skills);
    req.portfolio_links = clean_list(req.portfolio_links);

    let details = with_conn(&state.conn, move |conn| {
        find_user_with_role(conn, &req.clerk_id, Role::Freelancer)?;
        Ok(diesel::insert_into(freelancer_details::table)
            .values(&req)
            .returning(FreelancerDetails::as_returning())
            .get_result::<FreelancerDetails>(conn)
            .map_err(duplicate_as_conflict("Freelancer details"))?)
    })
    .await?;
    info!("Freelancer details created for {}", details.clerk_id);
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn get_freelancer(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<FreelancerDetails>> {
    let details = with_conn(&state.conn, move |conn| load_freelancer(conn, &clerk_id)).await?;
    Ok(Json(details))
}

pub async fn update_freelancer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(mut changes): Json<FreelancerDetailsUpdate>,
) -> ApiResult<Json<FreelancerDetails>> {
    caller.ensure_is_or_admin(&clerk_id)?;
    changes.skills = changes.skills.map(clean_list);
    changes.portfolio_links = changes.portfolio_links.map(clean_list);

    let details = with_conn(&state.conn, move |conn| {
        let current = load_freelancer(conn, &clerk_id)?;
        if changes.is_empty() {
            return Ok(current);
        }
        Ok(diesel::update(freelancer_details::table.find(current.id))
            .set(&changes)
            .returning(FreelancerDetails::as_returning())
            .get_result::<FreelancerDetails>(conn)?)
    })
    .await?;
    Ok(Json(details))
}

pub async fn delete_freelancer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.ensure_is_or_admin(&clerk_id)?;
    with_conn(&state.conn, move |conn| {
        let removed = diesel::delete(
            freelancer_details::table.filter(freelancer_details::clerk_id.eq(&clerk_id)),
        )
        .execute(conn)?;
        if removed == 0 {
            return Err(details_not_found("Freelancer details", &clerk_id));
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// EMPLOYER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = employer_details)]
#[serde(rename_all = "camelCase")]
pub struct EmployerDetails {
    pub id: i32,
    pub clerk_id: String,
    pub works_needed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = employer_details)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployerDetails {
    pub clerk_id: String,
    #[serde(default)]
    pub works_needed: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerDetailsUpdate {
    pub works_needed: Option<Vec<String>>,
}

fn load_employer(conn: &mut PgConnection, clerk_id: &str) -> ApiResult<EmployerDetails> {
    employer_details::table
        .filter(employer_details::clerk_id.eq(clerk_id))
        .select(EmployerDetails::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| details_not_found("Employer details", clerk_id))
}

pub async fn create_employer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(mut req): Json<NewEmployerDetails>,
) -> ApiResult<(StatusCode, Json<EmployerDetails>)> {
    caller.ensure_is(&req.clerk_id)?;
    req.works_needed = clean_list(req.works_needed);
    let details = with_conn(&state.conn, move |conn| {
        find_user_with_role(conn, &req.clerk_id, Role::Employer)?;
        Ok(diesel::insert_into(employer_details::table)
            .values(&req)
            .returning(EmployerDetails::as_returning())
            .get_result::<EmployerDetails>(conn)
            .map_err(duplicate_as_conflict("Employer details"))?)
    })
    .await?;
    info!("Employer details created for {}", details.clerk_id);
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn get_employer(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<EmployerDetails>> {
    let details = with_conn(&state.conn, move |conn| load_employer(conn, &clerk_id)).await?;
    Ok(Json(details))
}

pub async fn update_employer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(changes): Json<EmployerDetailsUpdate>,
) -> ApiResult<Json<EmployerDetails>> {
    caller.ensure_is_or_admin(&clerk_id)?;
    let details = with_conn(&state.conn, move |conn| {
        let current = load_employer(conn, &clerk_id)?;
        let Some(works) = changes.works_needed else {
            return Ok(current);
        };
        Ok(diesel::update(employer_details::table.find(current.id))
            .set(employer_details::works_needed.eq(clean_list(works)))
            .returning(EmployerDetails::as_returning())
            .get_result::<EmployerDetails>(conn)?)
    })
    .await?;
    Ok(Json(details))
}

pub async fn delete_employer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.ensure_is_or_admin(&clerk_id)?;
    with_conn(&state.conn, move |conn| {
        let removed = diesel::delete(
            employer_details::table.filter(employer_details::clerk_id.eq(&clerk_id)),
        )
        .execute(conn)?;
        if removed == 0 {
            return Err(details_not_found("Employer details", &clerk_id));
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_profiles_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::BASIC_DETAILS, post(create_basic))
        .route(
            ApiUrls::BASIC_DETAILS_BY_ID,
            get(get_basic).put(update_basic).delete(delete_basic),
        )
        .route(ApiUrls::FREELANCER_DETAILS, post(create_freelancer))
        .route(
            ApiUrls::FREELANCER_DETAILS_BY_ID,
            get(get_freelancer).put(update_freelancer).delete(delete_freelancer),
        )
        .route(ApiUrls::EMPLOYER_DETAILS, post(create_employer))
        .route(
            ApiUrls::EMPLOYER_DETAILS_BY_ID,
            get(get_employer).put(update_employer).delete(delete_employer),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_details_wire_names() {
        let req: NewBasicDetails = serde_json::from_value(json!({
            "clerkId": "user_1",
            "phone": "+15550100",
            "profilePicture": "https://cdn.example.com/a.png"
        }))
        .unwrap();
        assert_eq!(req.clerk_id, "user_1");
        assert_eq!(req.profile_picture.as_deref(), Some("https://cdn.example.com/a.png"));
        assert_eq!(req.bio, None);
    }

    #[test]
    fn test_partial_update_detection() {
        assert!(BasicDetailsUpdate::default().is_empty());
        let update: BasicDetailsUpdate = serde_json::from_value(json!({"bio": "Rustacean"})).unwrap();
        assert!(!update.is_empty());
        assert!(FreelancerDetailsUpdate::default().is_empty());
    }

    #[test]
    fn test_freelancer_details_serialize_average_rating() {
        let details = FreelancerDetails {
            id: 1,
            clerk_id: "free_1".into(),
            occupation: "Backend developer".into(),
            skills: vec!["rust".into()],
            average_rating: 4.5,
            portfolio_links: vec![],
        };
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["averageRating"], 4.5);
        assert_eq!(value["portfolioLinks"], json!([]));
        assert_eq!(value["clerkId"], "free_1");
    }

    #[test]
    fn test_clean_list_drops_blanks() {
        assert_eq!(
            clean_list(vec![" rust ".into(), "".into(), "sql".into()]),
            vec!["rust", "sql"]
        );
    }
}
