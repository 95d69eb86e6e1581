//! User balances and the company escrow balance.

pub mod ledger;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::find_user;
use crate::core::shared::schema::balances;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::core::urls::ApiUrls;
use crate::security::Caller;

pub use ledger::{Account, Balance, CompanyBalance};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: f64,
}

impl AmountRequest {
    /// Amount for add and withdraw, which must be strictly positive.
    pub fn positive(&self) -> ApiResult<f64> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ApiError::bad_request("Amount must be greater than zero"));
        }
        Ok(self.amount)
    }

    pub fn non_negative(&self) -> ApiResult<f64> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(ApiError::bad_request("Amount cannot be negative"));
        }
        Ok(self.amount)
    }
}

pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<Balance>> {
    let balance = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            find_user(conn, &clerk_id)?;
            ledger::user_balance_or_create(conn, &clerk_id)
        })
    })
    .await?;
    Ok(Json(balance))
}

/// Overwrites a balance outright, so only admins may call it.
pub async fn set_balance(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Json<Balance>> {
    caller.ensure_admin()?;
    let amount = req.non_negative()?;
    let balance = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            find_user(conn, &clerk_id)?;
            ledger::user_balance_or_create(conn, &clerk_id)?;
            Ok(diesel::update(balances::table.filter(balances::clerk_id.eq(&clerk_id)))
                .set(balances::amount.eq(amount))
                .returning(Balance::as_returning())
                .get_result::<Balance>(conn)?)
        })
    })
    .await?;
    info!("Balance of {} set to {:.2}", balance.clerk_id, balance.amount);
    Ok(Json(balance))
}

pub async fn add_funds(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Json<Balance>> {
    caller.ensure_is(&clerk_id)?;
    let amount = req.positive()?;
    let balance = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            find_user(conn, &clerk_id)?;
            let mut balance = ledger::user_balance_or_create(conn, &clerk_id)?;
            balance.amount = ledger::adjust(conn, &Account::User(clerk_id.clone()), amount)?;
            Ok(balance)
        })
    })
    .await?;
    info!("Added {amount:.2} to {}", balance.clerk_id);
    Ok(Json(balance))
}

pub async fn withdraw_funds(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<Json<Balance>> {
    caller.ensure_is(&clerk_id)?;
    let amount = req.positive()?;
    let balance = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            find_user(conn, &clerk_id)?;
            let account = Account::User(clerk_id.clone());
            let mut balance = ledger::lock_user_balance(conn, &clerk_id)?
                .ok_or_else(|| ApiError::not_found(format!("Balance for user {clerk_id} not found")))?;
            ledger::check_funds(&account, balance.amount, amount)?;
            balance.amount = ledger::adjust(conn, &account, -amount)?;
            Ok(balance)
        })
    })
    .await?;
    info!("Withdrew {amount:.2} from {}", balance.clerk_id);
    Ok(Json(balance))
}

pub async fn get_company_balance(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CompanyBalance>> {
    let balance = with_conn(&state.conn, |conn| {
        conn.transaction(ledger::company_balance_or_create)
    })
    .await?;
    Ok(Json(balance))
}

pub fn configure_billing_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::BALANCE_BY_USER, get(get_balance).put(set_balance))
        .route(ApiUrls::BALANCE_ADD, post(add_funds))
        .route(ApiUrls::BALANCE_WITHDRAW, post(withdraw_funds))
        .route(ApiUrls::BALANCE_COMPANY, get(get_company_balance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_validation() {
        assert_eq!(AmountRequest { amount: 25.0 }.positive().unwrap(), 25.0);
        assert!(AmountRequest { amount: 0.0 }.positive().is_err());
        assert!(AmountRequest { amount: -3.0 }.positive().is_err());
        assert!(AmountRequest { amount: f64::NAN }.positive().is_err());
        assert_eq!(AmountRequest { amount: 0.0 }.non_negative().unwrap(), 0.0);
        assert!(AmountRequest { amount: -0.5 }.non_negative().is_err());
    }
}
