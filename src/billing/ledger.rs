//! Balance rows and the transfers between them.
//!
//! Every function here expects to run inside the caller's transaction;
//! balance rows are read `FOR UPDATE` so concurrent transfers serialise on
//! the rows they touch. Rows are always locked company first, then users
//! ordered by clerk id.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{balances, company_balance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = balances)]
pub struct Balance {
    pub id: i32,
    #[serde(rename = "clerkId")]
    pub clerk_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = company_balance)]
pub struct CompanyBalance {
    pub id: i32,
    pub amount: f64,
    pub last_updated: DateTime<Utc>,
}

/// One side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    User(String),
    Company,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "balance of {id}"),
            Self::Company => f.write_str("company balance"),
        }
    }
}

/// The company balance is a single row with this id, seeded by the migrations.
pub const COMPANY_BALANCE_ID: i32 = 1;

/// Absorbs float noise in sums like `0.1 + 0.2`; never a whole cent.
const FUNDS_EPSILON: f64 = 1e-9;

/// Fails with 400 unless `available` covers `required`, so no debit can
/// take a balance below zero.
pub fn check_funds(account: &Account, available: f64, required: f64) -> ApiResult<()> {
    if available + FUNDS_EPSILON < required {
        return Err(ApiError::bad_request(format!(
            "Insufficient funds in {account}: {available:.2} available, {required:.2} required"
        )));
    }
    Ok(())
}

pub fn lock_user_balance(conn: &mut PgConnection, clerk_id: &str) -> ApiResult<Option<Balance>> {
    Ok(balances::table
        .filter(balances::clerk_id.eq(clerk_id))
        .select(Balance::as_select())
        .for_update()
        .first(conn)
        .optional()?)
}

pub fn lock_company_balance(conn: &mut PgConnection) -> ApiResult<Option<CompanyBalance>> {
    Ok(company_balance::table
        .find(COMPANY_BALANCE_ID)
        .select(CompanyBalance::as_select())
        .for_update()
        .first(conn)
        .optional()?)
}

pub fn user_balance_or_create(conn: &mut PgConnection, clerk_id: &str) -> ApiResult<Balance> {
    diesel::insert_into(balances::table)
        .values((balances::clerk_id.eq(clerk_id), balances::amount.eq(0.0)))
        .on_conflict(balances::clerk_id)
        .do_nothing()
        .execute(conn)?;
    lock_user_balance(conn, clerk_id)?
        .ok_or_else(|| ApiError::Internal(format!("balance for {clerk_id} vanished after insert")))
}

/// The migrations seed the row; the conflict-free insert only covers a
/// database where it was deleted by hand.
pub fn company_balance_or_create(conn: &mut PgConnection) -> ApiResult<CompanyBalance> {
    diesel::insert_into(company_balance::table)
        .values((
            company_balance::id.eq(COMPANY_BALANCE_ID),
            company_balance::amount.eq(0.0),
            company_balance::last_updated.eq(Utc::now()),
        ))
        .on_conflict(company_balance::id)
        .do_nothing()
        .execute(conn)?;
    lock_company_balance(conn)?
        .ok_or_else(|| ApiError::Internal("company balance vanished after insert".into()))
}

/// Current amount held by `account`, `None` when it has no row yet.
pub fn amount_of(conn: &mut PgConnection, account: &Account) -> ApiResult<Option<f64>> {
    Ok(match account {
        Account::User(id) => lock_user_balance(conn, id)?.map(|b| b.amount),
        Account::Company => lock_company_balance(conn)?.map(|b| b.amount),
    })
}

/// Adds `delta` (which may be negative) to the account's row.
pub fn adjust(conn: &mut PgConnection, account: &Account, delta: f64) -> ApiResult<f64> {
    match account {
        Account::User(id) => Ok(diesel::update(balances::table.filter(balances::clerk_id.eq(id)))
            .set(balances::amount.eq(balances::amount + delta))
            .returning(balances::amount)
            .get_result(conn)?),
        Account::Company => {
            company_balance_or_create(conn)?;
            Ok(diesel::update(company_balance::table.find(COMPANY_BALANCE_ID))
                .set((
                    company_balance::amount.eq(company_balance::amount + delta),
                    company_balance::last_updated.eq(Utc::now()),
                ))
                .returning(company_balance::amount)
                .get_result(conn)?)
        }
    }
}

/// The order rows are locked in: the company row first, then user rows
/// sorted by clerk id, each once.
pub fn lock_order(accounts: &[&Account]) -> Vec<Account> {
    let mut users: Vec<&str> = accounts
        .iter()
        .filter_map(|account| match account {
            Account::User(id) => Some(id.as_str()),
            Account::Company => None,
        })
        .collect();
    users.sort_unstable();
    users.dedup();

    let company = accounts
        .contains(&&Account::Company)
        .then_some(Account::Company);
    company
        .into_iter()
        .chain(users.into_iter().map(|id| Account::User(id.to_string())))
        .collect()
}

/// Creates and locks the rows of `accounts` in `lock_order`, so two
/// transactions that lock through here never wait on each other in a cycle.
pub fn lock_accounts(conn: &mut PgConnection, accounts: &[&Account]) -> ApiResult<()> {
    for account in lock_order(accounts) {
        match account {
            Account::Company => {
                company_balance_or_create(conn)?;
            }
            Account::User(clerk_id) => {
                user_balance_or_create(conn, &clerk_id)?;
            }
        }
    }
    Ok(())
}

/// Moves `amount` from one account to another. The source must already
/// hold enough funds (400); missing rows are created empty.
pub fn transfer(conn: &mut PgConnection, from: &Account, to: &Account, amount: f64) -> ApiResult<()> {
    if !(amount > 0.0) {
        return Err(ApiError::bad_request("Transfer amount must be positive"));
    }
    lock_accounts(conn, &[from, to])?;
    let available = amount_of(conn, from)?
        .ok_or_else(|| ApiError::Internal(format!("{from} not found")))?;
    check_funds(from, available, amount)?;
    adjust(conn, from, -amount)?;
    adjust(conn, to, amount)?;
    log::info!("Moved {amount:.2} from {from} to {to}");
    Ok(())
}
