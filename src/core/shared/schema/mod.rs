pub mod accounts;
pub mod ledger;
pub mod marketplace;
pub mod support;

pub use self::accounts::*;
pub use self::ledger::*;
pub use self::marketplace::*;
pub use self::support::*;

diesel::allow_tables_to_appear_in_same_query!(
    users,
    user_details,
    freelancer_details,
    employer_details,
    tickets,
    chat_messages,
    gigs,
    gig_requests,
    active_gigs,
    balances,
    company_balance,
    reviews,
);

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::pg::Pg;
    use diesel::prelude::*;

    #[test]
    fn test_table_modules_resolve_through_schema_root() {
        let pending = tickets::table
            .inner_join(users::table)
            .filter(users::is_banned.eq(false))
            .select(tickets::id);
        let sql = diesel::debug_query::<Pg, _>(&pending).to_string();
        assert!(sql.contains(r#"INNER JOIN "users""#));

        let funded = balances::table
            .inner_join(users::table)
            .select((balances::amount, users::clerk_id));
        let sql = diesel::debug_query::<Pg, _>(&funded).to_string();
        assert!(sql.contains(r#""balances"."amount""#));

        let open = gigs::table
            .filter(gigs::status.eq("OPEN"))
            .select(gigs::id);
        assert!(diesel::debug_query::<Pg, _>(&open)
            .to_string()
            .contains(r#""gigs"."status""#));
    }
}
