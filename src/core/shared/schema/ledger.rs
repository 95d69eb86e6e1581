use super::accounts::users;

diesel::table! {
    balances (id) {
        id -> Int4,
        clerk_id -> Varchar,
        amount -> Float8,
    }
}

diesel::table! {
    company_balance (id) {
        id -> Int4,
        amount -> Float8,
        last_updated -> Timestamptz,
    }
}

diesel::table! {
    reviews (id) {
        id -> Int4,
        rating -> Int4,
        employer_clerk_id -> Varchar,
        freelancer_clerk_id -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(balances -> users (clerk_id));
