diesel::table! {
    users (clerk_id) {
        clerk_id -> Varchar,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        role -> Nullable<Varchar>,
        is_banned -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    user_details (id) {
        id -> Int4,
        clerk_id -> Varchar,
        phone -> Nullable<Varchar>,
        address -> Nullable<Text>,
        bio -> Nullable<Text>,
        profile_picture -> Nullable<Text>,
    }
}

diesel::table! {
    freelancer_details (id) {
        id -> Int4,
        clerk_id -> Varchar,
        occupation -> Varchar,
        skills -> Array<Text>,
        average_rating -> Float8,
        portfolio_links -> Array<Text>,
    }
}

diesel::table! {
    employer_details (id) {
        id -> Int4,
        clerk_id -> Varchar,
        works_needed -> Array<Text>,
    }
}

diesel::joinable!(user_details -> users (clerk_id));
diesel::joinable!(freelancer_details -> users (clerk_id));
diesel::joinable!(employer_details -> users (clerk_id));
