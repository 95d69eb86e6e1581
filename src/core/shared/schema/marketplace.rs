diesel::table! {
    gigs (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        skills_needed -> Array<Text>,
        project_deadline -> Timestamptz,
        milestones -> Array<Text>,
        milestone_payments -> Array<Float8>,
        total_payment -> Float8,
        status -> Varchar,
        employer_clerk_id -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    gig_requests (id) {
        id -> Int4,
        gig_id -> Int4,
        freelancer_clerk_id -> Varchar,
        freelancer_wallet_address -> Varchar,
        employer_clerk_id -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    active_gigs (id) {
        id -> Int4,
        gig_id -> Int4,
        freelancer_clerk_id -> Varchar,
        employer_clerk_id -> Varchar,
        milestone_status -> Array<Text>,
        milestone_links -> Jsonb,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(gig_requests -> gigs (gig_id));
diesel::joinable!(active_gigs -> gigs (gig_id));
