use super::accounts::users;

diesel::table! {
    tickets (id) {
        id -> Int4,
        title -> Varchar,
        description -> Text,
        status -> Varchar,
        urgency -> Varchar,
        created_by -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    chat_messages (id) {
        id -> Int4,
        ticket_id -> Int4,
        sender_id -> Varchar,
        sender_name -> Varchar,
        message -> Text,
        timestamp -> Timestamptz,
    }
}

diesel::joinable!(tickets -> users (created_by));
diesel::joinable!(chat_messages -> tickets (ticket_id));
