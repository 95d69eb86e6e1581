use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::{user_details, users};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub clerk_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}

pub fn find_user(conn: &mut PgConnection, id: &str) -> ApiResult<User> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("User with clerkId {id} not found")))
}

/// Loads the user and checks their role, 403 when it differs.
pub fn find_user_with_role(conn: &mut PgConnection, id: &str, role: Role) -> ApiResult<User> {
    let user = find_user(conn, id)?;
    if !user.has_role(role) {
        return Err(ApiError::Forbidden(format!(
            "User {id} does not have the {role} role"
        )));
    }
    Ok(user)
}

/// Phone number from the user's basic details, if one was recorded.
pub fn find_phone(conn: &mut PgConnection, id: &str) -> ApiResult<Option<String>> {
    let phone = user_details::table
        .filter(user_details::clerk_id.eq(id))
        .select(user_details::phone)
        .first::<Option<String>>(conn)
        .optional()?;
    Ok(phone.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<Role>) -> User {
        User {
            clerk_id: "user_1".into(),
            email: "ana@example.com".into(),
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            role,
            is_banned: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(user(None).display_name(), "Ana Silva");
    }

    #[test]
    fn test_missing_role_matches_nothing() {
        assert!(!user(None).has_role(Role::Admin));
        assert!(user(Some(Role::Employer)).has_role(Role::Employer));
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(user(Some(Role::Freelancer))).unwrap();
        assert_eq!(value["clerkId"], "user_1");
        assert_eq!(value["firstName"], "Ana");
        assert_eq!(value["role"], "freelancer");
        assert_eq!(value["isBanned"], false);
    }
}
