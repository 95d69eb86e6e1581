//! Status and role vocabularies stored as text columns.
//!
//! Every status column is a closed enum. The database keeps the wire
//! spelling (`pending`, `OPEN`, ...) so rows stay readable from psql, and
//! parsing is case-insensitive so `Accepted` and `accepted` both land on
//! the same variant.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| format!("Unknown {}: {}", stringify!($name), s))
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(serialize::IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                value.parse::<Self>().map_err(Into::into)
            }
        }
    };
}

// ============================================================================
// USERS
// ============================================================================

text_enum! {
    /// Marketplace role carried by the session and stored on the user row.
    pub enum Role {
        Admin => "admin",
        Freelancer => "freelancer",
        Employer => "employer",
    }
}

impl Role {
    /// Roles a user may pick for themselves in the role-selection flow.
    pub fn is_self_selectable(&self) -> bool {
        matches!(self, Self::Freelancer | Self::Employer)
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Self::Admin => "/admindashboard",
            Self::Freelancer => "/freelancerdashboard",
            Self::Employer => "/employerdashboard",
        }
    }
}

// ============================================================================
// TICKETS
// ============================================================================

text_enum! {
    pub enum TicketStatus {
        Pending => "pending",
        Open => "open",
        Accepted => "accepted",
        Rejected => "rejected",
        Resolved => "resolved",
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TicketStatus {
    /// Tickets still waiting on an admin decision.
    pub fn is_awaiting_review(&self) -> bool {
        matches!(self, Self::Pending | Self::Open)
    }

    /// Statuses an admin may set through the update-status action.
    pub fn is_admin_outcome(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Resolved)
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        self.is_awaiting_review() && next.is_admin_outcome()
    }
}

text_enum! {
    pub enum Urgency {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Self::Medium
    }
}

// ============================================================================
// GIGS
// ============================================================================

text_enum! {
    pub enum GigStatus {
        Open => "OPEN",
        Closed => "CLOSED",
        InProgress => "IN_PROGRESS",
    }
}

impl Default for GigStatus {
    fn default() -> Self {
        Self::Open
    }
}

text_enum! {
    pub enum RequestStatus {
        Pending => "PENDING",
        Accepted => "ACCEPTED",
        Rejected => "REJECTED",
    }
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

text_enum! {
    pub enum ActiveGigStatus {
        Active => "ACTIVE",
        Terminated => "TERMINATED",
        Completed => "COMPLETED",
    }
}

text_enum! {
    /// Per-milestone progress on an active gig.
    pub enum MilestoneStatus {
        Pending => "PENDING",
        Submitted => "SUBMITTED",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

impl Default for MilestoneStatus {
    fn default() -> Self {
        Self::Pending
    }
}
