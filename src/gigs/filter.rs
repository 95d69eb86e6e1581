//! Query parameters of the gig listing.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::Gig;
use crate::core::shared::enums::GigStatus;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::schema::gigs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GigQuery {
    pub title: Option<String>,
    /// Comma separated.
    pub skills: Option<String>,
    pub min_payment: Option<f64>,
    pub max_payment: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GigSearch {
    pub title: Option<String>,
    pub skills: Vec<String>,
    pub min_payment: Option<f64>,
    pub max_payment: Option<f64>,
    /// `None` lists every status.
    pub status: Option<GigStatus>,
}

impl GigQuery {
    pub fn into_search(self) -> ApiResult<GigSearch> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let skills = self
            .skills
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        for bound in [self.min_payment, self.max_payment].into_iter().flatten() {
            if !bound.is_finite() || bound < 0.0 {
                return Err(ApiError::bad_request("Payment bounds must be non-negative numbers"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_payment, self.max_payment) {
            if min > max {
                return Err(ApiError::bad_request(
                    "min_payment cannot be greater than max_payment",
                ));
            }
        }

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => Some(GigStatus::Open),
            Some(all) if all.eq_ignore_ascii_case("all") => None,
            Some(raw) => Some(raw.parse::<GigStatus>().map_err(|_| {
                ApiError::bad_request(format!(
                    "Invalid status: {raw}. Use OPEN, CLOSED, IN_PROGRESS or ALL"
                ))
            })?),
        };

        Ok(GigSearch {
            title,
            skills,
            min_payment: self.min_payment,
            max_payment: self.max_payment,
            status,
        })
    }
}

/// Escapes LIKE wildcards so the title is matched literally.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn search_gigs(conn: &mut PgConnection, search: &GigSearch) -> ApiResult<Vec<Gig>> {
    let mut query = gigs::table.select(Gig::as_select()).into_boxed();

    if let Some(title) = &search.title {
        query = query.filter(gigs::title.ilike(format!("%{}%", escape_like(title))));
    }
    for skill in &search.skills {
        query = query.filter(gigs::skills_needed.contains(vec![skill.clone()]));
    }
    if let Some(min) = search.min_payment {
        query = query.filter(gigs::total_payment.ge(min));
    }
    if let Some(max) = search.max_payment {
        query = query.filter(gigs::total_payment.le(max));
    }
    if let Some(status) = search.status {
        query = query.filter(gigs::status.eq(status));
    }

    Ok(query
        .order((gigs::created_at.desc(), gigs::id.desc()))
        .load(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_open_gigs() {
        let search = GigQuery::default().into_search().unwrap();
        assert_eq!(search.status, Some(GigStatus::Open));
        assert!(search.skills.is_empty());
        assert_eq!(search.title, None);
    }

    #[test]
    fn test_skills_are_split_and_trimmed() {
        let search = GigQuery {
            skills: Some("rust, react,,  sql ".into()),
            title: Some("  web ".into()),
            ..Default::default()
        }
        .into_search()
        .unwrap();
        assert_eq!(search.skills, vec!["rust", "react", "sql"]);
        assert_eq!(search.title.as_deref(), Some("web"));
    }

    #[test]
    fn test_status_parsing() {
        let all = GigQuery {
            status: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(all.into_search().unwrap().status, None);

        let progress = GigQuery {
            status: Some("in_progress".into()),
            ..Default::default()
        };
        assert_eq!(progress.into_search().unwrap().status, Some(GigStatus::InProgress));

        let bad = GigQuery {
            status: Some("done".into()),
            ..Default::default()
        };
        assert!(bad.into_search().is_err());
    }

    #[test]
    fn test_payment_range_validation() {
        let inverted = GigQuery {
            min_payment: Some(500.0),
            max_payment: Some(100.0),
            ..Default::default()
        };
        assert!(inverted.into_search().is_err());
        let negative = GigQuery {
            min_payment: Some(-1.0),
            ..Default::default()
        };
        assert!(negative.into_search().is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
