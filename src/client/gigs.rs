//! Gig browsing with server-side filtering.

use async_trait::async_trait;

use super::error::ClientError;
use crate::core::shared::enums::GigStatus;
use crate::gigs::Gig;

#[async_trait]
pub trait GigApi: Send + Sync {
    async fn list_gigs(&self, filter: &GigFilter) -> Result<Vec<Gig>, ClientError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GigFilter {
    pub search: String,
    pub skills: Vec<String>,
    pub min_payment: Option<f64>,
    pub max_payment: Option<f64>,
    pub status: Option<GigStatus>,
}

impl GigFilter {
    /// Query parameters for `GET /gigs/`. Empty criteria are left out.
    pub fn to_query_string(&self) -> String {
        let mut params: Vec<(&str, String)> = Vec::new();
        let search = self.search.trim();
        if !search.is_empty() {
            params.push(("title", search.to_string()));
        }
        let skills: Vec<&str> = self
            .skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if !skills.is_empty() {
            params.push(("skills", skills.join(",")));
        }
        if let Some(min) = self.min_payment {
            params.push(("min_payment", min.to_string()));
        }
        if let Some(max) = self.max_payment {
            params.push(("max_payment", max.to_string()));
        }
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        params
            .into_iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(&v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn path(&self) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            "/gigs/".to_string()
        } else {
            format!("/gigs/?{query}")
        }
    }
}

/// Gig list that refetches on every filter change. Each refresh replaces
/// the list with the server's answer for the current filter.
#[derive(Debug, Clone, Default)]
pub struct GigBrowser {
    filter: GigFilter,
    gigs: Vec<Gig>,
    error: Option<String>,
    fetches: usize,
}

impl GigBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> &GigFilter {
        &self.filter
    }

    pub fn gigs(&self) -> &[Gig] {
        &self.gigs
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub async fn refresh(&mut self, api: &dyn GigApi) {
        self.fetches += 1;
        match api.list_gigs(&self.filter).await {
            Ok(gigs) => {
                self.gigs = gigs;
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub async fn set_search(&mut self, api: &dyn GigApi, search: impl Into<String>) {
        self.filter.search = search.into();
        self.refresh(api).await;
    }

    pub async fn set_skills(&mut self, api: &dyn GigApi, skills: Vec<String>) {
        self.filter.skills = skills;
        self.refresh(api).await;
    }

    pub async fn set_payment_range(
        &mut self,
        api: &dyn GigApi,
        min_payment: Option<f64>,
        max_payment: Option<f64>,
    ) {
        self.filter.min_payment = min_payment;
        self.filter.max_payment = max_payment;
        self.refresh(api).await;
    }

    pub async fn set_status(&mut self, api: &dyn GigApi, status: Option<GigStatus>) {
        self.filter.status = status;
        self.refresh(api).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingApi {
        paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GigApi for RecordingApi {
        async fn list_gigs(&self, filter: &GigFilter) -> Result<Vec<Gig>, ClientError> {
            self.paths.lock().unwrap().push(filter.path());
            if filter.search == "boom" {
                return Err(ClientError::Status {
                    status: 500,
                    message: "Internal server error".into(),
                });
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_empty_filter_has_no_query() {
        assert_eq!(GigFilter::default().path(), "/gigs/");
    }

    #[test]
    fn test_query_string_encodes_every_criterion() {
        let filter = GigFilter {
            search: " web app ".into(),
            skills: vec!["rust".into(), " ".into(), "sql".into()],
            min_payment: Some(100.0),
            max_payment: Some(2500.5),
            status: Some(GigStatus::InProgress),
        };
        assert_eq!(
            filter.to_query_string(),
            "title=web%20app&skills=rust%2Csql&min_payment=100&max_payment=2500.5&status=IN_PROGRESS"
        );
    }

    #[tokio::test]
    async fn test_every_change_refetches() {
        let api = RecordingApi::default();
        let mut browser = GigBrowser::new();
        browser.refresh(&api).await;
        browser.set_search(&api, "logo").await;
        browser.set_skills(&api, vec!["design".into()]).await;
        browser.set_payment_range(&api, Some(10.0), None).await;
        browser.set_status(&api, Some(GigStatus::Open)).await;

        assert_eq!(browser.fetches(), 5);
        let paths = api.paths.lock().unwrap();
        assert_eq!(paths[1], "/gigs/?title=logo");
        assert_eq!(
            paths[4],
            "/gigs/?title=logo&skills=design&min_payment=10&status=OPEN"
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_list() {
        let api = RecordingApi::default();
        let mut browser = GigBrowser::new();
        browser.set_search(&api, "boom").await;
        assert!(browser.error().unwrap().contains("Internal server error"));
        assert!(browser.gigs().is_empty());
        browser.set_search(&api, "ok").await;
        assert_eq!(browser.error(), None);
    }
}
