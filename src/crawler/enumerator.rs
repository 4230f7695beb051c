//! Page enumeration through the Wiki.js GraphQL API

use crate::auth::CookieJar;
use crate::crawler::{build_http_client, PageRef, DEFAULT_REQUEST_TIMEOUT};
use crate::{CrawlError, CrawlResult};
use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

/// Lists every page, ordered by title
const PAGES_QUERY: &str = r#"
{
  pages {
    list (orderBy: TITLE) {
      path
      title
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PagesData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct PagesData {
    pages: PagesList,
}

#[derive(Debug, Deserialize)]
struct PagesList {
    #[serde(default, deserialize_with = "null_as_empty")]
    list: Vec<PageEntry>,
}

/// Wiki.js answers `list: null` when the caller may not read pages
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<PageEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<PageEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Error messages GraphQL uses for a rejected session
const AUTH_ERROR_MARKERS: [&str; 3] = ["forbidden", "unauthorized", "not authorized"];

fn is_auth_error(message: &str) -> bool {
    let message = message.to_lowercase();
    AUTH_ERROR_MARKERS.iter().any(|marker| message.contains(marker))
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    path: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Queries the wiki for the full list of page paths
pub struct PathEnumerator {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl PathEnumerator {
    /// Creates an enumerator for the wiki at `base_url`
    pub fn new(base_url: &str, user_agent: &str) -> CrawlResult<Self> {
        Ok(Self {
            client: build_http_client(user_agent)?,
            base_url: Url::parse(base_url.trim_end_matches('/'))?,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Bounds the whole API call (connect, response, and body)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Fetches every page reference visible to the given credentials
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<PageRef>)` - Absolute page URLs with titles (possibly empty)
    /// * `Err(CrawlError::Unauthorized)` - The API answered 401 or 403
    /// * `Err(CrawlError)` - Any other API, transport, or parse failure
    pub async fn list_pages(&self, cookies: &CookieJar) -> CrawlResult<Vec<PageRef>> {
        let endpoint = format!("{}/graphql", self.base());

        let mut request = self
            .client
            .post(&endpoint)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "query": PAGES_QUERY }));

        if let Some(host) = self.base_url.host_str() {
            let header = cookies.as_header(host);
            if !header.is_empty() {
                request = request.header(COOKIE, header);
            }
        }
        if let Some(token) = cookies.bearer_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CrawlError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            tracing::error!("API Error: {}", status);
            return Err(CrawlError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: GraphQlResponse =
            serde_json::from_str(&body).map_err(|e| CrawlError::Parse(e.to_string()))?;

        // Permission errors arrive with a 200 and sometimes alongside partial data
        if let Some(error) = parsed.errors.iter().find(|e| is_auth_error(&e.message)) {
            tracing::warn!("API rejected the session: {}", error.message);
            return Err(CrawlError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let data = match parsed.data {
            Some(data) => data,
            None => {
                let messages = parsed
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(CrawlError::Api {
                    status: status.as_u16(),
                    body: if messages.is_empty() {
                        "response carried no data".to_string()
                    } else {
                        messages
                    },
                });
            }
        };

        let pages: Vec<PageRef> = data
            .pages
            .list
            .into_iter()
            .map(|entry| {
                let url = format!("{}/{}", self.base(), entry.path.trim_start_matches('/'));
                PageRef {
                    title: entry.title.unwrap_or_else(|| entry.path.clone()),
                    url,
                }
            })
            .collect();

        tracing::info!("Enumerated {} pages from {}", pages.len(), endpoint);
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Cookie;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jar_for(server: &MockServer) -> CookieJar {
        let host = Url::parse(&server.uri()).unwrap().host_str().unwrap().to_string();
        CookieJar::new(vec![Cookie::new("jwt", "tok", host)])
    }

    #[tokio::test]
    async fn test_lists_pages_as_absolute_urls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer tok"))
            .and(header("cookie", "jwt=tok"))
            .and(body_string_contains("orderBy: TITLE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "pages": { "list": [
                    { "path": "home", "title": "Home" },
                    { "path": "hardware/pcu", "title": "PCU" },
                    { "path": "untitled" }
                ]}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&format!("{}/", server.uri()), "TestBot/1.0").unwrap();
        let pages = enumerator.list_pages(&jar_for(&server)).await.unwrap();

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].url, format!("{}/home", server.uri()));
        assert_eq!(pages[1].url, format!("{}/hardware/pcu", server.uri()));
        assert_eq!(pages[1].title, "PCU");
        assert_eq!(pages[2].title, "untitled");
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0").unwrap();
        let result = enumerator.list_pages(&CookieJar::default()).await;
        assert!(matches!(result, Err(CrawlError::Unauthorized { status: 401 })));
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0").unwrap();
        match enumerator.list_pages(&CookieJar::default()).await {
            Err(CrawlError::Api { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_graphql_errors_without_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{ "message": "Forbidden" }]
            })))
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0").unwrap();
        let result = enumerator.list_pages(&CookieJar::default()).await;
        assert!(matches!(result, Err(CrawlError::Unauthorized { status: 200 })));
    }

    #[tokio::test]
    async fn test_forbidden_with_null_list_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{ "message": "Forbidden" }],
                "data": { "pages": { "list": null } }
            })))
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0").unwrap();
        let result = enumerator.list_pages(&CookieJar::default()).await;
        assert!(matches!(result, Err(CrawlError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_null_list_without_errors_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "pages": { "list": null } }
            })))
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0").unwrap();
        let pages = enumerator.list_pages(&CookieJar::default()).await.unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn test_other_graphql_errors_are_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{ "message": "Internal error" }, { "message": "retry later" }]
            })))
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0").unwrap();
        let result = enumerator.list_pages(&CookieJar::default()).await;
        assert!(
            matches!(result, Err(CrawlError::Api { ref body, .. }) if body == "Internal error; retry later")
        );
    }

    #[tokio::test]
    async fn test_slow_api_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": { "pages": { "list": [] } } }))
                    .set_delay(Duration::from_millis(2_000)),
            )
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0")
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let result = enumerator.list_pages(&CookieJar::default()).await;

        assert!(matches!(result, Err(CrawlError::Http(ref e)) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let enumerator = PathEnumerator::new(&server.uri(), "TestBot/1.0").unwrap();
        let result = enumerator.list_pages(&CookieJar::default()).await;
        assert!(matches!(result, Err(CrawlError::Parse(_))));
    }
}
