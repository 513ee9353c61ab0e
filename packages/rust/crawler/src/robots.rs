//! robots.txt permission checks behind a single `can_fetch` interface.

use reqwest::{Client, StatusCode};
use robotstxt::DefaultMatcher;
use tracing::{debug, info, warn};
use url::Url;

/// Answers whether a URL may be fetched.
pub trait RobotsPolicy: Send + Sync {
    fn can_fetch(&self, url: &Url) -> bool;
}

/// Used when a source does not consult robots.txt, or it could not be read.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl RobotsPolicy for AllowAll {
    fn can_fetch(&self, _url: &Url) -> bool {
        true
    }
}

/// Used when robots.txt itself is access-restricted (401/403).
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl RobotsPolicy for DenyAll {
    fn can_fetch(&self, _url: &Url) -> bool {
        false
    }
}

/// A parsed robots.txt evaluated for one user agent.
#[derive(Debug, Clone)]
pub struct RobotsTxt {
    body: String,
    user_agent: String,
}

impl RobotsTxt {
    pub fn new(body: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            user_agent: user_agent.into(),
        }
    }
}

impl RobotsPolicy for RobotsTxt {
    fn can_fetch(&self, url: &Url) -> bool {
        // The matcher keeps per-call state, so a fresh one is used each time.
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.body, &self.user_agent, url.as_str())
    }
}

/// Fetch and interpret `<origin>/robots.txt`.
///
/// 2xx → parsed rules; 401/403 → deny everything; any other status or a
/// transport error → allow everything.
pub async fn load_robots(client: &Client, origin: &Url, user_agent: &str) -> Box<dyn RobotsPolicy> {
    let robots_url = match origin.join("/robots.txt") {
        Ok(u) => u,
        Err(e) => {
            warn!(%origin, error = %e, "cannot build robots.txt URL, allowing all");
            return Box::new(AllowAll);
        }
    };

    let response = match client.get(robots_url.as_str()).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(%robots_url, error = %e, "robots.txt unreachable, allowing all");
            return Box::new(AllowAll);
        }
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        info!(%robots_url, %status, "robots.txt access denied, disallowing all");
        return Box::new(DenyAll);
    }
    if !status.is_success() {
        debug!(%robots_url, %status, "no robots.txt, allowing all");
        return Box::new(AllowAll);
    }

    match response.text().await {
        Ok(body) => {
            info!(%robots_url, bytes = body.len(), "loaded robots.txt");
            Box::new(RobotsTxt::new(body, user_agent))
        }
        Err(e) => {
            warn!(%robots_url, error = %e, "robots.txt body unreadable, allowing all");
            Box::new(AllowAll)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "User-agent: *\nDisallow: /youtube/answer/private\n\nUser-agent: BadBot\nDisallow: /\n";

    #[test]
    fn robots_txt_applies_rules() {
        let robots = RobotsTxt::new(BODY, "PolicyGraphCrawler/0.1.0");
        let open = Url::parse("https://support.google.com/youtube/answer/9288567").unwrap();
        let closed = Url::parse("https://support.google.com/youtube/answer/private/1").unwrap();
        assert!(robots.can_fetch(&open));
        assert!(!robots.can_fetch(&closed));
    }

    #[test]
    fn robots_txt_matches_named_agent() {
        let robots = RobotsTxt::new(BODY, "BadBot");
        let url = Url::parse("https://support.google.com/youtube/answer/9288567").unwrap();
        assert!(!robots.can_fetch(&url));
    }

    #[test]
    fn trivial_policies() {
        let url = Url::parse("https://example.com/x").unwrap();
        assert!(AllowAll.can_fetch(&url));
        assert!(!DenyAll.can_fetch(&url));
    }

    #[tokio::test]
    async fn load_robots_from_server() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(BODY))
            .mount(&server)
            .await;

        let origin = Url::parse(&server.uri()).unwrap();
        let robots = load_robots(&Client::new(), &origin, "PolicyGraphCrawler").await;

        assert!(robots.can_fetch(&origin.join("/youtube/answer/1").unwrap()));
        assert!(!robots.can_fetch(&origin.join("/youtube/answer/private").unwrap()));
    }

    #[tokio::test]
    async fn missing_robots_allows_all() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let origin = Url::parse(&server.uri()).unwrap();
        let robots = load_robots(&Client::new(), &origin, "PolicyGraphCrawler").await;
        assert!(robots.can_fetch(&origin.join("/anything").unwrap()));
    }

    #[tokio::test]
    async fn forbidden_robots_denies_all() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let origin = Url::parse(&server.uri()).unwrap();
        let robots = load_robots(&Client::new(), &origin, "PolicyGraphCrawler").await;
        assert!(!robots.can_fetch(&origin.join("/anything").unwrap()));
    }
}
