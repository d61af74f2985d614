//! Portal deployment configuration.
//!
//! One institution's portal differs from another's in its base URL, SPA
//! routes, and grading policy, not in behavior. Everything deployment
//! specific lives here; the automation code reads it and never hardcodes
//! portal addresses.

use serde::{Deserialize, Serialize};

/// Desktop Chrome user agent presented to the portal. The portal serves
/// a mobile layout (with a second, hidden login form) to anything else.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// Route fragments for the portal's single-page interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSet {
    /// Current-term grade listing.
    pub grades: String,
    /// Full academic transcript.
    pub transcript: String,
    /// Degree curriculum matrix.
    pub curriculum: String,
}

impl Default for RouteSet {
    fn default() -> Self {
        Self {
            grades: "#/boletim".to_string(),
            transcript: "#/historico".to_string(),
            curriculum: "#/matriz-curricular".to_string(),
        }
    }
}

/// Everything the automation needs to know about one portal deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal origin, e.g. `https://portal.example.edu.br`.
    pub base_url: String,
    /// Path of the login screen under `base_url`.
    pub login_path: String,
    /// Substring that marks a portal API request worth capturing.
    pub api_marker: String,
    pub routes: RouteSet,
    /// Enrollment label to prefer when the portal asks which enrollment
    /// to open (students with more than one active registration).
    pub preferred_enrollment: Option<String>,
    /// Passing threshold used to derive curriculum status when the
    /// portal supplies a grade but no status text.
    pub min_passing_grade: f64,
    /// Browser viewport, wide enough that the desktop layout renders.
    pub viewport: (u32, u32),
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://portal.example.edu.br".to_string(),
            login_path: "/login".to_string(),
            api_marker: "/api/".to_string(),
            routes: RouteSet::default(),
            preferred_enrollment: None,
            min_passing_grade: 7.0,
            viewport: (1366, 768),
            user_agent: DESKTOP_USER_AGENT.to_string(),
        }
    }
}

impl PortalConfig {
    /// Default configuration with environment overrides applied.
    ///
    /// `PORTICO_PORTAL_URL` swaps the portal origin, which is enough to
    /// point the binary at a staging deployment or a local fixture server.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = read_env_string("PORTICO_PORTAL_URL") {
            if !url.is_empty() {
                config.base_url = url.trim_end_matches('/').to_string();
            }
        }
        if let Some(enrollment) = read_env_string("PORTICO_ENROLLMENT") {
            if !enrollment.is_empty() {
                config.preferred_enrollment = Some(enrollment);
            }
        }
        config
    }

    /// Absolute URL of the login screen.
    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, self.login_path)
    }

    /// Absolute URL for an SPA route fragment.
    pub fn route_url(&self, fragment: &str) -> String {
        format!("{}/{}", self.base_url, fragment)
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        let config = PortalConfig::default();
        assert_eq!(config.routes.transcript, "#/historico");
        assert_eq!(config.login_url(), "https://portal.example.edu.br/login");
        assert_eq!(
            config.route_url("#/boletim"),
            "https://portal.example.edu.br/#/boletim"
        );
    }

    #[test]
    fn test_default_policy() {
        let config = PortalConfig::default();
        assert_eq!(config.min_passing_grade, 7.0);
        assert_eq!(config.viewport, (1366, 768));
        assert!(config.user_agent.contains("Chrome"));
    }

    #[test]
    fn test_env_override_trims_trailing_slash() {
        std::env::set_var("PORTICO_PORTAL_URL", "http://127.0.0.1:9000/");
        let config = PortalConfig::from_env();
        std::env::remove_var("PORTICO_PORTAL_URL");
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.login_url(), "http://127.0.0.1:9000/login");
    }
}
