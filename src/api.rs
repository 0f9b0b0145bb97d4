//! Zap2it listings API client

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::GuideError;
use crate::models::{LineupConfig, Provider, Session, TimeWindow};

pub const LOGIN_URL: &str = "https://tvlistings.zap2it.com/api/user/login";
pub const GRID_URL: &str = "https://tvlistings.zap2it.com/api/grid";
pub const PROVIDERS_URL: &str =
    "https://tvlistings.zap2it.com/gapzap_webapi/api/Providers/getPostalCodeProviders";

/// Hours of listings returned by one grid call
pub const WINDOW_HOURS: i64 = 3;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The two calls a guide run makes. Implemented over HTTP by [`Zap2itClient`].
pub trait ListingsApi {
    fn login(&self, username: &str, password: &str) -> Result<Session, GuideError>;

    fn grid(
        &self,
        session: &Session,
        lineup: &LineupConfig,
        window: TimeWindow,
    ) -> Result<Value, GuideError>;
}

pub struct Zap2itClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl Default for Zap2itClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Zap2itClient {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .timeout_connect(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: format!("zap2xmltv/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// List the providers serving a postal code
    pub fn find_providers(
        &self,
        country: &str,
        zip_code: &str,
        language: &str,
    ) -> Result<Vec<Provider>, GuideError> {
        let url = format!("{}/{}/{}/gapzap/{}", PROVIDERS_URL, country, zip_code, language);
        debug!(%url, "looking up providers");

        let response = self
            .agent
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| GuideError::Lookup(format!("request failed: {}", e)))?;

        let body: Value = serde_json::from_reader(response.into_body().into_reader())
            .map_err(|e| GuideError::Lookup(format!("invalid JSON: {}", e)))?;

        parse_providers(&body)
    }
}

impl ListingsApi for Zap2itClient {
    fn login(&self, username: &str, password: &str) -> Result<Session, GuideError> {
        let form = [
            ("emailid", username),
            ("password", password),
            ("isfacebookuser", "false"),
            ("usertype", "0"),
            ("objectid", ""),
        ];

        let response = self
            .agent
            .post(LOGIN_URL)
            .header("User-Agent", &self.user_agent)
            .send_form(form)
            .map_err(|e| GuideError::Auth(format!("request failed: {}", e)))?;

        let body: Value = serde_json::from_reader(response.into_body().into_reader())
            .map_err(|e| GuideError::Auth(format!("invalid JSON: {}", e)))?;

        session_from_login(&body)
    }

    fn grid(
        &self,
        session: &Session,
        lineup: &LineupConfig,
        window: TimeWindow,
    ) -> Result<Value, GuideError> {
        let fetch_err = |reason: String| GuideError::Fetch {
            start: window.start,
            reason,
        };

        let response = self
            .agent
            .get(GRID_URL)
            .header("User-Agent", &self.user_agent)
            .query_pairs(grid_query(session, lineup, window))
            .call()
            .map_err(|e| fetch_err(format!("request failed: {}", e)))?;

        serde_json::from_reader(response.into_body().into_reader())
            .map_err(|e| fetch_err(format!("invalid JSON: {}", e)))
    }
}

/// Pull the token and region hint out of a login response
pub fn session_from_login(body: &Value) -> Result<Session, GuideError> {
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| GuideError::Auth("token not found in response".to_string()))?;

    let region_hint = body
        .get("properties")
        .and_then(|p| p.get("2004"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(Session {
        token: token.to_string(),
        region_hint: region_hint.to_string(),
    })
}

/// Query string for one grid call. An empty configured headend falls back
/// to the one discovered at login.
pub fn grid_query(
    session: &Session,
    lineup: &LineupConfig,
    window: TimeWindow,
) -> Vec<(&'static str, String)> {
    let headend = if lineup.headend_id.is_empty() {
        session.region_hint.clone()
    } else {
        lineup.headend_id.clone()
    };

    vec![
        ("Activity_ID", "1".to_string()),
        ("FromPage", "TV Guide".to_string()),
        ("AffiliateId", "gapzap".to_string()),
        ("token", session.token.clone()),
        ("aid", "gapzap".to_string()),
        ("lineupId", lineup.lineup_id.clone()),
        ("timespan", WINDOW_HOURS.to_string()),
        ("headendId", headend),
        ("country", lineup.country.clone()),
        ("device", lineup.device.clone()),
        ("postalCode", lineup.zip_code.clone()),
        ("isOverride", "true".to_string()),
        ("time", window.start.to_string()),
        ("pref", "m,p".to_string()),
        ("userId", "-".to_string()),
        ("languagecode", lineup.language.clone()),
    ]
}

pub fn parse_providers(body: &Value) -> Result<Vec<Provider>, GuideError> {
    let entries = body
        .get("Providers")
        .and_then(Value::as_array)
        .ok_or_else(|| GuideError::Lookup("response has no Providers list".to_string()))?;

    let mut providers = Vec::with_capacity(entries.len());
    for entry in entries {
        match Provider::deserialize(entry) {
            Ok(provider) => providers.push(provider),
            Err(e) => warn!("skipping provider entry: {}", e),
        }
    }
    Ok(providers)
}

/// Pipe-separated table used by `--find-id`
pub fn provider_table(providers: &[Provider]) -> String {
    let mut out = format!(
        "{:<15}|{:<40}|{:<15}|{:<15}|{:<25}|{:<15}\n",
        "type", "name", "location", "headendID", "lineupId", "device"
    );
    for p in providers {
        out.push_str(&format!(
            "{:<15}|{:<40}|{:<15}|{:<15}|{:<25}|{:<15}\n",
            p.kind, p.name, p.location, p.headend_id, p.lineup_id, p.device
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_from_login() {
        let body = json!({
            "token": "abc123",
            "properties": { "2004": "NY31519", "2005": "other" }
        });
        let session = session_from_login(&body).unwrap();
        assert_eq!(session.token, "abc123");
        assert_eq!(session.region_hint, "NY31519");
    }

    #[test]
    fn test_session_without_properties() {
        let session = session_from_login(&json!({ "token": "abc" })).unwrap();
        assert_eq!(session.region_hint, "");
    }

    #[test]
    fn test_login_rejects_missing_or_non_string_token() {
        assert!(matches!(
            session_from_login(&json!({ "error": "bad password" })),
            Err(GuideError::Auth(_))
        ));
        assert!(matches!(
            session_from_login(&json!({ "token": 42 })),
            Err(GuideError::Auth(_))
        ));
    }

    #[test]
    fn test_grid_query_params() {
        let session = Session {
            token: "tok".into(),
            region_hint: "HINT".into(),
        };
        let lineup = LineupConfig {
            lineup_id: "USA-X".into(),
            headend_id: String::new(),
            country: "USA".into(),
            zip_code: "10001".into(),
            device: "-".into(),
            language: "en-us".into(),
        };
        let window = TimeWindow { start: 1_717_236_000, end: 1_717_246_800 };
        let query = grid_query(&session, &lineup, window);
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };

        assert_eq!(get("token"), "tok");
        assert_eq!(get("time"), "1717236000");
        assert_eq!(get("timespan"), "3");
        assert_eq!(get("headendId"), "HINT");
        assert_eq!(get("postalCode"), "10001");
        assert_eq!(get("languagecode"), "en-us");
    }

    #[test]
    fn test_parse_providers() {
        let body = json!({
            "Providers": [
                {
                    "type": "Cable",
                    "name": "Spectrum",
                    "location": "New York",
                    "headendId": "NY31519",
                    "lineupId": "USA-NY31519-DEFAULT",
                    "device": "X"
                },
                { "type": "OTA", "name": "Antenna", "location": null, "headendId": 12345 },
                "garbage"
            ]
        });
        let providers = parse_providers(&body).unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].lineup_id, "USA-NY31519-DEFAULT");
        assert_eq!(providers[1].location, "");
        assert_eq!(providers[1].headend_id, "12345");

        let table = provider_table(&providers);
        assert_eq!(table.lines().count(), 3);
        assert!(table.starts_with("type           |name"));
        assert!(table.contains("|USA-NY31519-DEFAULT      |"));
    }

    #[test]
    fn test_parse_providers_requires_list() {
        assert!(matches!(parse_providers(&json!({})), Err(GuideError::Lookup(_))));
    }
}
