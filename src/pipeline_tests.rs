//! Tests for the guide pipeline, driven by an in-memory listings API

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use std::cell::Cell;
    use std::fs;

    use crate::api::ListingsApi;
    use crate::config::GuideConfig;
    use crate::error::GuideError;
    use crate::models::{LineupConfig, Session, TimeWindow};
    use crate::pipeline::*;

    /// Serves `pages` in order; can fail login, fail one window, or cancel
    /// after a number of grid calls.
    #[derive(Default)]
    struct FakeApi {
        pages: Vec<Value>,
        reject_login: bool,
        fail_window: Option<usize>,
        cancel_after: Option<(usize, CancelToken)>,
        logins: Cell<usize>,
        grids: Cell<usize>,
    }

    impl ListingsApi for FakeApi {
        fn login(&self, _username: &str, _password: &str) -> Result<Session, GuideError> {
            self.logins.set(self.logins.get() + 1);
            if self.reject_login {
                return Err(GuideError::Auth("token not found in response".into()));
            }
            Ok(Session {
                token: "tok".into(),
                region_hint: "NY31519".into(),
            })
        }

        fn grid(&self, session: &Session, _lineup: &LineupConfig, window: TimeWindow) -> Result<Value, GuideError> {
            assert_eq!(session.token, "tok");
            let index = self.grids.get();
            self.grids.set(index + 1);

            if let Some((after, token)) = &self.cancel_after {
                if index + 1 >= *after {
                    token.cancel();
                }
            }
            if self.fail_window == Some(index) {
                return Err(GuideError::Fetch {
                    start: window.start,
                    reason: "connection reset".into(),
                });
            }
            Ok(self.pages[index % self.pages.len()].clone())
        }
    }

    fn config() -> GuideConfig {
        GuideConfig {
            username: "me@example.com".into(),
            password: "secret".into(),
            country: "USA".into(),
            zip_code: "10001".into(),
            language: "en".into(),
            ..GuideConfig::default()
        }
    }

    fn windows(count: usize) -> Vec<TimeWindow> {
        (0..count as i64)
            .map(|i| TimeWindow {
                start: 1_717_236_000 + i * 10_800,
                end: 1_717_246_800 + i * 10_800,
            })
            .collect()
    }

    fn page(event_start: &str, event_end: &str, title: &str) -> Value {
        json!({
            "channels": [{
                "channelId": "5.1",
                "channelNo": "5",
                "callSign": "WABC",
                "events": [{
                    "startTime": event_start,
                    "endTime": event_end,
                    "program": { "title": title }
                }]
            }]
        })
    }

    #[test]
    fn test_plan_windows() {
        let now = 1_717_236_000 + 1_000;
        let plan = plan_windows(now);

        let first = plan.first().unwrap();
        let last = plan.last().unwrap();
        assert_eq!(first.start % 1_800, 0);
        assert!(first.start <= now - 86_400 && first.start > now - 86_400 - 1_800);
        assert!(last.start < now + 14 * 86_400);
        assert!(last.end >= now + 14 * 86_400);
        for pair in plan.windows(2) {
            assert_eq!(pair[0].end - pair[0].start, 10_800);
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(plan.len(), 121);
    }

    #[test]
    fn test_single_window_guide() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        let api = FakeApi {
            pages: vec![page("2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z", "News")],
            ..FakeApi::default()
        };

        let mut pipeline = Pipeline::new(api, config(), &output);
        let report = pipeline.run_windows(&windows(1)).unwrap();
        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(report.channels, 1);
        assert_eq!(report.programmes, 1);
        assert!(report.rotation.is_some());

        let xml = fs::read_to_string(&output).unwrap();
        assert!(xml.contains("<channel id=\"5.1\">"));
        assert!(xml.contains("<display-name>5 WABC</display-name>"));
        assert!(xml.contains("<display-name>5</display-name>"));
        assert!(xml.contains("<display-name>WABC</display-name>"));
        assert!(!xml.contains("<icon"));
        assert!(xml.contains(
            "<programme start=\"20240601100000 +0000\" stop=\"20240601103000 +0000\" channel=\"5.1\">"
        ));
        assert!(xml.contains("<title lang=\"en\">News</title>"));
        assert!(xml.contains("<desc lang=\"en\">Unavailable</desc>"));
    }

    #[test]
    fn test_channels_deduplicated_programmes_kept() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        let api = FakeApi {
            pages: vec![
                page("2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z", "News"),
                page("2024-06-01T13:00:00Z", "2024-06-01T14:00:00Z", "Talk"),
            ],
            ..FakeApi::default()
        };

        let report = Pipeline::new(api, config(), &output).run_windows(&windows(2)).unwrap();
        assert_eq!(report.channels, 1);
        assert_eq!(report.programmes, 2);

        let xml = fs::read_to_string(&output).unwrap();
        assert_eq!(xml.matches("<channel ").count(), 1);
        assert_eq!(xml.matches("<programme ").count(), 2);
        assert!(xml.find(">News<").unwrap() < xml.find(">Talk<").unwrap());
    }

    #[test]
    fn test_overlapping_windows_keep_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        let api = FakeApi {
            pages: vec![page("2024-06-01T10:00:00Z", "2024-06-01T13:30:00Z", "Movie")],
            ..FakeApi::default()
        };

        let report = Pipeline::new(api, config(), &output).run_windows(&windows(2)).unwrap();
        assert_eq!(report.programmes, 2);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_failed_login_leaves_existing_guide() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        fs::write(&output, "previous guide").unwrap();
        let api = FakeApi {
            pages: vec![page("2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z", "News")],
            reject_login: true,
            ..FakeApi::default()
        };

        let mut pipeline = Pipeline::new(api, config(), &output);
        let err = pipeline.run_windows(&windows(3)).unwrap_err();

        assert!(matches!(err, GuideError::Auth(_)));
        assert_eq!(pipeline.stage(), Stage::Authenticating);
        assert_eq!(fs::read_to_string(&output).unwrap(), "previous guide");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_login_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        let api = FakeApi {
            reject_login: true,
            ..FakeApi::default()
        };

        assert!(Pipeline::new(api, config(), &output).run_windows(&windows(1)).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_failed_window_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        let api = FakeApi {
            pages: vec![page("2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z", "News")],
            fail_window: Some(1),
            ..FakeApi::default()
        };

        let mut pipeline = Pipeline::new(api, config(), &output);
        let err = pipeline.run_windows(&windows(3)).unwrap_err();

        assert!(matches!(err, GuideError::Fetch { .. }));
        assert_eq!(pipeline.stage(), Stage::FetchingWindow(1));
        assert!(!output.exists());
    }

    #[test]
    fn test_page_without_channels_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        let api = FakeApi {
            pages: vec![json!({ "errorMessage": "bad lineup" })],
            ..FakeApi::default()
        };

        let mut pipeline = Pipeline::new(api, config(), &output);
        let err = pipeline.run_windows(&windows(1)).unwrap_err();
        assert!(matches!(err, GuideError::Malformed { .. }));
        assert_eq!(pipeline.stage(), Stage::Normalizing(0));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_settings_fail_before_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::new(FakeApi::default(), GuideConfig::default(), dir.path().join("g.xmltv"));

        let err = pipeline.run_windows(&windows(1)).unwrap_err();
        assert!(matches!(err, GuideError::Config(_)));
        assert_eq!(pipeline.api().logins.get(), 0);
    }

    #[test]
    fn test_cancel_before_next_window() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("xmlguide.xmltv");
        let token = CancelToken::new();
        let api = FakeApi {
            pages: vec![page("2024-06-01T10:00:00Z", "2024-06-01T10:30:00Z", "News")],
            cancel_after: Some((2, token.clone())),
            ..FakeApi::default()
        };

        let mut pipeline = Pipeline::new(api, config(), &output).with_cancel_token(token);
        let err = pipeline.run_windows(&windows(5)).unwrap_err();

        assert!(matches!(err, GuideError::Cancelled));
        assert_eq!(pipeline.api().grids.get(), 2);
        assert!(!output.exists());
    }

    #[test]
    fn test_cancelled_before_login() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let mut pipeline = Pipeline::new(FakeApi::default(), config(), dir.path().join("g.xmltv"))
            .with_cancel_token(token);

        assert!(matches!(pipeline.run_windows(&windows(1)), Err(GuideError::Cancelled)));
        assert_eq!(pipeline.api().logins.get(), 0);
    }
}
