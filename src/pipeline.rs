//! Guide run orchestration
//!
//! One run logs in, walks the guide span in fixed three-hour windows, folds
//! every page into a [`GuideDocument`], writes the document and finally
//! rotates historical snapshots. Nothing is written unless every window
//! succeeds.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ListingsApi, WINDOW_HOURS};
use crate::config::GuideConfig;
use crate::epg::{self, GuideDocument, GuideNormalizer, RotationReport, SourceInfo};
use crate::error::GuideError;
use crate::models::{LineupConfig, Session, TimeWindow};

/// Days of listings requested after "now"
pub const GUIDE_DAYS: i64 = 14;
/// Days of listings requested before "now"
pub const LOOKBACK_DAYS: i64 = 1;

const SECS_PER_HOUR: i64 = 3600;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
const HALF_HOUR: i64 = SECS_PER_HOUR / 2;

/// Shared flag checked before every network call
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), GuideError> {
        if self.is_cancelled() {
            Err(GuideError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Where a run is (or where it stopped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Authenticating,
    FetchingWindow(usize),
    Normalizing(usize),
    Serializing,
    Rotating,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub output: PathBuf,
    pub windows: usize,
    pub channels: usize,
    pub programmes: usize,
    /// Programmes repeated across overlapping windows (kept in the output)
    pub duplicates: usize,
    /// None when rotation failed; the guide itself is still valid
    pub rotation: Option<RotationReport>,
}

/// Windows from `now - 1 day` (floored to the half hour) through `now + 14 days`
pub fn plan_windows(now: i64) -> Vec<TimeWindow> {
    let width = WINDOW_HOURS * SECS_PER_HOUR;
    let mut start = now - LOOKBACK_DAYS * SECS_PER_DAY;
    start -= start.rem_euclid(HALF_HOUR);
    let end = now + GUIDE_DAYS * SECS_PER_DAY;

    let mut windows = Vec::with_capacity(((end - start) / width + 1) as usize);
    while start < end {
        windows.push(TimeWindow {
            start,
            end: start + width,
        });
        start += width;
    }
    windows
}

/// A single guide run against `api`.
///
/// Runs are independent. Two runs writing the same output path concurrently
/// race on the file and its snapshots; callers must not do that.
pub struct Pipeline<A: ListingsApi> {
    api: A,
    config: GuideConfig,
    output: PathBuf,
    cancel: CancelToken,
    stage: Stage,
}

impl<A: ListingsApi> Pipeline<A> {
    pub fn new(api: A, config: GuideConfig, output: impl Into<PathBuf>) -> Self {
        Self {
            api,
            config,
            output: output.into(),
            cancel: CancelToken::new(),
            stage: Stage::Init,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Build the full guide span ending 14 days from now
    pub fn run(&mut self) -> Result<RunReport, GuideError> {
        let windows = plan_windows(chrono::Utc::now().timestamp());
        self.run_windows(&windows)
    }

    pub fn run_windows(&mut self, windows: &[TimeWindow]) -> Result<RunReport, GuideError> {
        self.stage = Stage::Init;
        self.config.validate_for_guide()?;

        self.enter(Stage::Authenticating);
        self.cancel.check()?;
        let session = self.api.login(&self.config.username, &self.config.password)?;
        info!(region = %session.region_hint, "authenticated");

        let lineup = self.config.lineup();
        let normalizer = GuideNormalizer::new(&self.config.language);
        let mut document = GuideDocument::new(SourceInfo::default());

        info!(windows = windows.len(), "fetching listings");
        for (index, window) in windows.iter().enumerate() {
            self.enter(Stage::FetchingWindow(index));
            let page = self.fetch(&session, &lineup, *window)?;

            self.enter(Stage::Normalizing(index));
            absorb_page(&mut document, &normalizer, &page, *window)?;
        }

        info!(
            channels = document.channels().len(),
            programmes = document.programmes().len(),
            "listings collected"
        );
        if document.duplicate_count() > 0 {
            warn!(
                duplicates = document.duplicate_count(),
                "programmes repeated across windows were kept"
            );
        }
        if document.orphan_count() > 0 {
            warn!(dropped = document.orphan_count(), "programmes for unknown channels were dropped");
        }

        self.enter(Stage::Serializing);
        let bytes = document
            .serialize()
            .map_err(|e| GuideError::io("serializing guide", &self.output, e))?;
        write_guide(&self.output, &bytes)?;
        info!(output = %self.output.display(), bytes = bytes.len(), "guide written");

        self.enter(Stage::Rotating);
        let rotation = match epg::rotate(&self.output, self.config.historical_guide_days) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("historical rotation failed: {}", e);
                None
            }
        };

        self.enter(Stage::Done);
        Ok(RunReport {
            output: self.output.clone(),
            windows: windows.len(),
            channels: document.channels().len(),
            programmes: document.programmes().len(),
            duplicates: document.duplicate_count(),
            rotation,
        })
    }

    fn enter(&mut self, stage: Stage) {
        debug!(?stage, "pipeline stage");
        self.stage = stage;
    }

    fn fetch(&self, session: &Session, lineup: &LineupConfig, window: TimeWindow) -> Result<Value, GuideError> {
        self.cancel.check()?;
        debug!(start = window.start, end = window.end, "fetching window");
        self.api.grid(session, lineup, window)
    }
}

/// Fold one page into the document: channels from the first page that has
/// any, programmes from every page.
fn absorb_page(
    document: &mut GuideDocument,
    normalizer: &GuideNormalizer,
    page: &Value,
    window: TimeWindow,
) -> Result<(), GuideError> {
    let malformed = || GuideError::Malformed {
        start: window.start,
        reason: "response has no channels array".to_string(),
    };

    if document.channels().is_empty() {
        let channels = normalizer.channels(page).ok_or_else(malformed)?;
        document.add_channels_once(channels);
    }
    let programmes = normalizer.programmes(page).ok_or_else(malformed)?;
    let added = document.append_programmes(programmes);
    debug!(start = window.start, added, "window normalized");
    Ok(())
}

/// Write through a temporary sibling so a failed write leaves the previous
/// guide untouched.
fn write_guide(output: &Path, bytes: &[u8]) -> Result<(), GuideError> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| GuideError::io("creating output directory", parent, e))?;
        }
    }

    let mut tmp = output.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).map_err(|e| GuideError::io("writing guide", &tmp, e))?;
    fs::rename(&tmp, output).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        GuideError::io("replacing guide", output, e)
    })
}
