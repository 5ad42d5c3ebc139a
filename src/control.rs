//! Host lifecycle adapters.
//!
//! The host drives a control through `initialize`, `draw`/`set_data`,
//! `get_parameters` and `destroy`. [`Lifecycle`] tracks where a control is so
//! out-of-order calls are rejected rather than acted on. The `done` callback
//! of `initialize` always runs, even when the configuration is rejected, so
//! the host never hangs on a misconfigured control.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::auth::SessionCredentials;
use crate::cache::{CacheStore, SessionCache};
use crate::config::{AttachmentSettings, DropdownSettings, ITEM_ID, MASK_NAME};
use crate::error::{ControlError, Result};
use crate::orchestrator::{AttachmentFetcher, AttachmentReport};
use crate::search::{items_from_rows, Dropdown, SearchOptions, Submission};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: ControlState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self { state: ControlState::Uninitialized }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn state(&self) -> ControlState {
        self.state
    }
    pub fn begin_initialize(&mut self) -> Result<()> {
        match self.state {
            ControlState::Uninitialized => {
                self.state = ControlState::Initializing;
                Ok(())
            }
            other => Err(ControlError::Lifecycle(format!("cannot initialize from {:?}", other))),
        }
    }
    /// Ends initialization: `Ready` on success, back to `Uninitialized` so
    /// the host may retry otherwise.
    pub fn finish_initialize(&mut self, succeeded: bool) {
        if self.state == ControlState::Initializing {
            self.state = if succeeded { ControlState::Ready } else { ControlState::Uninitialized };
        }
    }
    pub fn require_ready(&self, operation: &str) -> Result<()> {
        if self.state == ControlState::Ready {
            Ok(())
        } else {
            Err(ControlError::Lifecycle(format!("{} while {:?}", operation, self.state)))
        }
    }
    /// Returns whether this call did the teardown.
    pub fn destroy(&mut self) -> bool {
        if self.state == ControlState::Destroyed {
            return false;
        }
        self.state = ControlState::Destroyed;
        true
    }
}

// ------------- Dropdown -------------
#[derive(Debug, Default)]
pub struct DropdownControl {
    lifecycle: Lifecycle,
    settings: Option<DropdownSettings>,
    dropdown: Option<Dropdown>,
}

impl DropdownControl {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn state(&self) -> ControlState {
        self.lifecycle.state()
    }

    pub fn initialize<F: FnOnce()>(&mut self, config: &Value, done: F) -> Result<()> {
        let result = self.lifecycle.begin_initialize().and_then(|_| DropdownSettings::from_host(config));
        let outcome = match result {
            Ok(settings) => {
                let options = SearchOptions::new(settings.search_mode, settings.case_insensitive);
                self.dropdown = Some(
                    Dropdown::new(&settings.parameter_name, options)
                        .multiple(settings.multiple_select)
                        .auto_submit(settings.auto_submit),
                );
                self.settings = Some(settings);
                self.lifecycle.finish_initialize(true);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "dropdown initialization failed");
                self.lifecycle.finish_initialize(false);
                Err(e)
            }
        };
        done();
        outcome
    }

    /// Loads items from host rows using the configured columns.
    pub fn set_data(&mut self, rows: &[Vec<Value>]) -> Result<()> {
        self.lifecycle.require_ready("set_data")?;
        let (Some(settings), Some(dropdown)) = (&self.settings, &mut self.dropdown) else {
            return Err(ControlError::Lifecycle("set_data without settings".into()));
        };
        let value_column = settings.value_column.unwrap_or(0);
        let display_column = settings.display_column.unwrap_or(value_column);
        dropdown.set_items(items_from_rows(rows, value_column, display_column, settings.group_column));
        info!(items = dropdown.items().len(), "dropdown data loaded");
        Ok(())
    }

    pub fn dropdown(&self) -> Result<&Dropdown> {
        self.lifecycle.require_ready("dropdown")?;
        self.dropdown.as_ref().ok_or_else(|| ControlError::Lifecycle("no dropdown".into()))
    }
    pub fn dropdown_mut(&mut self) -> Result<&mut Dropdown> {
        self.lifecycle.require_ready("dropdown")?;
        self.dropdown.as_mut().ok_or_else(|| ControlError::Lifecycle("no dropdown".into()))
    }

    /// What the host reads back: the last submission, if any.
    pub fn get_parameters(&self) -> Vec<Submission> {
        self.dropdown.as_ref().and_then(|d| d.submitted()).cloned().into_iter().collect()
    }

    pub fn is_in_valid_state(&self) -> bool {
        self.lifecycle.state() == ControlState::Ready
            && self.dropdown.as_ref().is_some_and(|d| !d.selection().is_empty())
    }

    pub fn destroy(&mut self) {
        if self.lifecycle.destroy() {
            self.dropdown = None;
        }
    }
}

// ------------- Attachments -------------
pub struct AttachmentControl<T: Transport, S: CacheStore> {
    lifecycle: Lifecycle,
    transport: Option<T>,
    cache: Arc<SessionCache<S>>,
    settings: Option<AttachmentSettings>,
    fetcher: Option<AttachmentFetcher<T, S>>,
    report: Option<AttachmentReport>,
}

impl<T: Transport, S: CacheStore> AttachmentControl<T, S> {
    pub fn new(transport: T, cache: Arc<SessionCache<S>>) -> Self {
        Self { lifecycle: Lifecycle::new(), transport: Some(transport), cache, settings: None, fetcher: None, report: None }
    }
    pub fn state(&self) -> ControlState {
        self.lifecycle.state()
    }
    pub fn report(&self) -> Option<&AttachmentReport> {
        self.report.as_ref()
    }

    /// Reads the settings, clears a cache written by another version and
    /// prepares the fetcher.
    pub fn initialize<F: FnOnce()>(&mut self, config: &Value, done: F) -> Result<()> {
        let outcome = self.try_initialize(config);
        if let Err(e) = &outcome {
            error!(error = %e, "attachment control initialization failed");
        }
        self.lifecycle.finish_initialize(outcome.is_ok());
        done();
        outcome
    }

    fn try_initialize(&mut self, config: &Value) -> Result<()> {
        self.lifecycle.begin_initialize()?;
        let settings = AttachmentSettings::from_host(config)?;
        settings.registry()?;
        settings.cache_policy()?;
        if !self.cache.ensure_version(settings.cache_version()) {
            info!(version = settings.cache_version(), "cache reset for new version");
        }
        let transport = self
            .transport
            .take()
            .ok_or_else(|| ControlError::Lifecycle("transport already consumed".into()))?;
        self.fetcher = Some(AttachmentFetcher::new(&settings, transport, Arc::clone(&self.cache))?);
        self.settings = Some(settings);
        Ok(())
    }

    /// Loads the attachments of the configured mask and item.
    pub async fn draw(&mut self, credentials: &SessionCredentials) -> Result<Option<&AttachmentReport>> {
        self.lifecycle.require_ready("draw")?;
        let (Some(settings), Some(fetcher)) = (&self.settings, &self.fetcher) else {
            return Err(ControlError::Lifecycle("draw without settings".into()));
        };
        let mask = settings.mask_name.as_deref().filter(|m| !m.is_empty()).ok_or(ControlError::MissingConfig(MASK_NAME))?;
        let item_id = settings.item_id.as_deref().filter(|i| !i.is_empty()).ok_or(ControlError::MissingConfig(ITEM_ID))?;
        self.report = fetcher.load(mask, item_id, credentials).await;
        if self.report.is_none() {
            warn!(mask, item = item_id, "nothing to show");
        }
        Ok(self.report.as_ref())
    }

    /// Drops the cached entries of this environment.
    pub fn destroy(&mut self) {
        if !self.lifecycle.destroy() {
            return;
        }
        if let Some(settings) = &self.settings {
            self.cache.invalidate_all(&settings.environment);
        }
        self.report = None;
        self.fetcher = None;
    }
}
