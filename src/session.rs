use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::PipelineError;
use crate::normalize::normalize;
use crate::pattern::{Pattern, PatternSet};
use crate::segment::{BannedTokens, Zone};

pub const DEFAULT_SESSION: &str = "default";

/// One uploaded page image, still encoded.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub bytes: Vec<u8>,
}

/// Operator input for a session, as received at the configuration boundary.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub zone: Option<Zone>,
    pub templates: Vec<String>,
    pub banned_words: Vec<String>,
}

/// Pages and configuration accumulated ahead of a single segmentation run.
#[derive(Debug, Default)]
pub struct Session {
    pages: Vec<Page>,
    zone: Option<Zone>,
    patterns: PatternSet,
    banned: BannedTokens,
}

impl Session {
    /// Appends a page and returns the page count.
    pub fn push_page(&mut self, bytes: Vec<u8>) -> usize {
        let index = self.pages.len();
        self.pages.push(Page { index, bytes });
        self.pages.len()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Sets the zone and registers templates and banned words. Templates are
    /// normalized like OCR tokens before compiling; blank ones are skipped.
    pub fn configure(&mut self, config: SessionConfig) -> Result<()> {
        if let Some(zone) = config.zone {
            self.zone = Some(zone);
        }
        for template in &config.templates {
            let template = template.trim();
            if template.is_empty() {
                continue;
            }
            if let Some(pattern) = Pattern::compile(&normalize(template))? {
                self.patterns.push(pattern);
            }
        }
        for word in &config.banned_words {
            self.banned.insert(word);
        }
        Ok(())
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Consumes the session into a runnable job.
    pub fn into_job(self) -> Result<SegmentationJob, PipelineError> {
        let zone = self.zone.ok_or(PipelineError::ZoneNotSet)?;
        if self.patterns.is_empty() {
            return Err(PipelineError::NoPatterns);
        }
        Ok(SegmentationJob {
            pages: self.pages,
            zone,
            patterns: self.patterns,
            banned: self.banned,
        })
    }
}

/// Everything a run needs, owned exclusively by that run.
#[derive(Debug)]
pub struct SegmentationJob {
    pub pages: Vec<Page>,
    pub zone: Zone,
    pub patterns: PatternSet,
    pub banned: BannedTokens,
}

/// Sessions keyed by id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    fn with_session<R>(&self, id: &str, func: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        func(sessions.entry(id.to_string()).or_default())
    }

    /// Creates the session on first use.
    pub fn push_page(&self, id: &str, bytes: Vec<u8>) -> usize {
        self.with_session(id, |session| session.push_page(bytes))
    }

    pub fn configure(&self, id: &str, config: SessionConfig) -> Result<()> {
        self.with_session(id, |session| session.configure(config))
    }

    pub fn page_count(&self, id: &str) -> usize {
        let sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.get(id).map_or(0, Session::page_count)
    }

    /// Removes the session so exactly one run can own it.
    pub fn take(&self, id: &str) -> Session {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(id).unwrap_or_default()
    }
}
