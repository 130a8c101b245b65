// src/sources/mock.rs
//! Injectable fetcher for tests and synthetic-data demos.

use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::model::CandidateItem;
use crate::sources::SourceFetcher;

pub struct MockFetcher {
    name: String,
    items: Mutex<Vec<CandidateItem>>,
    fail: bool,
}

impl MockFetcher {
    pub fn with_items(name: &str, items: Vec<CandidateItem>) -> Self {
        Self {
            name: name.to_string(),
            items: Mutex::new(items),
            fail: false,
        }
    }

    /// A fetcher whose every fetch errors, for failure-isolation tests.
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn inject(&self, items: Vec<CandidateItem>) {
        *self.items.lock().expect("mock fetcher mutex poisoned") = items;
    }
}

#[async_trait::async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<CandidateItem>> {
        if self.fail {
            bail!("simulated fetch failure for '{}'", self.name);
        }
        let items = self.items.lock().expect("mock fetcher mutex poisoned");
        Ok(items.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
