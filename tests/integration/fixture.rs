//! Shared test fixture: a temp root with a wired recovery service.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::json;
use tempfile::TempDir;

use rollpoint::backup::digest_file;
use rollpoint::config::Config;
use rollpoint::service::RecoveryService;
use rollpoint::txlog::NewLogEntry;

pub struct TestFixture {
    pub dir: TempDir,
    pub config: Config,
}

impl TestFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        Self {
            dir,
            config: Config::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn service(&self) -> RecoveryService {
        RecoveryService::open(self.root(), &self.config).expect("open recovery service")
    }

    pub fn live_path(&self) -> PathBuf {
        self.root().join(&self.config.datastore.file_name)
    }

    pub fn live_digest(&self) -> String {
        digest_file(&self.live_path()).expect("digest live datastore")
    }
}

pub fn ts(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("timestamp in range")
}

pub fn order_entry(record_id: i64, at_ms: i64) -> NewLogEntry {
    NewLogEntry::create("orders", Some(record_id), json!({ "record": record_id }))
        .by_user(1)
        .at(ts(at_ms))
}
