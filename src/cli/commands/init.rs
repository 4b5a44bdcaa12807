//! rollpoint init - bootstrap the datastore and backup areas.

use serde::Serialize;

use crate::api::Envelope;
use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_envelope};
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub root: String,
    pub datastore: String,
    pub snapshots_dir: String,
    pub pre_restore_dir: String,
    pub schema_version: u32,
}

pub fn run(ctx: &AppContext) -> Result<bool> {
    let report = initialize(ctx);
    emit_envelope(ctx.robot_mode, &report, |data| {
        let mut layout = HumanLayout::new();
        layout
            .title("rollpoint initialized")
            .kv("Root", &data.root)
            .kv("Datastore", &data.datastore)
            .kv("Snapshots", &data.snapshots_dir)
            .kv("Pre-restore", &data.pre_restore_dir)
            .kv("Schema version", &data.schema_version.to_string());
        layout.build()
    })
}

fn initialize(ctx: &AppContext) -> Envelope<InitReport> {
    let result = (|| {
        // Opening the service creates the datastore and runs migrations.
        let service = ctx.open_service()?;

        let backups = ctx.root.join(&ctx.config.backups.dir);
        let snapshots_dir = backups.join(&ctx.config.backups.snapshots_subdir);
        let pre_restore_dir = backups.join(&ctx.config.backups.pre_restore_subdir);
        std::fs::create_dir_all(&snapshots_dir)?;
        std::fs::create_dir_all(&pre_restore_dir)?;

        let schema_version = service
            .connection()
            .with_conn(|conn| Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?))?;

        let report = InitReport {
            root: ctx.root.display().to_string(),
            datastore: ctx
                .root
                .join(&ctx.config.datastore.file_name)
                .display()
                .to_string(),
            snapshots_dir: snapshots_dir.display().to_string(),
            pre_restore_dir: pre_restore_dir.display().to_string(),
            schema_version,
        };
        service.shutdown();
        Ok(report)
    })();
    Envelope::from_result(result)
}
