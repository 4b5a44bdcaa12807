//! rollpoint restore - point-in-time restore.

use std::time::Duration;

use clap::Args;

use crate::app::AppContext;
use crate::cli::lock::GlobalLock;
use crate::cli::output::{HumanLayout, emit_envelope};
use crate::error::{Result, RollpointError};
use crate::restore::RestoreOptions;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Recovery point id to restore to
    pub id: i64,

    /// Skip the pre-restore safety snapshot. Without it a failed restore
    /// cannot be rolled back automatically.
    #[arg(long)]
    pub no_pre_backup: bool,

    /// Id of the user requesting the restore
    #[arg(long)]
    pub user: Option<i64>,

    /// Apply the restore (required)
    #[arg(long)]
    pub approve: bool,
}

pub fn run(ctx: &AppContext, args: &RestoreArgs) -> Result<bool> {
    if !args.approve {
        return Err(RollpointError::ApprovalRequired(
            "restore requires --approve".to_string(),
        ));
    }

    // Single restore at a time; the library assumes the caller enforces
    // this exclusion.
    let _lock = GlobalLock::acquire_timeout(&ctx.root, Duration::from_secs(30))?;
    let service = ctx.open_service()?;

    let opts = RestoreOptions {
        create_backup_before_restore: !args.no_pre_backup && ctx.config.restore.pre_restore_backup,
        user_id: args.user,
    };
    let envelope = service.restore(args.id, &opts);
    emit_envelope(ctx.robot_mode, &envelope, |outcome| {
        let mut layout = HumanLayout::new();
        layout
            .title(&format!(
                "Restored to recovery point {}",
                outcome.recovery_point_id
            ))
            .kv("Timestamp", &outcome.restored_timestamp.to_rfc3339())
            .kv("Records restored", &outcome.records_restored.to_string())
            .kv_opt("Safety backup", outcome.pre_restore_backup.as_deref())
            .kv(
                "Consistency probe",
                if outcome.probe_passed { "passed" } else { "FAILED (diagnostic only)" },
            );
        layout.build()
    })
}
