//! rollpoint point - recovery point lifecycle.

use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::cli::commands::parse_ts;
use crate::cli::output::{HumanLayout, emit_envelope};
use crate::error::{Result, RollpointError};
use crate::registry::{CreateRecoveryPoint, RecoveryPoint, RecoveryPointFilter};

#[derive(Args, Debug)]
pub struct PointArgs {
    #[command(subcommand)]
    pub command: PointCommand,
}

#[derive(Subcommand, Debug)]
pub enum PointCommand {
    /// Create a new recovery point
    Create(PointCreateArgs),
    /// List recovery points
    List(PointListArgs),
    /// Show one recovery point
    Show(PointShowArgs),
    /// Verify a recovery point's backup integrity
    Verify(PointShowArgs),
    /// Delete a recovery point and its backup file
    Delete(PointDeleteArgs),
}

#[derive(Args, Debug)]
pub struct PointCreateArgs {
    /// Human-readable name
    #[arg(long)]
    pub name: Option<String>,

    /// Longer description
    #[arg(long)]
    pub description: Option<String>,

    /// Explicit point timestamp (RFC 3339; default: now)
    #[arg(long)]
    pub timestamp: Option<String>,

    /// Also snapshot the datastore file
    #[arg(long)]
    pub backup: bool,

    /// Mark the point as automatically created
    #[arg(long)]
    pub automatic: bool,

    /// Id of the creating user
    #[arg(long)]
    pub user: Option<i64>,
}

#[derive(Args, Debug)]
pub struct PointListArgs {
    /// Only points at or after this timestamp (RFC 3339)
    #[arg(long)]
    pub from: Option<String>,

    /// Only points at or before this timestamp (RFC 3339)
    #[arg(long)]
    pub to: Option<String>,

    /// Only automatic points
    #[arg(long, conflicts_with = "manual")]
    pub automatic: bool,

    /// Only manual points
    #[arg(long)]
    pub manual: bool,

    /// 1-based page number
    #[arg(long, default_value = "1")]
    pub page: u32,

    #[arg(long, default_value = "20")]
    pub page_size: u32,
}

#[derive(Args, Debug)]
pub struct PointShowArgs {
    /// Recovery point id
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct PointDeleteArgs {
    /// Recovery point id
    pub id: i64,

    /// Apply the deletion (required)
    #[arg(long)]
    pub approve: bool,
}

pub fn run(ctx: &AppContext, args: &PointArgs) -> Result<bool> {
    match &args.command {
        PointCommand::Create(create) => run_create(ctx, create),
        PointCommand::List(list) => run_list(ctx, list),
        PointCommand::Show(show) => run_show(ctx, show),
        PointCommand::Verify(verify) => run_verify(ctx, verify),
        PointCommand::Delete(delete) => run_delete(ctx, delete),
    }
}

fn run_create(ctx: &AppContext, args: &PointCreateArgs) -> Result<bool> {
    let timestamp = args.timestamp.as_deref().map(parse_ts).transpose()?;
    let service = ctx.open_service()?;

    let envelope = service.create_recovery_point(CreateRecoveryPoint {
        name: args.name.clone(),
        description: args.description.clone(),
        timestamp,
        create_backup: args.backup,
        created_by: args.user,
        is_automatic: args.automatic,
    });
    emit_envelope(ctx.robot_mode, &envelope, render_point)
}

fn run_list(ctx: &AppContext, args: &PointListArgs) -> Result<bool> {
    let filter = RecoveryPointFilter {
        from: args.from.as_deref().map(parse_ts).transpose()?,
        to: args.to.as_deref().map(parse_ts).transpose()?,
        is_automatic: match (args.automatic, args.manual) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        page: args.page,
        page_size: args.page_size,
    };
    let service = ctx.open_service()?;

    let envelope = service.list_recovery_points(&filter);
    emit_envelope(ctx.robot_mode, &envelope, |page| {
        if page.points.is_empty() {
            return "No recovery points found.".to_string();
        }
        let mut lines = vec![format!(
            "Recovery points (page {}/{}, {} total):",
            page.page, page.total_pages, page.total
        )];
        for point in &page.points {
            lines.push(format!(
                "  {:>5}  {}  {}  {}",
                point.id,
                point.timestamp.to_rfc3339(),
                if point.is_automatic { "auto  " } else { "manual" },
                point.name.as_deref().unwrap_or("-"),
            ));
        }
        lines.join("\n")
    })
}

fn run_show(ctx: &AppContext, args: &PointShowArgs) -> Result<bool> {
    let service = ctx.open_service()?;
    let envelope = service.get_recovery_point(args.id);
    emit_envelope(ctx.robot_mode, &envelope, render_point)
}

fn run_verify(ctx: &AppContext, args: &PointShowArgs) -> Result<bool> {
    let service = ctx.open_service()?;
    let envelope = service.verify_recovery_point(args.id);
    emit_envelope(ctx.robot_mode, &envelope, |report| {
        let mut layout = HumanLayout::new();
        layout
            .title(&format!("Recovery point {}", report.recovery_point_id))
            .kv("Valid", if report.valid { "yes" } else { "no" })
            .kv("Detail", &report.message)
            .kv_opt("Backup", report.backup_path.as_deref());
        layout.build()
    })
}

fn run_delete(ctx: &AppContext, args: &PointDeleteArgs) -> Result<bool> {
    if !args.approve {
        return Err(RollpointError::ApprovalRequired(
            "point delete requires --approve".to_string(),
        ));
    }
    let service = ctx.open_service()?;

    let envelope = service.delete_recovery_point(args.id);
    emit_envelope(ctx.robot_mode, &envelope, |report| {
        format!(
            "Deleted recovery point {} (backup removed: {}, entries unpinned: {})",
            report.recovery_point_id, report.backup_removed, report.entries_unpinned
        )
    })
}

fn render_point(point: &RecoveryPoint) -> String {
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("Recovery point {}", point.id))
        .kv_opt("Name", point.name.as_deref())
        .kv_opt("Description", point.description.as_deref())
        .kv("Timestamp", &point.timestamp.to_rfc3339())
        .kv("Kind", if point.is_automatic { "automatic" } else { "manual" })
        .kv_opt("Backup", point.backup_path.as_deref())
        .kv_opt("Checksum", point.checksum.as_deref())
        .kv_opt(
            "Log watermark",
            point
                .transaction_log_id
                .map(|id| id.to_string())
                .as_deref(),
        );
    layout.build()
}
