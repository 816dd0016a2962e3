use crate::cli::{DashboardArgs, RecomputeArgs};
use crate::infra::{build_service, load_store};
use accredivault::compliance::{
    run_batch, BatchArgs, BatchFilter, BatchReport, BatchRequest, ComputedStatus,
    DashboardSummary, PackSelector, StatusCounts,
};
use accredivault::config::AppConfig;
use accredivault::error::AppError;
use accredivault::telemetry;

pub(crate) fn run_recompute(args: RecomputeArgs) -> Result<u8, AppError> {
    let config = AppConfig::load()?;
    let request = BatchRequest::from_args(args.batch_args(), config.engine.near_due_days)?;
    telemetry::init(&config.telemetry)?;

    let store = load_store(Some(args.snapshot.as_path()))?;
    let (service, _) = build_service(store, config.engine, args.today)?;
    let report = run_batch(service.as_ref(), &request, service.today())?;

    if report.is_empty() {
        println!("Warning: no controls found for pack {}", report.pack_version);
        return Ok(0);
    }

    print!("{}", render_report(&report));
    Ok(report.outcome().exit_code())
}

pub(crate) fn run_dashboard(args: DashboardArgs) -> Result<u8, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let selector = match args.pack_version {
        Some(version) => PackSelector::Version(version),
        None => PackSelector::Latest,
    };
    let store = load_store(Some(args.snapshot.as_path()))?;
    let (service, _) = build_service(store, config.engine, args.today)?;

    let refresh = BatchArgs {
        pack_version: match &selector {
            PackSelector::Version(version) => Some(version.clone()),
            PackSelector::Latest => None,
        },
        latest: selector == PackSelector::Latest,
        no_fail_on_overdue: true,
        ..BatchArgs::default()
    };
    let request = BatchRequest::from_args(refresh, config.engine.near_due_days)?;
    run_batch(service.as_ref(), &request, service.today())?;

    let summary = service.dashboard(&selector)?;
    if args.json {
        println!("{}", render_dashboard_json(&summary)?);
    } else {
        print!("{}", render_dashboard(&summary));
    }
    Ok(0)
}

fn render_counts(counts: &StatusCounts, out: &mut String) {
    for status in ComputedStatus::ordered() {
        out.push_str(&format!("{}: {}\n", status.as_str(), counts.get(status)));
    }
    out.push_str(&format!("NEAR_DUE: {}\n", counts.near_due));
}

pub(crate) fn render_report(report: &BatchReport) -> String {
    let mut out = String::new();
    let verb = if report.dry_run {
        "Computed (dry run)"
    } else {
        "Recomputed"
    };
    let scope = match report.filter {
        BatchFilter::All => String::new(),
        BatchFilter::OnlyOverdue => " [only overdue]".to_string(),
        BatchFilter::OnlyNearDue { window_days } => format!(" [due within {window_days} days]"),
    };
    out.push_str(&format!(
        "{verb} statuses for {} of {} controls in pack {} as of {}{scope}\n",
        report.selected, report.total_controls, report.pack_version, report.today
    ));
    render_counts(&report.counts, &mut out);
    let unlisted = report.overdue_seen.saturating_sub(report.counts.overdue);
    if unlisted > 0 {
        out.push_str(&format!("Overdue outside filter: {unlisted}\n"));
    }

    if !report.failures.is_empty() {
        out.push_str(&format!("Failed controls: {}\n", report.failures.len()));
        for failure in &report.failures {
            out.push_str(&format!(
                "  - {} ({}): {}\n",
                failure.control_code, failure.control_id, failure.error
            ));
        }
    }
    out
}

pub(crate) fn render_dashboard_json(summary: &DashboardSummary) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

pub(crate) fn render_dashboard(summary: &DashboardSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Pack {} as of {}: {} controls\n",
        summary.pack_version, summary.today, summary.totals.total_controls
    ));
    render_counts(&summary.totals.counts, &mut out);

    out.push_str("Sections:\n");
    for section in &summary.sections {
        out.push_str(&format!(
            "  {}: {} total | {} ready | {} verified | {} overdue\n",
            section.section_code,
            section.total,
            section.counts.ready,
            section.counts.verified,
            section.counts.overdue
        ));
    }

    if summary.upcoming_due.is_empty() {
        out.push_str("Upcoming due: none\n");
    } else {
        out.push_str("Upcoming due:\n");
        for entry in &summary.upcoming_due {
            out.push_str(&format!(
                "  {} {} ({})\n",
                entry.next_due_date,
                entry.control_code,
                entry.computed_status.label()
            ));
        }
    }
    out
}
