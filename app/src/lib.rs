pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod services;

use std::sync::Arc;

use affix_engine::{
    AffixResult, AffixSession, CanvasPlan, Collaborators, Dimensions, FileStreamProvider,
    ImageRef, RenderScale, Selection,
};
use serde::Serialize;

use cli::Args;
use config::AppConfig;
use services::hooks::LoggingHooks;
use services::output::FileSinkFactory;

/// Proposed size, reported by `--plan-only`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub plan: CanvasPlan,
    pub scale: f64,
    pub output: Dimensions,
}

/// What one invocation did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Report {
    Planned(PlanReport),
    Written(AffixResult),
}

/// Entry point for the binary: load config, affix, print the report.
pub async fn run(args: Args) -> anyhow::Result<()> {
    bootstrap::load_dotenv();
    let mut config = AppConfig::load()?;
    args.apply(&mut config);
    tracing::debug!(?config, "Settings loaded");

    let report = affix(&args, &config).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &report {
            Report::Planned(p) => println!(
                "Proposed size {}x{} (at {:.0}%: {})",
                p.plan.width,
                p.plan.height,
                p.scale * 100.0,
                p.output
            ),
            Report::Written(r) => println!("Wrote {} ({})", r.path.display(), r.dimensions),
        }
    }
    Ok(())
}

/// Run one affix session for `args` with already-resolved settings.
pub async fn affix(args: &Args, config: &AppConfig) -> anyhow::Result<Report> {
    let selection = Selection::new(
        args.images
            .iter()
            .map(|path| ImageRef::from(path.as_path())),
    )?;
    let scale = RenderScale::new(args.scale)?;

    let sinks = Arc::new(FileSinkFactory::new(bootstrap::output_dir(config)));
    let collaborators = Collaborators::new(Arc::new(FileStreamProvider), sinks)
        .with_exclusive(Arc::new(LoggingHooks))
        .with_registrar(Arc::new(LoggingHooks));

    let mut session = AffixSession::new(collaborators);
    let plan = session.start(selection, config.affix_config()).await?;
    let output = Dimensions::new(plan.width_at(scale), plan.height_at(scale));
    tracing::info!(
        width = plan.width,
        height = plan.height,
        scale = scale.get(),
        %output,
        "Proposed output size"
    );

    if args.plan_only {
        session.cancel()?;
        return Ok(Report::Planned(PlanReport {
            plan,
            scale: scale.get(),
            output,
        }));
    }

    let handle = session.confirm(scale, config.output_spec())?;
    let token = handle.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current image");
            token.cancel();
        }
    });

    let outcome = handle
        .outcome_with(|p| {
            tracing::info!(image = p.index, drawn = p.drawn, total = p.total, "Drew image");
        })
        .await;
    interrupt.abort();

    Ok(Report::Written(outcome?))
}
