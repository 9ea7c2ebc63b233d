use super::{Action, Context, load_spec};
use colored::Colorize;
use std::path::Path;
use vmaas_cloud::{SnapshotController, SnapshotSpec};

pub async fn handle(ctx: &Context, action: Action, spec_path: &Path) -> anyhow::Result<()> {
    let mut spec: SnapshotSpec = load_spec(spec_path)?;
    let mut state = ctx.state.load().await?;
    state.seed_snapshot(&mut spec);

    println!(
        "{}",
        format!(
            "■ snapshot {}: {} (instance {})",
            action, spec.name, spec.instance_id
        )
        .yellow()
        .bold()
    );

    let controller = SnapshotController::new(ctx.backend.clone(), ctx.policies.default)
        .with_cancellation(ctx.cancel.clone());

    let result = match action {
        Action::Create => controller.create(&mut spec).await,
        Action::Read => controller.read(&mut spec).await,
        Action::Update => controller.update(&mut spec).await,
        Action::Delete => controller.delete(&mut spec).await,
    };

    state.record_snapshot(&spec);
    ctx.state.save(&state).await?;
    result?;

    match spec.id {
        Some(id) => {
            println!("  {} id: {}", "✓".green(), id.to_string().cyan());
            if let Some(status) = &spec.status {
                println!("    status: {}", status.cyan());
            }
            if let Some(timestamp) = spec.timestamp {
                println!("    created: {}", timestamp.to_rfc3339().cyan());
            }
        }
        None => println!("  {} requested", "✓".green()),
    }
    Ok(())
}
