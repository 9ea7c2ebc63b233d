use super::{Action, Context, load_spec};
use colored::Colorize;
use std::path::Path;
use vmaas_cloud::{InstanceController, InstanceSpec};

pub async fn handle(ctx: &Context, action: Action, spec_path: &Path) -> anyhow::Result<()> {
    let mut spec: InstanceSpec = load_spec(spec_path)?;
    let mut state = ctx.state.load().await?;
    state.seed_instance(&mut spec);

    println!(
        "{}",
        format!("■ instance {}: {}", action, spec.name).yellow().bold()
    );
    if spec.is_clone() && action == Action::Create {
        println!("  {}", "cloning; waiting for the copy to appear".blue());
    }

    let controller = InstanceController::new(ctx.backend.clone(), ctx.policies)
        .with_cancellation(ctx.cancel.clone());

    let result = match action {
        Action::Create => controller.create(&mut spec).await.map(|_| ()),
        Action::Read => controller.read(&mut spec).await,
        Action::Update => controller.update(&mut spec).await,
        Action::Delete => controller.delete(&mut spec).await,
    };

    // The backend may have assigned an id even when a later check failed
    state.record_instance(&spec);
    ctx.state.save(&state).await?;
    result?;

    match spec.id {
        Some(id) => {
            println!("  {} id: {}", "✓".green(), id.to_string().cyan());
            if let Some(status) = &spec.status {
                println!("    status: {}", status.cyan());
            }
        }
        None => println!("  {} removed", "✓".green()),
    }
    Ok(())
}
