use anyhow::Context;

use skillforge::config::AppConfig;
use skillforge::server::build_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("SkillForge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding", config.port);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!(
        "   Wizard: {} skills required, commit timeout {:?}",
        config.wizard.min_assessed_skills, config.wizard.commit_timeout
    );

    let app = build_app(&config)
        .await
        .with_context(|| format!("failed to open database at {}", config.db_path.display()))?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding server started");

    axum::serve(listener, app).await?;
    Ok(())
}
