mod bootstrap;
mod render;

use anyhow::{Context, Result};
use clap::Parser;

use audit_core::settings::{CommandConfig, Settings};
use audit_data::analysis::analyze_logs;
use audit_data::verify::{verify_crashes, DirectoryStore, IdListQueue};

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(settings.effective_log_level(), settings.log_file.as_deref())?;

    tracing::info!("crash-audit v{} starting", env!("CARGO_PKG_VERSION"));

    let config = settings
        .command_config()
        .context("Invalid command line")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match config {
        CommandConfig::Logs(audit) => {
            tracing::info!(
                "Auditing {} input(s) from {} to {}",
                audit.inputs.len(),
                audit.window.start,
                audit.window.end
            );

            let result = analyze_logs(&audit).context("Log reconciliation failed")?;
            render::render_analysis(&mut out, &result, audit.format, audit.strict_hosts)?;
        }

        CommandConfig::Verify(verify) => {
            tracing::info!(
                "Verifying ids from {} against {}",
                verify.ids_file.display(),
                verify.store_root.display()
            );

            let mut queue = IdListQueue::from_file(&verify.ids_file)
                .with_context(|| format!("Failed to load {}", verify.ids_file.display()))?;
            let store = DirectoryStore::new(&verify.store_root);
            let report = verify_crashes(&mut queue, &store, &verify.key_prefix)
                .context("Verification failed")?;
            render::render_verify(&mut out, &report, verify.format)?;
        }
    }

    Ok(())
}
