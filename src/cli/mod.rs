//! CLI command handling
//!
//! Loads catalogs and UI scripts, dispatches commands and formats output.

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::commands::{Commands, ContextArgs};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::sim::SimulatedUi;
use crate::tour::{
    CancelToken, Catalog, EligibilityContext, Host, Registry, RunOutcome, RunReport, Runner,
    StepStatus, Walkthrough,
};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run {
            catalog,
            ui,
            id,
            context,
            timeout_ms,
            json,
        } => {
            let mut registry = load_registry(&catalog)?;
            let ui = Arc::new(SimulatedUi::from_path(&ui)?);
            let context = resolve_context(&context, config, &ui.script().url);

            let walkthrough = match id {
                Some(id) => registry.get(&id)?,
                None => registry.first_eligible(&context)?,
            };

            let mut settings = config.run_settings();
            if let Some(ms) = timeout_ms {
                settings.step_timeout = std::time::Duration::from_millis(ms);
            }

            let runner = Runner::new(Host::from_shared(ui), context, settings);
            let cancel = CancelToken::new();
            let interrupt = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Interrupted, cancelling after the current step");
                        cancel.cancel();
                    }
                })
            };

            if !json {
                println!(
                    "\n{} {}",
                    "Running Walkthrough:".blue().bold(),
                    walkthrough.id.white().bold()
                );
                println!("  {}", runner.context().to_string().dimmed());
            }

            let report = runner.run_with(&walkthrough, &cancel, None).await;
            interrupt.abort();
            registry.clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            match report.outcome {
                RunOutcome::Completed => Ok(()),
                RunOutcome::Failed { step, failure } => Err(Error::WalkthroughFailed {
                    id: report.id,
                    step: step + 1,
                    reason: failure.to_string(),
                }),
            }
        }

        Commands::List {
            catalog,
            context,
            all,
        } => {
            let registry = load_registry(&catalog)?;
            let context = resolve_context(&context, config, "");

            let walkthroughs = if all {
                registry.all()
            } else {
                registry.list_eligible(&context)
            };

            if walkthroughs.is_empty() {
                println!("No eligible walkthroughs for {}", context);
            } else {
                println!("Walkthroughs:");
                for w in &walkthroughs {
                    print_walkthrough_line(w, &context);
                }
            }

            Ok(())
        }

        Commands::Show { catalog, id, json } => {
            let registry = load_registry(&catalog)?;
            let walkthrough = registry.get(&id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(walkthrough.as_ref())?);
                return Ok(());
            }

            println!(
                "{} (sequence {}, url {})",
                walkthrough.id.bold(),
                walkthrough.sequence,
                if walkthrough.url.is_empty() {
                    "any"
                } else {
                    walkthrough.url.as_str()
                }
            );
            for (i, step) in walkthrough.steps.iter().enumerate() {
                let mut filters = Vec::new();
                if let Some(platform) = step.platform {
                    filters.push(platform.to_string());
                }
                if let Some(edition) = step.edition {
                    filters.push(edition.to_string());
                }
                let filters = if filters.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", filters.join(", "))
                };

                println!(
                    "  {:>2}. {} {}{}",
                    i + 1,
                    step.effective_action().to_string().cyan(),
                    step.trigger,
                    filters.dimmed()
                );
                if let Some(extra) = &step.extra_trigger {
                    println!("      {} {}", "also:".dimmed(), extra);
                }
                if !step.content.is_empty() {
                    println!("      {} ({})", step.content.dimmed(), step.position);
                }
            }

            Ok(())
        }

        Commands::Check { catalog } => {
            let registry = load_registry(&catalog)?;
            let steps: usize = registry
                .ids()
                .filter_map(|id| registry.lookup(id))
                .map(|w| w.steps.len())
                .sum();

            println!(
                "{} {} walkthroughs, {} fragments, {} steps after expansion",
                "✓".green(),
                registry.len(),
                registry.fragments().len(),
                steps
            );

            Ok(())
        }
    }
}

fn load_registry(path: &Path) -> Result<Registry> {
    let registry = Catalog::from_path(path)?.into_registry()?;
    tracing::debug!(path = %path.display(), walkthroughs = registry.len(), "Loaded catalog");
    Ok(registry)
}

/// Command-line values win over the config file, which wins over built-in defaults
fn resolve_context(args: &ContextArgs, config: &Config, default_url: &str) -> EligibilityContext {
    EligibilityContext::new(
        args.url.clone().unwrap_or_else(|| default_url.to_string()),
        args.edition.unwrap_or(config.defaults.edition),
        args.platform.unwrap_or(config.defaults.platform),
    )
}

fn print_walkthrough_line(w: &Walkthrough, context: &EligibilityContext) {
    let marker = if w.is_eligible(context) {
        "●".green()
    } else {
        "○".dimmed()
    };
    println!(
        "  {} {} (sequence {}, {} steps, url {})",
        marker,
        w.id,
        w.sequence,
        w.steps.len(),
        if w.url.is_empty() { "any" } else { w.url.as_str() }
    );
}

fn print_report(report: &RunReport) {
    println!("\n{}", "Steps:".cyan());

    for record in &report.records {
        let label = if record.content.is_empty() {
            record.trigger.as_str()
        } else {
            record.content.as_str()
        };
        match record.status {
            StepStatus::Done => println!(
                "  {} Step {}: {} ({})",
                "✓".green(),
                record.index + 1,
                label,
                record.action.to_string().dimmed()
            ),
            StepStatus::Skipped => println!(
                "  {} Step {}: {}",
                "-".dimmed(),
                record.index + 1,
                format!("{} (skipped)", label).dimmed()
            ),
        }
    }

    match &report.outcome {
        RunOutcome::Completed => {
            println!(
                "\n{} {} ({} of {} steps acted on)\n",
                "✓".green().bold(),
                "Walkthrough Completed".green().bold(),
                report.actions_dispatched(),
                report.steps_total
            );
            if report.celebrate {
                println!("  {}\n", "🌈 Well done!".magenta().bold());
            }
        }
        RunOutcome::Failed { step, failure } => {
            println!("  {} Step {}: {}", "✗".red(), step + 1, failure);
            println!(
                "\n{} {}\n",
                "✗".red().bold(),
                format!("Walkthrough Failed [{}]", failure.code()).red().bold()
            );
        }
    }
}
