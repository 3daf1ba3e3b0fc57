//! Config file setup.
//!
//! Asks whether the collision check should be on for every project by
//! default and which folder holds the migration scripts, then writes the
//! resulting TOML file.

use std::path::Path;

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};

use dbscript_guard_core::config::{GuardConfig, DEFAULT_WATCHED_FOLDER};

use crate::style;

/// Answers that skip the prompts.
#[derive(Debug, Default)]
pub struct InitAnswers {
    pub enabled: Option<bool>,
    pub watched_folder: Option<String>,
}

/// Run the setup and write the config to `output`.
pub fn run_init(output: &Path, answers: InitAnswers) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    println!();
    println!("{}", style::header("dbscript-guard Integration"));
    println!();

    let enabled = match answers.enabled {
        Some(enabled) => enabled,
        None => Confirm::new()
            .with_prompt("Enable the dbscript collision check for all projects by default?")
            .default(true)
            .interact()
            .context("failed to read confirmation")?,
    };

    let watched_folder = match answers.watched_folder {
        Some(folder) => folder,
        None => Input::new()
            .with_prompt("Repository folder holding migration scripts")
            .default(DEFAULT_WATCHED_FOLDER.to_string())
            .interact_text()
            .context("failed to read watched folder")?,
    };

    let contents = render_config(enabled, &watched_folder);

    // Refuse to write something that would not load back.
    let mut parsed = GuardConfig::from_toml(&contents).context("generated config does not parse")?;
    parsed.validate().context("generated config is invalid")?;

    std::fs::write(output, contents).context("failed to write config file")?;

    println!();
    println!(
        "{}",
        style::success(&format!("Configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!(
        "  1. Validate with: dbscript-guard --config {} validate",
        output.display()
    );
    println!("  2. Install as a server-side hook, e.g. hooks/pre-receive:");
    println!(
        "{}",
        style::dim(&format!(
            "       #!/bin/sh\n       exec dbscript-guard --config {} hook pre-receive",
            output.display()
        ))
    );

    Ok(())
}

fn render_config(enabled: bool, watched_folder: &str) -> String {
    format!(
        r#"# dbscript-guard configuration

[guard]
# Run the check for projects without an override below.
enabled = {enabled}
watched_folder = "{watched_folder}"

[repositories]
# Directory holding one repository per project (<id>.git or <id>).
# base_path = "/srv/git"

[logging]
log_level = "warn"

# Per-project overrides:
# [projects."my-project"]
# enabled = false
"#,
        enabled = enabled,
        watched_folder = watched_folder.trim().trim_end_matches('/'),
    )
}
