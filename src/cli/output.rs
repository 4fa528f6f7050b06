//! CLI output formatting

use crate::{
    core::{ExecutionDescription, ExecutionStatus, StepStatus},
    execution::LaunchEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner shown while waiting on the backend
pub fn create_wait_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        spinner.set_style(style);
    }
    spinner
}

/// Start ticking a spinner with a message
pub fn start_spinner(spinner: &ProgressBar, message: String) {
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Executing => style("EXECUTING").yellow().to_string(),
        ExecutionStatus::Stopping => style("STOPPING").yellow().to_string(),
        ExecutionStatus::Stopped => style("STOPPED").yellow().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Succeeded => style("SUCCEEDED").green().to_string(),
    }
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Starting => style("STARTING").dim().to_string(),
        StepStatus::Executing => style("EXECUTING").yellow().to_string(),
        StepStatus::Stopping => style("STOPPING").yellow().to_string(),
        StepStatus::Stopped => style("STOPPED").yellow().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
        StepStatus::Succeeded => style("SUCCEEDED").green().to_string(),
    }
}

/// Format a launch event for display
pub fn format_launch_event(event: &LaunchEvent) -> String {
    match event {
        LaunchEvent::DefinitionBuilt {
            pipeline_name,
            steps,
        } => format!(
            "{} Built pipeline {} ({})",
            INFO,
            style(pipeline_name).bold(),
            style(steps.join(" → ")).dim()
        ),
        LaunchEvent::PipelineRegistered { pipeline_arn, .. } => {
            format!("{} Registered {}", CHECK, style(pipeline_arn).dim())
        }
        LaunchEvent::ExecutionStarted { execution_arn } => {
            format!("{} Started execution {}", ROCKET, style(execution_arn).cyan())
        }
        LaunchEvent::WaitingForCompletion { execution_arn } => format!(
            "{} Waiting for {}",
            SPINNER,
            style(short_arn(execution_arn)).dim()
        ),
        LaunchEvent::ExecutionFinished {
            execution_arn,
            status,
        } => format!(
            "{} Execution {} {}",
            INFO,
            style(short_arn(execution_arn)).dim(),
            format_status(*status)
        ),
    }
}

/// Format the per-step results of a finished execution
pub fn format_description(description: &ExecutionDescription) -> String {
    let mut lines = Vec::new();
    for step in &description.steps {
        let mut line = format!(
            "  {} {}",
            style(&step.step_name).bold(),
            format_step_status(step.step_status)
        );
        if let Some(reason) = &step.failure_reason {
            line.push_str(&format!(" - {}", style(reason).dim()));
        }
        lines.push(line);
    }
    if let (Some(started), Some(completed)) = (description.started_at, description.completed_at) {
        if let Ok(duration) = completed.signed_duration_since(started).to_std() {
            lines.push(format!("  Duration: {}", style(format_duration(duration)).dim()));
        }
    }
    lines.join("\n")
}

/// Last path component of an ARN-like identifier
pub fn short_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
