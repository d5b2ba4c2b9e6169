//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::cli::repl::Session;
use crate::core::PatientId;

/// Result of parsing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Run the agent for this patient
    Run(PatientId),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
}

/// Parse and handle special commands
pub fn handle_command(input: &str, session: &mut Session) -> CommandResult {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" | "q" => CommandResult::Exit,

        "help" | "?" => CommandResult::Handled(help_text()),

        "status" => {
            let agent = &session.agent;
            let policy = agent.retry_policy();
            CommandResult::Handled(format!(
                "VertexCare Status:\n\
                 ─────────────────────────────\n\
                 Backend:        {}\n\
                 Max iterations: {}\n\
                 Retry budget:   {} attempts, first backoff {}s\n\
                 Patients:       {}\n\
                 Debug:          {}",
                agent.backend_name(),
                agent.max_iterations(),
                policy.max_attempts,
                policy.initial_backoff.as_secs(),
                agent.tools().context().patients.len(),
                if session.debug { "on" } else { "off" }
            ))
        }

        "tools" => CommandResult::Handled(format!("Available tools:\n{}", session.agent.tools().describe())),

        "set" => handle_set_command(args, session),

        "run" => match args.parse::<PatientId>() {
            Ok(id) => CommandResult::Run(id),
            Err(_) => CommandResult::Handled("Usage: run <patient_id>".to_string()),
        },

        _ => match input.parse::<PatientId>() {
            Ok(id) => CommandResult::Run(id),
            Err(_) => CommandResult::Handled(format!(
                "Unknown command: {}. Type 'help' for available commands.",
                cmd
            )),
        },
    }
}

/// Handle 'set' subcommands
fn handle_set_command(args: &str, session: &mut Session) -> CommandResult {
    let parts: Vec<&str> = args.splitn(2, ' ').collect();

    if parts[0].is_empty() {
        return CommandResult::Handled(
            "Usage: set <iterations|debug> <value>\n\
             Examples:\n\
               set iterations 8\n\
               set debug on"
                .to_string(),
        );
    }

    let key = parts[0].to_lowercase();
    let value = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match key.as_str() {
        "iterations" | "iter" => match value.parse::<usize>() {
            Ok(n) if n > 0 => {
                session.agent.set_max_iterations(n);
                CommandResult::Handled(format!("Max iterations set to: {}", n))
            }
            _ => CommandResult::Handled(format!(
                "Current max iterations: {}. Expected a positive integer.",
                session.agent.max_iterations()
            )),
        },

        "debug" => {
            let enabled = matches!(value.to_lowercase().as_str(), "on" | "true" | "1" | "yes");
            session.debug = enabled;
            CommandResult::Handled(format!(
                "Debug mode: {}",
                if enabled { "ON" } else { "OFF" }
            ))
        }

        _ => CommandResult::Handled(format!(
            "Unknown setting: {}. Available: iterations, debug",
            key
        )),
    }
}

/// Generate help text
fn help_text() -> String {
    r#"VertexCare Commands:
─────────────────────────────────────────────
  <patient_id>         Generate a plan for the patient
  run <patient_id>     Same as above
  help, ?              Show this help message
  exit, quit, q        Exit VertexCare
  status               Show current configuration
  tools                List the tools the agent can call

  set iterations <n>   Set the iteration budget per run
  set debug <on|off>   Print the full transcript after each run

Keyboard Shortcuts:
  Ctrl+D               Exit VertexCare
─────────────────────────────────────────────"#
        .to_string()
}
