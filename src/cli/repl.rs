//! Interactive REPL for VertexCare
//!
//! Reads patient ids or commands and prints the resulting plans.

use std::io::{self, BufRead, Write};

use crate::agent::Agent;
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, LoopOutcome, Result};

/// State the commands operate on
pub struct Session {
    pub agent: Agent,
    /// Print the full transcript after each run
    pub debug: bool,
}

impl Session {
    pub fn new(agent: Agent, debug: bool) -> Self {
        Self { agent, debug }
    }
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    session: Session,
}

impl Repl {
    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let debug = config.agent.debug;
        Ok(Self {
            session: Session::new(Agent::from_config(&config)?, debug),
        })
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("patient> ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.session) {
                CommandResult::Exit => {
                    println!("\nGoodbye!");
                    break;
                }
                CommandResult::Handled(output) => println!("{}\n", output),
                CommandResult::Run(patient_id) => {
                    let (outcome, transcript) = self.session.agent.run_traced(patient_id).await;
                    if self.session.debug {
                        println!("\n--- TRANSCRIPT ---\n{}\n", transcript);
                    }
                    match &outcome {
                        LoopOutcome::Plan(_) => println!("\n--- FINAL INTERVENTION PLAN ---"),
                        LoopOutcome::Error(_) => println!("\n--- RUN FAILED ---"),
                    }
                    println!("{}\n", serde_json::to_string_pretty(&outcome)?);
                }
            }
        }

        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let agent = &self.session.agent;

        println!();
        println!("VertexCare - CHW intervention planning agent");
        println!("Backend:    {}", agent.backend_name());
        println!("Patients:   {}", agent.tools().context().patients.len());
        println!("Iterations: {}", agent.max_iterations());
        println!();
        println!("Enter a patient id, or: help, status, tools, exit");
        println!("─────────────────────────────────────────────────");
    }
}
