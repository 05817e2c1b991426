//! completions command - Print shell completion scripts

use clap::CommandFactory;
use clap_complete::Shell;

use super::Cli;
use crate::exit_code::ExitCode;

/// Name completions are registered under
const BIN_NAME: &str = "stow";

/// Arguments for the completions command
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Completion script for one shell
fn render(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut script = Vec::new();
    clap_complete::generate(shell, &mut cmd, BIN_NAME, &mut script);
    script
}

/// Print the completion script to stdout
pub fn execute(args: CompletionsArgs) -> ExitCode {
    use std::io::Write;

    match std::io::stdout().lock().write_all(&render(args.shell)) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            eprintln!("Failed to write completions: {e}");
            ExitCode::GeneralError
        }
    }
}
