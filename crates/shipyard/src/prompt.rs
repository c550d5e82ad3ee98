use colored::Colorize;
use shipyard_deploy::Confirm;
use std::io::Write;

/// Asks on the terminal, defaulting to "no"
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} {} ", prompt.yellow(), "[y/N]:".dimmed());
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        match std::io::stdin().read_line(&mut input) {
            Ok(_) => {
                let answer = input.trim();
                answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read answer");
                false
            }
        }
    }
}
