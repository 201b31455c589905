use repolens_core::bootstrap::RepoSession;
use repolens_core::Orchestrator;
use repolens_llm::LlmProvider;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::print_exchange;

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Clear,
    History,
    Export,
    Exit,
    Empty,
    Question(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/clear" => Input::Clear,
        "/history" => Input::History,
        "/export" => Input::Export,
        "/exit" | "/quit" => Input::Exit,
        text => Input::Question(text),
    }
}

/// Read questions from stdin until EOF, `/exit` or Ctrl-C.
pub(crate) async fn run<P: LlmProvider>(
    orchestrator: &Orchestrator<P>,
    session: &mut RepoSession,
) -> anyhow::Result<()> {
    println!(
        "chatting about {} (/clear, /history, /export, /exit)",
        session.repo_id()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Exit => break,
            Input::Clear => {
                session.clear();
                println!("history cleared");
            }
            Input::History => {
                for exchange in session.replay() {
                    println!("> {}", exchange.question);
                    print_exchange(&exchange);
                    println!();
                }
            }
            Input::Export => println!("{}", serde_json::to_string_pretty(session.transcript())?),
            Input::Question(text) => match orchestrator.submit(session, text).await {
                Ok(outcome) => print_exchange(&outcome),
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
    Ok(())
}

fn print_prompt() {
    use std::io::Write as _;

    print!("> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_commands() {
        assert_eq!(parse_input(" /clear "), Input::Clear);
        assert_eq!(parse_input("/history"), Input::History);
        assert_eq!(parse_input("/quit"), Input::Exit);
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(
            parse_input("what does main.cpp do?\n"),
            Input::Question("what does main.cpp do?")
        );
    }
}
