use std::collections::BTreeSet;
use std::fmt;

use quiz_core::model::{OptionKey, QuestionError, Step, parse_key_list};
use quiz_core::time::{format_clock, format_compact};
use services::session::{AnswerStatus, OptionState, QuestionView};
use services::{QuizError, QuizLoopService, QuizOutcome, QuizRun};
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line typed at the quiz prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCommand {
    Select(BTreeSet<OptionKey>),
    Submit,
    Next,
    Previous,
    /// 0-based target index.
    GoTo(usize),
    List,
    Finish,
    Restart,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCommandError {
    Empty,
    InvalidIndex { raw: String },
    Keys(QuestionError),
}

impl fmt::Display for PlayCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayCommandError::Empty => f.write_str("type a command, or h for help"),
            PlayCommandError::InvalidIndex { raw } => write!(f, "invalid question number: {raw}"),
            PlayCommandError::Keys(err) => write!(f, "{err}"),
        }
    }
}

impl PlayCommand {
    /// Single-letter commands win over option keys; a trailing comma
    /// (`f,`) selects an option whose letter is also a command.
    pub fn parse(line: &str) -> Result<Self, PlayCommandError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err(PlayCommandError::Empty);
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "s" => Self::Submit,
            "n" => Self::Next,
            "p" => Self::Previous,
            "l" => Self::List,
            "f" => Self::Finish,
            "r" => Self::Restart,
            "q" => Self::Quit,
            "h" | "?" => Self::Help,
            "g" => {
                let raw = parts.next().unwrap_or_default();
                let number: usize = raw
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| PlayCommandError::InvalidIndex {
                        raw: raw.to_string(),
                    })?;
                Self::GoTo(number - 1)
            }
            _ => {
                let keys = parse_key_list(line).map_err(PlayCommandError::Keys)?;
                if keys.is_empty() {
                    return Err(PlayCommandError::Empty);
                }
                Self::Select(keys)
            }
        };
        Ok(command)
    }
}

const HELP: &str = "\
  a | a,c   pick option(s); single-answer questions submit at once
  s         submit the selection of a multi-select question
  n / p     next / previous question
  g <k>     jump to question k
  l         list questions
  f         finish (all questions answered)
  r         restart the set
  q         quit and show where you stand
  f,        pick option F (same for other command letters)";

fn option_marker(state: OptionState) -> &'static str {
    match state {
        OptionState::Neutral => "[ ]",
        OptionState::Selected => "[*]",
        OptionState::Correct => "[+]",
        OptionState::Incorrect => "[x]",
    }
}

pub fn render_question(view: &QuestionView) -> String {
    let mut out = format!(
        "\nQuestion {} of {}   Score: {}   {}\n{}\n",
        view.index + 1,
        view.total,
        view.score,
        format_clock(view.elapsed_seconds),
        view.text
    );
    if view.multi_select_hint {
        out.push_str("(Select all that apply, then s to submit)\n");
    }
    for option in &view.options {
        out.push_str(&format!(
            "  {} {}. {}\n",
            option_marker(option.state),
            option.key,
            option.text
        ));
    }
    if let Some(feedback) = &view.feedback {
        out.push_str(&format!("{feedback}\n"));
    }

    let nav = view.navigation;
    let mut hints = Vec::new();
    if nav.can_submit {
        hints.push("s submit");
    }
    if nav.can_go_previous {
        hints.push("p previous");
    }
    if nav.can_go_next {
        hints.push("n next");
    }
    if nav.can_finish {
        hints.push("f finish");
    }
    hints.push("h help");
    out.push_str(&format!("[{}]", hints.join(" | ")));
    out
}

pub fn render_outcome(outcome: &QuizOutcome) -> String {
    let result = outcome.result;
    let mut out = format!(
        "Quiz completed!\nYour score: {}/{} ({}%)\nTime taken: {}",
        result.score,
        result.total,
        result.percent(),
        format_compact(result.elapsed_seconds)
    );
    if outcome.attempt.is_none() {
        out.push_str("\n(result not saved to the server)");
    }
    out
}

fn render_list(run: &QuizRun) -> String {
    run.question_list()
        .iter()
        .map(|item| {
            let status = match item.status {
                AnswerStatus::Unanswered => ' ',
                AnswerStatus::Correct => '+',
                AnswerStatus::Incorrect => 'x',
            };
            let cursor = if item.active { '>' } else { ' ' };
            format!("{cursor}{status} Q{}. {}", item.number, item.preview)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply one command. Returns `false` when the loop should end.
async fn apply(
    service: &QuizLoopService,
    run: &mut QuizRun,
    command: PlayCommand,
) -> Result<bool, QuizError> {
    match command {
        PlayCommand::Select(keys) => {
            let question = run.session().current_question();
            if question.allows_multiple() {
                run.toggle_many(keys)?;
            } else if let Some(key) = keys.first().copied().filter(|_| keys.len() == 1) {
                service.select_option(run, key).await?;
            } else {
                let id = question.id().clone();
                service.submit(run, &id, keys).await?;
            }
        }
        PlayCommand::Submit => {
            service.submit_pending(run).await?;
        }
        PlayCommand::Next => {
            run.advance(Step::Next)?;
        }
        PlayCommand::Previous => {
            run.advance(Step::Previous)?;
        }
        PlayCommand::GoTo(index) => {
            run.go_to(index)?;
        }
        PlayCommand::List => println!("{}", render_list(run)),
        PlayCommand::Finish => {
            let outcome = service.finish(run).await?;
            println!("\n{}", render_outcome(&outcome));
            return Ok(false);
        }
        PlayCommand::Restart => service.restart(run).await,
        PlayCommand::Quit => {
            let summary = run.quit_summary();
            println!(
                "\nAnswered {} of {} ({} correct) in {}.",
                summary.answered,
                summary.total,
                summary.correct,
                format_compact(summary.elapsed_seconds)
            );
            return Ok(false);
        }
        PlayCommand::Help => println!("{HELP}"),
    }
    Ok(true)
}

/// Interactive quiz on stdin/stdout.
///
/// # Errors
///
/// Returns an error if stdin cannot be read. Session errors are printed and
/// the loop continues.
pub async fn play(service: &QuizLoopService, mut run: QuizRun) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", render_question(&run.view()));

    while let Some(line) = lines.next_line().await? {
        let command = match PlayCommand::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        let redraw = !matches!(command, PlayCommand::List | PlayCommand::Help);
        match apply(service, &mut run, command).await {
            Ok(false) => return Ok(()),
            Ok(true) if redraw => println!("{}", render_question(&run.view())),
            Ok(true) => {}
            Err(err) => println!("{err}"),
        }
    }

    // End of input counts as quitting.
    apply(service, &mut run, PlayCommand::Quit)
        .await
        .map(|_| ())
        .map_err(|err| std::io::Error::other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::SetNumber;
    use std::sync::Arc;
    use storage::repository::InMemoryRepository;
    use storage::wire::parse_questions_json;

    const MULTI: &str = r#"[{
        "question_text": "Pick the serverless query engines",
        "options": {"A": "Athena", "B": "EMR", "C": "Redshift Spectrum"},
        "correct_answers": ["A", "C"]
    }]"#;

    async fn multi_select_run() -> (QuizLoopService, QuizRun) {
        let repo = InMemoryRepository::new();
        repo.insert_entries(parse_questions_json(MULTI).unwrap())
            .unwrap();
        let service = QuizLoopService::new(Arc::new(repo.clone()), Arc::new(repo));
        let run = service.start_session(SetNumber::new(1)).await.unwrap();
        (service, run)
    }

    fn keys(cs: &[char]) -> BTreeSet<OptionKey> {
        cs.iter().map(|c| OptionKey::new(*c).unwrap()).collect()
    }

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(PlayCommand::parse("n"), Ok(PlayCommand::Next));
        assert_eq!(PlayCommand::parse(" P "), Ok(PlayCommand::Previous));
        assert_eq!(PlayCommand::parse("g 3"), Ok(PlayCommand::GoTo(2)));
        assert_eq!(PlayCommand::parse("q"), Ok(PlayCommand::Quit));
    }

    #[test]
    fn parses_key_selections() {
        assert_eq!(PlayCommand::parse("a"), Ok(PlayCommand::Select(keys(&['A']))));
        assert_eq!(
            PlayCommand::parse("a, c"),
            Ok(PlayCommand::Select(keys(&['A', 'C'])))
        );
        assert_eq!(PlayCommand::parse("f,"), Ok(PlayCommand::Select(keys(&['F']))));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(PlayCommand::parse("   "), Err(PlayCommandError::Empty));
        assert!(matches!(
            PlayCommand::parse("g 0"),
            Err(PlayCommandError::InvalidIndex { .. })
        ));
        assert!(matches!(
            PlayCommand::parse("g"),
            Err(PlayCommandError::InvalidIndex { .. })
        ));
        assert!(matches!(
            PlayCommand::parse("a1"),
            Err(PlayCommandError::Keys(_))
        ));
    }

    #[tokio::test]
    async fn bad_key_leaves_selection_untouched() {
        let (service, mut run) = multi_select_run().await;

        let command = PlayCommand::parse("a, e").unwrap();
        assert!(apply(&service, &mut run, command).await.is_err());
        assert!(run.pending().is_empty());

        let command = PlayCommand::parse("a, c").unwrap();
        assert!(apply(&service, &mut run, command).await.unwrap());
        assert_eq!(run.pending(), &keys(&['A', 'C']));

        assert!(apply(&service, &mut run, PlayCommand::Submit).await.unwrap());
        assert_eq!(run.session().score().to_string(), "1/1");
    }
}
