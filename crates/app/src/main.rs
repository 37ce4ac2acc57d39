use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use quiz_core::model::{
    Difficulty, OptionDraft, OptionKey, Participant, QuestionDraft, QuestionId, SetNumber,
    UserId, parse_key_list,
};
use services::{
    CatalogService, Clock, ProgressService, QuestionAdminService, QuizLoopService, add_option,
    blank_draft, edit_draft,
};
use storage::http::BackendConfig;
use storage::repository::{InMemoryRepository, Storage};
use storage::wire::parse_questions_json;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod play;

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    MissingSet,
    InvalidSet { raw: String },
    InvalidPage { raw: String },
    InvalidTimeout { raw: String },
    InvalidOption { raw: String },
    InvalidCorrect { raw: String },
    InvalidDifficulty { raw: String },
    MissingQuestionId,
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingSet => f.write_str("this command requires --set <n>"),
            ArgsError::InvalidSet { raw } => write!(f, "invalid --set value: {raw}"),
            ArgsError::InvalidPage { raw } => write!(f, "invalid --page value: {raw}"),
            ArgsError::InvalidTimeout { raw } => write!(f, "invalid --timeout value: {raw}"),
            ArgsError::InvalidOption { raw } => write!(f, "invalid --option value: {raw}"),
            ArgsError::InvalidCorrect { raw } => write!(f, "invalid --correct value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value: {raw} (easy, medium or hard)")
            }
            ArgsError::MissingQuestionId => f.write_str("a question id is required"),
            ArgsError::MissingUser => {
                f.write_str("no user configured; pass --user <id> or set QUIZ_USER_ID")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app sets");
    eprintln!("  app play --set <n> [--questions <file.json>]");
    eprintln!("  app progress");
    eprintln!("  app admin list [--page <n>]");
    eprintln!("  app admin show <id>");
    eprintln!("  app admin add --set <n> --text <text> --option A=<text> ... --correct A[,C]");
    eprintln!("  app admin edit <id> [--text ..] [--option K=<text>] [--correct ..] [--set <n>]");
    eprintln!("  app admin delete <id>");
    eprintln!();
    eprintln!("Question fields (admin add / edit):");
    eprintln!("  --text <text>         question text");
    eprintln!("  --option [K=]<text>   set option K; without K, fill the next free row");
    eprintln!("  --correct <keys>      correct option keys, e.g. A,C");
    eprintln!("  --category <name>     category (default AWS Data Engineering)");
    eprintln!("  --difficulty <level>  easy, medium or hard");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --api <url>        backend base URL (default http://localhost:5000)");
    eprintln!("  --timeout <secs>   request timeout, 0 disables (default 10)");
    eprintln!("  --user <id>        user recorded on attempts");
    eprintln!("  --name <name>      display name recorded on attempts");
    eprintln!("  --questions <file> play from a local JSON file instead of the backend");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_API_URL, QUIZ_API_TIMEOUT_SECS, QUIZ_USER_ID, QUIZ_USER_NAME, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Sets,
    Play { set: SetNumber },
    Progress,
    AdminList { page: u32 },
    AdminShow(QuestionId),
    AdminAdd { set: SetNumber, edits: QuestionEdits },
    AdminEdit { id: QuestionId, edits: QuestionEdits },
    AdminDelete(QuestionId),
}

/// Question fields given on the command line, applied over a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct QuestionEdits {
    text: Option<String>,
    /// Rows in command-line order; `None` keys fill the next free row.
    options: Vec<(Option<OptionKey>, String)>,
    correct: Option<BTreeSet<OptionKey>>,
    category: Option<String>,
    difficulty: Option<Difficulty>,
    set: Option<SetNumber>,
}

impl QuestionEdits {
    fn apply(&self, draft: &mut QuestionDraft) {
        if let Some(text) = &self.text {
            draft.text.clone_from(text);
        }
        for (key, text) in &self.options {
            let row = match key {
                Some(key) => draft.options.iter().position(|o| o.key == *key),
                None => draft.options.iter().position(|o| o.text.trim().is_empty()),
            };
            match (row, key) {
                (Some(row), _) => draft.options[row].text.clone_from(text),
                (None, Some(key)) => {
                    draft.options.push(OptionDraft::new(*key, text.clone(), false));
                }
                (None, None) => {
                    let added = add_option(draft);
                    if let (Some(_), Some(last)) = (added, draft.options.last_mut()) {
                        last.text.clone_from(text);
                    }
                }
            }
        }
        if let Some(correct) = &self.correct {
            for option in &mut draft.options {
                option.correct = correct.contains(&option.key);
            }
        }
        if let Some(category) = &self.category {
            draft.category = Some(category.clone());
        }
        if let Some(difficulty) = self.difficulty {
            draft.difficulty = difficulty;
        }
        if let Some(set) = self.set {
            draft.set_number = set;
        }
    }
}

/// `A=Athena` sets row A; plain text fills the next free row.
fn parse_option(raw: String) -> Result<(Option<OptionKey>, String), ArgsError> {
    let keyed = raw.split_once('=').and_then(|(key, text)| {
        let key = key.trim().to_ascii_uppercase().parse::<OptionKey>().ok()?;
        Some((Some(key), text.trim().to_string()))
    });
    let (key, text) = keyed.unwrap_or_else(|| (None, raw.trim().to_string()));
    if text.is_empty() {
        return Err(ArgsError::InvalidOption { raw });
    }
    Ok((key, text))
}

#[derive(Debug)]
struct Args {
    command: Command,
    backend: BackendConfig,
    user: Option<UserId>,
    name: Option<String>,
    questions_file: Option<PathBuf>,
}

impl Args {
    fn from_env() -> Self {
        let non_blank = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            command: Command::Help,
            backend: BackendConfig::from_env(),
            user: non_blank("QUIZ_USER_ID").map(UserId::new),
            name: non_blank("QUIZ_USER_NAME"),
            questions_file: None,
        }
    }

    /// Parse the command line on top of `defaults`. Flags may appear anywhere.
    fn parse(
        defaults: Self,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut parsed = defaults;
        let mut positional = Vec::new();
        let mut set = None;
        let mut page = 1;
        let mut edits = QuestionEdits::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => parsed.backend.base_url = require_value(&mut args, "--api")?,
                "--timeout" => {
                    let value = require_value(&mut args, "--timeout")?;
                    let secs: u64 = value
                        .trim()
                        .parse()
                        .map_err(|_| ArgsError::InvalidTimeout { raw: value.clone() })?;
                    parsed.backend = parsed.backend.with_timeout_secs(secs);
                }
                "--user" => {
                    parsed.user = Some(UserId::new(require_value(&mut args, "--user")?));
                }
                "--name" => parsed.name = Some(require_value(&mut args, "--name")?),
                "--questions" => {
                    parsed.questions_file =
                        Some(PathBuf::from(require_value(&mut args, "--questions")?));
                }
                "--set" => {
                    let value = require_value(&mut args, "--set")?;
                    let number: SetNumber = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSet { raw: value.clone() })?;
                    set = Some(number);
                }
                "--page" => {
                    let value = require_value(&mut args, "--page")?;
                    page = value
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p > 0)
                        .ok_or(ArgsError::InvalidPage { raw: value })?;
                }
                "--text" => edits.text = Some(require_value(&mut args, "--text")?),
                "--option" => {
                    let value = require_value(&mut args, "--option")?;
                    edits.options.push(parse_option(value)?);
                }
                "--correct" => {
                    let value = require_value(&mut args, "--correct")?;
                    let keys = parse_key_list(&value)
                        .ok()
                        .filter(|keys| !keys.is_empty())
                        .ok_or(ArgsError::InvalidCorrect { raw: value })?;
                    edits.correct = Some(keys);
                }
                "--category" => edits.category = Some(require_value(&mut args, "--category")?),
                "--difficulty" => {
                    let value = require_value(&mut args, "--difficulty")?;
                    let difficulty = value
                        .parse::<Difficulty>()
                        .map_err(|_| ArgsError::InvalidDifficulty { raw: value.clone() })?;
                    edits.difficulty = Some(difficulty);
                }
                "--help" | "-h" => {
                    parsed.command = Command::Help;
                    return Ok(parsed);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        parsed.command = match positional.next().as_deref() {
            None | Some("help") => Command::Help,
            Some("sets") => Command::Sets,
            Some("play") => Command::Play {
                set: set.ok_or(ArgsError::MissingSet)?,
            },
            Some("progress") => Command::Progress,
            Some("admin") => match positional.next().as_deref() {
                Some("list") => Command::AdminList { page },
                Some("show") => Command::AdminShow(parse_question_id(positional.next())?),
                Some("add") => Command::AdminAdd {
                    set: set.ok_or(ArgsError::MissingSet)?,
                    edits,
                },
                Some("edit") => Command::AdminEdit {
                    id: parse_question_id(positional.next())?,
                    edits: QuestionEdits { set, ..edits },
                },
                Some("delete") => Command::AdminDelete(parse_question_id(positional.next())?),
                Some(other) => return Err(ArgsError::UnknownCommand(format!("admin {other}"))),
                None => return Err(ArgsError::UnknownCommand("admin".into())),
            },
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_string())),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(parsed)
    }

    fn participant(&self) -> Option<Participant> {
        let user = self.user.clone()?;
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| user.as_str().to_string());
        Some(Participant::new(user, name))
    }
}

fn parse_question_id(raw: Option<String>) -> Result<QuestionId, ArgsError> {
    raw.and_then(|value| value.parse().ok())
        .ok_or(ArgsError::MissingQuestionId)
}

async fn open_storage(args: &Args) -> Result<Storage, Box<dyn std::error::Error>> {
    match &args.questions_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await?;
            let entries = parse_questions_json(&raw)?;
            info!(file = %path.display(), questions = entries.len(), "loaded offline questions");
            let repo = InMemoryRepository::new().with_clock(Clock::system());
            repo.insert_entries(entries)?;
            Ok(Storage::in_memory(repo))
        }
        None => {
            info!(api = %args.backend.base_url, "using quiz backend");
            Ok(Storage::http(args.backend.clone())?)
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(Args::from_env(), std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if args.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let storage = open_storage(&args).await?;

    match &args.command {
        Command::Help => {}
        Command::Sets => {
            let catalog = CatalogService::new(Arc::clone(&storage.questions));
            let sets = catalog.list_sets().await?;
            if sets.is_empty() {
                println!("No question sets available.");
            }
            for set in sets {
                println!("Set {}: {} questions", set.set_number, set.question_count);
            }
        }
        Command::Play { set } => {
            let mut service = QuizLoopService::from_storage(&storage);
            if let Some(participant) = args.participant() {
                service = service.with_participant(participant);
            }
            let run = service.start_session(*set).await?;
            play::play(&service, run).await?;
        }
        Command::Progress => {
            let user = args.user.clone().ok_or(ArgsError::MissingUser)?;
            let progress = ProgressService::new(Arc::clone(&storage.attempts))
                .user_progress(&user)
                .await?;
            println!("Total attempts: {}", progress.total_attempts);
            println!("Best score: {}%", progress.best_score_percent);
            for entry in &progress.latest_by_set {
                println!(
                    "  Set {}: last score {}/{} ({}%)",
                    entry.set_number, entry.score, entry.total, entry.percent
                );
            }
        }
        Command::AdminList { page } => {
            let admin = QuestionAdminService::new(Arc::clone(&storage.questions));
            let listing = admin.list_page(*page).await?;
            println!(
                "Page {} of {} ({} questions)",
                listing.current_page, listing.total_pages, listing.total_questions
            );
            for entry in &listing.questions {
                println!(
                    "  [{}] set {} | {} | {}",
                    entry.question.id(),
                    entry.set_number,
                    entry.difficulty,
                    services::session::preview(entry.question.text())
                );
            }
        }
        Command::AdminShow(id) => {
            let admin = QuestionAdminService::new(Arc::clone(&storage.questions));
            let Some(entry) = admin.get_question(id).await? else {
                println!("Question {id} not found.");
                return Ok(());
            };
            let question = &entry.question;
            println!("{}", question.text());
            for option in question.options() {
                let mark = if question.correct_answers().contains(&option.key) {
                    '*'
                } else {
                    ' '
                };
                println!(" {mark} {}. {}", option.key, option.text);
            }
            println!(
                "Set {} | {} | {}",
                entry.set_number, entry.category, entry.difficulty
            );
        }
        Command::AdminAdd { set, edits } => {
            let admin = QuestionAdminService::new(Arc::clone(&storage.questions));
            let mut draft = blank_draft(*set);
            edits.apply(&mut draft);
            let id = admin.create_question(draft).await?;
            println!("Question {id} created in set {set}.");
        }
        Command::AdminEdit { id, edits } => {
            let admin = QuestionAdminService::new(Arc::clone(&storage.questions));
            let Some(entry) = admin.get_question(id).await? else {
                println!("Question {id} not found.");
                return Ok(());
            };
            let mut draft = edit_draft(&entry);
            edits.apply(&mut draft);
            admin.update_question(id, draft).await?;
            println!("Question {id} updated.");
        }
        Command::AdminDelete(id) => {
            let admin = QuestionAdminService::new(Arc::clone(&storage.questions));
            admin.delete_question(id).await?;
            println!("Question {id} deleted.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
