use std::collections::BTreeSet;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use analysis_core::{update, AppState, Msg, Phase};
use analysis_engine::EngineHandle;
use analysis_logging::{analysis_debug, analysis_info, level_for};
use anyhow::{bail, Context};
use clap::Parser;

use super::cli::{Cli, Command};
use super::effects::EffectRunner;
use super::render::{self, TerminalRenderer};
use super::{logging, persistence};

const TICK: Duration = Duration::from_millis(75);

pub fn run_app() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::initialize(cli.log, level_for(cli.verbose));
    analysis_info!("meta-analysis {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command.clone() {
        Command::History => {
            render::print_history(&persistence::load_history(&cli.output_dir));
            Ok(ExitCode::SUCCESS)
        }
        Command::Search { prompt } => {
            let mut session = Session::open(&cli)?;
            session.search(prompt)?;
            let found = *session.state.phase() == Phase::Selecting
                && !session.state.view().articles.is_empty();
            Ok(exit_code(found))
        }
        Command::Run { prompt, pick, all } => {
            let mut session = Session::open(&cli)?;
            session.search(prompt)?;
            let article_count = session.state.view().articles.len();
            if *session.state.phase() != Phase::Selecting || article_count == 0 {
                return Ok(ExitCode::FAILURE);
            }

            let selection = if all {
                Selection::All
            } else if !pick.is_empty() {
                Selection::Numbers(validate_numbers(pick, article_count)?)
            } else {
                prompt_for_selection(article_count)?
            };
            session.select(selection);
            session.analyze()
        }
        Command::Analyze { links } => {
            let mut session = Session::open(&cli)?;
            session.dispatch(Msg::LinksAdded(links));
            session.analyze()
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Drives the core state machine for one command invocation.
struct Session {
    state: AppState,
    runner: EffectRunner,
    renderer: TerminalRenderer,
    msg_rx: mpsc::Receiver<Msg>,
    msg_tx: mpsc::Sender<Msg>,
}

impl Session {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let engine = EngineHandle::new(cli.client_settings(), cli.poll_settings())
            .with_context(|| format!("cannot use server {:?}", cli.server))?;
        let (msg_tx, msg_rx) = mpsc::channel();
        let runner = EffectRunner::new(engine, cli.output_dir.clone(), msg_tx.clone());

        let mut session = Self {
            state: AppState::new(),
            runner,
            renderer: TerminalRenderer::default(),
            msg_rx,
            msg_tx,
        };
        session.restore_history(cli.output_dir.clone());
        Ok(session)
    }

    fn restore_history(&mut self, output_dir: PathBuf) {
        let entries = persistence::load_history(&output_dir);
        self.dispatch(Msg::RestoreHistory(entries));
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            self.renderer.render(&state.view());
        }
        self.state = state;
        self.runner.enqueue(effects);
    }

    fn pump_until(&mut self, done: impl Fn(&Phase) -> bool) -> anyhow::Result<()> {
        loop {
            self.runner
                .drain_engine_events()
                .context("analysis engine stopped before the session finished")?;
            while let Ok(msg) = self.msg_rx.try_recv() {
                self.dispatch(msg);
            }
            if done(self.state.phase()) {
                return Ok(());
            }
            thread::sleep(TICK);
            self.dispatch(Msg::Tick);
        }
    }

    fn search(&mut self, prompt: String) -> anyhow::Result<()> {
        self.dispatch(Msg::PromptChanged(prompt));
        self.dispatch(Msg::PromptSubmitted);
        self.pump_until(|phase| *phase != Phase::Searching)
    }

    fn select(&mut self, selection: Selection) {
        match selection {
            Selection::All => self.dispatch(Msg::AllArticlesToggled),
            Selection::Numbers(numbers) => {
                for number in numbers {
                    self.dispatch(Msg::ArticleToggled(number - 1));
                }
            }
        }
    }

    fn analyze(&mut self) -> anyhow::Result<ExitCode> {
        self.dispatch(Msg::AnalysisRequested);
        if !self.state.phase().is_polling() {
            return Ok(ExitCode::FAILURE);
        }

        if io::stdin().is_terminal() {
            println!("Type 'c' and Enter to cancel.");
            spawn_cancel_listener(self.msg_tx.clone());
        }
        self.pump_until(Phase::is_terminal)?;
        Ok(exit_code(*self.state.phase() == Phase::Saved))
    }
}

fn spawn_cancel_listener(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { return };
            if matches!(line.trim(), "c" | "cancel") {
                analysis_debug!("Cancel requested from stdin");
                if msg_tx.send(Msg::CancelClicked).is_err() {
                    return;
                }
            }
        }
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    All,
    /// 1-based, unique, in range.
    Numbers(Vec<usize>),
}

fn validate_numbers(numbers: Vec<usize>, count: usize) -> anyhow::Result<Vec<usize>> {
    let unique: BTreeSet<usize> = numbers.into_iter().collect();
    if let Some(bad) = unique.iter().find(|n| **n == 0 || **n > count) {
        bail!("article number {bad} is out of range 1..={count}");
    }
    Ok(unique.into_iter().collect())
}

fn parse_selection(input: &str, count: usize) -> anyhow::Result<Selection> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return Ok(Selection::All);
    }
    let numbers = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .with_context(|| format!("{part:?} is not an article number"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if numbers.is_empty() {
        bail!("Select at least one article.");
    }
    Ok(Selection::Numbers(validate_numbers(numbers, count)?))
}

fn prompt_for_selection(count: usize) -> anyhow::Result<Selection> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("Select articles (e.g. 1,3 or 'all'): ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            bail!("no selection given");
        }
        match parse_selection(&line, count) {
            Ok(selection) => return Ok(selection),
            Err(err) => println!("! {err:#}"),
        }
    }
}
