use std::path::PathBuf;
use std::time::Duration;

use analysis_engine::{ClientSettings, PollSettings};
use clap::{Parser, Subcommand};

use super::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(
    name = "meta-analysis",
    author,
    version,
    about = "Search research articles and generate a meta-analysis document",
    long_about = None
)]
pub struct Cli {
    /// Base url of the analysis service.
    #[arg(long, global = true, default_value = "http://localhost:8000")]
    pub server: String,

    /// Directory for the generated document and the history file.
    #[arg(short, long, global = true, default_value = "output")]
    pub output_dir: PathBuf,

    /// Seconds between status checks.
    #[arg(long, global = true, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: u64,

    /// Give up on a job after this many seconds.
    #[arg(long, global = true, default_value_t = 600, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Where log output goes.
    #[arg(long, global = true, value_enum, default_value_t = LogDestination::File)]
    pub log: LogDestination,

    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List candidate articles for a research question.
    Search {
        #[arg(short, long)]
        prompt: String,
    },
    /// Search, pick articles, analyze them and save the document.
    Run {
        #[arg(short, long)]
        prompt: String,
        /// 1-based article numbers, comma separated.
        #[arg(long, value_delimiter = ',', conflicts_with = "all")]
        pick: Vec<usize>,
        /// Analyze every article found.
        #[arg(long)]
        all: bool,
    },
    /// Analyze the given article links directly.
    Analyze {
        #[arg(required = true)]
        links: Vec<String>,
    },
    /// Print previously saved analyses.
    History,
}

impl Cli {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.server.clone(),
            ..ClientSettings::default()
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            ceiling: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_service_conventions() {
        let cli = Cli::try_parse_from(["meta-analysis", "history"]).unwrap();
        assert_eq!(cli.server, "http://localhost:8000");
        assert_eq!(cli.output_dir, PathBuf::from("output"));
        assert_eq!(cli.poll_settings().interval, Duration::from_secs(3));
        assert_eq!(cli.poll_settings().ceiling, Duration::from_secs(600));
        assert_eq!(cli.log, LogDestination::File);
        assert_eq!(cli.command, Command::History);
    }

    #[test]
    fn pick_accepts_comma_separated_numbers() {
        let cli = Cli::try_parse_from([
            "meta-analysis",
            "run",
            "--prompt",
            "sleep and memory",
            "--pick",
            "1,3",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Run {
                prompt: "sleep and memory".to_string(),
                pick: vec![1, 3],
                all: false,
            }
        );
    }

    #[test]
    fn pick_and_all_conflict() {
        let result = Cli::try_parse_from([
            "meta-analysis",
            "run",
            "--prompt",
            "q",
            "--pick",
            "1",
            "--all",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn analyze_requires_links() {
        assert!(Cli::try_parse_from(["meta-analysis", "analyze"]).is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let result = Cli::try_parse_from(["meta-analysis", "--poll-interval-secs", "0", "history"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "meta-analysis",
            "analyze",
            "https://example.org/a",
            "--server",
            "http://10.0.0.2:9000",
        ])
        .unwrap();
        assert_eq!(cli.client_settings().base_url, "http://10.0.0.2:9000");
    }
}
