use analysis_core::{AppViewModel, ArticleRowView, HistoryEntry, Phase};

const BAR_WIDTH: usize = 30;

/// Prints view changes to stdout, skipping repeats of what is already shown.
#[derive(Default)]
pub struct TerminalRenderer {
    last_phase: Option<Phase>,
    last_progress: Option<(u8, String)>,
    last_input_error: Option<String>,
}

impl TerminalRenderer {
    pub fn render(&mut self, view: &AppViewModel) {
        if view.input_error != self.last_input_error {
            if let Some(message) = &view.input_error {
                println!("! {message}");
            }
            self.last_input_error = view.input_error.clone();
        }

        if self.last_phase.as_ref() != Some(&view.phase) {
            self.render_phase(view);
            self.last_phase = Some(view.phase.clone());
        }

        if view.phase == Phase::Polling {
            if let Some(session) = &view.session {
                let progress = (session.progress, session.status_message.clone());
                if self.last_progress.as_ref() != Some(&progress) {
                    println!("{}", progress_line(session.progress, &session.status_message));
                    self.last_progress = Some(progress);
                }
            }
        }
    }

    fn render_phase(&mut self, view: &AppViewModel) {
        match &view.phase {
            Phase::Idle => {}
            Phase::Searching => println!("Searching articles for \"{}\"...", view.prompt.trim()),
            Phase::Selecting => print_articles(&view.articles),
            Phase::Starting => {
                self.last_progress = None;
                println!("Starting analysis of {} article(s)...", view.selected_count);
            }
            Phase::Polling => {
                if let Some(task_id) = view.session.as_ref().and_then(|s| s.task_id.as_deref()) {
                    println!("Task {task_id} accepted, waiting for the document.");
                }
            }
            Phase::Saving => println!("Saving document..."),
            Phase::Saved => {
                if let Some(path) = &view.saved_path {
                    println!("Analysis complete! PDF saved to {path}");
                }
            }
            Phase::Failed(_) => {
                if let Some(error) = &view.error {
                    eprintln!("Error: {error}");
                }
            }
            Phase::Cancelled => println!("Analysis cancelled."),
        }
    }
}

pub fn print_articles(articles: &[ArticleRowView]) {
    if articles.is_empty() {
        println!("No articles found.");
        return;
    }
    println!("\n{}", "=".repeat(64));
    println!("Found {} article(s):", articles.len());
    println!("{}", "=".repeat(64));
    for row in articles {
        let mark = if row.selected { "x" } else { " " };
        println!("[{mark}] {:>2}. {}", row.index + 1, row.title);
        println!("        {}", row.url);
    }
    println!();
}

pub fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No saved analyses yet.");
        return;
    }
    for entry in entries {
        println!("{}  {}", entry.saved_at, entry.prompt);
        println!(
            "    {} article(s) -> {}",
            entry.article_count, entry.saved_path
        );
    }
}

fn progress_line(progress: u8, message: &str) -> String {
    let filled = usize::from(progress.min(100)) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        progress,
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(
            progress_line(40, "Reading"),
            format!("[{}{}]  40% Reading", "#".repeat(12), ".".repeat(18))
        );
        assert_eq!(
            progress_line(100, ""),
            format!("[{}] 100% ", "#".repeat(BAR_WIDTH))
        );
    }
}
