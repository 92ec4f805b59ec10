use std::sync::Once;

use analysis_core::{update, AppState, Article, Effect, Msg, Phase, SessionError};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(analysis_logging::initialize_for_tests);
}

fn submit_prompt(state: AppState, input: &str) -> (AppState, Vec<Effect>) {
    let (state, _) = update(state, Msg::PromptChanged(input.to_string()));
    update(state, Msg::PromptSubmitted)
}

fn article(title: &str, url: &str) -> Article {
    Article {
        title: title.to_string(),
        url: url.to_string(),
        doi: None,
    }
}

#[test]
fn empty_prompt_is_rejected_without_effects() {
    init_logging();
    let (mut state, effects) = submit_prompt(AppState::new(), "   \n");

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.input_error.as_deref(), Some("Input cannot be empty."));
    assert!(state.consume_dirty());
}

#[test]
fn prompt_is_trimmed_and_starts_search() {
    init_logging();
    let (state, effects) = submit_prompt(AppState::new(), "  banana wilt disease \n");

    assert_eq!(
        effects,
        vec![Effect::SearchArticles {
            prompt: "banana wilt disease".to_string()
        }]
    );
    assert_eq!(state.view().phase, Phase::Searching);
    assert_eq!(state.view().input_error, None);
}

#[test]
fn second_submit_while_searching_is_ignored() {
    init_logging();
    let (state, _) = submit_prompt(AppState::new(), "first");
    let (state, effects) = submit_prompt(state, "second");

    assert!(effects.is_empty());
    assert_eq!(state.view().phase, Phase::Searching);
}

#[test]
fn loaded_articles_start_unselected() {
    init_logging();
    let (state, _) = submit_prompt(AppState::new(), "climate economics");
    let (state, effects) = update(
        state,
        Msg::ArticlesLoaded(vec![
            article("A", "https://doi.org/10.1/a"),
            article("B", "https://doi.org/10.1/b"),
        ]),
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Selecting);
    assert_eq!(view.articles.len(), 2);
    assert_eq!(view.selected_count, 0);
    assert_eq!(view.articles[1].title, "B");
    assert_eq!(view.articles[1].index, 1);
}

#[test]
fn articles_arriving_outside_a_search_are_dropped() {
    init_logging();
    let (state, _) = update(
        AppState::new(),
        Msg::ArticlesLoaded(vec![article("A", "https://a.example.com")]),
    );

    assert_eq!(state.view().phase, Phase::Idle);
    assert!(state.view().articles.is_empty());
}

#[test]
fn search_failure_is_surfaced() {
    init_logging();
    let (state, _) = submit_prompt(AppState::new(), "anything");
    let (state, _) = update(state, Msg::ArticlesFailed("http status 500".to_string()));

    let view = state.view();
    assert_eq!(
        view.phase,
        Phase::Failed(SessionError::Search("http status 500".to_string()))
    );
    assert!(view
        .error
        .unwrap()
        .starts_with("Error fetching articles. Please try again."));
}

#[test]
fn toggling_selects_and_deselects_rows() {
    init_logging();
    let (state, _) = submit_prompt(AppState::new(), "topic");
    let (state, _) = update(
        state,
        Msg::ArticlesLoaded(vec![
            article("A", "https://a.example.com"),
            article("B", "https://b.example.com"),
        ]),
    );

    let (state, _) = update(state, Msg::ArticleToggled(1));
    assert_eq!(state.view().selected_count, 1);
    assert!(state.view().articles[1].selected);

    let (state, _) = update(state, Msg::ArticleToggled(1));
    assert_eq!(state.view().selected_count, 0);

    // Out of range is ignored.
    let (mut state, _) = update(state, Msg::ArticleToggled(9));
    assert!(state.consume_dirty());
    let (mut state, _) = update(state, Msg::ArticleToggled(9));
    assert!(!state.consume_dirty());
}

#[test]
fn toggle_all_selects_everything_then_nothing() {
    init_logging();
    let (state, _) = submit_prompt(AppState::new(), "topic");
    let (state, _) = update(
        state,
        Msg::ArticlesLoaded(vec![
            article("A", "https://a.example.com"),
            article("B", "https://b.example.com"),
        ]),
    );
    let (state, _) = update(state, Msg::ArticleToggled(0));

    let (state, _) = update(state, Msg::AllArticlesToggled);
    assert_eq!(state.view().selected_count, 2);

    let (state, _) = update(state, Msg::AllArticlesToggled);
    assert_eq!(state.view().selected_count, 0);
}

#[test]
fn added_links_are_selected_and_deduplicated() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::LinksAdded(vec![
            "https://example.com/".to_string(),
            "  ".to_string(),
            "HTTPS://EXAMPLE.COM".to_string(),
            "https://doi.org/10.29321/maj.10.a04230".to_string(),
        ]),
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.phase, Phase::Selecting);
    assert_eq!(view.articles.len(), 2);
    assert_eq!(view.selected_count, 2);
    assert_eq!(view.articles[0].title, "https://example.com/");
}

#[test]
fn analysis_without_selection_reports_error() {
    init_logging();
    let (state, _) = submit_prompt(AppState::new(), "topic");
    let (state, _) = update(
        state,
        Msg::ArticlesLoaded(vec![article("A", "https://a.example.com")]),
    );
    let (state, effects) = update(state, Msg::AnalysisRequested);

    assert!(effects.is_empty());
    assert_eq!(
        state.view().input_error.as_deref(),
        Some("Select at least one article.")
    );
    assert_eq!(state.view().phase, Phase::Selecting);
}

#[test]
fn normalization_treats_spelling_variants_as_equal() {
    use analysis_core::normalize_url_for_dedupe;

    assert_eq!(
        normalize_url_for_dedupe("https://example.com/"),
        normalize_url_for_dedupe("  HTTPS://EXAMPLE.COM  ")
    );
    assert_eq!(
        normalize_url_for_dedupe("https://example.com/paper#abstract"),
        "https://example.com/paper"
    );
    assert_ne!(
        normalize_url_for_dedupe("https://example.com/a"),
        normalize_url_for_dedupe("https://example.com/b")
    );
}
