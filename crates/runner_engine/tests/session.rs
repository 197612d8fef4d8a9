use std::sync::Once;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use runner_core::{ControllerConfig, Msg, Phase, RunnerView};
use runner_engine::{FileStore, KeyValueStore, Presenter, Session, SessionOutcome, StoreMap};
use serde_json::json;
use tempfile::TempDir;

const START: &str = "https://host.example/?gtm_debug=tok";
const CSV: &str = "url,tag status\na.com,not tagged\nb.com,Not Tagged\n";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(runner_logging::initialize_for_tests);
}

#[derive(Default)]
struct RecordingPresenter {
    views: Vec<RunnerView>,
    torn_down: bool,
}

impl Presenter for RecordingPresenter {
    fn render(&mut self, view: &RunnerView) {
        self.views.push(view.clone());
    }

    fn teardown(&mut self) {
        self.torn_down = true;
    }
}

fn open(address: &str, durable: &FileStore, now: Instant) -> Option<Session<RecordingPresenter>> {
    Session::open(
        address,
        durable.clone(),
        ControllerConfig::default(),
        RecordingPresenter::default(),
        now,
    )
}

fn started(durable: &FileStore, now: Instant) -> Session<RecordingPresenter> {
    let mut session = open(START, durable, now).expect("session");
    session.dispatch(
        Msg::Uploaded {
            name: "export.csv".to_string(),
            text: CSV.to_string(),
        },
        now,
    );
    assert_eq!(session.dispatch(Msg::StartClicked, now), SessionOutcome::Continue);
    session
}

#[test]
fn address_without_parameter_does_not_open() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let durable = FileStore::open(temp.path());
    assert!(open("https://host.example/", &durable, Instant::now()).is_none());
    assert!(open("https://host.example/?gtm_debug=", &durable, Instant::now()).is_none());
}

#[test]
fn disabled_feature_does_not_open() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let mut durable = FileStore::open(temp.path());
    let mut entries = StoreMap::new();
    entries.insert("nav_runner_enabled".to_string(), json!(false));
    durable.set(entries);
    assert!(open(START, &durable, Instant::now()).is_none());
}

#[test]
fn first_render_shows_upload() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let durable = FileStore::open(temp.path());
    let session = open(START, &durable, Instant::now()).expect("session");
    let last = session.presenter().views.last().expect("rendered");
    assert_eq!(last.phase, Phase::Upload);
    assert_eq!(
        durable.get(&["nav_runner_debug_token"]).get("nav_runner_debug_token"),
        Some(&json!("tok"))
    );
}

#[test]
fn run_survives_page_loads_until_done() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let durable = FileStore::open(temp.path());
    let t0 = Instant::now();
    let mut session = started(&durable, t0);

    assert_eq!(session.next_deadline(), Some(t0 + Duration::from_secs(1)));
    assert_eq!(
        durable.get(&["nav_runner_index"]).get("nav_runner_index"),
        Some(&json!(1))
    );

    let outcome = session.poll(t0 + Duration::from_millis(3_200));
    assert_eq!(outcome, SessionOutcome::Continue);
    let countdown = session
        .presenter()
        .views
        .last()
        .and_then(|view| view.progress.as_ref())
        .and_then(|progress| progress.countdown);
    assert_eq!(countdown, Some(2));

    let outcome = session.poll(t0 + Duration::from_secs(5));
    assert_eq!(
        outcome,
        SessionOutcome::Navigate("https://a.com/?gtm_debug=tok".to_string())
    );
    drop(session);

    let t1 = t0 + Duration::from_secs(6);
    let mut session = open("https://a.com/?gtm_debug=tok", &durable, t1).expect("resumed");
    assert_eq!(session.state().phase(), Phase::Running);
    assert_eq!(session.state().index(), 2);
    let outcome = session.poll(t1 + Duration::from_secs(5));
    assert_eq!(
        outcome,
        SessionOutcome::Navigate("https://b.com/?gtm_debug=tok".to_string())
    );
    drop(session);

    let t2 = t1 + Duration::from_secs(6);
    let session = open("https://b.com/?gtm_debug=tok", &durable, t2).expect("finished");
    assert_eq!(session.state().phase(), Phase::Done);
    assert_eq!(session.next_deadline(), None);
    let view = session.presenter().views.last().expect("rendered");
    assert_eq!(view.progress.as_ref().map(|p| p.percent), Some(100));
    assert!(session.state().timing().average_step_ms.is_some());
}

#[test]
fn pause_disarms_the_navigation() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let durable = FileStore::open(temp.path());
    let t0 = Instant::now();
    let mut session = started(&durable, t0);

    session.dispatch(Msg::PauseClicked, t0 + Duration::from_secs(2));
    assert_eq!(session.next_deadline(), None);
    assert_eq!(
        session.poll(t0 + Duration::from_secs(30)),
        SessionOutcome::Continue
    );
    assert_eq!(
        durable.get(&["nav_runner_phase"]).get("nav_runner_phase"),
        Some(&json!("paused"))
    );
}

#[test]
fn external_disable_tears_down_a_running_session() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let durable = FileStore::open(temp.path());
    let t0 = Instant::now();
    let mut session = started(&durable, t0);

    let mut settings = durable.clone();
    let mut entries = StoreMap::new();
    entries.insert("nav_runner_enabled".to_string(), json!(false));
    settings.set(entries);

    assert_eq!(
        session.poll(t0 + Duration::from_millis(10)),
        SessionOutcome::Closed
    );
    assert!(session.is_closed());
    assert!(session.presenter().torn_down);
    assert_eq!(session.next_deadline(), None);
    assert!(durable
        .get(&["nav_runner_index", "nav_runner_urls", "nav_runner_phase"])
        .is_empty());
    assert_eq!(
        durable.get(&["nav_runner_enabled"]).get("nav_runner_enabled"),
        Some(&json!(false))
    );
}

#[test]
fn cancel_clears_the_durable_run() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let durable = FileStore::open(temp.path());
    let t0 = Instant::now();
    let mut session = started(&durable, t0);

    assert_eq!(
        session.dispatch(Msg::CancelClicked, t0),
        SessionOutcome::Closed
    );
    assert!(durable.get(&["nav_runner_urls", "nav_runner_index"]).is_empty());
    assert!(session.store().page().is_empty());
    assert_eq!(
        session.dispatch(Msg::StartClicked, t0),
        SessionOutcome::Closed
    );
}

#[test]
fn without_durable_tier_the_run_lives_only_in_the_page() {
    init_logging();
    let durable = FileStore::unavailable();
    let t0 = Instant::now();
    let mut session = started(&durable, t0);
    assert_eq!(session.state().index(), 1);
    let outcome = session.poll(t0 + Duration::from_secs(5));
    assert!(matches!(outcome, SessionOutcome::Navigate(_)));
    drop(session);

    let session = open("https://a.com/?gtm_debug=tok", &durable, t0).expect("session");
    assert_eq!(session.state().phase(), Phase::Upload);
    assert!(session.state().urls().is_empty());
}
