mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::init_tracing;
use modelkit::{
    route_to_regex, Event, History, HistoryConfig, ModelError, NavigateOptions, Router,
};

fn route_log(router: &Router, name: &str) -> Rc<RefCell<Vec<Vec<String>>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    router.on(
        &format!("route:{name}"),
        move |_, ev| {
            if let Event::Route { params, .. } = ev {
                sink.borrow_mut().push(params.clone());
            }
        },
        None,
    );
    log
}

#[test]
fn router_dispatches_named_routes() {
    init_tracing();
    let history = History::new();
    let router = Router::with_routes(
        &history,
        [
            ("", "home"),
            ("search/:query/p:page", "search"),
            ("files/*path", "files"),
        ],
    )
    .unwrap();
    let home = route_log(&router, "home");
    let search = route_log(&router, "search");
    let files = route_log(&router, "files");

    assert!(history.start(&HistoryConfig::default(), "/").unwrap());
    router.navigate("search/rust/p2", NavigateOptions::new().trigger(true));
    router.navigate("#files/docs/readme.md", NavigateOptions::new().trigger(true));

    assert_eq!(home.borrow().len(), 1);
    assert_eq!(*search.borrow(), vec![vec!["rust".to_string(), "2".to_string()]]);
    assert_eq!(*files.borrow(), vec![vec!["docs/readme.md".to_string()]]);
    assert_eq!(history.fragment(), "files/docs/readme.md");
}

#[test]
fn history_announces_routes() {
    let history = History::new();
    let router = Router::new(&history);
    router.route("about", "about").unwrap();

    let names = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&names);
    history.on(
        "route",
        move |_, ev| {
            if let Event::Route { name, .. } = ev {
                sink.borrow_mut().push(name.clone());
            }
        },
        None,
    );
    history.start(&HistoryConfig::default(), "about").unwrap();
    assert_eq!(*names.borrow(), vec!["about"]);
}

#[test]
fn navigate_without_trigger_only_records() {
    let history = History::new();
    let router = Router::new(&history);
    router.route("a/:x", "a").unwrap();
    let hits = route_log(&router, "a");
    history
        .start(&HistoryConfig { root: "/app/".into(), silent: true }, "/app/")
        .unwrap();

    assert!(router.navigate("a/1", NavigateOptions::new()));
    assert!(hits.borrow().is_empty());
    assert!(history.load_url(None));
    assert_eq!(*hits.borrow(), vec![vec!["1".to_string()]]);
    assert_eq!(history.entries(), vec!["", "a/1"]);
}

#[test]
fn start_twice_is_rejected() {
    let history = History::new();
    history.start(&HistoryConfig::default(), "").unwrap();
    assert_eq!(
        history.start(&HistoryConfig::default(), "").unwrap_err(),
        ModelError::HistoryStarted
    );
}

#[test]
fn raw_regex_routes() {
    let history = History::new();
    let hit = Rc::new(RefCell::new(String::new()));
    let sink = Rc::clone(&hit);
    history.route(route_to_regex("raw/:id").unwrap(), move |fragment| {
        sink.borrow_mut().push_str(fragment);
    });
    assert!(history.load_url(Some("raw/9")));
    assert!(!history.load_url(Some("raw")));
    assert_eq!(*hit.borrow(), "raw/9");
}
