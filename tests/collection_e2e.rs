mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{count, init_tracing, record_collection};
use modelkit::{
    attrs, AddOptions, Collection, CollectionOptions, Comparator, Event, Model, ModelError,
    ModelId, ModelRef, NotifyOptions, SetOptions, Value,
};

fn numbered(ns: &[i64]) -> Vec<Model> {
    ns.iter()
        .map(|n| Model::new(attrs! { "id" => *n, "n" => *n }).unwrap())
        .collect()
}

fn order(collection: &Collection) -> Vec<i64> {
    collection
        .pluck("n")
        .into_iter()
        .filter_map(|v| v.and_then(|v| v.as_int()))
        .collect()
}

#[test]
fn duplicate_id_in_one_batch_is_rejected() {
    init_tracing();
    let books = Collection::new(CollectionOptions::new());
    books.add(numbered(&[1]), &AddOptions::new()).unwrap();

    let a = Model::new(attrs! { "id" => 7 }).unwrap();
    let b = Model::new(attrs! { "id" => 7 }).unwrap();
    let err = books.add([a, b], &AddOptions::new()).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateIdentity { id: Some(ModelId::Int(7)), .. }));
    assert_eq!(books.len(), 1);
}

#[test]
fn identity_change_reindexes() {
    let books = Collection::new(CollectionOptions::new());
    let m = Model::new(attrs! { "id" => 1 }).unwrap();
    books.add([m.clone()], &AddOptions::new()).unwrap();

    m.set_key("id", 2, &SetOptions::new());
    assert!(books.get(&ModelId::Int(2)).unwrap().ptr_eq(&m));
    assert!(books.get(&ModelId::Int(1)).is_none());
    assert!(books.get_by_cid(m.cid()).is_some());
}

#[test]
fn colliding_id_fires_error_and_is_handed_back() {
    let books = Collection::new(CollectionOptions::new());
    let a = Model::new(attrs! { "id" => 1 }).unwrap();
    let b = Model::new(attrs! { "id" => 2 }).unwrap();
    books.add([a.clone(), b.clone()], &AddOptions::new()).unwrap();
    let log = record_collection(&books);

    b.set_key("id", 1, &SetOptions::new());
    b.set_key("id", 3, &SetOptions::new());

    assert!(books.get(&ModelId::Int(1)).unwrap().ptr_eq(&a));
    assert!(books.get(&ModelId::Int(3)).unwrap().ptr_eq(&b));
    assert_eq!(a.id(), Some(ModelId::Int(1)));
    assert_eq!(books.len(), 2);
    assert_eq!(count(&log, "error"), 1);
}

#[test]
fn comparator_sort_orders_members() {
    let books = Collection::with_models(numbered(&[3, 1, 2]), CollectionOptions::new()).unwrap();
    assert_eq!(order(&books), vec![3, 1, 2]);

    let sorted = Collection::new(
        CollectionOptions::new().comparator(Comparator::by_attribute("n")),
    );
    sorted.add(numbered(&[3, 1, 2]), &AddOptions::new().silent(true)).unwrap();
    let log = record_collection(&sorted);
    sorted.sort(&NotifyOptions::new()).unwrap();
    assert_eq!(order(&sorted), vec![1, 2, 3]);
    assert_eq!(*log.borrow(), vec!["reset"]);
}

#[test]
fn full_comparator_descending() {
    let c = Collection::new(CollectionOptions::new().comparator(Comparator::full(|a, b| {
        b.get("n")
            .unwrap_or_default()
            .sort_cmp(&a.get("n").unwrap_or_default())
    })));
    c.add(numbered(&[1, 3, 2]), &AddOptions::new()).unwrap();
    assert_eq!(order(&c), vec![3, 2, 1]);
}

#[test]
fn add_events_carry_resulting_index() {
    let c = Collection::new(CollectionOptions::new().comparator(Comparator::by_attribute("n")));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    c.on(
        "add",
        move |_, ev| {
            if let Event::Add { model, index, .. } = ev {
                let n = model.get("n").and_then(|v| v.as_int()).unwrap_or_default();
                sink.borrow_mut().push((n, *index));
            }
        },
        None,
    );
    c.add(numbered(&[5, 1]), &AddOptions::new()).unwrap();
    assert_eq!(*seen.borrow(), vec![(5, 1), (1, 0)]);
}

#[test]
fn member_events_relay_and_stop_after_remove() {
    let c = Collection::new(CollectionOptions::new());
    let m = Model::new(attrs! { "id" => 1 }).unwrap();
    c.add([m.clone()], &AddOptions::new()).unwrap();
    let log = record_collection(&c);

    m.set_key("title", "x", &SetOptions::new());
    m.trigger("custom", &Event::Custom(vec![Value::from(1)]));
    assert_eq!(*log.borrow(), vec!["change:title", "change", "custom"]);

    c.remove([ModelRef::Cid(m.cid())], &NotifyOptions::new());
    m.set_key("title", "y", &SetOptions::new());
    assert_eq!(count(&log, "remove"), 1);
    assert_eq!(count(&log, "change"), 1);
}

#[test]
fn reset_fires_once_without_add_events() {
    let c = Collection::new(CollectionOptions::new());
    c.add(numbered(&[1, 2]), &AddOptions::new()).unwrap();
    let log = record_collection(&c);
    c.reset(numbered(&[3, 4, 5]), &NotifyOptions::new()).unwrap();
    assert_eq!(*log.borrow(), vec!["reset"]);
    assert_eq!(c.len(), 3);
    assert!(c.get(&ModelId::Int(1)).is_none());
}

#[test]
fn model_in_two_collections_keeps_first_owner() {
    let first = Collection::new(CollectionOptions::new().url("/first"));
    let second = Collection::new(CollectionOptions::new().url("/second"));
    let m = Model::new(attrs! { "id" => 1 }).unwrap();
    first.add([m.clone()], &AddOptions::new()).unwrap();
    second.add([m.clone()], &AddOptions::new()).unwrap();
    assert_eq!(m.url().unwrap(), "/first/1");

    let first_log = record_collection(&first);
    let second_log = record_collection(&second);
    second.remove([&m], &NotifyOptions::new());
    assert!(first_log.borrow().is_empty());
    assert_eq!(*second_log.borrow(), vec!["remove"]);
    assert_eq!(m.url().unwrap(), "/first/1");
}
