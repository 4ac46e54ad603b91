use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use modelkit::{
    attrs, AddOptions, Attributes, Collection, CollectionOptions, Comparator, Event, Events,
    Model, SetOptions, Value,
};

fn bench_trigger_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let hub: Events<Event> = Events::new();
    let hits = Rc::new(Cell::new(0u64));
    for _ in 0..16 {
        let h = Rc::clone(&hits);
        hub.on("tick", move |_, _| h.set(h.get() + 1), None);
    }
    let h = Rc::clone(&hits);
    hub.on("all", move |_, _| h.set(h.get() + 1), None);
    let payload = Event::Custom(vec![Value::Int(1)]);

    group.bench_function("trigger_17_listeners", |b| {
        b.iter(|| hub.trigger(black_box("tick"), &payload));
    });
    group.finish();
}

fn bench_change_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("change_cycle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_two_keys", |b| {
        let model = Model::new(attrs! { "a" => 0, "b" => "x" }).unwrap();
        model.on("change", |_, _| {}, None);
        let mut n = 0i64;
        b.iter(|| {
            n += 1;
            model.set(attrs! { "a" => n, "b" => n % 2 == 0 }, &SetOptions::new())
        });
    });

    group.bench_function("set_unchanged_nested", |b| {
        let nested = Value::Map(attrs! { "xs" => vec![Value::from(1); 32] });
        let model = Model::new(attrs! { "doc" => nested.clone() }).unwrap();
        b.iter(|| model.set_key("doc", black_box(nested.clone()), &SetOptions::new()));
    });
    group.finish();
}

fn bench_collection_relay(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection");

    group.bench_function("add_sorted_256", |b| {
        b.iter(|| {
            let list = Collection::new(
                CollectionOptions::new().comparator(Comparator::by_attribute("n")),
            );
            let batch: Vec<Attributes> = (0..256i64).rev().map(|n| attrs! { "n" => n }).collect();
            list.add_attributes(batch, &AddOptions::new()).unwrap();
            list
        });
    });

    group.bench_function("member_change_relay", |b| {
        let list = Collection::new(CollectionOptions::new());
        let models: Vec<Model> = (0..64i64)
            .map(|n| Model::new(attrs! { "id" => n }).unwrap())
            .collect();
        list.add(models.clone(), &AddOptions::new().silent(true)).unwrap();
        list.on("change", |_, _| {}, None);
        let mut n = 0i64;
        b.iter(|| {
            n += 1;
            let target = &models[usize::try_from(n).unwrap_or_default() % models.len()];
            target.set_key("v", n, &SetOptions::new())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_trigger_fanout,
    bench_change_cycle,
    bench_collection_relay
);
criterion_main!(benches);
