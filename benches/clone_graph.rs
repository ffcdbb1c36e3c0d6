//! Benchmarks for cloning template graphs of increasing width.
//!
//! Each iteration seeds a fresh `MemoryStore` with a template task holding
//! `n` checklist steps, then clones it into a subject and commits.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use serde_json::json;
use template_clone::catalog::TypeCatalog;
use template_clone::config::CloneConfig;
use template_clone::session::CloneSession;
use template_clone::store::MemoryStore;
use template_clone::value::{Entity, EntityId, EntityKey, Value};

const CATALOG: &str = r#"
types:
  - name: Task
    fields:
      - { name: Name, kind: primitive }
      - { name: Rank, kind: primitive }
      - { name: Template, kind: relation, target: Task }
      - { name: Is Template, kind: primitive }
      - { name: Checklist, kind: collection, target: Step, inverse: Task }
  - name: Step
    fields:
      - { name: Name, kind: primitive }
      - { name: Rank, kind: primitive }
      - { name: Task, kind: relation, target: Task, inverse: Checklist }
"#;

fn seeded_store(catalog: &TypeCatalog, steps: usize) -> Arc<MemoryStore> {
    let store = MemoryStore::new().with_catalog(catalog);
    let step_ids: Vec<EntityId> = (0..steps)
        .map(|i| EntityId::new(format!("step-{}", i)))
        .collect();

    for (i, id) in step_ids.iter().enumerate() {
        store
            .insert(
                Entity::new("Step", id.as_str())
                    .with_field("Name", Value::text(format!("Step {} template", i)))
                    .with_field("Rank", Value::Scalar(json!(i)))
                    .with_field("Task", Value::Ref(Some(EntityId::new("template")))),
            )
            .unwrap();
    }
    store
        .insert(
            Entity::new("Task", "template")
                .with_field("Name", Value::text("Release TEMPLATE"))
                .with_field("Is Template", Value::Scalar(json!(true)))
                .with_field("Checklist", Value::Refs(step_ids)),
        )
        .unwrap();
    store
        .insert(
            Entity::new("Task", "subject")
                .with_field("Template", Value::Ref(Some(EntityId::new("template")))),
        )
        .unwrap();

    Arc::new(store)
}

fn bench_clone_wide_checklist(c: &mut Criterion) {
    let config = CloneConfig::default();
    let catalog = Arc::new(TypeCatalog::from_yaml(CATALOG, &config).unwrap());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let subject = EntityKey::new("Task", "subject");

    let mut group = c.benchmark_group("clone_checklist");
    for steps in [10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, &steps| {
            b.iter_batched(
                || {
                    let store = seeded_store(&catalog, steps);
                    CloneSession::new(Arc::clone(&catalog), store, config.clone()).unwrap()
                },
                |session| {
                    let outcome = runtime
                        .block_on(session.clone_subject(black_box(&subject), None))
                        .unwrap();
                    black_box(outcome.report)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_catalog_classification(c: &mut Criterion) {
    let config = CloneConfig::default();

    c.bench_function("catalog_from_yaml", |b| {
        b.iter(|| TypeCatalog::from_yaml(black_box(CATALOG), &config).unwrap())
    });
}

criterion_group!(
    benches,
    bench_clone_wide_checklist,
    bench_catalog_classification
);
criterion_main!(benches);
