use keystone_di::{
    Container, Definition, DiError, DiResult, Identifier, Injectable, InitContext, Lifetime,
};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Node;
impl Injectable for Node {}

fn node(name: &str, injects: &[&str]) -> Arc<Definition> {
    let mut builder = Definition::builder(name, Node::default).lifetime(Lifetime::Singleton);
    for target in injects {
        builder = builder.inject(*target);
    }
    builder.build().unwrap()
}

fn path_labels(error: DiError) -> Vec<String> {
    match error {
        DiError::Circular(path) => path.iter().map(Identifier::to_string).collect(),
        other => panic!("expected Circular, got {:?}", other),
    }
}

#[tokio::test]
async fn test_direct_cycle_detected() {
    let container = Container::new();
    container
        .load([("a", &node("a", &["b"])), ("b", &node("b", &["a"]))])
        .unwrap();

    let error = container.get::<Node>("a").await.unwrap_err();
    let path = path_labels(error);
    assert_eq!(path, vec!["a", "b", "a"]);
}

#[tokio::test]
async fn test_transitive_cycle_detected() {
    let container = Container::new();
    container
        .load([
            ("a", &node("a", &["b"])),
            ("b", &node("b", &["c"])),
            ("c", &node("c", &["a"])),
        ])
        .unwrap();

    let error = container.get::<Node>("a").await.unwrap_err();
    let path = path_labels(error);
    assert_eq!(path, vec!["a", "b", "c", "a"]);
}

#[tokio::test]
async fn test_self_cycle_detected() {
    let container = Container::new();
    container.load([("a", &node("a", &["a"]))]).unwrap();

    let error = container.get::<Node>("a").await.unwrap_err();
    assert_eq!(path_labels(error), vec!["a", "a"]);
}

#[tokio::test]
async fn test_diamond_is_not_a_cycle() {
    // d -> b -> a, d -> c -> a: a is visited twice but never while it is
    // itself under construction
    let container = Container::new();
    container
        .load([
            ("a", &node("a", &[])),
            ("b", &node("b", &["a"])),
            ("c", &node("c", &["a"])),
            ("d", &node("d", &["b", "c"])),
        ])
        .unwrap();

    let d = container.get::<Node>("d").await;
    assert!(d.is_ok());
}

#[tokio::test]
async fn test_cycle_across_container_boundary() {
    // the cycle spans a child and its parent: the path follows the
    // logical resolution, not the container that owns each registration
    let parent = Container::new();
    parent.load([("a", &node("a", &["b"]))]).unwrap();

    let child = parent.create_child();
    child.load([("b", &node("b", &["a"]))]).unwrap();

    let error = child.get::<Node>("b").await.unwrap_err();
    assert_eq!(path_labels(error), vec!["b", "a", "b"]);
}

#[tokio::test]
async fn test_reentrant_cycle_through_init() {
    #[derive(Debug)]
    struct Reentrant;

    #[async_trait::async_trait]
    impl Injectable for Reentrant {
        async fn init(&mut self, ctx: &mut InitContext) -> DiResult<()> {
            // resolving our own id from init would await our own
            // in-flight construction; it must fail instead of hanging
            ctx.get::<Reentrant>("selfish").await?;
            Ok(())
        }
    }

    let def = Definition::builder("reentrant", || Reentrant)
        .lifetime(Lifetime::Singleton)
        .build()
        .unwrap();

    let container = Container::new();
    container.load([("selfish", &def)]).unwrap();

    let error = container.get::<Reentrant>("selfish").await.unwrap_err();
    assert_eq!(path_labels(error), vec!["selfish", "selfish"]);
}

#[tokio::test]
async fn test_failed_cycle_leaves_no_cached_instance() {
    let container = Container::new();
    container
        .load([("a", &node("a", &["b"])), ("b", &node("b", &["a"]))])
        .unwrap();

    assert!(container.get::<Node>("a").await.is_err());
    assert!(container.status_of("a").is_none());
    assert!(container.status_of("b").is_none());
}
