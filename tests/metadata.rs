use keystone_di::{
    declare_configurable, declare_injection, declare_lifetime, lock_lifetime, metadata, schemas,
    Container, Definition, DiError, DiResult, Injectable, Lifetime, Module, RegistrationSpec,
    ValidatedConfig,
};
use serial_test::serial;
use std::sync::Arc;

#[derive(Default)]
struct Widget {
    host: String,
    port: u64,
}

impl Injectable for Widget {
    fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()> {
        self.host = config.try_get("host").unwrap_or_default();
        self.port = config.try_get("port").unwrap_or_default();
        Ok(())
    }
}

#[test]
#[serial]
fn test_child_inherits_parent_configurables() {
    let parent = Definition::builder("widget-base", Widget::default)
        .configurable("host", schemas::string().default_value("localhost"))
        .build()
        .unwrap();

    let child = Definition::builder("widget", Widget::default)
        .extends(&parent)
        .configurable("port", schemas::unsigned().default_value(80u64))
        .build()
        .unwrap();

    let resolved = metadata::resolve(&child);
    let properties: Vec<&str> = resolved
        .configurables
        .iter()
        .map(|c| c.property.as_str())
        .collect();

    // ancestors first, then subclass declarations
    assert_eq!(properties, vec!["host", "port"]);

    // the parent's own set never grows from child declarations
    let parent_resolved = metadata::resolve(&parent);
    assert_eq!(parent_resolved.configurables.len(), 1);
}

#[test]
#[serial]
fn test_redeclared_property_keeps_ancestor_position() {
    let parent = Definition::builder("widget-base", Widget::default)
        .configurable("host", schemas::string())
        .configurable("port", schemas::unsigned())
        .build()
        .unwrap();

    // the child makes host optional with a default but must not move it
    let child = Definition::builder("widget", Widget::default)
        .extends(&parent)
        .configurable("host", schemas::string().default_value("0.0.0.0"))
        .build()
        .unwrap();

    let resolved = metadata::resolve(&child);
    let properties: Vec<&str> = resolved
        .configurables
        .iter()
        .map(|c| c.property.as_str())
        .collect();
    assert_eq!(properties, vec!["host", "port"]);
    assert!(!resolved.configurables[0].schema.required());
}

#[test]
#[serial]
fn test_injections_inherit_and_merge() {
    #[derive(Default)]
    struct Base;
    impl Injectable for Base {}

    let parent = Definition::builder("base", Base::default)
        .inject("logger")
        .build()
        .unwrap();

    let child = Definition::builder("derived", Base::default)
        .extends(&parent)
        .inject_from("store", "database")
        .build()
        .unwrap();

    let resolved = metadata::resolve(&child);
    assert_eq!(resolved.injections.len(), 2);
    assert_eq!(resolved.injections[0].property, "logger");
    assert_eq!(resolved.injections[0].lookup.to_string(), "logger");
    assert_eq!(resolved.injections[1].property, "store");
    assert_eq!(resolved.injections[1].lookup.to_string(), "database");
}

#[tokio::test]
#[serial]
async fn test_lifetime_inherited_from_ancestor() {
    let parent = Definition::builder("widget-base", Widget::default)
        .lifetime(Lifetime::Singleton)
        .build()
        .unwrap();

    let child = Definition::builder("widget", Widget::default)
        .extends(&parent)
        .build()
        .unwrap();

    assert_eq!(metadata::resolve(&child).lifetime.kind, Lifetime::Singleton);

    let container = Container::new();
    container.load([("w", &child)]).unwrap();
    let a = container.get::<Widget>("w").await.unwrap();
    let b = container.get::<Widget>("w").await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
#[serial]
fn test_locked_ancestor_rejects_conflicting_kind() {
    let parent = Definition::builder("widget-base", Widget::default)
        .lifetime_locked(Lifetime::Singleton)
        .build()
        .unwrap();

    let result = Definition::builder("widget", Widget::default)
        .extends(&parent)
        .lifetime(Lifetime::Transient)
        .build();

    match result {
        Err(DiError::LifetimeLocked { definition }) => assert_eq!(definition, "widget"),
        other => panic!("expected LifetimeLocked, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_locked_ancestor_allows_same_kind() {
    let parent = Definition::builder("widget-base", Widget::default)
        .lifetime_locked(Lifetime::Scoped)
        .build()
        .unwrap();

    let child = Definition::builder("widget", Widget::default)
        .extends(&parent)
        .lifetime(Lifetime::Scoped)
        .build();
    assert!(child.is_ok());
}

#[test]
#[serial]
fn test_lock_lifetime_freezes_effective_kind() {
    let def = Definition::builder("widget", Widget::default)
        .lifetime(Lifetime::Singleton)
        .build()
        .unwrap();
    lock_lifetime(&def).unwrap();

    // same kind is still fine
    assert!(declare_lifetime(&def, Lifetime::Singleton, false).is_ok());
    // a different kind is not
    assert!(matches!(
        declare_lifetime(&def, Lifetime::Transient, false),
        Err(DiError::LifetimeLocked { .. })
    ));
}

#[test]
#[serial]
fn test_module_base_lifetime_is_locked() {
    #[derive(Default)]
    struct FakeModule;
    impl Injectable for FakeModule {}

    let result = Definition::builder("rogue-module", FakeModule::default)
        .extends(Module::base())
        .lifetime(Lifetime::Transient)
        .build();

    assert!(matches!(result, Err(DiError::LifetimeLocked { .. })));

    // a derived module that keeps the singleton kind is fine
    let ok = Definition::builder("proper-module", FakeModule::default)
        .extends(Module::base())
        .lifetime(Lifetime::Singleton)
        .build();
    assert!(ok.is_ok());
}

#[test]
#[serial]
fn test_free_function_declarations() {
    #[derive(Default)]
    struct Plain;
    impl Injectable for Plain {}

    let def = Definition::builder("plain", Plain::default).build().unwrap();

    declare_configurable(&def, "level", schemas::integer().default_value(3));
    declare_injection(&def, "peer", None, false);
    declare_lifetime(&def, Lifetime::Scoped, false).unwrap();

    let resolved = metadata::resolve(&def);
    assert_eq!(resolved.configurables.len(), 1);
    assert_eq!(resolved.injections.len(), 1);
    assert!(!resolved.injections[0].required);
    assert_eq!(resolved.lifetime.kind, Lifetime::Scoped);
    assert!(!resolved.lifetime.locked);
}

#[tokio::test]
#[serial]
async fn test_lifetime_fixed_at_load_time() {
    let def = Definition::builder("widget", Widget::default)
        .lifetime(Lifetime::Singleton)
        .build()
        .unwrap();

    let container = Container::new();
    container.load([("w", RegistrationSpec::of(&def))]).unwrap();

    // declarations after load do not change the computed lifetime of the
    // registration already held by the container
    declare_lifetime(&def, Lifetime::Transient, false).unwrap();

    let a = container.get::<Widget>("w").await.unwrap();
    let b = container.get::<Widget>("w").await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
