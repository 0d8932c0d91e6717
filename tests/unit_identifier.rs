use keystone_di::Identifier;
use proptest::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

fn hash_of(id: &Identifier) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn test_names_equal_by_string() {
    let a = Identifier::name("database");
    let b = Identifier::name("database");
    let c = Identifier::name("cache");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(hash_of(&a), hash_of(&b));
}

#[test]
fn test_symbols_are_unique_per_allocation() {
    let a = Identifier::symbol("worker");
    let b = Identifier::symbol("worker");

    assert_ne!(a, b); // same label, distinct identities
    assert_eq!(a, a.clone());
    assert_eq!(a.label(), "worker");
    assert!(a.is_symbol());
}

#[test]
fn test_symbols_never_collide_with_names() {
    let name = Identifier::name("worker");
    let symbol = Identifier::symbol("worker");
    assert_ne!(name, symbol);
    assert!(!name.is_symbol());
}

#[test]
fn test_display_formats() {
    let name = Identifier::name("database");
    assert_eq!(name.to_string(), "database");

    let symbol = Identifier::symbol("database");
    let rendered = symbol.to_string();
    assert!(rendered.starts_with("database#"));
}

#[test]
fn test_conversions() {
    let from_str: Identifier = "svc".into();
    let from_string: Identifier = String::from("svc").into();
    assert_eq!(from_str, from_string);

    let by_ref: Identifier = (&from_str).into();
    assert_eq!(by_ref, from_str);
}

#[test]
fn test_identifiers_as_map_keys() {
    let mut map = HashMap::new();
    map.insert(Identifier::name("a"), 1);
    map.insert(Identifier::symbol("a"), 2);

    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&Identifier::name("a")), Some(&1));
}

proptest! {
    #[test]
    fn prop_equal_names_equal_identifiers(name in "[a-zA-Z0-9_.-]{1,24}") {
        let a = Identifier::name(&name);
        let b = Identifier::name(&name);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(hash_of(&a), hash_of(&b));
        prop_assert_eq!(a.to_string(), name);
    }

    #[test]
    fn prop_symbols_always_distinct(label in "[a-z]{1,12}") {
        let a = Identifier::symbol(&label);
        let b = Identifier::symbol(&label);
        prop_assert_ne!(a, b);
    }
}
