use keystone_di::{
    Container, Definition, DiError, DiResult, Injectable, InitContext, InjectionSet,
    LifecycleStatus, Lifetime, RegistrationSpec, ValidatedConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Tracked {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl Injectable for Tracked {
    fn configure(&mut self, config: &ValidatedConfig) -> DiResult<()> {
        self.name = config.try_get("name").unwrap_or_default();
        Ok(())
    }

    async fn destroy(&self) -> DiResult<()> {
        self.log.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}

fn tracked(name: &str, lifetime: Lifetime, log: &Arc<Mutex<Vec<String>>>) -> Arc<Definition> {
    let log = log.clone();
    Definition::builder(name, move || Tracked {
        name: String::new(),
        log: log.clone(),
    })
    .lifetime(lifetime)
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_destroy_runs_in_reverse_construction_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let def = tracked("tracked", Lifetime::Singleton, &log);

    let container = Container::new();
    container
        .load([
            ("first", RegistrationSpec::of(&def).with("name", "first")),
            ("second", RegistrationSpec::of(&def).with("name", "second")),
            ("third", RegistrationSpec::of(&def).with("name", "third")),
        ])
        .unwrap();

    container.get::<Tracked>("first").await.unwrap();
    container.get::<Tracked>("second").await.unwrap();
    container.get::<Tracked>("third").await.unwrap();

    container.destroy().await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["third".to_string(), "second".to_string(), "first".to_string()]
    );
}

#[tokio::test]
async fn test_dependent_destroyed_before_dependency() {
    let log = Arc::new(Mutex::new(Vec::new()));

    struct Dependent {
        log: Arc<Mutex<Vec<String>>>,
        dep: Option<Arc<Tracked>>,
    }

    #[async_trait::async_trait]
    impl Injectable for Dependent {
        fn inject(&mut self, deps: &InjectionSet) -> DiResult<()> {
            self.dep = Some(deps.get("a")?);
            Ok(())
        }

        async fn destroy(&self) -> DiResult<()> {
            self.log.lock().unwrap().push("b".to_string());
            Ok(())
        }
    }

    let def_a = tracked("dep-a", Lifetime::Singleton, &log);
    let shared = log.clone();
    let def_b = Definition::builder("dep-b", move || Dependent {
        log: shared.clone(),
        dep: None,
    })
    .inject("a")
    .lifetime(Lifetime::Singleton)
    .build()
    .unwrap();

    let container = Container::new();
    container
        .load([
            ("a", RegistrationSpec::of(&def_a).with("name", "a")),
            ("b", RegistrationSpec::of(&def_b)),
        ])
        .unwrap();

    // resolving b constructs a first, so teardown goes b then a
    container.get::<Dependent>("b").await.unwrap();
    container.destroy().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["b".to_string(), "a".to_string()]);
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let destroys = Arc::new(AtomicUsize::new(0));

    struct CountedDown {
        destroys: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Injectable for CountedDown {
        async fn destroy(&self) -> DiResult<()> {
            self.destroys.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let shared = destroys.clone();
    let def = Definition::builder("counted-down", move || CountedDown {
        destroys: shared.clone(),
    })
    .lifetime(Lifetime::Singleton)
    .build()
    .unwrap();

    let container = Container::new();
    container.load([("svc", &def)]).unwrap();
    container.get::<CountedDown>("svc").await.unwrap();

    container.destroy().await.unwrap();
    container.destroy().await.unwrap();

    assert_eq!(destroys.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_init_failure_triggers_cleanup_of_partial_state() {
    let cleaned = Arc::new(AtomicUsize::new(0));

    struct Partial {
        cleaned: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Injectable for Partial {
        async fn init(&mut self, _ctx: &mut InitContext) -> DiResult<()> {
            Err(DiError::Lifecycle("init exploded".to_string()))
        }

        async fn destroy(&self) -> DiResult<()> {
            self.cleaned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let shared = cleaned.clone();
    let def = Definition::builder("partial", move || Partial { cleaned: shared.clone() })
        .lifetime(Lifetime::Singleton)
        .build()
        .unwrap();

    let container = Container::new();
    container.load([("partial", &def)]).unwrap();

    // the original init error propagates; the best-effort destroy of the
    // partial instance does not replace it
    match container.get::<Partial>("partial").await {
        Err(DiError::Lifecycle(message)) => assert_eq!(message, "init exploded"),
        other => panic!("expected the init error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    assert!(container.status_of("partial").is_none());
}

#[tokio::test]
async fn test_cleanup_error_does_not_mask_original() {
    struct DoublyBroken;

    #[async_trait::async_trait]
    impl Injectable for DoublyBroken {
        async fn init(&mut self, _ctx: &mut InitContext) -> DiResult<()> {
            Err(DiError::Lifecycle("original".to_string()))
        }

        async fn destroy(&self) -> DiResult<()> {
            Err(DiError::Lifecycle("secondary".to_string()))
        }
    }

    let def = Definition::builder("doubly-broken", || DoublyBroken)
        .lifetime(Lifetime::Singleton)
        .build()
        .unwrap();

    let container = Container::new();
    container.load([("broken", &def)]).unwrap();

    match container.get::<DoublyBroken>("broken").await {
        Err(DiError::Lifecycle(message)) => assert_eq!(message, "original"),
        other => panic!("expected the original error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_bootstrap_failure_tears_instance_down() {
    let destroyed = Arc::new(AtomicUsize::new(0));

    struct BadBootstrap {
        destroyed: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Injectable for BadBootstrap {
        async fn bootstrap(&self, _ctx: &mut InitContext) -> DiResult<()> {
            Err(DiError::Lifecycle("bootstrap exploded".to_string()))
        }

        async fn destroy(&self) -> DiResult<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let shared = destroyed.clone();
    let def = Definition::builder("bad-bootstrap", move || BadBootstrap {
        destroyed: shared.clone(),
    })
    .lifetime(Lifetime::Singleton)
    .build()
    .unwrap();

    let container = Container::new();
    container.load([("bad", &def)]).unwrap();

    assert!(container.get::<BadBootstrap>("bad").await.is_err());
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert!(container.status_of("bad").is_none());
}

#[tokio::test]
async fn test_destroy_entry_and_reload() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let def = tracked("tracked", Lifetime::Singleton, &log);

    let container = Container::new();
    container
        .load([("svc", RegistrationSpec::of(&def).with("name", "svc"))])
        .unwrap();

    let first = container.get::<Tracked>("svc").await.unwrap();
    assert_eq!(container.status_of("svc"), Some(LifecycleStatus::Ready));

    container.destroy_entry("svc").await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["svc".to_string()]);
    assert!(container.status_of("svc").is_none());

    // the registration survives; the next get rebuilds under the same id
    let second = container.get::<Tracked>("svc").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    let reloaded = container.reload("svc").await.unwrap();
    let third = container.get::<Tracked>("svc").await.unwrap();
    assert!(Arc::ptr_eq(&reloaded.downcast::<Tracked>().unwrap(), &third));
    assert!(!Arc::ptr_eq(&second, &third));
}

#[tokio::test]
async fn test_destroy_entry_unknown_id_fails() {
    let container = Container::new();
    assert!(matches!(
        container.destroy_entry("ghost").await,
        Err(DiError::Unresolved(_))
    ));
}

#[tokio::test]
async fn test_explicit_transient_destroy() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let def = tracked("tracked", Lifetime::Transient, &log);

    let container = Container::new();
    container
        .load([("job", RegistrationSpec::of(&def).with("name", "job"))])
        .unwrap();

    let job = container.get::<Tracked>("job").await.unwrap();
    container.destroy_transient(&job).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["job".to_string()]);

    // a destroyed transient does not affect subsequently created ones
    let next = container.get::<Tracked>("job").await.unwrap();
    assert!(!Arc::ptr_eq(&job, &next));
    assert_eq!(next.name, "job");
    drop(next);

    // destroying the first again through container teardown is a no-op
    container.tracker().prune();
    container.destroy().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["job".to_string()]);
}

#[tokio::test]
async fn test_live_transients_destroyed_at_container_teardown() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let def = tracked("tracked", Lifetime::Transient, &log);

    let container = Container::new();
    container
        .load([("job", RegistrationSpec::of(&def).with("name", "job"))])
        .unwrap();

    let held = container.get::<Tracked>("job").await.unwrap();
    container.destroy().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["job".to_string()]);
    drop(held);
}

#[tokio::test]
async fn test_reclaim_callback_fires_on_prune() {
    #[derive(Default)]
    struct Ephemeral;
    impl Injectable for Ephemeral {}

    let def = Definition::builder("ephemeral", Ephemeral::default)
        .build()
        .unwrap();

    let container = Container::new();
    container.load([("tmp", &def)]).unwrap();

    let reclaimed = Arc::new(AtomicUsize::new(0));
    let counter = reclaimed.clone();
    container.tracker().on_reclaimed(&def, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let a = container.get::<Ephemeral>("tmp").await.unwrap();
    let b = container.get::<Ephemeral>("tmp").await.unwrap();
    drop(a);
    drop(b);

    container.tracker().prune();
    assert_eq!(reclaimed.load(Ordering::SeqCst), 2);
}
