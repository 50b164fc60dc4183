//! Integration tests for kiln

mod support {
    use kiln::env::{Environment, Loader};
    use kiln::{KilnError, KilnResult};
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, PoisonError};
    use uuid::Uuid;

    /// In-memory host loader: records every load and answers the safety
    /// predicate from a configurable set of hazardous unit names.
    #[derive(Default)]
    pub struct FakeLoader {
        loads: Mutex<Vec<(Uuid, PathBuf)>>,
        hazards: Mutex<HashSet<String>>,
    }

    impl FakeLoader {
        pub fn mark_hazard(&self, unit: &str) {
            lock(&self.hazards).insert(unit.to_string());
        }

        pub fn total_loads(&self) -> usize {
            lock(&self.loads).len()
        }

        pub fn environments_seen(&self) -> usize {
            let loads = lock(&self.loads);
            let ids: HashSet<Uuid> = loads.iter().map(|(id, _)| *id).collect();
            ids.len()
        }

        pub fn load_count_of(&self, entry: &str) -> usize {
            lock(&self.loads)
                .iter()
                .filter(|(_, p)| p == Path::new(entry))
                .count()
        }
    }

    impl Loader for FakeLoader {
        fn load_entry(&self, env: &Environment, entry: &Path) -> KilnResult<()> {
            lock(&self.loads).push((env.id(), entry.to_path_buf()));
            Ok(())
        }

        fn defines_protocol_or_record(&self, _env: &Environment, unit: &str) -> KilnResult<bool> {
            Ok(lock(&self.hazards).contains(unit))
        }
    }

    /// A loader whose predicate always fails, for the conservative path.
    pub struct BrokenPredicateLoader;

    impl Loader for BrokenPredicateLoader {
        fn load_entry(&self, _env: &Environment, _entry: &Path) -> KilnResult<()> {
            Ok(())
        }

        fn defines_protocol_or_record(&self, _env: &Environment, unit: &str) -> KilnResult<bool> {
            Err(KilnError::loader(format!("cannot introspect {unit}")))
        }
    }

    /// Route `RUST_LOG`-filtered tracing output into test runs
    pub fn init_tracing() {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    pub fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    pub fn units(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

mod shared_cache_tests {
    use crate::support::{paths, units, FakeLoader};
    use kiln::cache::EnvironmentCache;
    use kiln::classpath::DependencySet;
    use kiln::env::Loader;
    use kiln::strategy::SharedCacheStrategy;
    use std::path::Path;
    use std::sync::Arc;

    fn strategy() -> (Arc<FakeLoader>, Arc<EnvironmentCache>, SharedCacheStrategy) {
        let loader = Arc::new(FakeLoader::default());
        let cache = Arc::new(EnvironmentCache::new());
        let strategy =
            SharedCacheStrategy::new(Arc::clone(&loader) as Arc<dyn Loader>, Arc::clone(&cache));
        (loader, cache, strategy)
    }

    /// Call 1 builds fresh and caches; call 2 extends the cached parent;
    /// call 3 conflicts on a version and builds fully fresh.
    #[test]
    fn three_call_reuse_scenario() {
        crate::support::init_tracing();
        let (loader, cache, strategy) = strategy();

        strategy
            .run(&paths(&["repo/g/a/1/a-1.jar", "out.classes"]), &[], |env| {
                assert!(env.visible(Path::new("repo/g/a/1/a-1.jar")));
                Ok(())
            })
            .unwrap();
        assert_eq!(cache.len(), 1);

        strategy
            .run(
                &paths(&["repo/g/a/1/a-1.jar", "repo/g/b/2/b-2.jar", "out2.classes"]),
                &[],
                |env| {
                    assert!(env.visible(Path::new("repo/g/a/1/a-1.jar")));
                    assert!(env.visible(Path::new("repo/g/b/2/b-2.jar")));
                    assert!(!env.visible(Path::new("out.classes")));
                    Ok(())
                },
            )
            .unwrap();

        // The parent was reused: a-1.jar went through the loader once.
        assert_eq!(loader.load_count_of("repo/g/a/1/a-1.jar"), 1);
        // Re-cached under the grown archive set.
        let grown = DependencySet::new(["repo/g/a/1/a-1.jar", "repo/g/b/2/b-2.jar"]);
        assert_eq!(cache.best_match(&grown).unwrap(), grown);

        strategy
            .run(&paths(&["repo/g/a/2/a-2.jar", "out3.classes"]), &[], |env| {
                assert!(env.visible(Path::new("repo/g/a/2/a-2.jar")));
                assert!(!env.visible(Path::new("repo/g/a/1/a-1.jar")));
                assert!(!env.visible(Path::new("repo/g/b/2/b-2.jar")));
                Ok(())
            })
            .unwrap();

        // The conflicting call could not reuse; a fresh parent was cached.
        assert_eq!(loader.load_count_of("repo/g/a/2/a-2.jar"), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn worker_results_flow_back() {
        let (_, _, strategy) = strategy();

        let value = strategy
            .run(&paths(&["repo/g/a/1/a-1.jar", "out.classes"]), &[], |env| {
                Ok(format!("compiled in {}", env.id()))
            })
            .unwrap();

        assert!(value.starts_with("compiled in "));
    }

    #[test]
    fn hazardous_call_leaves_cache_unchanged() {
        let (loader, cache, strategy) = strategy();
        loader.mark_hazard("app.types");
        let cp = paths(&["repo/g/a/1/a-1.jar", "out.classes"]);

        strategy.run(&cp, &units(&["app.types"]), |_| Ok(())).unwrap();
        assert!(cache.is_empty());

        // The next identical call cannot reuse anything.
        strategy.run(&cp, &[], |_| Ok(())).unwrap();
        assert_eq!(loader.load_count_of("repo/g/a/1/a-1.jar"), 2);
    }

    #[test]
    fn broken_predicate_is_conservative() {
        let loader = Arc::new(crate::support::BrokenPredicateLoader);
        let cache = Arc::new(EnvironmentCache::new());
        let strategy = SharedCacheStrategy::new(loader as Arc<dyn Loader>, Arc::clone(&cache));

        strategy
            .run(
                &paths(&["repo/g/a/1/a-1.jar", "out.classes"]),
                &units(&["app.core"]),
                |_| Ok(()),
            )
            .unwrap();

        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_calls_never_share_one_claimed_environment() {
        crate::support::init_tracing();
        let loader = Arc::new(FakeLoader::default());
        let cache = Arc::new(EnvironmentCache::new());
        let strategy = Arc::new(SharedCacheStrategy::new(
            Arc::clone(&loader) as Arc<dyn Loader>,
            cache,
        ));

        // Warm the cache with one entry.
        strategy
            .run(&paths(&["repo/g/a/1/a-1.jar", "out.classes"]), &[], |_| {
                Ok(())
            })
            .unwrap();

        // All eight calls sit inside their workers simultaneously, so none
        // can reinsert its parent before the others have acquired theirs.
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let mut handles = Vec::new();
        for i in 0..8 {
            let strategy = Arc::clone(&strategy);
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                let cp = paths(&["repo/g/a/1/a-1.jar", &format!("out-{i}.classes")]);
                strategy.run(&cp, &[], |env| {
                    barrier.wait();
                    Ok(env.parent().unwrap().id())
                })
            }));
        }

        let parents: std::collections::HashSet<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        // At most one call claimed the warmed parent; everyone else built
        // fresh. No two concurrent calls shared an environment.
        assert_eq!(parents.len(), 8);
    }
}

mod strategy_selection_tests {
    use crate::support::{paths, FakeLoader};
    use kiln::config::Config;
    use kiln::env::Loader;
    use kiln::{create_strategy, StrategyKind};
    use std::sync::Arc;

    #[test]
    fn configured_strategy_runs_end_to_end() {
        for toml in [
            "[cache]\nstrategy = \"naive\"\n",
            "[cache]\nstrategy = \"dirty-shared\"\n",
            "[cache]\nstrategy = \"shared\"\n",
            "[cache]\nstrategy = \"thread-local\"\n",
        ] {
            let config: Config = toml::from_str(toml).unwrap();
            let loader = Arc::new(FakeLoader::default());
            let strategy = create_strategy(&config, Arc::clone(&loader) as Arc<dyn Loader>);

            let cp = paths(&["repo/g/a/1/a-1.jar", "out.classes"]);
            strategy.run(&cp, &[], |_| Ok(())).unwrap();
            strategy.run(&cp, &[], |_| Ok(())).unwrap();

            match strategy.kind() {
                // Fresh parent and child every call.
                StrategyKind::Naive => assert_eq!(loader.environments_seen(), 2),
                // One merged environment for both calls.
                StrategyKind::DirtyShared => assert_eq!(loader.environments_seen(), 1),
                // One reused parent, fresh child per call.
                StrategyKind::Shared | StrategyKind::ThreadLocal => {
                    assert_eq!(loader.environments_seen(), 3)
                }
            }
        }
    }

    #[test]
    fn naive_and_caching_strategies_agree_on_visibility() {
        let cp = paths(&["repo/g/a/1/a-1.jar", "repo/g/b/2/b-2.jar", "out.classes"]);
        let entries = ["repo/g/a/1/a-1.jar", "repo/g/b/2/b-2.jar", "out.classes"];

        for toml in [
            "[cache]\nstrategy = \"naive\"\n",
            "[cache]\nstrategy = \"shared\"\n",
            "[cache]\nstrategy = \"thread-local\"\n",
        ] {
            let config: Config = toml::from_str(toml).unwrap();
            let loader = Arc::new(FakeLoader::default());
            let strategy = create_strategy(&config, loader as Arc<dyn Loader>);

            strategy
                .run(&cp, &[], |env| {
                    for entry in entries {
                        assert!(env.visible(std::path::Path::new(entry)));
                    }
                    Ok(())
                })
                .unwrap();
        }
    }
}

mod event_log_tests {
    use crate::support::{paths, FakeLoader};
    use kiln::cache::EnvironmentCache;
    use kiln::env::Loader;
    use kiln::events::EventLog;
    use kiln::strategy::SharedCacheStrategy;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn cache_decisions_are_recorded() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("events.log");

        let loader = Arc::new(FakeLoader::default());
        let cache = Arc::new(EnvironmentCache::new());
        let strategy = SharedCacheStrategy::new(loader as Arc<dyn Loader>, cache)
            .with_events(Arc::new(EventLog::at_path(log_path.clone())));

        strategy
            .run(&paths(&["repo/g/a/1/a-1.jar", "out.classes"]), &[], |_| {
                Ok(())
            })
            .unwrap();
        strategy
            .run(&paths(&["repo/g/a/1/a-1.jar", "out2.classes"]), &[], |_| {
                Ok(())
            })
            .unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        let events: Vec<serde_json::Value> = content
            .trim()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        let names: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec!["cache.miss", "cache.insert", "cache.hit", "cache.insert"]
        );
        assert!(events.iter().all(|e| e["data"]["key"].is_string()));
    }
}
