//! Orchestrator integration tests
//!
//! Adapters are replaced by scripted mocks so tier routing, supplementing,
//! fallback and caching can be observed through call counts.

mod helpers;

use helpers::{clubs, create_test_orchestrator, test_cache_config, MockAdapter, MockSources};
use std::sync::Arc;
use std::time::Duration;
use teamatlas_engine::adapters::{
    AdapterSet, FetchReport, RestCatalogAdapter, SourceAdapter, StaticFileAdapter,
};
use teamatlas_engine::cache::{DurableStore, MemoryStore, TieredCache};
use teamatlas_engine::orchestrator::{cache_key, Orchestrator};
use teamatlas_engine::scheduler::RefreshTarget;
use teamatlas_engine::types::{CountryDataset, PriorityTier, RawRecord};
use teamatlas_engine::EngineError;

#[tokio::test]
async fn test_unknown_country_gets_cached_fallback() {
    // Given: Every source answers empty
    let sources = MockSources::empty();
    let orchestrator = create_test_orchestrator(&sources);

    // When: Requesting an unknown country
    let dataset = orchestrator.get_country_teams("XZ").await;

    // Then: One synthetic, low-confidence record
    assert!(dataset.is_fallback);
    assert_eq!(dataset.priority_tier, PriorityTier::Tier3);
    assert_eq!(dataset.teams.len(), 1);
    let team = &dataset.teams[0];
    assert!(team.synthetic);
    assert!(team.confidence < 0.5);
    assert_eq!(team.sources, vec!["fallback".to_string()]);

    // Tier 3 routing: no knowledge graph query
    assert_eq!(sources.knowledge_graph.calls(), 0);
    assert_eq!(sources.static_file.calls(), 1);
    assert_eq!(sources.rest_catalog.calls(), 1);

    // And: The fallback is cached
    let cached: Option<CountryDataset> = orchestrator.cache().get(&cache_key("XZ")).await;
    assert_eq!(cached, Some(dataset));
}

#[tokio::test]
async fn test_cache_hit_skips_sources() {
    let sources = MockSources::empty();
    let orchestrator = create_test_orchestrator(&sources);

    let first = orchestrator.get_country_teams("xz").await;
    let second = orchestrator.get_country_teams("XZ").await;

    assert_eq!(first, second);
    assert_eq!(sources.static_file.calls(), 1);
    assert_eq!(sources.rest_catalog.calls(), 1);
}

#[tokio::test]
async fn test_well_covered_country_supplements_below_threshold() {
    // Given: Knowledge graph knows three clubs, REST catalog three more (one shared)
    let sources = MockSources {
        knowledge_graph: MockAdapter::with_teams("knowledge_graph", &clubs(3)),
        static_file: MockAdapter::empty("static_file"),
        rest_catalog: MockAdapter::with_teams(
            "rest_catalog",
            &[
                ("Racing Club", "Buenos Aires"),
                ("Huracan", "Buenos Aires"),
                ("Tigre", "Victoria"),
            ],
        ),
    };
    let orchestrator = create_test_orchestrator(&sources);

    // When: Fetching a tier 1 country
    let dataset = orchestrator.get_country_teams("AR").await;

    // Then: REST catalog consulted, shared club fused
    assert_eq!(sources.knowledge_graph.calls(), 1);
    assert_eq!(sources.rest_catalog.calls(), 1);
    assert_eq!(sources.static_file.calls(), 0);

    assert!(!dataset.is_fallback);
    assert_eq!(dataset.priority_tier, PriorityTier::Tier1);
    assert_eq!(dataset.teams.len(), 5);
    assert_eq!(
        dataset.data_sources,
        vec!["knowledge_graph".to_string(), "rest_catalog".to_string()]
    );

    let racing = dataset.teams.iter().find(|t| t.name == "Racing Club").unwrap();
    assert_eq!(racing.sources.len(), 2);
    assert_eq!(dataset.teams[0].name, "Racing Club");
}

#[tokio::test]
async fn test_well_covered_country_skips_supplement_at_threshold() {
    let sources = MockSources {
        knowledge_graph: MockAdapter::with_teams("knowledge_graph", &clubs(6)),
        static_file: MockAdapter::empty("static_file"),
        rest_catalog: MockAdapter::with_teams("rest_catalog", &clubs(2)),
    };
    let orchestrator = create_test_orchestrator(&sources);

    let dataset = orchestrator.get_country_teams("DE").await;

    assert_eq!(dataset.teams.len(), 6);
    assert_eq!(sources.rest_catalog.calls(), 0);
    assert_eq!(dataset.data_sources, vec!["knowledge_graph".to_string()]);
}

#[tokio::test]
async fn test_long_tail_country_queries_both_light_sources() {
    let sources = MockSources {
        knowledge_graph: MockAdapter::with_teams("knowledge_graph", &clubs(8)),
        static_file: MockAdapter::with_teams("static_file", &[("Valletta", "Valletta")]),
        rest_catalog: MockAdapter::with_teams(
            "rest_catalog",
            &[("Valletta FC", "Valletta"), ("Hibernians", "Paola")],
        ),
    };
    let orchestrator = create_test_orchestrator(&sources);

    let dataset = orchestrator.get_country_teams("MT").await;

    assert_eq!(sources.knowledge_graph.calls(), 0);
    assert_eq!(sources.static_file.calls(), 1);
    assert_eq!(sources.rest_catalog.calls(), 1);
    assert_eq!(dataset.teams.len(), 2);
    assert_eq!(dataset.priority_tier, PriorityTier::Tier3);
}

#[tokio::test]
async fn test_total_outage_is_reported_to_scheduler() {
    // Given: Every source fails at transport level
    let sources = MockSources {
        knowledge_graph: MockAdapter::failing("knowledge_graph"),
        static_file: MockAdapter::failing("static_file"),
        rest_catalog: MockAdapter::failing("rest_catalog"),
    };
    let orchestrator = create_test_orchestrator(&sources);

    // When: The scheduler refreshes the country
    let result = orchestrator.refresh_country("FR").await;

    // Then: Error for retry accounting, consumers still get a fallback
    assert!(matches!(result, Err(EngineError::SourcesUnavailable(ref c)) if c == "FR"));

    let dataset = orchestrator.get_country_teams("FR").await;
    assert!(dataset.is_fallback);
    assert_eq!(dataset.teams[0].name, "France FC");
}

#[tokio::test]
async fn test_outage_keeps_previous_dataset() {
    // Given: A successful refresh cached real data
    let sources = MockSources {
        knowledge_graph: MockAdapter::with_teams("knowledge_graph", &clubs(6)),
        ..MockSources::empty()
    };
    let orchestrator = create_test_orchestrator(&sources);
    let before = orchestrator.refresh("ES").await.unwrap().dataset;

    // When: The sources go down and the country is refreshed again
    sources.knowledge_graph.set_report(FetchReport::failed());
    sources.rest_catalog.set_report(FetchReport::failed());
    let outcome = orchestrator.refresh("ES").await.unwrap();

    // Then: Previous data survives
    assert!(outcome.all_sources_failed);
    assert_eq!(outcome.dataset, before);
    assert_eq!(orchestrator.get_country_teams("ES").await, before);
}

#[tokio::test]
async fn test_partial_failure_is_not_an_outage() {
    let sources = MockSources {
        knowledge_graph: MockAdapter::failing("knowledge_graph"),
        static_file: MockAdapter::empty("static_file"),
        rest_catalog: MockAdapter::with_teams("rest_catalog", &clubs(2)),
    };
    let orchestrator = create_test_orchestrator(&sources);

    let outcome = orchestrator.refresh("IT").await.unwrap();

    assert!(!outcome.all_sources_failed);
    assert_eq!(outcome.dataset.teams.len(), 2);
    assert!(orchestrator.refresh_country("IT").await.is_ok());
}

#[tokio::test]
async fn test_refresh_bypasses_cache() {
    let sources = MockSources::empty();
    let orchestrator = create_test_orchestrator(&sources);
    orchestrator.get_country_teams("MT").await;

    sources.static_file.set_report(FetchReport::ok(vec![RawRecord::new(
        "Floriana",
        "Floriana",
        "static_file",
        0.7,
    )]));
    let outcome = orchestrator.refresh("MT").await.unwrap();

    assert_eq!(sources.static_file.calls(), 2);
    assert!(!outcome.dataset.is_fallback);
    assert_eq!(orchestrator.get_country_teams("MT").await.teams[0].name, "Floriana");
}

#[tokio::test]
async fn test_invalid_code_never_reaches_sources() {
    let sources = MockSources::empty();
    let orchestrator = create_test_orchestrator(&sources);

    let dataset = orchestrator.get_country_teams("ARG").await;
    assert!(dataset.is_fallback);
    assert_eq!(dataset.teams.len(), 1);

    let refresh = orchestrator.refresh("ARG").await;
    assert!(matches!(refresh, Err(EngineError::InvalidCountry(_))));

    assert_eq!(sources.static_file.calls(), 0);
    assert_eq!(sources.rest_catalog.calls(), 0);
    assert_eq!(sources.knowledge_graph.calls(), 0);
}

#[tokio::test]
async fn test_long_tail_outage_is_reported_to_scheduler() {
    // Given: Both light sources fail
    let sources = MockSources {
        static_file: MockAdapter::failing("static_file"),
        rest_catalog: MockAdapter::failing("rest_catalog"),
        ..MockSources::empty()
    };
    let orchestrator = create_test_orchestrator(&sources);

    // When: Refreshing a tier 3 country
    let outcome = orchestrator.refresh("MT").await.unwrap();

    // Then: Outage flagged and surfaced for retry
    assert!(outcome.all_sources_failed);
    assert!(outcome.dataset.is_fallback);
    assert!(matches!(
        orchestrator.refresh_country("MT").await,
        Err(EngineError::SourcesUnavailable(ref c)) if c == "MT"
    ));
}

#[tokio::test]
async fn test_long_tail_outage_keeps_previous_dataset() {
    let sources = MockSources {
        static_file: MockAdapter::with_teams("static_file", &[("Hibernians", "Paola")]),
        ..MockSources::empty()
    };
    let orchestrator = create_test_orchestrator(&sources);
    let before = orchestrator.refresh("MT").await.unwrap().dataset;

    sources.static_file.set_report(FetchReport::failed());
    sources.rest_catalog.set_report(FetchReport::failed());
    let outcome = orchestrator.refresh("MT").await.unwrap();

    assert!(outcome.all_sources_failed);
    assert_eq!(outcome.dataset, before);
}

#[tokio::test]
async fn test_skipped_source_does_not_mask_outage() {
    // Given: Static files have nothing to query, REST catalog is down
    let sources = MockSources {
        static_file: MockAdapter::new("static_file", FetchReport::skipped()),
        rest_catalog: MockAdapter::failing("rest_catalog"),
        ..MockSources::empty()
    };
    let orchestrator = create_test_orchestrator(&sources);

    let outcome = orchestrator.refresh("AD").await.unwrap();

    assert!(outcome.all_sources_failed);
}

#[tokio::test]
async fn test_long_tail_outage_against_unreachable_sources() {
    // Given: Real light adapters pointed at a port nothing listens on
    let timeout = Duration::from_secs(5);
    let static_file = Arc::new(
        StaticFileAdapter::with_base_url("http://127.0.0.1:9", "2024-25", Duration::ZERO, timeout)
            .unwrap(),
    );
    let rest_catalog = Arc::new(
        RestCatalogAdapter::with_base_url("http://127.0.0.1:9", "3", Duration::ZERO, 100, timeout)
            .unwrap(),
    );
    let adapters = AdapterSet::new(
        MockAdapter::empty("knowledge_graph"),
        static_file.clone(),
        rest_catalog.clone(),
    );
    let durable = Arc::new(MemoryStore::new(100));
    let store: Arc<dyn DurableStore> = durable.clone();
    let cache = Arc::new(TieredCache::new(test_cache_config(), Some(store)));
    let orchestrator = Orchestrator::new(cache, adapters);

    // When: Refreshing a tier 3 country
    let outcome = orchestrator.refresh("AD").await.unwrap();

    // Then: Both adapters sent a request and the outage is visible
    assert_eq!(static_file.stats().requests, 1);
    assert_eq!(static_file.stats().failures, 1);
    assert_eq!(rest_catalog.stats().failures, 1);
    assert!(outcome.all_sources_failed);
    assert!(outcome.dataset.is_fallback);

    // And: The outage fallback stays out of the durable tier
    assert_eq!(durable.len().await.unwrap(), 0);
    assert!(orchestrator.refresh_country("AD").await.is_err());
}
