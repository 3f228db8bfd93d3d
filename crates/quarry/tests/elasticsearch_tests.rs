//! Elasticsearch transport tests.
//!
//! Configuration and client construction are checked without a cluster.
//! The `es_integration` module runs against a real Elasticsearch started
//! with testcontainers and needs Docker.
//!
//! Run with: `cargo test -p quarry -- --ignored es_integration`

#![cfg(feature = "elasticsearch")]

use std::time::Duration;

use quarry::config::{ConnectionAuth, ConnectionConfig, HostDescriptor, QuarryConfig};
use quarry::{ClientFactory, ConnectionResolver};

// ============================================================================
// Configuration Tests (no ES instance required)
// ============================================================================

#[test]
fn test_connection_config_defaults() {
    let config = ConnectionConfig::default();
    assert_eq!(config.servers.len(), 1);
    assert_eq!(config.servers[0].url(), "http://localhost:9200");
    assert!(config.ignore.is_empty());
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert!(config.auth.is_none());
}

#[test]
fn test_config_from_json() {
    let config = QuarryConfig::from_json_str(
        r#"{
            "default": "main",
            "connections": {
                "main": {
                    "servers": [{ "host": "es1", "port": 9201, "scheme": "https" }],
                    "ignore": [404],
                    "timeout": "5s"
                }
            }
        }"#,
    )
    .unwrap();

    let main = &config.connections["main"];
    assert_eq!(main.servers[0].url(), "https://es1:9201");
    assert_eq!(main.ignore, vec![404]);
    assert_eq!(main.timeout, Duration::from_secs(5));
}

#[test]
fn test_client_factory_with_auth() {
    let config = ConnectionConfig::new(vec![HostDescriptor::new("localhost")]).with_auth(
        ConnectionAuth::Basic {
            username: "elastic".to_string(),
            password: "changeme".to_string(),
        },
    );
    assert!(ClientFactory::build("main", &config).is_ok());
}

#[test]
fn test_resolver_from_config_is_lazy() {
    let config = QuarryConfig::new("main").with_connection("main", ConnectionConfig::default());
    let resolver = ConnectionResolver::from_config(&config);

    assert!(resolver.has_connection("main"));
    assert!(!resolver.is_materialized("main"));

    let connection = resolver.connection(None).unwrap();
    assert_eq!(connection.name(), "main");
    assert!(resolver.is_materialized("main"));
}

// ============================================================================
// Integration Tests (requires Docker for testcontainers)
// ============================================================================

/// Integration tests against a real Elasticsearch instance via testcontainers.
///
/// Run with:
///   cargo test -p quarry -- --ignored es_integration
#[cfg(test)]
mod es_integration {
    use std::sync::Arc;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use quarry::config::{ConnectionConfig, HostDescriptor, QuarryConfig};
    use quarry::{Connection, ConnectionResolver, Model, SortOrder};

    use testcontainers::ImageExt;
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::elastic_search::ElasticSearch;
    use tokio::sync::OnceCell;

    /// Shared Elasticsearch container reused across all tests in this module.
    struct SharedEs {
        host: String,
        port: u16,
        /// Kept alive for the duration of the test binary; dropped at process exit.
        _container: testcontainers::ContainerAsync<ElasticSearch>,
    }

    static SHARED_ES: OnceCell<SharedEs> = OnceCell::const_new();

    async fn shared_es() -> &'static SharedEs {
        SHARED_ES
            .get_or_init(|| async {
                let container = ElasticSearch::default()
                    .with_env_var("ES_JAVA_OPTS", "-Xms256m -Xmx256m")
                    .with_startup_timeout(Duration::from_secs(120))
                    .start()
                    .await
                    .expect("Failed to start Elasticsearch container");

                let port = container
                    .get_host_port_ipv4(9200)
                    .await
                    .expect("Failed to get host port");

                let host = container
                    .get_host()
                    .await
                    .expect("Failed to get host")
                    .to_string();

                SharedEs {
                    host,
                    port,
                    _container: container,
                }
            })
            .await
    }

    async fn resolver() -> ConnectionResolver {
        let es = shared_es().await;
        let config = QuarryConfig::new("main").with_connection(
            "main",
            ConnectionConfig::new(vec![HostDescriptor::new(es.host.as_str()).with_port(es.port)])
                .with_ignore([404]),
        );
        ConnectionResolver::from_config(&config)
    }

    /// Unique index name per test so tests can share one container.
    fn index_name(prefix: &str) -> String {
        format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        rank: u32,
    }

    impl Model for Note {
        const INDEX: &'static str = "notes";
    }

    async fn seed(connection: &Arc<Connection>, index: &str, count: u32) {
        connection
            .create_index(index)
            .shards(1)
            .mappings(json!({
                "properties": {
                    "title": { "type": "keyword" },
                    "rank": { "type": "integer" }
                }
            }))
            .create()
            .await
            .unwrap();

        for rank in 0..count {
            let note = Note {
                title: format!("note-{}", rank),
                rank,
            };
            connection
                .index(index)
                .id(rank.to_string())
                .insert(&note)
                .await
                .unwrap();
        }
        connection.refresh(index).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_index_lifecycle() {
        let resolver = resolver().await;
        let connection = resolver.connection(None).unwrap();
        let name = index_name("lifecycle");
        let index = connection.create_index(name.as_str()).shards(1).alias(format!("{}-alias", name));

        assert!(!index.exists().await.unwrap());
        index.create().await.unwrap();
        assert!(index.exists().await.unwrap());

        index.delete().await.unwrap();
        assert!(!index.exists().await.unwrap());

        // 404 is ignored on this connection
        index.delete().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_search_count_and_paginate() {
        let resolver = resolver().await;
        let connection = resolver.connection(None).unwrap();
        let name = index_name("search");
        seed(&connection, &name, 12).await;

        let top = connection
            .index(name.as_str())
            .where_op("rank", quarry::Operator::Gte, 5)
            .order_by("rank", SortOrder::Desc)
            .take(3)
            .get()
            .await
            .unwrap();
        assert_eq!(top.total(), 7);
        assert_eq!(top.ids(), vec!["11", "10", "9"]);

        let count = connection
            .index(name.as_str())
            .where_in("title", ["note-1", "note-2"])
            .count()
            .await
            .unwrap();
        assert_eq!(count, 2);

        let page = connection
            .index(name.as_str())
            .order_by("rank", SortOrder::Asc)
            .paginate(5, 3)
            .await
            .unwrap();
        assert_eq!(page.items().len(), 2);
        assert_eq!(page.last_page(), 3);

        connection.create_index(name.as_str()).delete().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_find_update_and_delete() {
        let resolver = resolver().await;
        let connection = resolver.connection(None).unwrap();
        let name = index_name("docs");
        seed(&connection, &name, 3).await;

        let hit = connection.index(name.as_str()).find("1").await.unwrap().unwrap();
        assert_eq!(hit.to_model::<Note>().unwrap().rank, 1);
        assert!(connection.index(name.as_str()).find("99").await.unwrap().is_none());

        connection
            .index(name.as_str())
            .id("1")
            .update(&json!({ "title": "renamed" }))
            .await
            .unwrap();
        connection
            .index(name.as_str())
            .where_eq("rank", 2)
            .update(&json!({ "title": "bulk" }))
            .await
            .unwrap();
        connection.refresh(&name).await.unwrap();

        let renamed = connection.index(name.as_str()).find("1").await.unwrap().unwrap();
        assert_eq!(renamed.get("title"), Some(&json!("renamed")));
        let bulk = connection.index(name.as_str()).find("2").await.unwrap().unwrap();
        assert_eq!(bulk.get("title"), Some(&json!("bulk")));

        connection.index(name.as_str()).id("0").delete().await.unwrap();
        connection
            .index(name.as_str())
            .where_eq("title", "bulk")
            .delete()
            .await
            .unwrap();
        connection.refresh(&name).await.unwrap();
        assert_eq!(connection.index(name.as_str()).count().await.unwrap(), 1);

        connection.create_index(name.as_str()).delete().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_scroll_through_index() {
        let resolver = resolver().await;
        let connection = resolver.connection(None).unwrap();
        let name = index_name("scroll");
        seed(&connection, &name, 5).await;

        let mut batch = connection
            .index(name.as_str())
            .scroll(Duration::from_secs(30))
            .take(2)
            .get()
            .await
            .unwrap();
        let mut seen = batch.len();
        let mut scroll_id = batch.scroll_id().unwrap().to_string();

        while !batch.is_empty() {
            batch = connection
                .index(name.as_str())
                .scroll(Duration::from_secs(30))
                .scroll_id(scroll_id.as_str())
                .get()
                .await
                .unwrap();
            seen += batch.len();
            if let Some(next) = batch.scroll_id() {
                scroll_id = next.to_string();
            }
        }
        assert_eq!(seen, 5);

        connection.clear_scroll(&scroll_id).await.unwrap();
        connection.create_index(name.as_str()).delete().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_missing_index_is_ignored() {
        let resolver = resolver().await;
        let connection = resolver.connection(None).unwrap();

        let count = connection.index(index_name("absent")).count().await.unwrap();
        assert_eq!(count, 0);

        let collection = connection.index(index_name("absent")).get().await.unwrap();
        assert!(collection.is_empty());
    }
}
