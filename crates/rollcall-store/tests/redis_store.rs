//! Redis script tests
//!
//! Run against a live server with
//! `ROLLCALL_TEST_REDIS_URL=redis://localhost:6379 cargo test -- --ignored`.

use std::time::Duration;

use rollcall_store::{AtomicStore, RedisStore, RedisStoreConfig, Reply, StoreOp};

async fn connect(namespace: &str) -> RedisStore {
    let url = std::env::var("ROLLCALL_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let namespace = format!("{}-{}", namespace, std::process::id());
    RedisStore::connect(RedisStoreConfig::new(url, namespace))
        .await
        .expect("Failed to connect to redis")
}

async fn register(store: &RedisStore, node_id: &str, ttl_secs: u64) -> Reply {
    store
        .execute(StoreOp::RegisterOrRefresh { node_id, ttl_secs })
        .await
        .expect("register_or_refresh failed")
}

async fn cleanup(store: &RedisStore, node_ids: &[&str]) {
    for node_id in node_ids {
        let _ = store.execute(StoreOp::Deregister { node_id }).await;
    }
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_register_allocates_and_refreshes() {
    let store = connect("alloc").await;

    assert_eq!(register(&store, "a", 30).await, Reply::Integer(0));
    assert_eq!(register(&store, "b", 30).await, Reply::Integer(1));
    assert_eq!(register(&store, "a", 30).await, Reply::Integer(0));

    let info = store
        .execute(StoreOp::GetNodeInfo { node_id: "b" })
        .await
        .unwrap();
    assert_eq!(
        info,
        Reply::Array(vec![Reply::text("ok"), Reply::Integer(1), Reply::Integer(2)])
    );

    store
        .execute(StoreOp::Deregister { node_id: "a" })
        .await
        .unwrap();
    assert_eq!(register(&store, "c", 30).await, Reply::Integer(0));

    cleanup(&store, &["a", "b", "c"]).await;
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_get_node_info_statuses() {
    let store = connect("info").await;

    let reply = store
        .execute(StoreOp::GetNodeInfo { node_id: "ghost" })
        .await
        .unwrap();
    assert_eq!(reply, Reply::Array(vec![Reply::text("not_found")]));

    register(&store, "a", 30).await;
    register(&store, "b", 30).await;
    store
        .execute(StoreOp::Deregister { node_id: "a" })
        .await
        .unwrap();
    let reply = store
        .execute(StoreOp::GetNodeInfo { node_id: "b" })
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::Array(vec![
            Reply::text("error"),
            Reply::text("ordinal 1 is outside the 1 live nodes"),
        ])
    );

    cleanup(&store, &["a", "b"]).await;
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_monitor_evicts_on_server_clock() {
    let store = connect("monitor").await;

    register(&store, "short", 1).await;
    register(&store, "long", 60).await;

    let reply = store.execute(StoreOp::Monitor).await.unwrap();
    assert_eq!(reply, Reply::Array(vec![]));

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let reply = store.execute(StoreOp::Monitor).await.unwrap();
    assert_eq!(reply, Reply::Array(vec![Reply::text("short")]));

    let reply = store
        .execute(StoreOp::GetNodeInfo { node_id: "short" })
        .await
        .unwrap();
    assert_eq!(reply, Reply::Array(vec![Reply::text("not_found")]));

    cleanup(&store, &["long"]).await;
}

#[tokio::test]
#[ignore = "requires running redis"]
async fn test_close_ends_lifecycle() {
    let store = connect("close").await;
    assert!(store.ping().await.is_ok());

    store.close().await.unwrap();
    assert!(store.ping().await.unwrap_err().is_transport());
    assert!(
        store
            .execute(StoreOp::Monitor)
            .await
            .unwrap_err()
            .is_transport()
    );
}
