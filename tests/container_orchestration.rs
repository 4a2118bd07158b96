//! Integration tests against a live container engine.
//!
//! These tests verify the container module works end-to-end with Docker/Podman.
//! Tests are skipped if Docker/Podman is not available or SKIP_CONTAINER_TESTS=1.

use dock_bootstrap::container::{
    ContainerClient, ContainerConfig, ContainerManager, ContainerState, Engine, EngineConfig,
    EventMonitor, ExecConfig, Inventory, NetworkConfig, NetworkManager, execute, find_container,
    find_image, find_network,
};
use dock_bootstrap::readiness::RetryPolicy;
use serial_test::serial;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use test_tag::tag;

// Its default command keeps the container running
const TEST_IMAGE: &str = "nginx:alpine";
const TEST_CONTAINER: &str = "dock-bootstrap-it-exec";
const TEST_NETWORK: &str = "dock-bootstrap-it-net";

/// Check if container tests should run.
fn should_run_container_tests() -> bool {
    if let Ok(value) = std::env::var("SKIP_CONTAINER_TESTS")
        && (value == "1" || value.eq_ignore_ascii_case("true"))
    {
        return false;
    }

    std::process::Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
        || std::process::Command::new("podman")
            .arg("info")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
}

async fn connect() -> Arc<ContainerClient> {
    Arc::new(
        ContainerClient::connect(&EngineConfig::default())
            .await
            .expect("Failed to connect to Docker/Podman"),
    )
}

/// Cleanup helper - stops and removes the container if it exists.
async fn cleanup_container(client: &ContainerClient, name: &str) {
    if let Ok(Some(container)) = find_container(client, name).await {
        let _ = client.stop_container(&container.id, 1).await;
        let _ = client.remove_container(&container.id).await;
    }
}

fn test_network_config() -> NetworkConfig {
    NetworkConfig {
        name: TEST_NETWORK.to_string(),
        subnet: "172.29.0.0/16".to_string(),
        gateway: "172.29.0.1".to_string(),
        options: BTreeMap::new(),
        ..Default::default()
    }
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_inventory_lists_everything() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests (Docker/Podman not available or SKIP_CONTAINER_TESTS=1)");
        return;
    }

    let client = connect().await;
    let inventory = Inventory::collect(client.as_ref())
        .await
        .expect("Inventory should succeed");

    // Every engine ships the default bridge network
    assert!(!inventory.networks.is_empty());
    let rendered = inventory.render();
    assert!(rendered.starts_with("Networks ("));
    assert!(rendered.contains("Containers ("));
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_network_creation_is_idempotent() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests (Docker/Podman not available or SKIP_CONTAINER_TESTS=1)");
        return;
    }

    let client = connect().await;
    let _ = client.docker().remove_network(TEST_NETWORK).await;

    let manager = NetworkManager::new(client.clone());
    let config = test_network_config();

    let first = manager
        .ensure_network(&config, &HashMap::new())
        .await
        .expect("Network creation should succeed");
    let second = manager
        .ensure_network(&config, &HashMap::new())
        .await
        .expect("Second ensure should succeed");

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);

    let matching = client
        .list_networks()
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.name == TEST_NETWORK)
        .count();
    assert_eq!(matching, 1);

    client
        .docker()
        .remove_network(TEST_NETWORK)
        .await
        .expect("Failed to remove test network");
    assert!(find_network(client.as_ref(), TEST_NETWORK).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[tag(integration, container)]
async fn test_container_lifecycle_and_exec() {
    if !should_run_container_tests() {
        eprintln!("Skipping container tests (Docker/Podman not available or SKIP_CONTAINER_TESTS=1)");
        return;
    }

    let client = connect().await;
    cleanup_container(&client, TEST_CONTAINER).await;

    let monitor = EventMonitor::spawn_with(client.clone(), |_| {});
    let manager = ContainerManager::new(client.clone());
    let labels = HashMap::from([("dock-bootstrap.test".to_string(), "true".to_string())]);
    let config = ContainerConfig::builder()
        .image(TEST_IMAGE)
        .labels(&labels)
        .build()
        .unwrap();

    let created = manager
        .resolve_or_create(TEST_CONTAINER, &config)
        .await
        .expect("Container creation should succeed");
    assert!(created.created);
    assert!(find_image(client.as_ref(), TEST_IMAGE).await.unwrap().is_some());

    let again = manager
        .resolve_or_create(TEST_CONTAINER, &config)
        .await
        .unwrap();
    assert_eq!(again.id, created.id);
    assert!(!again.created);

    manager.start(&created.id).await.unwrap();
    let policy = RetryPolicy {
        max_attempts: 10,
        initial_delay_ms: 200,
        max_delay_ms: 1_000,
        ..Default::default()
    };
    manager
        .wait_running(TEST_CONTAINER, &policy)
        .await
        .expect("Container should reach running");

    let exec = ExecConfig::builder()
        .cmd(vec!["sh", "-c", "for i in $(seq 1 200); do echo line-$i; done"])
        .build();
    let output = execute(client.as_ref(), &created.id, &exec)
        .await
        .expect("Exec should succeed");
    assert!(output.success());
    let text = output.text();
    assert!(text.contains("line-1\n"));
    assert!(text.contains("line-200"));

    manager.stop(&created.id, 1).await.unwrap();
    assert_eq!(
        manager.state(TEST_CONTAINER).await.unwrap(),
        Some(ContainerState::Exited)
    );
    manager.remove(&created.id).await.unwrap();
    assert!(manager.find(TEST_CONTAINER).await.unwrap().is_none());

    for _ in 0..50 {
        if monitor.events_seen() > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert!(monitor.events_seen() > 0, "Lifecycle should produce engine events");
    monitor.stop().await;
}
