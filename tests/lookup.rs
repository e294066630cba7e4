#![cfg(feature = "sync")]

use std::time::Duration;

use bytes::Bytes;
use deadline::deadline;
use kadroute::{message::MAX_VALUE_LEN, Config, Contact, Id, NodeInfo, RpcError, Store};

mod common;
#[allow(unused_imports)]
use crate::common::{bootstrapped_network, enable_tracing, Behaviour, Network};

#[tokio::test(flavor = "multi_thread")]
async fn lookups_on_an_empty_table_finish() {
    // enable_tracing();

    let network = Network::new();
    let node = network.spawn_node(Id::rand(), 1000, Config::default());

    assert!(node.find_node(Id::rand()).await.is_empty());
    assert!(node.value_for_key(Id::rand()).await.is_none());
    assert_eq!(node.publish(Id::rand(), Bytes::from_static(b"v")).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn add_contact() {
    let (network, nodes) = bootstrapped_network(2, 1100, Config::default()).await;

    // Both sides know each other after the ping.
    assert!(nodes[0].routing_table().peer(&nodes[1].local_id()).is_some());
    assert!(nodes[1].routing_table().peer(&nodes[0].local_id()).is_some());

    // Nobody listens here.
    let addr = "127.0.0.1:1199".parse().unwrap();
    assert!(matches!(
        nodes[0].add_contact(addr).await,
        Err(RpcError::Transport(_))
    ));

    network.set_behaviour(nodes[1].local_addr(), Behaviour::Down);
    assert!(nodes[0].add_contact(nodes[1].local_addr()).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn find_node_exact_match_in_table() {
    let (_network, nodes) = bootstrapped_network(2, 1200, Config::default()).await;

    let found = nodes[1].find_node(nodes[0].local_id()).await;
    assert_eq!(
        found,
        vec![Contact::new(nodes[0].local_id(), nodes[0].local_addr())]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn find_node_through_bootstrap() {
    let (_network, nodes) = bootstrapped_network(10, 1300, Config::default()).await;

    // Node 5 only knows the bootstrap node, which knows everyone.
    assert_eq!(nodes[5].routing_table().len(), 1);

    let target = nodes[7].local_id();
    let found = nodes[5].find_node(target).await;
    assert_eq!(found, vec![Contact::new(target, nodes[7].local_addr())]);

    // Everything the bootstrap node returned is now known.
    assert!(nodes[5].routing_table().peer(&target).is_some());
    assert_eq!(nodes[5].routing_table().len(), 9);
}

#[tokio::test(flavor = "multi_thread")]
async fn find_node_returns_closest_sorted() {
    let (_network, nodes) = bootstrapped_network(10, 1400, Config::default()).await;

    let target = Id::rand();
    let found = nodes[3].find_node(target).await;

    // All ten nodes, the local one included, closest to the target first.
    assert_eq!(found.len(), 10);
    assert!(found
        .windows(2)
        .all(|w| w[0].id.distance(&target) < w[1].id.distance(&target)));
}

#[tokio::test(flavor = "multi_thread")]
async fn find_close_nodes_fills_tables() {
    let (_network, nodes) = bootstrapped_network(10, 1500, Config::default()).await;

    for node in &nodes {
        node.find_close_nodes().await;
    }

    for node in &nodes {
        assert_eq!(node.routing_table().len(), 9);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_and_find_value() {
    let (_network, nodes) = bootstrapped_network(8, 1600, Config::default()).await;

    let key = Id::rand();
    let value = Bytes::from_static(b"Hello, world!");

    // Every node but the publisher acknowledges.
    assert_eq!(nodes[3].publish(key, value.clone()).await.unwrap(), 7);
    assert!(!nodes[3].store().has(&key));

    for node in &nodes {
        assert_eq!(node.value_for_key(key).await, Some(value.clone()));
    }

    // The first value stored under a key wins, only the first publisher takes the new one.
    let other = Bytes::from_static(b"other");
    assert_eq!(nodes[4].publish(key, other.clone()).await.unwrap(), 7);
    for (i, node) in nodes.iter().enumerate() {
        let expected = if i == 3 { &other } else { &value };
        assert_eq!(node.store().get(&key).as_ref(), Some(expected));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn store_value_for_key_in_background() {
    let (network, nodes) = bootstrapped_network(6, 1700, Config::default()).await;

    let key = Id::rand();
    nodes[2]
        .store_value_for_key(key, Bytes::from_static(b"background"))
        .unwrap();

    let publisher = nodes[2].local_id();
    deadline!(Duration::from_secs(3), move || network
        .nodes()
        .iter()
        .filter(|node| node.local_id() != publisher)
        .all(|node| node.store().has(&key)));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_value_is_not_found() {
    let (_network, nodes) = bootstrapped_network(6, 1800, Config::default()).await;

    for node in &nodes {
        node.find_close_nodes().await;
    }

    assert!(nodes[1].value_for_key(Id::rand()).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_peers_time_out() {
    let config = Config {
        rpc_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let (network, nodes) = bootstrapped_network(6, 1900, config).await;

    for node in &nodes {
        node.find_close_nodes().await;
    }
    for node in &nodes[2..] {
        network.set_behaviour(node.local_addr(), Behaviour::Silent);
    }

    let key = Id::rand();
    nodes[2].store().put(key, Bytes::from_static(b"unreachable"));

    // Every silent peer costs one deadline, the lookup still terminates.
    let res = tokio::time::timeout(Duration::from_secs(5), nodes[1].value_for_key(key)).await;
    assert_eq!(res.unwrap(), None);

    assert!(matches!(
        nodes[1].add_contact(nodes[3].local_addr()).await,
        Err(RpcError::Timeout)
    ));
}

// A table with a single slot per bucket, where the incumbent is always old enough to be pinged.
fn single_slot_config() -> Config {
    Config {
        k: 1,
        max_ping_interval: time::Duration::ZERO,
        rpc_timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unresponsive_incumbent_is_replaced() {
    let network = Network::new();
    let a = network.spawn_node(Id::from_u64(0), 2000, single_slot_config());
    // Both at log2 distance 1 from A.
    let b = network.spawn_node(Id::from_u64(2), 2001, Config::default());
    let c = network.spawn_node(Id::from_u64(3), 2002, Config::default());

    a.add_contact(b.local_addr()).await.unwrap();
    network.set_behaviour(b.local_addr(), Behaviour::Silent);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // C answers, but its bucket is full: B is pinged in the background and times out.
    a.add_contact(c.local_addr()).await.unwrap();

    let (a_clone, b_id, c_id) = (a.clone(), b.local_id(), c.local_id());
    deadline!(Duration::from_secs(3), move || {
        let table = a_clone.routing_table();
        table.peer(&c_id).is_some() && table.peer(&b_id).is_none()
    });
    assert_eq!(a.routing_table().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn responsive_incumbent_is_kept() {
    let network = Network::new();
    let a = network.spawn_node(Id::from_u64(0), 2100, single_slot_config());
    let b = network.spawn_node(Id::from_u64(2), 2101, Config::default());
    let c = network.spawn_node(Id::from_u64(3), 2102, Config::default());

    a.add_contact(b.local_addr()).await.unwrap();
    let first_seen = a.routing_table().peer(&b.local_id()).unwrap().last_seen();
    tokio::time::sleep(Duration::from_millis(10)).await;

    a.add_contact(c.local_addr()).await.unwrap();

    // The ping succeeds and refreshes B.
    let (a_clone, b_id) = (a.clone(), b.local_id());
    deadline!(Duration::from_secs(3), move || a_clone
        .routing_table()
        .peer(&b_id)
        .map_or(false, |peer| peer.last_seen() > first_seen));

    let table = a.routing_table();
    assert!(table.peer(&c.local_id()).is_none());
    assert_eq!(table.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn recently_seen_incumbent_is_kept_without_ping() {
    let network = Network::new();
    let config = Config {
        k: 1,
        ..Default::default()
    };
    let a = network.spawn_node(Id::from_u64(0), 2200, config);
    let b = network.spawn_node(Id::from_u64(2), 2201, Config::default());
    let c = network.spawn_node(Id::from_u64(3), 2202, Config::default());

    a.add_contact(b.local_addr()).await.unwrap();
    // B would fail a ping, but it was seen well within the ping interval.
    network.set_behaviour(b.local_addr(), Behaviour::Down);
    a.add_contact(c.local_addr()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let table = a.routing_table();
    assert!(table.peer(&b.local_id()).is_some());
    assert!(table.peer(&c.local_id()).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn one_staleness_ping_per_incumbent() {
    let network = Network::new();
    let config = Config {
        rpc_timeout: Duration::from_millis(300),
        ..single_slot_config()
    };
    let a = network.spawn_node(Id::from_u64(0), 2600, config);
    // All three at log2 distance 2 from A.
    let b = network.spawn_node(Id::from_u64(4), 2601, Config::default());
    let c = network.spawn_node(Id::from_u64(5), 2602, Config::default());
    let d = network.spawn_node(Id::from_u64(6), 2603, Config::default());

    a.add_contact(b.local_addr()).await.unwrap();
    network.set_behaviour(b.local_addr(), Behaviour::Silent);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Both newcomers find B old enough to ping, only the first one triggers a ping.
    a.add_contact(c.local_addr()).await.unwrap();
    a.add_contact(d.local_addr()).await.unwrap();

    let (a_clone, b_id, c_id) = (a.clone(), b.local_id(), c.local_id());
    deadline!(Duration::from_secs(3), move || {
        let table = a_clone.routing_table();
        table.peer(&c_id).is_some() && table.peer(&b_id).is_none()
    });

    // The initial ping and a single staleness ping.
    assert_eq!(network.requests(b.local_addr()), 2);
    assert!(a.routing_table().peer(&d.local_id()).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn second_hand_contacts_leave_known_peers_alone() {
    let network = Network::new();
    let config = Config {
        k: 1,
        ..Default::default()
    };
    let a = network.spawn_node(Id::from_u64(0), 2700, config);
    let b = network.spawn_node(Id::from_u64(0x2), 2701, Config::default());
    let c = network.spawn_node(Id::from_u64(0x100), 2702, Config::default());

    a.add_contact(b.local_addr()).await.unwrap();
    a.add_contact(c.local_addr()).await.unwrap();
    let confirmed = *a.routing_table().peer(&b.local_id()).unwrap();

    // C hears from someone claiming to be B at another address, and B stops answering.
    c.handle_ping("10.9.9.9".parse().unwrap(), NodeInfo::new(b.local_id(), 9999));
    network.set_behaviour(b.local_addr(), Behaviour::Down);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // C is the only seed, its answer hands out the other address for B.
    a.find_node(Id::from_u64(0x101)).await;
    assert_eq!(network.requests(c.local_addr()), 2);

    assert_eq!(*a.routing_table().peer(&b.local_id()).unwrap(), confirmed);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_values_are_refused() {
    let (_network, nodes) = bootstrapped_network(3, 2800, Config::default()).await;

    let key = Id::rand();
    let too_large = Bytes::from(vec![0u8; MAX_VALUE_LEN + 1]);
    assert!(matches!(
        nodes[1].publish(key, too_large.clone()).await,
        Err(RpcError::ValueTooLarge(len)) if len == MAX_VALUE_LEN + 1
    ));
    assert!(matches!(
        nodes[1].store_value_for_key(key, too_large),
        Err(RpcError::ValueTooLarge(_))
    ));

    let largest = Bytes::from(vec![1u8; MAX_VALUE_LEN]);
    assert_eq!(nodes[1].publish(key, largest.clone()).await.unwrap(), 2);
    assert_eq!(nodes[2].value_for_key(key).await, Some(largest));
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_table_refreshes_stale_buckets() {
    let (_network, nodes) = bootstrapped_network(5, 2300, Config::default()).await;

    // Nothing has aged yet.
    assert_eq!(nodes[1].refresh_table().await, 0);

    let network = Network::new();
    let config = Config {
        bucket_refresh_age: time::Duration::ZERO,
        ..Default::default()
    };
    let a = network.spawn_node(Id::rand(), 2400, config);
    let b = network.spawn_node(Id::rand(), 2401, Config::default());
    a.add_contact(b.local_addr()).await.unwrap();

    // Every bucket is due.
    assert_eq!(a.refresh_table().await, Id::BITS);
}

#[tokio::test(flavor = "multi_thread")]
async fn maintenance_discovers_neighbours() {
    let config = Config {
        maintenance_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let (_network, nodes) = bootstrapped_network(8, 2500, config).await;

    let node = nodes[4].clone();
    assert_eq!(node.routing_table().len(), 1);

    let handle = node.spawn_maintenance();
    deadline!(Duration::from_secs(3), move || node.routing_table().len() == 7);

    handle.abort();
}
