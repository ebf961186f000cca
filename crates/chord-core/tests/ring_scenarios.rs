//! Multi-node ring scenarios (spec.md §8, S1-S6), run over real UDP
//! sockets on loopback. Grounded on the teacher's integration-test style
//! of standing up several real `Node`s on a multi-threaded `tokio::test`
//! runtime rather than mocking the transport.

use chord_core::ring::node::Config;
use chord_core::ring::Node;
use std::time::Duration;

fn fast_config() -> Config {
    Config {
        stabilize_period: Duration::from_millis(20),
        fix_fingers_period: Duration::from_millis(20),
        check_predecessor_period: Duration::from_millis(20),
        rpc_timeout: Duration::from_millis(200),
        successor_list_len: 4,
    }
}

/// Drives `fix_fingers` fast enough to sweep the whole finger table
/// (`chord_core::ID_BITS` round-robin ticks) within a test's patience.
fn fast_finger_config() -> Config {
    Config {
        fix_fingers_period: Duration::from_millis(5),
        ..fast_config()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(400)).await;
}

/// S1: a single node forms a ring of one and is its own successor.
#[tokio::test(flavor = "multi_thread")]
async fn s1_single_node_ring_is_self_referential() {
    let node = Node::create("127.0.0.1:0".parse().unwrap(), fast_config())
        .await
        .unwrap();
    let successor = node.lookup(node.id()).await.unwrap();
    assert_eq!(successor.id, node.id());
}

/// S2: a second node joining a one-node ring is reachable from the first
/// via lookup once stabilization runs.
#[tokio::test(flavor = "multi_thread")]
async fn s2_second_node_becomes_reachable_after_join() {
    let root = Node::create("127.0.0.1:0".parse().unwrap(), fast_config())
        .await
        .unwrap();
    let root_addr = root.local_addr().unwrap();

    let joiner = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_config())
        .await
        .unwrap();
    let joiner_id = joiner.id();

    settle().await;

    let resolved = root.lookup(joiner_id).await.unwrap();
    assert_eq!(resolved.id, joiner_id);
}

/// S3: with three nodes joined to the same root, every node's lookup of
/// every other node's id resolves to that exact node (ring fully
/// converged).
#[tokio::test(flavor = "multi_thread")]
async fn s3_three_node_ring_converges_and_lookups_agree() {
    let root = Node::create("127.0.0.1:0".parse().unwrap(), fast_config())
        .await
        .unwrap();
    let root_addr = root.local_addr().unwrap();

    let b = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_config())
        .await
        .unwrap();
    let c = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_config())
        .await
        .unwrap();

    settle().await;
    settle().await;

    let nodes = [(&root, root.id()), (&b, b.id()), (&c, c.id())];
    for (looking, _) in &nodes {
        for (_, target_id) in &nodes {
            let resolved = looking.lookup(*target_id).await.unwrap();
            assert_eq!(
                resolved.id, *target_id,
                "lookup of {target_id:016x} from node {:016x} should resolve exactly",
                looking.id()
            );
        }
    }
}

/// S4: killing a live successor (not the whole ring's only path) triggers
/// the drop-head/promote-next failover in `stabilize`/`fix_successor_list`,
/// and lookups keep resolving once the ring re-converges (spec.md §4.6,
/// churn tolerance).
#[tokio::test(flavor = "multi_thread")]
async fn s4_successor_failure_triggers_failover() {
    let root = Node::create("127.0.0.1:0".parse().unwrap(), fast_config())
        .await
        .unwrap();
    let root_addr = root.local_addr().unwrap();

    let b = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_config())
        .await
        .unwrap();
    let c = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_config())
        .await
        .unwrap();

    settle().await;
    settle().await;

    let dead_id = root.state.successor().id;
    assert!(root.state.successor_list().len() >= 2, "need a standby successor to fail over to");

    if b.id() == dead_id {
        drop(b);
    } else {
        assert_eq!(c.id(), dead_id);
        drop(c);
    }

    // Give stabilize/fix_successor_list several ticks to notice and fail over.
    settle().await;
    settle().await;
    settle().await;

    assert_ne!(
        root.state.successor().id,
        dead_id,
        "root should have failed over away from the dead successor"
    );
    let resolved = root.lookup(root.id()).await.unwrap();
    assert_ne!(resolved.id, dead_id, "lookups should no longer resolve to the dead node");
}

/// S5: a predecessor that crashes is cleared by `check_predecessor`, and a
/// fresh node joining afterwards re-establishes the predecessor slot via
/// `notify` (spec.md §4.6).
#[tokio::test(flavor = "multi_thread")]
async fn s5_predecessor_crash_then_notify_reestablishes() {
    let root = Node::create("127.0.0.1:0".parse().unwrap(), fast_config())
        .await
        .unwrap();
    let root_addr = root.local_addr().unwrap();

    let joiner = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_config())
        .await
        .unwrap();
    settle().await;

    // In a two-node ring the joiner becomes root's predecessor.
    assert_eq!(root.state.predecessor().map(|p| p.id), Some(joiner.id()));

    drop(joiner);
    settle().await;
    settle().await;

    assert!(root.state.predecessor().is_none());

    let replacement = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_config())
        .await
        .unwrap();
    settle().await;

    assert_eq!(root.state.predecessor().map(|p| p.id), Some(replacement.id()));
}

/// S6: after a full round-robin sweep of `fix_fingers`, every populated
/// finger table entry agrees with an independent `find_successor` lookup
/// for the same target id (spec.md §8.2's testable property, finger_table[i]
/// == find_successor(self.id + 2^i)).
#[tokio::test(flavor = "multi_thread")]
async fn s6_finger_table_matches_find_successor_after_full_sweep() {
    let root = Node::create("127.0.0.1:0".parse().unwrap(), fast_finger_config())
        .await
        .unwrap();
    let root_addr = root.local_addr().unwrap();

    let _b = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_finger_config())
        .await
        .unwrap();
    let _c = Node::join("127.0.0.1:0".parse().unwrap(), root_addr, fast_finger_config())
        .await
        .unwrap();

    settle().await;
    // One full round-robin sweep takes ID_BITS ticks at 5ms each; give it
    // generous headroom on top of ring convergence.
    let sweep_budget = Duration::from_millis(chord_core::ID_BITS as u64 * 5 + 500);
    tokio::time::sleep(sweep_budget).await;

    let fingers = root.state.fingers();
    assert_eq!(fingers.len(), chord_core::ID_BITS as usize);
    for (i, nd) in fingers {
        let target = root.id().wrapping_add(1u64 << i);
        let resolved = root.lookup(target).await.unwrap();
        assert_eq!(
            nd.id, resolved.id,
            "finger_table[{i}] should match find_successor(self.id + 2^{i})"
        );
    }
}
