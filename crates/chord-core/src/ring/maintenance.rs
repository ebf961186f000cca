//! Periodic ring-maintenance tasks (spec.md §4.6, C6).
//!
//! Grounded on `original_source/src/chord_impl.c`'s `stabilize()`,
//! `fix_successor_list()`, `fix_fingers()`, and `check_predecessor()` for
//! the algorithms themselves; grounded on the teacher's
//! `Node::do_background_tasks` for running each as its own scheduled loop
//! rather than one monolithic tick function — here expressed as one
//! `tokio::time::interval`-driven task per maintenance duty instead of a
//! single-threaded gate check, since spec.md explicitly allows a
//! multi-task implementation as long as state mutation stays serialized
//! per field (enforced by [`super::state::RingState`]'s per-field locks).

use super::codec::Message;
use super::identifier::in_ring;
use super::lookup;
use super::node_descriptor::NodeDescriptor;
use super::state::RingState;
use super::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Asks our successor for its predecessor; if that predecessor lies
/// strictly between us and our successor, adopt it as our new successor,
/// then notify whoever is now our successor that we might be its
/// predecessor. If the successor doesn't answer at all, this is itself a
/// failure signal and triggers the same failover as `fix_successor_list`
/// (spec.md §4.6) rather than silently notifying a dead node.
pub async fn stabilize(state: &RingState, transport: &Transport, max_len: usize) {
    let successor = state.successor();
    if successor.id == state.self_descriptor.id {
        // Single-node ring: nothing to stabilize against but ourselves.
        let _ = transport
            .send_oneway(
                successor,
                Message::Notify {
                    predecessor: state.self_descriptor,
                },
            )
            .await;
        return;
    }

    let candidate = match transport.call(successor, Message::GetPredecessorRequest).await {
        Ok(frame) => match frame.body {
            Message::GetPredecessorResponse { predecessor } => predecessor,
            _ => {
                warn!("stabilize: unexpected response type from successor");
                None
            }
        },
        Err(e) => {
            trace!(?e, "stabilize: successor unreachable, failing over");
            handle_successor_failure(state, transport, max_len).await;
            return;
        }
    };

    let mut effective_successor = successor;
    if let Some(candidate) = candidate {
        if in_ring(candidate.id, state.self_descriptor.id, successor.id, false) {
            debug!(candidate_id = candidate.id, "stabilize: adopting new successor");
            let mut list = state.successor_list();
            list.insert(0, candidate);
            state.set_successor_list(list, super::protocol::MAX_SUCCESSOR_LIST_LEN);
            effective_successor = candidate;
        }
    }

    let _ = transport
        .send_oneway(
            effective_successor,
            Message::Notify {
                predecessor: state.self_descriptor,
            },
        )
        .await;
}

/// Refreshes the successor list by asking the immediate successor for its
/// own list and prepending that successor to it, then truncating to
/// `max_len`. Mirrors `original_source/src/chord_impl.c`'s
/// `fix_successor_list`, but fixes the tag/length bug flagged in spec.md
/// §9: the request uses its own `GET_SUCCESSOR_LIST_REQUEST` tag, not a
/// reused `find_successor_request`, and the response length is an explicit
/// count byte rather than a raw pointer size.
pub async fn fix_successor_list(state: &RingState, transport: &Transport, max_len: usize) {
    let successor = state.successor();
    if successor.id == state.self_descriptor.id {
        return;
    }

    match transport.call(successor, Message::GetSuccessorListRequest).await {
        Ok(frame) => match frame.body {
            Message::GetSuccessorListResponse { successors } => {
                let mut list = vec![successor];
                list.extend(successors);
                list.dedup_by_key(|nd| nd.id);
                state.set_successor_list(list, max_len);
            }
            _ => warn!("fix_successor_list: unexpected response type"),
        },
        Err(e) => {
            trace!(?e, "fix_successor_list: successor unreachable, failing over");
            handle_successor_failure(state, transport, max_len).await;
        }
    }
}

/// Successor failover (spec.md §4.6): drop `successor_list[0]` and promote
/// `successor_list[1]` if present; if the list is now exhausted (we were
/// only ever tracking the now-dead node), fall back to being our own
/// successor and attempt to re-join the ring through the bootstrap node we
/// originally joined via.
async fn handle_successor_failure(state: &RingState, transport: &Transport, max_len: usize) {
    let mut list = state.successor_list();
    if !list.is_empty() {
        list.remove(0);
    }

    if list.is_empty() {
        warn!("successor list exhausted, falling back to self and re-joining via bootstrap");
        state.set_successor_list(vec![state.self_descriptor], max_len);
        rejoin_via_bootstrap(state, transport, max_len).await;
    } else {
        debug!(
            new_successor_id = list[0].id,
            "promoted next successor-list entry after failure"
        );
        state.set_successor_list(list, max_len);
    }
}

/// Re-contacts the node this one originally joined through and asks it for
/// the successor of our own id, the same request `Node::join` makes
/// initially (spec.md §4.6's "re-join via the bootstrap list"). A no-op if
/// this node was created fresh and has no bootstrap, or if the bootstrap
/// itself doesn't answer — the next `fix_successor_list` tick retries.
async fn rejoin_via_bootstrap(state: &RingState, transport: &Transport, max_len: usize) {
    let Some(bootstrap) = state.bootstrap() else {
        return;
    };
    match transport
        .call(
            bootstrap,
            Message::StartFindSuccessorRequest {
                id: state.self_descriptor.id,
            },
        )
        .await
    {
        Ok(frame) => match frame.body {
            Message::StartFindSuccessorResponse { successor } => {
                info!(successor_id = successor.id, "re-joined ring via bootstrap");
                state.set_successor_list(vec![successor], max_len);
            }
            _ => warn!("rejoin: unexpected response type from bootstrap"),
        },
        Err(e) => trace!(?e, "rejoin: bootstrap unreachable"),
    }
}

/// Refreshes one entry of the finger table per call, round-robin, per
/// `original_source/src/chord_impl.c`'s `fixIndex` cursor.
pub async fn fix_fingers(state: &RingState, transport: &Transport) {
    let i = state.next_finger_index();
    let offset: u64 = 1u64.checked_shl(i as u32).unwrap_or(0);
    let target_id = state.self_descriptor.id.wrapping_add(offset);

    match find_successor_via_network(state, transport, target_id).await {
        Ok(nd) => state.set_finger(i, nd),
        Err(e) => {
            trace!(?e, i, "fix_fingers: lookup failed");
            state.observer().on_lookup_failed(target_id);
        }
    }
}

/// Drives a `find_successor` lookup starting from our own local state,
/// forwarding over the network via `START_FIND_SUCCESSOR_REQUEST` whenever
/// we are not responsible ourselves. Used by `fix_fingers` and by the
/// externally exposed `Node::lookup` client API (spec.md §4.9).
pub async fn find_successor_via_network(
    state: &RingState,
    transport: &Transport,
    id: u64,
) -> crate::error::Result<NodeDescriptor> {
    if let Some(successor) = lookup::responsible_for(state, id) {
        return Ok(successor);
    }
    let next = lookup::next_hop(state, id);
    let reply = transport
        .call(next, Message::StartFindSuccessorRequest { id })
        .await?;
    match reply.body {
        Message::StartFindSuccessorResponse { successor } => Ok(successor),
        _ => Err(crate::error::ChordError::LookupFailed),
    }
}

/// Pings the current predecessor; if it fails to answer, it is presumed
/// dead and cleared so `notify` can replace it (spec.md §4.6).
pub async fn check_predecessor(state: &RingState, transport: &Transport) {
    let Some(predecessor) = state.predecessor() else {
        return;
    };
    if transport
        .call(predecessor, Message::CheckPredecessorRequest)
        .await
        .is_err()
    {
        debug!(predecessor_id = predecessor.id, "check_predecessor: presumed dead, clearing");
        state.set_predecessor(None);
    }
}

/// Spawns the five maintenance loops as independent tokio tasks, each
/// ticking at its own configured period (spec.md §6's `--ts`, `--tcp`,
/// `--tff` flags; fix_successor_list shares `--ts`'s cadence per spec.md
/// §4.6). The fifth sweeps timed-out pending RPC entries every 100ms
/// (SPEC_FULL.md §4.4) so a downstream node that never replies to a
/// forwarded lookup doesn't leak a [`super::transport::PendingCall`]
/// forever.
pub fn spawn_maintenance_tasks(
    state: Arc<RingState>,
    transport: Arc<Transport>,
    stabilize_period: Duration,
    fix_fingers_period: Duration,
    check_predecessor_period: Duration,
    successor_list_len: usize,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::with_capacity(5);

    {
        let state = state.clone();
        let transport = transport.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(stabilize_period);
            loop {
                interval.tick().await;
                stabilize(&state, &transport, successor_list_len).await;
            }
        }));
    }
    {
        let state = state.clone();
        let transport = transport.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(stabilize_period);
            loop {
                interval.tick().await;
                fix_successor_list(&state, &transport, successor_list_len).await;
            }
        }));
    }
    {
        let state = state.clone();
        let transport = transport.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(fix_fingers_period);
            loop {
                interval.tick().await;
                fix_fingers(&state, &transport).await;
            }
        }));
    }
    {
        let state = state.clone();
        let transport = transport.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_predecessor_period);
            loop {
                interval.tick().await;
                check_predecessor(&state, &transport).await;
            }
        }));
    }
    {
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            loop {
                interval.tick().await;
                transport.sweep_expired();
            }
        }));
    }

    handles
}
