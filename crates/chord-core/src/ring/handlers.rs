//! Inbound message dispatch (spec.md §4.7, C7).
//!
//! Grounded on `vl1::peer::Peer`'s `match verb { VERB_VL1_HELLO => ..., ... }`
//! receive-side dispatch: one function per verb, called from the event
//! loop after decode. `START_FIND_SUCCESSOR_REQUEST` is the one handler
//! that may not reply immediately — when this node is not responsible for
//! the queried id, it registers a [`Transport`] continuation and forwards
//! the request on, per spec.md §4.5's non-blocking forwarding requirement.

use super::codec::Message;
use super::lookup;
use super::node_descriptor::NodeDescriptor;
use super::state::RingState;
use super::transport::Transport;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Shared handles every handler needs: the node's own ring state and the
/// transport to reply or forward through.
pub struct HandlerContext {
    pub state: Arc<RingState>,
    pub transport: Arc<Transport>,
}

/// Dispatches one already-decoded request to its handler. Replies, where
/// required, are fire-and-forget: a dropped reply degrades to the caller's
/// RPC timeout, which is the correct recovery path (spec.md §4.4).
pub async fn handle_request(
    ctx: &HandlerContext,
    correlation_id: u64,
    from: SocketAddr,
    body: Message,
) {
    match body {
        Message::Notify { predecessor } => handle_notify(ctx, predecessor),
        Message::GetPredecessorRequest => {
            let predecessor = ctx.state.predecessor();
            let _ = ctx
                .transport
                .reply(
                    from,
                    correlation_id,
                    Message::GetPredecessorResponse { predecessor },
                )
                .await;
        }
        Message::GetSuccessorListRequest => {
            let successors = ctx.state.successor_list();
            let _ = ctx
                .transport
                .reply(
                    from,
                    correlation_id,
                    Message::GetSuccessorListResponse { successors },
                )
                .await;
        }
        Message::StartFindSuccessorRequest { id } => {
            handle_start_find_successor(ctx, correlation_id, from, id).await;
        }
        Message::CheckPredecessorRequest => {
            let _ = ctx
                .transport
                .reply(from, correlation_id, Message::CheckPredecessorResponse)
                .await;
        }
        // Responses arrive here only if `Transport::dispatch_reply` found no
        // matching pending call (e.g. a very late reply after timeout); log
        // and drop rather than treat as a protocol error.
        Message::GetPredecessorResponse { .. }
        | Message::GetSuccessorListResponse { .. }
        | Message::StartFindSuccessorResponse { .. }
        | Message::CheckPredecessorResponse => {
            trace!(?from, correlation_id, "dropping unmatched response");
        }
    }
}

fn handle_notify(ctx: &HandlerContext, candidate: NodeDescriptor) {
    let self_id = ctx.state.self_descriptor.id;
    let should_adopt = match ctx.state.predecessor() {
        None => true,
        Some(current) => super::identifier::in_ring(candidate.id, current.id, self_id, false),
    };
    if should_adopt {
        debug!(candidate_id = candidate.id, "adopting new predecessor");
        ctx.state.set_predecessor(Some(candidate));
    }
}

async fn handle_start_find_successor(
    ctx: &HandlerContext,
    correlation_id: u64,
    from: SocketAddr,
    id: u64,
) {
    if let Some(successor) = lookup::responsible_for(&ctx.state, id) {
        let _ = ctx
            .transport
            .reply(
                from,
                correlation_id,
                Message::StartFindSuccessorResponse { successor },
            )
            .await;
        return;
    }

    let next = lookup::next_hop(&ctx.state, id);
    if next.id == ctx.state.self_descriptor.id {
        // No better hop known; answer with our own successor rather than
        // forwarding to ourselves, which would loop forever.
        warn!(id, "closest_preceding_node returned self, answering directly");
        let _ = ctx
            .transport
            .reply(
                from,
                correlation_id,
                Message::StartFindSuccessorResponse {
                    successor: ctx.state.successor(),
                },
            )
            .await;
        return;
    }

    let forwarded_correlation_id = ctx.transport.register_continuation(from, correlation_id);
    if ctx
        .transport
        .call_fire_and_forget(next, forwarded_correlation_id, Message::StartFindSuccessorRequest { id })
        .await
        .is_err()
    {
        warn!(?next, id, "failed to forward find_successor");
    }
}
