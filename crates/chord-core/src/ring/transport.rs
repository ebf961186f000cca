//! UDP RPC transport (spec.md §4.4, C4).
//!
//! Grounded on `vl1-service/src/sys/udp.rs` for the `tokio::net::UdpSocket`
//! wrapping style, and on the teacher's pervasive `DashMap` usage (e.g.
//! `Node::paths`/`Node::peers`) for a lock-free concurrent table of
//! in-flight calls keyed by correlation id. The `Continuation` variant has
//! no teacher analogue — it is this crate's answer to spec.md §4.5's
//! requirement that a forwarded `find_successor` never block the receive
//! loop: instead of awaiting a reply inline, the handler registers where
//! the eventual reply should be forwarded and returns immediately.

use super::codec::{Frame, Message};
use super::node_descriptor::NodeDescriptor;
use crate::error::{ChordError, Result};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// What to do when a reply with a given correlation id arrives.
enum PendingCall {
    /// A local caller is awaiting the reply directly.
    Await(oneshot::Sender<Frame>),
    /// Forward the reply to `reply_to`, re-tagged with `reply_correlation_id`
    /// — the continuation of a recursive lookup forwarded on this node's
    /// behalf (spec.md §4.5).
    Continuation {
        reply_to: SocketAddr,
        reply_correlation_id: u64,
    },
}

/// A pending call plus when it was registered, so [`Transport::sweep_expired`]
/// can resolve it to `Timeout` once it outlives `rpc_timeout` — the only
/// cleanup mechanism a `Continuation` entry has, since nothing is `.await`ing
/// it directly the way an `Await` caller's own `tokio::time::timeout` does.
struct PendingEntry {
    call: PendingCall,
    registered_at: Instant,
}

/// Owns the UDP socket and the table of in-flight RPC calls.
pub struct Transport {
    socket: Arc<UdpSocket>,
    pending: DashMap<u64, PendingEntry>,
    next_correlation_id: AtomicU64,
    pub rpc_timeout: Duration,
}

impl Transport {
    pub async fn bind(addr: SocketAddr, rpc_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            pending: DashMap::new(),
            next_correlation_id: AtomicU64::new(1),
            rpc_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn fresh_correlation_id(&self) -> u64 {
        self.next_correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends `body` to `to` and awaits the matching reply, subject to
    /// `self.rpc_timeout`. This is the primitive every maintenance task and
    /// every synchronous handler path (GET_PREDECESSOR, GET_SUCCESSOR_LIST,
    /// CHECK_PREDECESSOR) uses.
    pub async fn call(&self, to: NodeDescriptor, body: Message) -> Result<Frame> {
        let correlation_id = self.fresh_correlation_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            correlation_id,
            PendingEntry {
                call: PendingCall::Await(tx),
                registered_at: Instant::now(),
            },
        );

        let frame = Frame::new(correlation_id, body);
        if let Err(e) = self
            .socket
            .send_to(&frame.marshal(), to.socket_addr())
            .await
        {
            self.pending.remove(&correlation_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.rpc_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ChordError::Timeout), // sender dropped: sweep already reclaimed it
            Err(_) => {
                self.pending.remove(&correlation_id);
                Err(ChordError::Timeout)
            }
        }
    }

    /// Sends a request under a caller-chosen correlation id without
    /// registering a local `Await` — used when forwarding a lookup on
    /// another requester's behalf, where [`Self::register_continuation`]
    /// already recorded where the eventual reply should go.
    pub async fn call_fire_and_forget(
        &self,
        to: NodeDescriptor,
        correlation_id: u64,
        body: Message,
    ) -> Result<()> {
        let frame = Frame::new(correlation_id, body);
        self.socket
            .send_to(&frame.marshal(), to.socket_addr())
            .await?;
        Ok(())
    }

    /// Sends a one-way message with no reply expected (NOTIFY).
    pub async fn send_oneway(&self, to: NodeDescriptor, body: Message) -> Result<()> {
        let correlation_id = self.fresh_correlation_id();
        let frame = Frame::new(correlation_id, body);
        self.socket
            .send_to(&frame.marshal(), to.socket_addr())
            .await?;
        Ok(())
    }

    /// Sends a reply frame directly to `to` under `correlation_id`, used by
    /// handlers replying to an inbound request and by the continuation
    /// dispatch in [`Self::dispatch_reply`].
    pub async fn reply(&self, to: SocketAddr, correlation_id: u64, body: Message) -> Result<()> {
        let frame = Frame::new(correlation_id, body);
        self.socket.send_to(&frame.marshal(), to).await?;
        Ok(())
    }

    /// Registers a forwarding continuation for the next reply that arrives
    /// under a fresh correlation id, returning that id to embed in the
    /// forwarded request.
    pub fn register_continuation(&self, reply_to: SocketAddr, reply_correlation_id: u64) -> u64 {
        let correlation_id = self.fresh_correlation_id();
        self.pending.insert(
            correlation_id,
            PendingEntry {
                call: PendingCall::Continuation {
                    reply_to,
                    reply_correlation_id,
                },
                registered_at: Instant::now(),
            },
        );
        correlation_id
    }

    /// Routes an inbound frame that matches a pending call: completes an
    /// `Await` or forwards to a `Continuation`'s original requester. Returns
    /// `true` if the frame was consumed this way; `false` means it is
    /// unsolicited and should go to the request handlers instead.
    pub async fn dispatch_reply(&self, frame: Frame) -> bool {
        let Some((_, entry)) = self.pending.remove(&frame.correlation_id) else {
            return false;
        };
        match entry.call {
            PendingCall::Await(tx) => {
                let _ = tx.send(frame);
            }
            PendingCall::Continuation {
                reply_to,
                reply_correlation_id,
            } => {
                let _ = self.reply(reply_to, reply_correlation_id, frame.body).await;
            }
        }
        true
    }

    /// Receives one raw datagram. Decode errors are surfaced to the caller
    /// rather than silently dropped, so the event loop can log them.
    pub async fn recv_frame(&self) -> Result<(Frame, SocketAddr)> {
        let mut buf = [0u8; 2048];
        let (n, from) = self.socket.recv_from(&mut buf).await?;
        let frame = Frame::unmarshal(&buf[..n])?;
        Ok((frame, from))
    }

    /// Drops every pending entry older than `self.rpc_timeout` (SPEC_FULL.md
    /// §4.4): dropping an `Await` sender fails the waiter's `.await` with
    /// `Timeout` if `call()`'s own `tokio::time::timeout` hasn't already
    /// fired; dropping a `Continuation` has nothing to notify upstream —
    /// the original forwarder's own pending entry for this hop will itself
    /// expire the same way, propagating the failure back along the chain.
    /// `Continuation` entries have no other expiry path, so without this
    /// sweep a downstream node that never replies leaks one entry per
    /// forwarded lookup forever.
    pub fn sweep_expired(&self) {
        let timeout = self.rpc_timeout;
        self.pending
            .retain(|_, entry| entry.registered_at.elapsed() < timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn local_nd(port: u16) -> NodeDescriptor {
        NodeDescriptor::new(Ipv4Addr::new(127, 0, 0, 1), port)
    }

    #[tokio::test]
    async fn call_round_trips_through_a_real_socket() {
        let server = Transport::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(500))
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let server_nd = NodeDescriptor::new(
            match server_addr.ip() {
                std::net::IpAddr::V4(v4) => v4,
                _ => unreachable!(),
            },
            server_addr.port(),
        );

        let client = Arc::new(
            Transport::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(500))
                .await
                .unwrap(),
        );
        let client_recv = Arc::clone(&client);
        tokio::spawn(async move {
            loop {
                let Ok((frame, _from)) = client_recv.recv_frame().await else {
                    return;
                };
                client_recv.dispatch_reply(frame).await;
            }
        });

        let server_task = tokio::spawn(async move {
            let (frame, from) = server.recv_frame().await.unwrap();
            assert_eq!(frame.body, Message::GetPredecessorRequest);
            server
                .reply(
                    from,
                    frame.correlation_id,
                    Message::GetPredecessorResponse {
                        predecessor: Some(local_nd(9999)),
                    },
                )
                .await
                .unwrap();
        });

        let reply = client
            .call(server_nd, Message::GetPredecessorRequest)
            .await
            .unwrap();
        assert_eq!(
            reply.body,
            Message::GetPredecessorResponse {
                predecessor: Some(local_nd(9999))
            }
        );
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn call_times_out_when_nobody_answers() {
        let client = Transport::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(50))
            .await
            .unwrap();
        // Bind a socket that never replies, just to have a valid address.
        let silent = Transport::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(50))
            .await
            .unwrap();
        let silent_addr = silent.local_addr().unwrap();
        let silent_nd = NodeDescriptor::new(
            match silent_addr.ip() {
                std::net::IpAddr::V4(v4) => v4,
                _ => unreachable!(),
            },
            silent_addr.port(),
        );

        let err = client
            .call(silent_nd, Message::CheckPredecessorRequest)
            .await
            .unwrap_err();
        assert!(matches!(err, ChordError::Timeout));
    }

    #[tokio::test]
    async fn sweep_expired_reclaims_stale_continuations() {
        let transport = Transport::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(20))
            .await
            .unwrap();
        transport.register_continuation("127.0.0.1:1".parse().unwrap(), 7);
        assert_eq!(transport.pending.len(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        transport.sweep_expired();
        assert_eq!(transport.pending.len(), 0);
    }

    #[tokio::test]
    async fn sweep_expired_leaves_fresh_entries_alone() {
        let transport = Transport::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(500))
            .await
            .unwrap();
        transport.register_continuation("127.0.0.1:1".parse().unwrap(), 7);
        transport.sweep_expired();
        assert_eq!(transport.pending.len(), 1);
    }
}
