//! Replica Module Tests
//!
//! ## Test Scopes
//! - **Addresses**: parsing and display of `host:port` pairs.
//! - **Line hygiene**: embedded line breaks never reach the wire.
//! - **Handle lifecycle**: open, request, reconnect-and-retry, timeout, close.
//! - **Serialization**: concurrent callers on one handle get their own replies.

#[cfg(test)]
mod tests {
    use crate::replica::connection::single_line;
    use crate::replica::handle::ReplicaHandle;
    use crate::replica::types::{ReplicaAddr, ReplicaError, ReplicaOptions};
    use crate::test_support::{MockReplica, Reply, line, unreachable_addr};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::net::{TcpSocket, TcpStream};

    fn fast_options() -> ReplicaOptions {
        ReplicaOptions {
            connect_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_millis(300),
            ..ReplicaOptions::default()
        }
    }

    // ============================================================
    // ADDRESS TESTS
    // ============================================================

    #[test]
    fn test_parse_replica_addr() {
        let addr: ReplicaAddr = "worker-1:8081".parse().unwrap();
        assert_eq!(addr.host, "worker-1");
        assert_eq!(addr.port, 8081);
        assert_eq!(addr.to_string(), "worker-1:8081");
    }

    #[test]
    fn test_parse_replica_addr_trims_and_accepts_ipv6_brackets() {
        let addr: ReplicaAddr = "  [::1]:9000 ".parse().unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, 9000);
    }

    #[test]
    fn test_parse_replica_addr_rejects_garbage() {
        assert!("localhost".parse::<ReplicaAddr>().is_err());
        assert!(":8081".parse::<ReplicaAddr>().is_err());
        assert!("host:notaport".parse::<ReplicaAddr>().is_err());
        assert!("host:70000".parse::<ReplicaAddr>().is_err());
        assert!("host:0".parse::<ReplicaAddr>().is_err());
    }

    #[test]
    fn test_single_line_strips_breaks() {
        assert_eq!(single_line("BUY a\r\nb\nc"), "BUY abc");
        assert_eq!(single_line("PING"), "PING");
    }

    // ============================================================
    // HANDLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_open_fails_for_unreachable_replica() {
        let addr = unreachable_addr().await;
        let result = ReplicaHandle::open(addr, fast_options()).await;

        assert!(matches!(result, Err(ReplicaError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let replica = MockReplica::spawn(|request| line(&format!("echo {}", request))).await;
        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();

        let reply = handle.request("GET_STORE_DETAILS Pizza\nFun").await.unwrap();
        assert_eq!(reply, "echo GET_STORE_DETAILS PizzaFun");
        assert!(handle.stats().connected);
    }

    #[tokio::test]
    async fn test_ping_expects_pong() {
        let replica = MockReplica::fixed("whatever").await;
        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();
        assert!(handle.ping().await.unwrap());

        let rude = MockReplica::spawn(|_| line("NOPE")).await;
        let handle = ReplicaHandle::open(rude.addr.clone(), fast_options())
            .await
            .unwrap();
        assert!(!handle.ping().await.unwrap());
    }

    #[tokio::test]
    async fn test_severed_socket_reconnects_once_silently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let replica = MockReplica::spawn(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::LineThenClose("first".to_string())
            } else {
                line("second")
            }
        })
        .await;

        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();

        assert_eq!(handle.request("A").await.unwrap(), "first");
        // The replica hung up after answering; this request must transparently reconnect.
        assert_eq!(handle.request("B").await.unwrap(), "second");

        assert_eq!(replica.accepted(), 2);
        let stats = handle.stats();
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_retry_failure_is_propagated_after_one_reconnect() {
        let replica = MockReplica::spawn(|_| Reply::Close).await;
        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();

        let result = handle.request("BUY x").await;
        assert!(result.is_err());

        // Original socket plus exactly one reconnect.
        assert_eq!(replica.accepted(), 2);
        assert_eq!(replica.requests(), 2);

        let stats = handle.stats();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.failures, 1);
        assert!(!stats.connected);
    }

    #[tokio::test]
    async fn test_request_timeout_counts_as_failure() {
        let replica = MockReplica::spawn(|_| Reply::Hang).await;
        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();

        let result = handle.request("GET_SALES_BY_PRODUCT pizza").await;
        assert!(matches!(result, Err(ReplicaError::Timeout { .. })));

        let stats = handle.stats();
        assert_eq!(stats.timeouts, 2);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_waiting_for_a_busy_handle_is_bounded() {
        let replica = MockReplica::spawn(|_| Reply::Hang).await;
        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();

        let holder = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.request("A").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let queued = handle.request("B").await;
        let waited = started.elapsed();

        assert!(matches!(queued, Err(ReplicaError::Timeout { .. })));
        assert!(waited < Duration::from_millis(500), "waited {:?}", waited);
        assert!(holder.await.unwrap().is_err());

        // "B" never reached the wire.
        assert_eq!(replica.requests(), 2);
        let stats = handle.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.timeouts, 3);
        assert_eq!(stats.failures, 2);
    }

    #[tokio::test]
    async fn test_connect_timeout_is_counted() {
        // A listener that never accepts: once its queue is full, further SYNs go unanswered.
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let local = listener.local_addr().unwrap();

        let mut queued = Vec::new();
        for _ in 0..4 {
            if let Ok(Ok(stream)) =
                tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(local)).await
            {
                queued.push(stream);
            }
        }

        let options = ReplicaOptions {
            connect_timeout: Duration::from_millis(200),
            ..fast_options()
        };
        let handle = ReplicaHandle::detached(ReplicaAddr::new("127.0.0.1", local.port()), options);

        let result = handle.request("PING").await;
        assert!(matches!(result, Err(ReplicaError::Timeout { .. })));

        let stats = handle.stats();
        assert_eq!(stats.timeouts, 2);
        assert_eq!(stats.failures, 1);
        drop(listener);
    }

    #[tokio::test]
    async fn test_oversized_reply_is_rejected() {
        let replica = MockReplica::fixed(&"x".repeat(64)).await;
        let options = ReplicaOptions {
            max_reply_bytes: 16,
            ..fast_options()
        };
        let handle = ReplicaHandle::detached(replica.addr.clone(), options);

        let result = handle.request("FILTER_STORES x").await;
        assert!(matches!(result, Err(ReplicaError::Oversized { limit: 16, .. })));

        let stats = handle.stats();
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.timeouts, 0);
    }

    #[tokio::test]
    async fn test_detached_handle_connects_on_first_request() {
        let replica = MockReplica::fixed("[]").await;
        let handle = ReplicaHandle::detached(replica.addr.clone(), fast_options());
        assert!(!handle.stats().connected);

        assert_eq!(handle.request("FILTER_STORES x").await.unwrap(), "[]");
        assert_eq!(replica.accepted(), 1);
        assert!(handle.stats().connected);
    }

    #[tokio::test]
    async fn test_connect_falls_back_to_detached() {
        let addr = unreachable_addr().await;
        let handle = ReplicaHandle::connect(addr, fast_options()).await;

        assert!(!handle.stats().connected);
        assert!(handle.request("PING").await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let replica = MockReplica::fixed("ok").await;
        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();
        // A completed exchange means the replica has accepted the socket.
        assert_eq!(handle.request("PING").await.unwrap(), "PONG");

        handle.close().await;
        handle.close().await;

        assert!(handle.is_closed());
        assert!(matches!(
            handle.request("PING").await,
            Err(ReplicaError::NotConnected { .. })
        ));
        assert_eq!(replica.accepted(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_serialized() {
        let replica = MockReplica::spawn(|request| line(&format!("re:{}", request))).await;
        let handle = ReplicaHandle::open(replica.addr.clone(), fast_options())
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..32 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let request = format!("REQ{}", i);
                let reply = handle.request(&request).await.unwrap();
                (request, reply)
            }));
        }

        for task in tasks {
            let (request, reply) = task.await.unwrap();
            assert_eq!(reply, format!("re:{}", request));
        }
        assert_eq!(replica.accepted(), 1);
    }
}
