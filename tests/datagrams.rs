//! End-to-end datagram behavior over the loopback link.

#![cfg(feature = "loopback")]

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{init_tracing, spawn_echo, within};
use webtransport_datagrams::prelude::*;
use webtransport_datagrams::transport::loopback;

fn config(outgoing: usize, incoming: usize) -> SessionConfig {
    SessionConfigBuilder::new()
        .outgoing_high_water_mark(outgoing)
        .incoming_high_water_mark(incoming)
        .build()
        .unwrap()
}

fn echo_pair(client_config: SessionConfig) -> Session {
    let (client, server) = loopback::pair();
    let server = Session::open(server, SessionConfig::default()).unwrap();
    spawn_echo(server);
    Session::open(client, client_config).unwrap()
}

#[tokio::test]
async fn test_echo_round_trip() {
    init_tracing();
    let session = echo_pair(SessionConfig::default());
    within(session.ready()).await.unwrap();

    let datagrams = session.datagrams();
    let writer = datagrams.writer();
    let reader = datagrams.reader();

    let sent: HashSet<String> = (0..10).map(|i| format!("datagram {i}")).collect();
    for payload in &sent {
        within(writer.ready()).await.unwrap();
        writer.write(payload.clone()).unwrap();
    }

    // Unreliable channel: any arrival must be one of ours.
    let first = within(reader.read()).await.unwrap().unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert!(sent.contains(&first));

    let mut received = 1;
    while let Ok(Ok(Some(datagram))) =
        tokio::time::timeout(Duration::from_millis(200), reader.read()).await
    {
        assert!(sent.contains(std::str::from_utf8(&datagram).unwrap()));
        received += 1;
    }
    assert!(received <= sent.len());
}

#[tokio::test]
async fn test_writes_before_ready_are_delivered() {
    init_tracing();
    let (client, server) = loopback::LoopbackBuilder::new()
        .connect_delay(Duration::from_millis(50))
        .build();
    spawn_echo(Session::open(server, SessionConfig::default()).unwrap());
    let session = Session::open(client, SessionConfig::default()).unwrap();

    assert_eq!(session.state(), SessionState::Connecting);
    let writer = session.datagrams().writer();
    writer.ready().await.unwrap();
    writer.write("sent while connecting").unwrap();

    within(session.ready()).await.unwrap();
    let echoed = within(session.datagrams().reader().read()).await.unwrap();
    assert_eq!(echoed, Some(Datagram::from("sent while connecting")));
}

#[tokio::test]
async fn test_outgoing_high_water_mark_paces_writer() {
    init_tracing();
    let session = echo_pair(config(5, 64));
    let writer = session.datagrams().writer();

    for i in 0..50 {
        within(writer.ready()).await.unwrap();
        writer.write(format!("{i}")).unwrap();
        assert!(writer.pending() <= 5);
    }
    assert_eq!(session.stats().outgoing.enqueued, 50);
}

#[tokio::test]
async fn test_incoming_high_water_mark_bounds_buffering() {
    init_tracing();
    const N: usize = 5;
    let session = echo_pair(config(64, N));
    within(session.ready()).await.unwrap();

    let writer = session.datagrams().writer();
    for i in 0..10 * N {
        writer.write(format!("burst {i}")).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let reader = session.datagrams().reader();
    let mut buffered = 0;
    while reader.try_read().is_some() {
        buffered += 1;
    }
    assert!(buffered >= 1);
    assert!(buffered <= N);
    assert!(session.stats().incoming.dropped_full >= (10 * N - N) as u64);
}

#[tokio::test]
async fn test_close_reaches_peer() {
    init_tracing();
    let (client, server) = loopback::pair();
    let client = Session::open(client, SessionConfig::default()).unwrap();
    let server = Session::open(server, SessionConfig::default()).unwrap();
    within(client.ready()).await.unwrap();
    within(server.ready()).await.unwrap();

    let info = CloseInfo::new(42, "client done");
    client.close_with(info.clone());
    client.close();

    assert_eq!(within(client.closed()).await, Ok(info.clone()));
    assert_eq!(within(server.closed()).await, Ok(info.clone()));
    assert_eq!(within(server.datagrams().reader().read()).await, Ok(None));
    assert_eq!(
        client.datagrams().writer().write("late"),
        Err(SessionError::ConnectionClosed(info))
    );
}

#[tokio::test]
async fn test_dropping_peer_closes_session() {
    init_tracing();
    let (client, server) = loopback::pair();
    let client = Session::open(client, SessionConfig::default()).unwrap();
    let server = Session::open(server, SessionConfig::default()).unwrap();
    within(server.ready()).await.unwrap();

    drop(server);
    assert_eq!(within(client.closed()).await, Ok(CloseInfo::default()));
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_refused_connection_fails_session() {
    init_tracing();
    let (client, _server) = loopback::LoopbackBuilder::new().refuse("no route").build();
    let session = Session::open(client, SessionConfig::default()).unwrap();
    let writer = session.datagrams().writer();
    writer.write("never sent").unwrap();

    let err = within(session.ready()).await.unwrap_err();
    assert!(matches!(&err, SessionError::ConnectionFailed(reason) if reason.contains("no route")));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(within(session.closed()).await, Err(err.clone()));
    assert_eq!(within(writer.ready()).await, Err(err.clone()));
    assert_eq!(within(session.datagrams().reader().read()).await, Err(err));
    assert_eq!(session.stats().outgoing.discarded, 1);
}

#[tokio::test]
async fn test_shutdown_waits_for_driver() {
    init_tracing();
    let (client, server) = loopback::pair();
    let client = Session::open(client, SessionConfig::default()).unwrap();
    let server = Session::open(server, SessionConfig::default()).unwrap();
    within(client.ready()).await.unwrap();

    within(client.shutdown(CloseInfo::new(1, "shutdown"))).await;
    assert_eq!(
        within(server.closed()).await,
        Ok(CloseInfo::new(1, "shutdown"))
    );
}
