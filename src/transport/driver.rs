//! Session driver: connects a link and pumps datagrams through it.

use super::{Connector, DatagramSink, DatagramSource, LinkEvent};
use crate::session::TransportAdapter;

/// Establish the connection, then run the send and receive pumps until the
/// session ends.
///
/// Sending and receiving run as independent pumps so a link that is slow to
/// accept frames never stops arrivals from reaching the incoming queue.
pub(crate) async fn drive<C: Connector>(connector: C, adapter: TransportAdapter) {
    let connected = tokio::select! {
        result = connector.connect() => result,
        () = adapter.terminated() => {
            tracing::debug!("session ended before the connection was established");
            return;
        }
    };

    let (sink, source) = match connected {
        Ok(link) => link,
        Err(e) => {
            adapter.fail(e.to_string());
            return;
        }
    };

    if !adapter.connected() {
        tracing::debug!(state = %adapter.state(), "connection established after session ended");
        return;
    }

    tokio::join!(send_pump(sink, &adapter), recv_pump(source, &adapter));
    tracing::debug!(stats = ?adapter.stats(), "session driver finished");
}

async fn send_pump<S: DatagramSink>(mut sink: S, adapter: &TransportAdapter) {
    while let Some(datagram) = adapter.next_outgoing().await {
        let len = datagram.len();
        match sink.send(datagram).await {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                tracing::trace!(len, error = %e, "datagram lost on send");
            }
            Err(e) => {
                adapter.fail(e.to_string());
                return;
            }
        }
    }

    if let Some(info) = adapter.local_close_info() {
        if let Err(e) = sink.close(info).await {
            tracing::debug!(error = %e, "failed to notify peer of close");
        }
    }
}

async fn recv_pump<R: DatagramSource>(mut source: R, adapter: &TransportAdapter) {
    loop {
        let event = tokio::select! {
            event = source.recv() => event,
            () = adapter.terminated() => return,
        };

        match event {
            Ok(LinkEvent::Datagram(datagram)) => {
                adapter.deliver(datagram);
            }
            Ok(LinkEvent::Closed(info)) => {
                adapter.remote_closed(info);
                return;
            }
            Err(e) if !e.is_fatal() => {
                tracing::trace!(error = %e, "datagram lost on receive");
            }
            Err(e) => {
                adapter.fail(e.to_string());
                return;
            }
        }
    }
}
