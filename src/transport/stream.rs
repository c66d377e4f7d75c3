//! Datagrams over a reliable byte stream, framed as capsules.
//!
//! Each datagram travels as one DATAGRAM capsule; a local close is sent as a
//! CLOSE_WEBTRANSPORT_SESSION capsule. A stream that ends without a close
//! capsule counts as a close with code 0 and no reason. Unknown capsule types
//! are skipped.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use super::capsule::{Capsule, CapsuleDecoder, CapsuleType, DEFAULT_MAX_CAPSULE_SIZE};
use super::{Connector, DatagramSink, DatagramSource, LinkEvent, TransportResult};
use crate::core::CloseInfo;
use crate::datagram::Datagram;

/// Read chunk reserved before each stream read.
const READ_CHUNK: usize = 4096;

/// Connector for a stream that is already established (for example the
/// CONNECT stream of an extended CONNECT request).
#[derive(Debug)]
pub struct CapsuleConnector<S> {
    stream: S,
    remote: String,
    max_capsule_size: usize,
}

impl<S> CapsuleConnector<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an established stream.
    pub fn new(stream: S, remote: impl Into<String>) -> Self {
        Self {
            stream,
            remote: remote.into(),
            max_capsule_size: DEFAULT_MAX_CAPSULE_SIZE,
        }
    }

    /// Reject received capsules with values larger than `max` bytes.
    pub fn max_capsule_size(mut self, max: usize) -> Self {
        self.max_capsule_size = max;
        self
    }
}

impl<S> Connector for CapsuleConnector<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    type Sink = CapsuleSink<WriteHalf<S>>;
    type Source = CapsuleSource<ReadHalf<S>>;

    fn remote(&self) -> String {
        self.remote.clone()
    }

    async fn connect(self) -> TransportResult<(Self::Sink, Self::Source)> {
        let (reader, writer) = tokio::io::split(self.stream);
        Ok((
            CapsuleSink::new(writer),
            CapsuleSource::with_max_capsule_size(reader, self.max_capsule_size),
        ))
    }
}

/// Writes datagrams as capsules.
#[derive(Debug)]
pub struct CapsuleSink<W> {
    writer: W,
    buf: BytesMut,
}

impl<W> CapsuleSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: BytesMut::new(),
        }
    }

    async fn write_capsule(&mut self, capsule: &Capsule) -> TransportResult<()> {
        self.buf.clear();
        capsule.encode_into(&mut self.buf)?;
        self.writer.write_all(&self.buf).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl<W> DatagramSink for CapsuleSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, datagram: Datagram) -> TransportResult<()> {
        self.write_capsule(&Capsule::datagram(datagram)).await
    }

    async fn close(&mut self, info: CloseInfo) -> TransportResult<()> {
        self.write_capsule(&Capsule::close(&info)?).await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Reads capsules and surfaces datagrams and close notifications.
#[derive(Debug)]
pub struct CapsuleSource<R> {
    reader: R,
    decoder: CapsuleDecoder,
}

impl<R> CapsuleSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Wrap a reader with the default capsule size limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_capsule_size(reader, DEFAULT_MAX_CAPSULE_SIZE)
    }

    /// Wrap a reader rejecting capsules larger than `max` bytes.
    pub fn with_max_capsule_size(reader: R, max: usize) -> Self {
        Self {
            reader,
            decoder: CapsuleDecoder::with_max_capsule_size(max),
        }
    }
}

impl<R> DatagramSource for CapsuleSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn recv(&mut self) -> TransportResult<LinkEvent> {
        loop {
            if let Some(capsule) = self.decoder.decode_next()? {
                match capsule.kind() {
                    Some(CapsuleType::Datagram) => {
                        return Ok(LinkEvent::Datagram(Datagram::from(capsule.data)));
                    }
                    Some(CapsuleType::CloseWebTransportSession) => {
                        return Ok(LinkEvent::Closed(capsule.parse_close()?));
                    }
                    _ => {
                        tracing::trace!(
                            capsule_type = capsule.capsule_type,
                            len = capsule.data.len(),
                            "skipping capsule"
                        );
                        continue;
                    }
                }
            }

            if self.decoder.is_finished() {
                return Ok(LinkEvent::Closed(CloseInfo::default()));
            }

            let buf = self.decoder.buf_mut();
            buf.reserve(READ_CHUNK);
            if self.reader.read_buf(buf).await? == 0 {
                self.decoder.finish();
            }
        }
    }
}
