use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream as TlsClientStream;

/// A byte stream that may or may not already be wrapped in TLS. The
/// dialog engine's state machine is written once against this trait so
/// that STARTTLS is just a matter of swapping the boxed stream out from
/// under it, grounded on `rfc5321::traits::AsyncReadAndWrite`. The
/// teacher's `try_dup`/raw-fd duplication workaround for failed TLS
/// handshakes and its OpenSSL/server-side stream impls have no
/// counterpart here: this crate only ever plays the client role.
pub trait AsyncReadAndWrite: AsyncRead + AsyncWrite + Debug + Unpin + Send {}

impl AsyncReadAndWrite for TcpStream {}
impl AsyncReadAndWrite for TlsClientStream<TcpStream> {}
impl AsyncReadAndWrite for TlsClientStream<BoxedAsyncReadAndWrite> {}

pub type BoxedAsyncReadAndWrite = Box<dyn AsyncReadAndWrite>;
