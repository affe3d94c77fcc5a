//! Non-blocking HTTP/1.1 GET engine.
//!
//! One [`FetchEngine::fetch`] call is one request: connect (bounded by the
//! connect timeout), write the fixed GET template, then accumulate the
//! response until the peer closes or the announced `Content-Length` worth of
//! body has arrived. Every call resolves to exactly one terminal
//! [`FetchOutcome`]; partial reads and writes suspend on socket readiness
//! instead of blocking, so any number of requests can be multiplexed on a
//! single thread.
//!
//! TLS is deliberately unsupported: `https://` URLs never reach this module.

use std::fmt;
use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::BytesMut;
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// How long the connect stage may take before the request fails with
/// [`FetchStatus::ConnTimeout`]. Send and receive are unbounded.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Static desktop-browser User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.102 Safari/537.36";

const RECV_CHUNK: usize = 64;
const BODY_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Terminal result of a request. `FdLimit` is transient (the submitter is
/// expected to retry once a descriptor frees up); everything else is fatal
/// for the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Succ,
    FdLimit,
    ConnErr,
    ConnTimeout,
    SendErr,
    RecvErr,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchStatus::Succ => "success",
            FetchStatus::FdLimit => "fd limit",
            FetchStatus::ConnErr => "connect error",
            FetchStatus::ConnTimeout => "connect timeout",
            FetchStatus::SendErr => "send error",
            FetchStatus::RecvErr => "recv error",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub url: String,
    pub status: FetchStatus,
    /// HTML payload past the header separator. Present only on `Succ`, and
    /// absent even then when the response carried no `\r\n\r\n`.
    pub body: Option<String>,
}

impl FetchOutcome {
    fn fail(url: String, status: FetchStatus) -> Self {
        Self {
            url,
            status,
            body: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

/// The thin I/O seam under the engine: name resolution, socket creation, and
/// connection establishment. Tests swap in scripted implementations.
///
/// The engine polls fetch futures from a single task, so no `Send` bound is
/// needed on the returned futures.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Production connector. A `host:port` suffix in the host piece takes
/// precedence over the caller's port, so canonical URLs that kept an
/// explicit port dial where they should.
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        if let Some((name, p)) = split_host_port(host) {
            TcpStream::connect((name, p)).await
        } else {
            TcpStream::connect((host, port)).await
        }
    }
}

fn split_host_port(host: &str) -> Option<(&str, u16)> {
    let (name, port) = host.rsplit_once(':')?;
    let port = port.parse().ok()?;
    Some((name, port))
}

pub struct FetchEngine<C> {
    connector: C,
    opts: FetchOptions,
}

impl<C: Connector> FetchEngine<C> {
    pub fn new(connector: C, opts: FetchOptions) -> Self {
        Self { connector, opts }
    }

    /// Issue one GET for a canonical URL and run it to a terminal outcome.
    pub async fn fetch(&self, url: String) -> FetchOutcome {
        let host = crate::urls::parse_host(&url).to_string();
        let path = crate::urls::parse_path(&url).to_string();
        let port = crate::urls::parse_port(&url);

        let connect = self.connector.connect(&host, port);
        let mut stream = match timeout(self.opts.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return FetchOutcome::fail(url, classify_connect_error(&err)),
            Err(_) => return FetchOutcome::fail(url, FetchStatus::ConnTimeout),
        };

        let (status, body) = exchange(&mut stream, &host, &path, &self.opts.user_agent).await;
        let _ = stream.shutdown().await;
        FetchOutcome { url, status, body }
    }
}

fn classify_connect_error(err: &io::Error) -> FetchStatus {
    match err.raw_os_error() {
        Some(code) if code == libc::EMFILE || code == libc::ENFILE => FetchStatus::FdLimit,
        _ => FetchStatus::ConnErr,
    }
}

async fn exchange<S>(
    stream: &mut S,
    host: &str,
    path: &str,
    user_agent: &str,
) -> (FetchStatus, Option<String>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_request(path, host, user_agent);
    if stream.write_all(request.as_bytes()).await.is_err() {
        return (FetchStatus::SendErr, None);
    }

    let response = match read_response(stream).await {
        Ok(response) => response,
        Err(_) => return (FetchStatus::RecvErr, None),
    };

    let body = body_start(&response)
        .map(|start| String::from_utf8_lossy(&response[start..]).into_owned());
    (FetchStatus::Succ, body)
}

fn build_request(path: &str, host: &str, user_agent: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         User-Agent: {user_agent}\r\n\
         Accept: text/html,application/xhtml+xml,application/xml\r\n\
         \r\n"
    )
}

/// Accumulate the response until the peer closes, or until the bytes past
/// the header separator reach the announced `Content-Length`. With no
/// `Content-Length` in sight, only a close ends the read.
async fn read_response<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<BytesMut> {
    let mut response = BytesMut::new();
    let mut chunk = [0u8; RECV_CHUNK];
    let mut content_length: Option<usize> = None;

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..n]);

        if content_length.is_none() {
            content_length = scan_content_length(&response);
        }
        if let (Some(len), Some(start)) = (content_length, body_start(&response)) {
            if response.len() - start >= len {
                break;
            }
        }
    }

    Ok(response)
}

fn content_length_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Content-Length: (\d+)\r").unwrap())
}

fn scan_content_length(response: &[u8]) -> Option<usize> {
    let caps = content_length_regex().captures(response)?;
    let digits = std::str::from_utf8(caps.get(1)?.as_bytes()).ok()?;
    digits.parse().ok()
}

fn body_start(response: &[u8]) -> Option<usize> {
    response
        .windows(BODY_SEPARATOR.len())
        .position(|w| w == BODY_SEPARATOR)
        .map(|i| i + BODY_SEPARATOR.len())
}
