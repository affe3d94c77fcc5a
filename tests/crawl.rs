//! End-to-end crawl tests against an in-process HTTP server.
//!
//! The server is a plain tokio listener speaking just enough HTTP/1.1 for
//! the engine: read until the header separator, answer the requested path
//! with a fixed page and a Content-Length.

use std::cell::Cell;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use webrank::crawl::{crawl, CrawlOptions};
use webrank::fetch::{Connector, FetchEngine};
use webrank::rank;
use webrank::report;

/// A four-page site with 10 links exercising absolute, rooted, relative,
/// and `../` references plus two self-loops.
fn page_for(path: &str) -> &'static str {
    match path {
        "/" => concat!(
            r#"<html><body>"#,
            r#"<a href="http://localhost/">home</a>"#,
            r#"<a href="/page1/">one</a>"#,
            r#"</body></html>"#
        ),
        "/page1/" => concat!(
            r#"<html><body>"#,
            r#"<a href="../">up</a>"#,
            r#"<a href="/page2/">two</a>"#,
            r#"<a href="/page2/page2-1/">deep</a>"#,
            r#"</body></html>"#
        ),
        "/page2/" => concat!(
            r#"<html><body>"#,
            r#"<a href="/">root</a>"#,
            r#"<a href="http://localhost/page2/">self</a>"#,
            r#"<a href="page2-1/">child</a>"#,
            // Filtered out before it reaches the graph or the engine.
            r#"<a href="https://secure.example/">tls</a>"#,
            r#"</body></html>"#
        ),
        "/page2/page2-1/" => concat!(
            r#"<html><body>"#,
            r#"<a href="/">root</a>"#,
            r#"<a href="../">parent</a>"#,
            r#"</body></html>"#
        ),
        "/dead-link/" => concat!(
            r#"<html><body>"#,
            r#"<a href="/dead-link/">self</a>"#,
            r#"<a href="http://dead.example/">gone</a>"#,
            r#"</body></html>"#
        ),
        _ => "<html><body>not found</body></html>",
    }
}

async fn serve_pages() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut sock, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 512];
                loop {
                    let n = match sock.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let body = page_for(&path);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    addr
}

/// Dials the test server no matter which host the crawl asks for.
struct LoopbackConnector {
    addr: SocketAddr,
}

impl Connector for LoopbackConnector {
    type Stream = TcpStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<TcpStream> {
        TcpStream::connect(self.addr).await
    }
}

/// Injects fd exhaustion into the first `failures` connect attempts.
struct FdLimited<C> {
    inner: C,
    failures: Cell<u32>,
    attempts: Rc<Cell<u32>>,
}

impl<C: Connector> Connector for FdLimited<C> {
    type Stream = C::Stream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<C::Stream> {
        self.attempts.set(self.attempts.get() + 1);
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(io::Error::from_raw_os_error(libc::EMFILE));
        }
        self.inner.connect(host, port).await
    }
}

#[tokio::test]
async fn crawl_records_the_four_page_graph() {
    let addr = serve_pages().await;
    let opts = CrawlOptions::default();
    let engine = FetchEngine::new(LoopbackConnector { addr }, opts.fetch.clone());

    let graph = crawl(&engine, &opts, "http://localhost/").await;

    assert_eq!(graph.url_count(), 4);
    assert_eq!(graph.edges().len(), 10);

    let urls: Vec<(&str, usize)> = graph.urls().collect();
    assert_eq!(
        urls,
        vec![
            ("localhost/", 1),
            ("localhost/page1/", 2),
            ("localhost/page2/", 3),
            ("localhost/page2/page2-1/", 4),
        ]
    );

    // Every edge endpoint refers back into the URL table.
    let n = graph.url_count();
    for &(src, dst) in graph.edges() {
        assert!(1 <= src && src <= n);
        assert!(1 <= dst && dst <= n);
    }
}

#[tokio::test]
async fn crawl_report_feeds_pagerank() {
    let addr = serve_pages().await;
    let opts = CrawlOptions::default();
    let engine = FetchEngine::new(LoopbackConnector { addr }, opts.fetch.clone());

    let graph = crawl(&engine, &opts, "http://localhost/").await;

    let mut buf = Vec::new();
    report::write_report(&mut buf, &graph).unwrap();
    let parsed = report::parse(std::str::from_utf8(&buf).unwrap()).unwrap();
    assert_eq!(parsed.urls.len(), 4);
    assert_eq!(parsed.edges.len(), 10);

    let ranks = rank::pagerank(&parsed.edges);
    let ranked = rank::ranked_urls(&parsed.urls, &ranks);
    let order: Vec<&str> = ranked.iter().map(|(_, url)| url.as_str()).collect();
    assert_eq!(
        order,
        vec![
            "localhost/",
            "localhost/page2/",
            "localhost/page1/",
            "localhost/page2/page2-1/",
        ]
    );

    let expected = [0.400453, 0.230248, 0.207705, 0.161595];
    for ((rank, _), want) in ranked.iter().zip(expected) {
        assert!(
            (rank - want).abs() < 2e-3,
            "rank {rank} expected about {want}"
        );
    }
}

#[tokio::test]
async fn fd_limited_urls_are_retried_to_completion() {
    let addr = serve_pages().await;
    let attempts = Rc::new(Cell::new(0));
    let connector = FdLimited {
        inner: LoopbackConnector { addr },
        failures: Cell::new(2),
        attempts: Rc::clone(&attempts),
    };
    let opts = CrawlOptions::default();
    let engine = FetchEngine::new(connector, opts.fetch.clone());

    let graph = crawl(&engine, &opts, "http://localhost/").await;

    // The seed was parked twice and replayed; the third attempt connected
    // and the rest of the site crawled normally. Ten edges means every page
    // parsed exactly once despite the injected failures.
    assert_eq!(graph.url_count(), 4);
    assert_eq!(graph.edges().len(), 10);
    assert_eq!(attempts.get(), 6);
}

/// Routes `localhost` to the test server and refuses everything else.
struct PartialConnector {
    addr: SocketAddr,
}

impl Connector for PartialConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, _port: u16) -> io::Result<TcpStream> {
        if host != "localhost" {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        TcpStream::connect(self.addr).await
    }
}

#[tokio::test]
async fn unreachable_hosts_leave_a_partial_graph() {
    let addr = serve_pages().await;
    let opts = CrawlOptions::default();
    let engine = FetchEngine::new(PartialConnector { addr }, opts.fetch.clone());

    // The seed page links to dead.example; that fetch fails, but the edge
    // was recorded when the link was seen and the crawl still terminates.
    let graph = crawl(&engine, &opts, "http://localhost/dead-link/").await;

    assert_eq!(graph.url_count(), 2);
    assert_eq!(graph.edges().len(), 2);
    let urls: Vec<(&str, usize)> = graph.urls().collect();
    assert_eq!(
        urls,
        vec![("dead.example/", 2), ("localhost/dead-link/", 1)]
    );
}
