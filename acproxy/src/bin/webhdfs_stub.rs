use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::{Request, Response, body::Incoming, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(version, about = "Minimal WebHDFS endpoint for exercising the proxy")]
struct Cli {
    #[arg(long, default_value_t = 50070)]
    port: u16,

    /// Name reported in every response body
    #[arg(long, default_value = "nn1")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let addr: SocketAddr = format!("127.0.0.1:{}", cli.port).parse()?;

    let listener = TcpListener::bind(addr).await?;
    println!("WebHDFS stub {} listening on http://{}", cli.name, addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let name = cli.name.clone();
        let service = service_fn(move |req: Request<Incoming>| {
            let name = name.clone();
            async move {
                let target = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.to_string())
                    .unwrap_or_default();
                let body = format!("{{\"namenode\":\"{}\",\"target\":\"{}\"}}\n", name, target);
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
            }
        });

        tokio::spawn(async move {
            let _ = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await;
        });
    }
}
