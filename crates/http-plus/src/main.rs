//! http-plus: fetch a URL through the instrumented client and export the
//! resulting span.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::dns::GaiResolver;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::{ServiceBuilder, ServiceExt};

use http_plus::{
    HttpPlusInstrumentation, InterceptedBody, Settings, TimingConnector, TimingResolver,
};

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| std::env::var("HTTP_PLUS_CONFIG").ok())
        .unwrap_or_else(|| "http-plus.toml".to_string());

    let data = args
        .iter()
        .position(|a| a == "--data")
        .and_then(|i| args.get(i + 1).cloned());

    let Some(url) = args.iter().skip(1).rev().find(|a| a.contains("://")).cloned() else {
        anyhow::bail!("usage: http-plus [--config <path>] [--data <body>] <url>");
    };

    let settings = Settings::load(&config_path)?;

    // The tonic gRPC exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = http_plus_tracing::init_tracing(&settings.tracing);

        tracing::info!(
            config_path = %config_path,
            url = %url,
            method = if data.is_some() { "POST" } else { "GET" },
            otlp_export = tracing_guard.is_exporting(),
            "Starting http-plus"
        );

        run(settings, url, data).await
    })
}

async fn run(settings: Settings, url: String, data: Option<String>) -> anyhow::Result<()> {
    let connector = TimingConnector::tcp(HttpConnector::new_with_resolver(TimingResolver::new(
        GaiResolver::new(),
    )));
    let client = Client::builder(TokioExecutor::new())
        .build::<_, InterceptedBody<Full<Bytes>>>(connector);

    let instrumentation = HttpPlusInstrumentation::new(settings.instrumentation);
    let service = ServiceBuilder::new()
        .layer(instrumentation.layer())
        .service(client);

    let request = match data {
        Some(body) => http::Request::post(&url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?,
        None => http::Request::get(&url).body(Full::new(Bytes::new()))?,
    };

    let response = service.oneshot(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    tracing::info!(%status, bytes = body.len(), "Request complete");
    println!("{}", String::from_utf8_lossy(&body));
    Ok(())
}
