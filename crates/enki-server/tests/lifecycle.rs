use core::time::Duration;
use enki_core::{
    Greeting, Result,
    proto::{HelloRequest, example_service_client::ExampleServiceClient},
};
use enki_server::server::{
    app::{self, App},
    config::{AppConfig, LogLevel, ServerConfig},
    error::ServerError,
    health::HealthProbe,
    protocol::Outcome,
    service::{Greeter, GreeterService, templates::StaticTemplates},
};
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Notify,
    time::{Instant, sleep, timeout},
};
use tonic::Code;

fn local(grace: Duration) -> ServerConfig {
    ServerConfig::enabled("127.0.0.1:0".parse().unwrap(), grace)
}

fn config(grpc: ServerConfig, http: ServerConfig) -> AppConfig {
    AppConfig {
        log_level: LogLevel::Info,
        grpc,
        http,
    }
}

fn default_greeter() -> Arc<dyn Greeter> {
    Arc::new(GreeterService::new(
        StaticTemplates::default().with_template("Ferris", "Ahoy, {name}!"),
    ))
}

async fn wait_healthy(probe: &HealthProbe) {
    timeout(Duration::from_secs(5), async {
        while !probe.is_healthy() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server never became healthy");
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

#[tokio::test]
async fn serves_both_protocols_then_drains() {
    let App {
        orchestrator,
        grpc_addr,
        http_addr,
        grpc_health,
        http_health,
    } = app::build(
        &config(local(Duration::from_secs(2)), local(Duration::from_secs(2))),
        default_greeter(),
        None,
    )
    .await
    .unwrap();
    let grpc_addr = grpc_addr.unwrap();
    let http_addr = http_addr.unwrap();
    let shutdown = orchestrator.shutdown_token();
    let run = tokio::spawn(orchestrator.run());

    wait_healthy(&grpc_health).await;
    wait_healthy(&http_health).await;

    let mut client = ExampleServiceClient::connect(format!("http://{grpc_addr}"))
        .await
        .unwrap();
    let reply = client
        .hello(HelloRequest {
            name: "Ada".to_owned(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.greeting, "Hello, Ada!");

    let reply = client
        .hello(HelloRequest {
            name: "Ferris".to_owned(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.greeting, "Ahoy, Ferris!");

    let status = client
        .hello(HelloRequest {
            name: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let response = http_get(http_addr, "/health/grpc").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert_eq!(body(&response), "OK");
    let response = http_get(http_addr, "/health/http").await;
    assert_eq!(body(&response), "OK");

    drop(client);
    shutdown.cancel();
    let report = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(report.outcome("grpc"), Some(Outcome::Stopped));
    assert_eq!(report.outcome("http"), Some(Outcome::Stopped));
    assert!(!grpc_health.is_healthy());
    assert!(!http_health.is_healthy());
    assert_eq!(grpc_health.status(), "UNHEALTHY");
}

struct Slow {
    started: Arc<Notify>,
    finished: Arc<AtomicBool>,
}

#[tonic::async_trait]
impl Greeter for Slow {
    async fn hello(&self, name: &str) -> Result<Greeting> {
        self.started.notify_one();
        sleep(Duration::from_millis(1500)).await;
        self.finished.store(true, Ordering::SeqCst);
        let mut greeting = Greeting::new(name);
        greeting.apply_template("late, {name}");
        Ok(greeting)
    }
}

#[tokio::test]
async fn slow_request_is_abandoned_after_grace_period() {
    let started = Arc::new(Notify::new());
    let finished = Arc::new(AtomicBool::new(false));
    let grace = Duration::from_millis(300);
    let App {
        orchestrator,
        grpc_addr,
        grpc_health,
        ..
    } = app::build(
        &config(local(grace), local(Duration::from_secs(2))),
        Arc::new(Slow {
            started: Arc::clone(&started),
            finished: Arc::clone(&finished),
        }),
        None,
    )
    .await
    .unwrap();
    let shutdown = orchestrator.shutdown_token();
    let run = tokio::spawn(orchestrator.run());
    wait_healthy(&grpc_health).await;

    let mut client = ExampleServiceClient::connect(format!("http://{}", grpc_addr.unwrap()))
        .await
        .unwrap();
    let call = tokio::spawn(async move {
        client
            .hello(HelloRequest {
                name: "Ada".to_owned(),
            })
            .await
    });
    started.notified().await;

    let begin = Instant::now();
    shutdown.cancel();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(grpc_health.status(), "UNHEALTHY");
    assert!(!run.is_finished(), "orchestrator returned while draining");

    let report = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let elapsed = begin.elapsed();

    assert_eq!(report.outcome("grpc"), Some(Outcome::ForcedStopped));
    assert_eq!(report.outcome("http"), Some(Outcome::Stopped));
    assert!(elapsed >= grace, "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "returned after {elapsed:?}");

    let status = timeout(Duration::from_secs(1), call)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    // Outlive the greeter's own delay: its work must have been dropped.
    sleep(Duration::from_millis(1500)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn disabled_server_reports_disabled() {
    let App {
        orchestrator,
        grpc_addr,
        http_addr,
        grpc_health,
        ..
    } = app::build(
        &config(local(Duration::from_secs(1)), ServerConfig::disabled()),
        default_greeter(),
        None,
    )
    .await
    .unwrap();
    assert!(grpc_addr.is_some());
    assert!(http_addr.is_none());

    let shutdown = orchestrator.shutdown_token();
    let run = tokio::spawn(orchestrator.run());
    wait_healthy(&grpc_health).await;
    shutdown.cancel();

    let report = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report.outcome("grpc"), Some(Outcome::Stopped));
    assert_eq!(report.outcome("http"), Some(Outcome::Disabled));
}

#[tokio::test]
async fn occupied_port_fails_before_launch() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap();

    let err = app::build(
        &config(
            ServerConfig::enabled(addr, Duration::from_secs(1)),
            ServerConfig::disabled(),
        ),
        default_greeter(),
        None,
    )
    .await
    .unwrap_err();

    match err {
        ServerError::Bind { server, addr: got, .. } => {
            assert_eq!(server, "grpc");
            assert_eq!(got, addr);
        }
        other => panic!("unexpected error: {other}"),
    }
}
