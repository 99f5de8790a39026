use std::time::Duration;

use tether_client::{Client, ClientConfig, ClientMethod, DirectoryError, InvocationError};
use tether_server::{shared::ChannelId, Server, ServerConfig};
use tether_test::{
    init_logging, test_services::ScoreService, within, TestClient, TestServer, SETTLE,
};

fn start_score_server() -> TestServer {
    let mut server = Server::new(ServerConfig::default());
    server.add_service(ScoreService::new()).unwrap();
    TestServer::start(server).unwrap()
}

fn method<Q, R>(client: &TestClient, name: &str) -> ClientMethod<Q, R>
where
    Q: tether_server::shared::Payload,
    R: tether_server::shared::Payload,
{
    client
        .handle
        .service(ScoreService::NAME)
        .unwrap()
        .method::<Q, R>(name)
        .unwrap()
}

#[tokio::test]
async fn invoke_returns_the_handler_result() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let add = method::<(u32, u32), u32>(&client, "Add");
    assert_eq!(add.channel(), &ChannelId::new(ScoreService::NAME, "Add"));
    assert_eq!(add.invoke(&(2, 3)).await, Ok(5));
    assert_eq!(add.invoke(&(40, 2)).await, Ok(42));
}

#[tokio::test]
async fn handler_sees_the_calling_session() {
    init_logging();

    let server = start_score_server();
    let first = server.connect().await.unwrap();
    let second = server.connect().await.unwrap();

    let whoami_first = method::<(), u64>(&first, "Whoami");
    let whoami_second = method::<(), u64>(&second, "Whoami");
    assert_eq!(whoami_first.invoke(&()).await, Ok(first.session.to_u64()));
    assert_eq!(whoami_second.invoke(&()).await, Ok(second.session.to_u64()));
}

#[tokio::test]
async fn handler_reads_per_session_property_values() {
    init_logging();

    let server = start_score_server();
    let service = server.handle.service::<ScoreService>().unwrap();
    let client = server.connect().await.unwrap();
    service.score.set_top(10).unwrap();
    service.score.set_for(client.session, 11).unwrap();

    let score_for = method::<(), u32>(&client, "ScoreFor");
    assert_eq!(score_for.invoke(&()).await, Ok(11));
}

#[tokio::test]
async fn handler_error_reaches_the_caller() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let fail = method::<String, ()>(&client, "Fail");
    assert_eq!(
        fail.invoke(&"out of stock".to_string()).await,
        Err(InvocationError::Failed("out of stock".to_string()))
    );
}

#[tokio::test]
async fn handler_panic_becomes_a_failure_and_server_keeps_serving() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let explode = method::<(), ()>(&client, "Panic");
    match explode.invoke(&()).await {
        Err(InvocationError::Failed(message)) => assert!(message.contains("handler blew up")),
        other => panic!("expected a failure, got {other:?}"),
    }

    let add = method::<(u32, u32), u32>(&client, "Add");
    assert_eq!(add.invoke(&(1, 1)).await, Ok(2));
}

#[tokio::test]
async fn mismatched_request_type_is_a_bad_payload() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let add = method::<String, u32>(&client, "Add");
    assert!(matches!(
        add.invoke(&"two and three".to_string()).await,
        Err(InvocationError::BadPayload(_))
    ));
}

#[tokio::test]
async fn mismatched_response_type_fails_to_decode() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let add = method::<(u32, u32), String>(&client, "Add");
    assert!(matches!(
        add.invoke(&(1, 2)).await,
        Err(InvocationError::Payload(_))
    ));
}

#[tokio::test]
async fn unknown_method_is_refused_by_the_directory() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();
    let service = client.handle.service(ScoreService::NAME).unwrap();

    assert!(matches!(
        service.method::<(), ()>("Refund"),
        Err(DirectoryError::UnknownChannel { .. })
    ));
    assert!(matches!(
        service.method::<(), ()>("Chat"),
        Err(DirectoryError::WrongKind {
            expected: "Method",
            found: "Signal",
            ..
        })
    ));
}

#[tokio::test]
async fn concurrent_calls_resolve_independently() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let sleep = method::<u64, u64>(&client, "Sleep");
    let slow = sleep.clone();
    let fast = sleep.clone();
    let (slow, fast) = tokio::join!(slow.invoke(&80), fast.invoke(&5));
    assert_eq!(slow, Ok(80));
    assert_eq!(fast, Ok(5));
}

#[tokio::test]
async fn request_timeout_bounds_the_wait() {
    init_logging();

    let server = start_score_server();
    let client = server
        .connect_client(Client::new(ClientConfig {
            request_timeout: Some(Duration::from_millis(30)),
            ..Default::default()
        }))
        .await
        .unwrap();

    let sleep = method::<u64, u64>(&client, "Sleep");
    assert_eq!(
        sleep.invoke(&1_000).await,
        Err(InvocationError::Timeout { millis: 30 })
    );
    assert_eq!(sleep.invoke(&1).await, Ok(1));
}

#[tokio::test]
async fn pending_call_resolves_when_the_session_ends() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let sleep = method::<u64, u64>(&client, "Sleep");
    let call = tokio::spawn(async move { sleep.invoke(&60_000).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.disconnect(&client);

    let outcome = within(SETTLE, call).await.unwrap();
    assert_eq!(outcome, Err(InvocationError::SessionGone));
}

#[tokio::test]
async fn invoke_after_disconnect_reports_session_gone() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();
    let add = method::<(u32, u32), u32>(&client, "Add");

    server.disconnect(&client);
    within(SETTLE, client.handle.closed()).await;

    assert_eq!(add.invoke(&(1, 2)).await, Err(InvocationError::SessionGone));
}

#[tokio::test]
async fn local_shutdown_also_ends_pending_calls() {
    init_logging();

    let server = start_score_server();
    let client = server.connect().await.unwrap();

    let sleep = method::<u64, u64>(&client, "Sleep");
    let call = tokio::spawn(async move { sleep.invoke(&60_000).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.handle.shutdown();

    let outcome = within(SETTLE, call).await.unwrap();
    assert_eq!(outcome, Err(InvocationError::SessionGone));
    assert!(!client.handle.is_connected());
}
