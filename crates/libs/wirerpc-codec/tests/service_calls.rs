use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wirerpc_codec::service::{dial, CallError, RpcClient, RpcServer, RESPONSE_TOO_LARGE};
use wirerpc_codec::{CodecConfig, ServerCodec, UNSPECIFIED_ERROR};

fn echo_server() -> RpcServer {
    let server = RpcServer::new();
    server.register("Echo.Call", |text: String| Ok(text));
    server.register("Arith.Add", |(a, b): (i64, i64)| {
        a.checked_add(b).ok_or_else(|| "overflow".to_string())
    });
    server.register("Sleep.For", |millis: u64| {
        thread::sleep(Duration::from_millis(millis));
        Ok(millis)
    });
    server.register("Fail.Always", |_: ()| -> Result<(), String> { Err("boom".into()) });
    server.register("Fail.Silently", |_: ()| -> Result<(), String> { Err(String::new()) });
    server
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn spawn_tcp_server() -> String {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr").to_string();
    let server = echo_server();
    thread::spawn(move || server.serve(&listener));
    addr
}

#[test]
fn calls_over_tcp_return_handler_results() {
    let addr = spawn_tcp_server();
    let client = dial("tcp", &addr).expect("dial");

    let echoed: String = client.call("Echo.Call", &"over tcp".to_string()).expect("echo");
    assert_eq!(echoed, "over tcp");
    let sum: i64 = client.call("Arith.Add", &(40_i64, 2_i64)).expect("add");
    assert_eq!(sum, 42);
    assert_eq!(client.pending_calls(), 0);

    client.close().expect("close");
}

#[test]
fn handler_errors_and_unknown_methods_come_back_as_server_errors() {
    let addr = spawn_tcp_server();
    let client = dial("tcp", &addr).expect("dial");

    match client.call::<_, ()>("Fail.Always", &()) {
        Err(CallError::Server(message)) => assert_eq!(message, "boom"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    match client.call::<_, ()>("Fail.Silently", &()) {
        Err(CallError::Server(message)) => assert_eq!(message, UNSPECIFIED_ERROR),
        other => panic!("unexpected outcome: {other:?}"),
    }
    match client.call::<_, ()>("Nope.Missing", &()) {
        Err(CallError::Server(message)) => {
            assert_eq!(message, "rpc: can't find method Nope.Missing")
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    match client.call::<_, i64>("Arith.Add", &(i64::MAX, 1_i64)) {
        Err(CallError::Server(message)) => assert_eq!(message, "overflow"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The connection survives every failure above.
    let echoed: String = client.call("Echo.Call", &"still here".to_string()).expect("echo");
    assert_eq!(echoed, "still here");
}

#[test]
fn wrongly_typed_params_fail_only_that_call() {
    let addr = spawn_tcp_server();
    let client = dial("tcp", &addr).expect("dial");

    let err = client
        .call::<_, i64>("Arith.Add", &"not a pair".to_string())
        .expect_err("string is not (i64, i64)");
    assert!(matches!(err, CallError::Server(_)));

    let sum: i64 = client.call("Arith.Add", &(1_i64, 2_i64)).expect("add");
    assert_eq!(sum, 3);
}

#[test]
fn concurrent_callers_each_get_their_own_reply() {
    let addr = spawn_tcp_server();
    let client = Arc::new(dial("tcp", &addr).expect("dial"));

    let callers: Vec<_> = (0..8_u64)
        .map(|i| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                // Later callers sleep less, so replies arrive out of order.
                let millis = (8 - i) * 15;
                let slept: u64 = client.call("Sleep.For", &millis).expect("sleep call");
                assert_eq!(slept, millis);
            })
        })
        .collect();
    for caller in callers {
        caller.join().expect("caller thread");
    }
    assert_eq!(client.pending_calls(), 0);
}

#[cfg(unix)]
#[test]
fn pending_calls_fail_with_shutdown_when_server_hangs_up() {
    let (left, right) = wirerpc_codec::transport::pipe().expect("pipe");
    let client = Arc::new(RpcClient::new(left).expect("client"));
    let server = ServerCodec::new(right);

    let caller = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.call::<_, String>("Echo.Call", &"never".to_string()))
    };

    let header = server.read_request_header().expect("request arrives");
    assert_eq!(header.method, "Echo.Call");
    server.close().expect("server close");

    let outcome = caller.join().expect("caller thread");
    assert!(matches!(outcome, Err(CallError::Shutdown)));

    client.close().expect("client close");
    let late = client.call::<_, String>("Echo.Call", &"late".to_string());
    assert!(matches!(late, Err(CallError::Shutdown)));
}

#[cfg(unix)]
#[test]
fn serve_conn_returns_when_client_closes() {
    let (left, right) = wirerpc_codec::transport::pipe().expect("pipe");
    let server = echo_server();
    let serving = thread::spawn(move || server.serve_conn(right));

    let client = RpcClient::new(left).expect("client");
    let echoed: String = client.call("Echo.Call", &"pipe".to_string()).expect("echo");
    assert_eq!(echoed, "pipe");
    client.close().expect("close");

    serving.join().expect("server thread exits");
}

#[cfg(unix)]
#[test]
fn result_over_server_frame_limit_comes_back_as_error() {
    init_logging();
    let (left, right) = wirerpc_codec::transport::pipe().expect("pipe");
    let server = RpcServer::with_config(CodecConfig::default().with_max_frame_len(64));
    server.register("Text.Repeat", |count: u32| Ok("x".repeat(count as usize)));
    let serving = thread::spawn(move || server.serve_conn(right));

    let client = RpcClient::new(left).expect("client");
    match client.call::<_, String>("Text.Repeat", &500_u32) {
        Err(CallError::Server(message)) => assert_eq!(message, RESPONSE_TOO_LARGE),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(client.pending_calls(), 0);

    let short: String = client.call("Text.Repeat", &3_u32).expect("small result fits");
    assert_eq!(short, "xxx");
    client.close().expect("close");

    serving.join().expect("server thread exits");
}
