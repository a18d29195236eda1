//! End-to-end tests for the full homebusd stack.
//!
//! Each test starts a real home server with the virtual integration, loads a
//! small house of components and drives it through the command-line
//! executor — no TCP port is bound.

use std::sync::Arc;
use std::time::Duration;

use homebus_adapter_virtual::VirtualComponentFactory;
use homebus_app::ports::{ComponentFactory, FinalEventListener};
use homebus_app::server::{HomeServer, ServerConfig};
use homebus_app::services::command_line::CommandLineExecutor;
use homebus_domain::event::{Event, MINUTE_EVENT_TYPE};
use homebus_domain::record::ComponentRecord;

fn house() -> Vec<ComponentRecord> {
    vec![
        ComponentRecord::new("VirtualLamp", "Hall")
            .with_id(10)
            .with_attribute("Address", "A1"),
        ComponentRecord::new("VirtualLamp", "Porch")
            .with_id(11)
            .with_attribute("Address", "A2"),
        ComponentRecord::new("VirtualThermometer", "Outside")
            .with_id(12)
            .with_attribute("Address", "T1"),
        ComponentRecord::new("LampGroup", "Downstairs")
            .with_id(20)
            .with_attribute("Lamps", "10,11"),
    ]
}

/// A started server with the house loaded, plus a command session on it.
fn start() -> (Arc<HomeServer>, CommandLineExecutor) {
    let factories: Vec<Box<dyn ComponentFactory>> = vec![Box::new(VirtualComponentFactory)];
    let server = Arc::new(HomeServer::start(&ServerConfig::default(), Box::new(factories)).unwrap());
    let report = server.load(house());
    assert!(report.failed.is_empty(), "failed: {:?}", report.failed);
    assert_eq!(report.activated, 4);
    let executor = CommandLineExecutor::new(Arc::clone(&server));
    (server, executor)
}

fn run(executor: &CommandLineExecutor, line: &str) -> String {
    executor.execute(line).expect("session should stay open")
}

/// Repeat `line` until it answers `expected`; events are delivered on the
/// dispatcher thread.
fn eventually(executor: &CommandLineExecutor, line: &str, expected: &str) {
    for _ in 0..200 {
        if run(executor, line) == expected {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(run(executor, line), expected);
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[test]
fn should_list_every_loaded_component() {
    let (server, executor) = start();

    let reply = run(&executor, "dir");

    for name in ["HomeServer", "Hall", "Porch", "Outside", "Downstairs"] {
        assert!(reply.split(',').any(|token| token == name), "{reply}");
    }
    server.shutdown();
}

#[test]
fn should_list_groups_related_to_a_lamp() {
    let (server, executor) = start();

    assert_eq!(run(&executor, "dir,@related=10"), "ok,Downstairs");
    assert_eq!(run(&executor, "dir,@related=12"), "ok");
    server.shutdown();
}

#[test]
fn should_create_rename_and_remove_through_commands() {
    let (server, executor) = start();

    assert_eq!(run(&executor, "create,VirtualLamp,Kitchen"), "ok");
    assert_eq!(run(&executor, "rename,Kitchen,Scullery"), "ok");
    assert_eq!(run(&executor, "get,Scullery,State"), "ok,State,Off");
    assert!(run(&executor, "get,Kitchen,State").starts_with("error,3,"));

    assert!(server.remove_instance("Scullery"));
    assert!(run(&executor, "get,Scullery,State").starts_with("error,3,"));
    server.shutdown();
}

#[test]
fn should_reject_unknown_class() {
    let (server, executor) = start();

    assert!(run(&executor, "create,Toaster,Kitchen").starts_with("error,15,"));
    server.shutdown();
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[test]
fn should_switch_lamp_from_inbound_message() {
    let (server, executor) = start();

    let reply = run(
        &executor,
        "event,Virtual_Message,Direction,In,Address,A1,Command,On",
    );

    assert_eq!(reply, "ok");
    eventually(&executor, "get,Hall,State", "ok,State,On");
    assert_eq!(run(&executor, "get,Porch,State"), "ok,State,Off");
    server.shutdown();
}

#[test]
fn should_record_thermometer_reading() {
    let (server, executor) = start();

    run(
        &executor,
        "event,Virtual_Temperature,Direction,In,Address,T1,Temperature,21.46",
    );

    eventually(&executor, "get,Outside,Temperature", "ok,Temperature,21.5");
    server.shutdown();
}

#[test]
fn should_count_sent_events() {
    let (server, executor) = start();
    let before = server.sent_event_count();

    run(&executor, "event,Doorbell");
    run(&executor, "event,Doorbell");

    assert_eq!(server.sent_event_count(), before + 2);
    server.shutdown();
}

// ---------------------------------------------------------------------------
// Actions and attributes
// ---------------------------------------------------------------------------

#[test]
fn should_fan_group_action_out_to_lamps() {
    let (server, executor) = start();

    assert!(run(&executor, "call,Downstairs,on").starts_with("ok"));

    assert_eq!(run(&executor, "get,Hall,State"), "ok,State,On");
    assert_eq!(run(&executor, "get,Porch,State"), "ok,State,On");
    server.shutdown();
}

#[test]
fn should_report_invalid_attribute_and_action() {
    let (server, executor) = start();

    assert!(run(&executor, "set,Hall,Colour,Red").starts_with("error,8,"));
    assert!(run(&executor, "set,Hall,Address").starts_with("error,7,"));
    assert!(run(&executor, "call,Hall,dim").starts_with("error,10,"));
    assert!(run(&executor, "frobnicate,Hall").starts_with("error,6,"));
    server.shutdown();
}

#[test]
fn should_reset_server_statistics() {
    let (server, executor) = start();
    run(&executor, "event,Doorbell");

    assert!(run(&executor, "call,HomeServer,ResetStatistics").starts_with("ok"));
    server.shutdown();
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn should_restore_components_from_snapshot() {
    let (server, executor) = start();
    run(&executor, "set,Porch,Address,B7");
    let records = server.snapshot_records();
    server.shutdown();

    let factories: Vec<Box<dyn ComponentFactory>> = vec![Box::new(VirtualComponentFactory)];
    let restored =
        Arc::new(HomeServer::start(&ServerConfig::default(), Box::new(factories)).unwrap());
    let report = restored.load(records);
    let executor = CommandLineExecutor::new(Arc::clone(&restored));

    assert!(report.failed.is_empty());
    assert_eq!(run(&executor, "get,Porch,Address"), "ok,Address,B7");
    assert_eq!(run(&executor, "get,11,Address"), "ok,Address,B7");
    restored.shutdown();
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn should_broadcast_heartbeat_events() {
    let (server, _executor) = start();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let listener: Arc<dyn FinalEventListener> = Arc::new(move |event: &Event, _handled: bool| {
        if event.is_type(MINUTE_EVENT_TYPE) {
            let _ = tx.send(event.clone());
        }
    });
    server.register_final_listener(listener);

    server.start_heartbeat(Duration::from_millis(20)).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("heartbeat should fire")
        .expect("listener should stay registered");
    assert_eq!(event.event_type(), MINUTE_EVENT_TYPE);
    tokio::task::spawn_blocking(move || server.shutdown())
        .await
        .unwrap();
}
