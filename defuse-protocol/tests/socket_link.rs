//! A module talking to a controller stand-in over a Unix socket.

#![cfg(unix)]

use defuse_protocol::host::spawn_intake;
use defuse_protocol::{
    Clock, DefuseModule, DemoConfig, FeatureTag, LineFramer, ModuleConfig, ModuleDescriptor,
    SocketAddr, SocketConnection, SocketListener, State, SystemClock, TaggedValue, WriteLink,
};
use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_module_over_unix_socket() {
    let socket_path = "/tmp/defuse-me-test-socket.sock";
    let addr = SocketAddr::unix(socket_path);
    let listener = SocketListener::bind(&addr).unwrap();

    // Controller side
    let controller = thread::spawn(move || {
        let conn = listener.accept().unwrap();
        let (reader, mut writer) = conn.split();
        let mut reader = BufReader::new(reader);
        let mut read_line = || {
            let mut line = Vec::new();
            reader.read_until(b'\n', &mut line).unwrap();
            line
        };

        writer.write_all(b"\x80\nlevel:5\n").unwrap();
        writer.flush().unwrap();
        let enumerate_reply = read_line();

        writer.write_all(b"\x83time:60000 state:1 strikes:2\n").unwrap();
        writer.flush().unwrap();
        let status_reply = read_line();

        (enumerate_reply, status_reply)
    });

    // Module side
    let conn = SocketConnection::connect(&addr).unwrap();
    conn.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
    let (reader, writer) = conn.split();
    let framer = Arc::new(LineFramer::new());
    let shutdown = Arc::new(AtomicBool::new(false));
    let intake = spawn_intake(reader, framer.clone(), shutdown.clone()).unwrap();

    const FEATURES: [FeatureTag<'static>; 1] = [FeatureTag::new("LED", "1")];
    let descriptor = ModuleDescriptor::new("button", &FEATURES).unwrap();
    let config = ModuleConfig {
        demo: DemoConfig {
            grace_millis: None,
            ..DemoConfig::default()
        },
        ..ModuleConfig::default()
    };
    let mut module = DefuseModule::new(&framer, descriptor, config);
    let mut link = WriteLink::new(writer);
    let clock = SystemClock::new();

    let mut tags = [TaggedValue::int("level")];
    module
        .wait_for_init(&mut link, &clock, &mut tags, Some(5_000))
        .unwrap();
    assert_eq!(tags[0].as_int(), Some(5));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !module.update_state() && Instant::now() < deadline {
        module.service(&mut link, clock.now_millis());
        clock.idle();
    }
    let state = module.game_state();
    assert_eq!(state.countdown_millis, 60000);
    assert_eq!(state.state, State::Active);
    assert_eq!(state.strikes, 2);

    let (enumerate_reply, status_reply) = controller.join().unwrap();
    assert_eq!(enumerate_reply, b"\x80button:LED:1\n".to_vec());
    assert_eq!(status_reply, b"\x83button:state:1\n".to_vec());
    assert!(!link.has_failed());

    shutdown.store(true, Ordering::Relaxed);
    intake.join().unwrap();
}
