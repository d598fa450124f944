//! Start-up failures of the real engine, with `<home>/bin/sumo` standing in for SUMO.
//!
//! The stand-in is a link to `/bin/sh`; the configuration path becomes the
//! script it runs via `-c`.
#![cfg(unix)]

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use traffic_lab_abstract::{EngineError, EngineOptions, SimulationConfig, SimulationEngine};
use traffic_lab_traci::SumoEngine;
use traffic_lab_traci::launcher::binary_name;

fn sumo_home(binary: impl FnOnce(&Path)) -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let bin = home.path().join("bin");
    std::fs::create_dir(&bin).unwrap();
    binary(&bin.join(binary_name(false)));
    home
}

fn shell_home() -> TempDir {
    sumo_home(|path| std::os::unix::fs::symlink("/bin/sh", path).unwrap())
}

fn options(home: &TempDir) -> EngineOptions {
    EngineOptions {
        sumo_home: Some(home.path().to_path_buf()),
        connect_retries: 200,
        retry_delay_ms: 10,
        ..Default::default()
    }
}

#[test]
fn engine_exiting_early_is_a_launch_error() {
    let home = shell_home();
    let mut engine = SumoEngine::new(options(&home));

    match engine.start(&SimulationConfig::new("exit 1")) {
        Err(EngineError::Launch(message)) => {
            assert!(message.contains("exit status: 1"), "{message}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn binary_that_cannot_run_is_a_launch_error() {
    // present, so it is picked over a PATH lookup, but not executable
    let home = sumo_home(|path| std::fs::write(path, "not a program").unwrap());
    let mut engine = SumoEngine::new(options(&home));

    match engine.start(&SimulationConfig::new("scenario.sumocfg")) {
        Err(EngineError::Launch(message)) => {
            assert!(message.contains("failed to spawn"), "{message}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn garbled_handshake_fails_and_reaps_the_engine() {
    // The engine lingers; the control port is served by a listener that answers with junk.
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = [0u8; 6];
        stream.read_exact(&mut request).unwrap();
        // a status command whose length byte is too small to hold its own id
        stream.write_all(&[0, 0, 0, 6, 1, 0]).unwrap();
    });

    let home = shell_home();
    let mut engine = SumoEngine::new(EngineOptions {
        port: Some(port),
        ..options(&home)
    });

    let started = Instant::now();
    let result = engine.start(&SimulationConfig::new("sleep 30"));

    assert!(
        matches!(result, Err(EngineError::Protocol(_))),
        "unexpected result: {result:?}"
    );
    // returning well before the sleep ends means the child was killed and waited for
    assert!(started.elapsed() < Duration::from_secs(20));
    server.join().unwrap();
}
