use std::ffi::{OsStr, OsString};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::thread;

use tracing::{debug, info};
use traffic_lab_abstract::{EngineError, EngineOptions, SimulationConfig};

/// Install locations probed when neither an explicit home nor `SUMO_HOME` is given.
pub const COMMON_SUMO_HOMES: &[&str] = &[
    "/usr/share/sumo",
    "/usr/local/share/sumo",
    "C:/Program Files (x86)/Eclipse/Sumo",
];

/// Pick the SUMO installation root: explicit option, then `SUMO_HOME`, then
/// the first common install path that exists.
pub fn resolve_sumo_home(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_sumo_home_from(explicit, std::env::var_os("SUMO_HOME"), COMMON_SUMO_HOMES)
}

fn resolve_sumo_home_from(
    explicit: Option<&Path>,
    env: Option<OsString>,
    candidates: &[&str],
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(home) = env.filter(|h| !h.is_empty()) {
        return Some(PathBuf::from(home));
    }
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

pub fn binary_name(gui: bool) -> String {
    let stem = if gui { "sumo-gui" } else { "sumo" };
    format!("{stem}{}", std::env::consts::EXE_SUFFIX)
}

/// `<home>/bin/<binary>` when it exists, otherwise the bare name for a `PATH` lookup.
pub fn resolve_binary(gui: bool, sumo_home: Option<&Path>) -> PathBuf {
    let name = binary_name(gui);
    if let Some(home) = sumo_home {
        let candidate = home.join("bin").join(&name);
        if candidate.is_file() {
            return candidate;
        }
        debug!(
            "{} not found, falling back to PATH lookup of {name}",
            candidate.display()
        );
    }
    PathBuf::from(name)
}

/// Ask the OS for a port nobody is listening on.
pub fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}

/// Arguments passed to the engine binary.
pub fn engine_args(config: &SimulationConfig, port: u16) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-c".into(),
        config.config_path.as_os_str().to_owned(),
        "--remote-port".into(),
        port.to_string().into(),
    ];
    if let Some(step) = config.step_length {
        args.push("--step-length".into());
        args.push(step.to_string().into());
    }
    args.extend(config.extra_args.iter().map(OsString::from));
    args
}

/// A spawned engine process with an open control connection.
#[derive(Debug)]
pub struct Launched {
    pub child: Child,
    pub stream: TcpStream,
    pub port: u16,
}

/// Spawn the engine and connect to its remote-control port.
pub fn launch(options: &EngineOptions, config: &SimulationConfig) -> Result<Launched, EngineError> {
    let sumo_home = resolve_sumo_home(options.sumo_home.as_deref());
    let binary = resolve_binary(options.gui, sumo_home.as_deref());
    let port = match options.port {
        Some(port) => port,
        None => free_port()?,
    };
    let args = engine_args(config, port);

    info!(
        "Launching {} {}",
        binary.display(),
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let mut command = Command::new(&binary);
    command.args(&args);
    if let Some(home) = &sumo_home {
        command.env("SUMO_HOME", home);
    }
    let mut child = command
        .spawn()
        .map_err(|e| EngineError::Launch(format!("failed to spawn {}: {e}", binary.display())))?;

    match connect(&mut child, binary.as_os_str(), port, options) {
        Ok(stream) => Ok(Launched {
            child,
            stream,
            port,
        }),
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(err)
        }
    }
}

fn connect(
    child: &mut Child,
    binary: &OsStr,
    port: u16,
    options: &EngineOptions,
) -> Result<TcpStream, EngineError> {
    let attempts = options.connect_retries.saturating_add(1);
    for attempt in 1..=attempts {
        match TcpStream::connect((Ipv4Addr::LOCALHOST, port)) {
            Ok(stream) => {
                debug!("connected to port {port} on attempt {attempt}");
                return Ok(stream);
            }
            Err(e) => {
                if let Some(status) = child.try_wait()? {
                    return Err(EngineError::Launch(format!(
                        "{} exited with {status} before accepting a connection",
                        binary.to_string_lossy()
                    )));
                }
                debug!("connect attempt {attempt}/{attempts} to port {port} failed: {e}");
                thread::sleep(options.retry_delay());
            }
        }
    }
    Err(EngineError::Launch(format!(
        "could not connect to {} on port {port} after {attempts} attempts",
        binary.to_string_lossy()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_home_wins() {
        let home = resolve_sumo_home_from(
            Some(Path::new("/opt/sumo")),
            Some("/env/sumo".into()),
            &["/"],
        );
        assert_eq!(home, Some(PathBuf::from("/opt/sumo")));
    }

    #[test]
    fn env_home_beats_candidates() {
        let home = resolve_sumo_home_from(None, Some("/env/sumo".into()), &["/"]);
        assert_eq!(home, Some(PathBuf::from("/env/sumo")));
    }

    #[test]
    fn first_existing_candidate_is_used() {
        let existing = std::env::temp_dir();
        let existing = existing.to_str().unwrap();
        let home = resolve_sumo_home_from(None, Some("".into()), &["/no/such/sumo", existing]);
        assert_eq!(home, Some(PathBuf::from(existing)));
        assert_eq!(resolve_sumo_home_from(None, None, &["/no/such/sumo"]), None);
    }

    #[test]
    fn binary_falls_back_to_path_lookup() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_binary(false, Some(dir.path())),
            PathBuf::from(binary_name(false))
        );

        std::fs::create_dir(dir.path().join("bin")).unwrap();
        let gui = dir.path().join("bin").join(binary_name(true));
        std::fs::write(&gui, b"").unwrap();
        assert_eq!(resolve_binary(true, Some(dir.path())), gui);
    }

    // `<home>/bin/sumo` is a shell, so the config path runs as its `-c` script.
    #[cfg(unix)]
    #[test]
    fn unbounded_retries_still_notice_an_exited_engine() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join("bin")).unwrap();
        std::os::unix::fs::symlink("/bin/sh", home.path().join("bin").join(binary_name(false)))
            .unwrap();
        let options = EngineOptions {
            sumo_home: Some(home.path().to_path_buf()),
            connect_retries: u32::MAX,
            retry_delay_ms: 10,
            ..Default::default()
        };

        let err = launch(&options, &SimulationConfig::new("exit 1")).unwrap_err();

        match err {
            EngineError::Launch(message) => assert!(message.contains("exited"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn args_include_step_length_and_extras() {
        let mut config = SimulationConfig::new("net/run.sumocfg");
        config.step_length = Some(0.5);
        config.extra_args = vec!["--no-warnings".to_string()];
        let args = engine_args(&config, 8813);
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-c",
                "net/run.sumocfg",
                "--remote-port",
                "8813",
                "--step-length",
                "0.5",
                "--no-warnings"
            ]
        );
    }
}
