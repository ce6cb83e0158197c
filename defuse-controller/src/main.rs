mod game;
mod parse_args;

use defuse_protocol::host::{spawn_intake, Logger, Verbosity};
use defuse_protocol::{
    Command, Line, LineFramer, LinkError, ModuleReport, SocketAddr, SocketConnection,
    SocketListener,
};
use game::Game;
use parse_args::{parse_args, AppArgs};

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Console commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Console {
    Start,
    Strike,
    Reset,
    Enumerate,
    Quit,
}

fn parse_console(line: &str) -> Option<Console> {
    match line.trim() {
        "start" => Some(Console::Start),
        "strike" => Some(Console::Strike),
        "reset" => Some(Console::Reset),
        "enumerate" | "enum" => Some(Console::Enumerate),
        "quit" | "q" => Some(Console::Quit),
        _ => None,
    }
}

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            std::process::exit(1);
        }
    };

    // Set up logger
    let logger = match &args.log_file {
        Some(path) => match Logger::file(path, args.verbosity) {
            Ok(l) => {
                eprintln!("Logging to: {}", path);
                l
            }
            Err(e) => {
                eprintln!("Failed to open log file '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => Logger::stderr(args.verbosity),
    };
    let verbosity = logger.verbosity();
    if let Err(e) = logger.install() {
        eprintln!("Failed to install logger: {}", e);
    }

    // Determine socket address
    let addr = if let Some(tcp) = &args.tcp_addr {
        SocketAddr::tcp(tcp.clone())
    } else {
        let path = args
            .socket_path
            .clone()
            .unwrap_or_else(|| defuse_protocol::socket::DEFAULT_SOCKET_PATH.to_string());
        #[cfg(unix)]
        {
            SocketAddr::unix(&path)
        }
        #[cfg(not(unix))]
        {
            eprintln!("Unix sockets not supported on this platform, use --tcp");
            std::process::exit(1);
        }
    };

    let listener = match SocketListener::bind(&addr) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to listen on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // One stdin reader for all sessions
    let (tx_stdin, rx_stdin): (Sender<Console>, Receiver<Console>) = mpsc::channel();
    let _stdin_thread = std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_console(&line) {
                Some(cmd) => {
                    if tx_stdin.send(cmd).is_err() {
                        break;
                    }
                }
                None => eprintln!("Unknown command '{}'", line.trim()),
            }
        }
    });

    // Serve modules one after the other
    loop {
        if verbosity < Verbosity::Verbose {
            eprintln!("Waiting for a module on {}...", listener.addr());
        }
        log::info!("Listening on {}", listener.addr());
        let conn = match listener.accept() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Accept failed: {}", e);
                std::process::exit(1);
            }
        };
        log::info!("Module connected");

        match run_session(conn, &args, &rx_stdin) {
            Ok(true) => break,
            Ok(false) => eprintln!("Module disconnected"),
            Err(e) => eprintln!("Session error: {}", e),
        }
    }
}

fn send_line<W: Write>(writer: &mut W, line: &Line) -> Result<(), LinkError> {
    log::debug!("-> {:?}", line);
    let (wire, len) = line.to_wire();
    writer.write_all(&wire[..len])?;
    writer.flush()?;
    Ok(())
}

fn send_command<W: Write>(writer: &mut W, command: Command) -> Result<(), LinkError> {
    let line = Line::command(command, |_| Ok(())).unwrap_or_else(|_| Line::empty());
    send_line(writer, &line)
}

/// Enumerate the module and hand it the configured values
fn configure<W: Write>(writer: &mut W, args: &AppArgs) -> Result<(), LinkError> {
    send_command(writer, Command::Enumerate)?;
    for setting in &args.settings {
        send_line(writer, &Line::from_bytes(setting.as_bytes()))?;
    }
    Ok(())
}

/// Print a line the module sent and feed reports into the game
fn handle_module_line(line: &Line, game: &mut Game, now_millis: u64) {
    log::debug!("<- {:?}", line);
    if let Some(report) = ModuleReport::parse(line) {
        log::trace!("Report from '{}': {}", report.name, report.code);
        let was_running = game.is_running();
        game.on_report(&report, now_millis);
        if was_running && !game.is_running() {
            let state = game.state_at(now_millis);
            println!(
                "Game over: {:?} with {} ms left, {} strikes",
                state.state, state.countdown_millis, state.strikes
            );
        }
        return;
    }
    match line.command_kind() {
        Some(command) if command.wants_descriptor() || command == Command::Reset => {
            println!(
                "{}: {}",
                command,
                String::from_utf8_lossy(line.payload())
            );
        }
        _ => println!("?? {}", String::from_utf8_lossy(line.as_bytes())),
    }
}

/// Drive one connected module. Returns `Ok(true)` when the operator quit.
fn run_session(
    conn: SocketConnection,
    args: &AppArgs,
    rx_stdin: &Receiver<Console>,
) -> Result<bool, LinkError> {
    conn.set_read_timeout(Some(Duration::from_millis(100)))?;
    let (reader, mut writer) = conn.split();

    let framer = Arc::new(LineFramer::new());
    let shutdown = Arc::new(AtomicBool::new(false));
    let intake = spawn_intake(reader, framer.clone(), shutdown.clone())?;

    let start = Instant::now();
    let now = || start.elapsed().as_millis() as u64;
    let status_interval = Duration::from_millis(args.status_interval_ms);
    let mut last_status = Instant::now();
    let mut game = Game::new(args.round_ms, args.max_strikes);

    configure(&mut writer, args)?;
    game.start(now());
    eprintln!("Game started");

    let mut quit = false;
    while !shutdown.load(Ordering::Relaxed) {
        while let Some(line) = framer.take_line() {
            handle_module_line(&line, &mut game, now());
        }

        while let Ok(cmd) = rx_stdin.try_recv() {
            match cmd {
                Console::Start => {
                    game.start(now());
                    eprintln!("Game started");
                }
                Console::Strike => game.add_strike(now()),
                Console::Reset => {
                    send_command(&mut writer, Command::Reset)?;
                    game.stop();
                    configure(&mut writer, args)?;
                    game.start(now());
                    eprintln!("Module reset, game restarted");
                }
                Console::Enumerate => send_command(&mut writer, Command::Enumerate)?,
                Console::Quit => {
                    quit = true;
                    shutdown.store(true, Ordering::Relaxed);
                }
            }
        }

        if !quit && last_status.elapsed() >= status_interval {
            send_line(&mut writer, &Line::game_status(&game.state_at(now())))?;
            last_status = Instant::now();
        }

        // Small sleep to avoid busy-waiting
        std::thread::sleep(Duration::from_millis(1));
    }

    if framer.dropped_lines() > 0 {
        log::warn!("{} module lines dropped", framer.dropped_lines());
    }
    let _ = writer.shutdown();
    let _ = intake.join();
    Ok(quit)
}
