mod parse_args;
mod port;

use defuse_protocol::host::{spawn_intake, Logger, Verbosity};
use defuse_protocol::{
    Clock, Command, DefuseModule, DemoConfig, FeatureTag, GameState, LineFramer, ModuleConfig,
    ModuleDescriptor, ModuleError, NullLink, SerialLink, StrikePolicy, SystemClock, TaggedValue,
    WriteLink,
};
use parse_args::{parse_args, AppArgs};
use port::LinkTarget;

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// What the operator can do to the module from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserCommand {
    Arm,
    Disarm,
    Trigger,
    Status,
    Quit,
}

fn parse_user_command(line: &str) -> Option<UserCommand> {
    match line.trim() {
        "arm" => Some(UserCommand::Arm),
        "disarm" => Some(UserCommand::Disarm),
        "trigger" | "t" => Some(UserCommand::Trigger),
        "status" | "s" => Some(UserCommand::Status),
        "quit" | "q" => Some(UserCommand::Quit),
        _ => None,
    }
}

/// `m:ss.t`, or `-` once the countdown is over
fn fmt_countdown(millis: i32) -> String {
    if millis <= 0 {
        return "-".to_string();
    }
    let tenths = millis / 100;
    format!("{}:{:02}.{}", tenths / 600, (tenths / 10) % 60, tenths % 10)
}

fn print_game_state(state: &GameState, demo: bool) {
    println!(
        "{} {:?} strikes={}{}",
        fmt_countdown(state.countdown_millis),
        state.state,
        state.strikes,
        if demo { " (demo)" } else { "" }
    );
}

/// Tag names live for the whole process
fn leak_tag(name: &str) -> &'static str {
    Box::leak(name.to_string().into_boxed_str())
}

fn requested_tags(args: &AppArgs) -> Vec<TaggedValue> {
    let ints = args.int_tags.iter().map(|t| TaggedValue::int(leak_tag(t)));
    let serials = args
        .serial_tags
        .iter()
        .map(|t| TaggedValue::serial_number(leak_tag(t)));
    ints.chain(serials).collect()
}

fn print_tags(tags: &[TaggedValue]) {
    for tag in tags {
        match tag {
            TaggedValue::Int(v) => match v.value() {
                Some(value) => println!("{} = {}", tag.tag(), value),
                None => println!("{} = (missing)", tag.tag()),
            },
            TaggedValue::SerialNumber(v) => match v.as_str() {
                Some(sno) => println!("{} = {}", tag.tag(), sno),
                None => println!("{} = (missing)", tag.tag()),
            },
        }
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

    let features: Vec<FeatureTag> = args
        .features
        .iter()
        .map(|(name, data)| FeatureTag::new(name, data))
        .collect();
    let descriptor = match ModuleDescriptor::new(&args.name, &features) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let config = ModuleConfig {
        strike_policy: if args.explode_on_trigger {
            StrikePolicy::Explode
        } else {
            StrikePolicy::Escalate
        },
        demo: DemoConfig {
            grace_millis: args.demo_grace_ms,
            ..DemoConfig::default()
        },
    };

    let framer = Arc::new(LineFramer::new());
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut module = DefuseModule::new(&framer, descriptor, config);
    let mut tags = requested_tags(&args);
    let clock = SystemClock::new();

    // Set up stdin reader thread
    let (tx_stdin, rx_stdin): (Sender<UserCommand>, Receiver<UserCommand>) = mpsc::channel();
    let _stdin_thread = std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_user_command(&line) {
                Some(cmd) => {
                    if tx_stdin.send(cmd).is_err() {
                        break;
                    }
                }
                None => eprintln!("Unknown command '{}'", line.trim()),
            }
        }
    });

    if args.demo_only {
        eprintln!("Demo mode, no link");
        module.start_demo(clock.now_millis());
        run_module(&mut module, &mut NullLink, &clock, &mut [], None, &rx_stdin, &shutdown);
        return;
    }

    let target = match LinkTarget::from_args(&args) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if verbosity < Verbosity::Verbose {
        eprintln!("Connecting to {}...", target);
    }
    log::info!("Connecting to {}...", target);
    let (reader, writer) = match target.open() {
        Ok(halves) => halves,
        Err(e) => {
            eprintln!("Failed to open {}: {}", target, e);
            std::process::exit(1);
        }
    };
    log::info!("Connected");

    let _intake = match spawn_intake(reader, framer.clone(), shutdown.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start intake thread: {}", e);
            std::process::exit(1);
        }
    };

    let mut link = WriteLink::new(writer);
    run_module(
        &mut module,
        &mut link,
        &clock,
        &mut tags,
        args.init_timeout_ms,
        &rx_stdin,
        &shutdown,
    );
    if link.has_failed() {
        eprintln!("Link write failed");
        std::process::exit(1);
    }
}

fn negotiate<L: SerialLink + ?Sized>(
    module: &mut DefuseModule<'_>,
    link: &mut L,
    clock: &SystemClock,
    tags: &mut [TaggedValue],
    timeout_ms: Option<u64>,
) {
    if tags.is_empty() {
        // Nothing to wait for, go straight to running.
        let _ = module.wait_for_init(link, clock, tags, timeout_ms);
        return;
    }
    eprintln!("Waiting for {} values from the controller...", tags.len());
    match module.wait_for_init(link, clock, tags, timeout_ms) {
        Ok(()) => {
            eprintln!("Configured");
            print_tags(tags);
        }
        Err(e @ ModuleError::InitTimeout { .. }) => {
            eprintln!("{}, running demo mode", e);
        }
        Err(e) => eprintln!("Negotiation failed: {}", e),
    }
}

fn run_module<L: SerialLink + ?Sized>(
    module: &mut DefuseModule<'_>,
    link: &mut L,
    clock: &SystemClock,
    tags: &mut [TaggedValue],
    init_timeout_ms: Option<u64>,
    rx_stdin: &Receiver<UserCommand>,
    shutdown: &AtomicBool,
) {
    if !module.is_demo_mode() {
        negotiate(module, link, clock, tags, init_timeout_ms);
    }

    while !shutdown.load(Ordering::Relaxed) {
        while let Ok(cmd) = rx_stdin.try_recv() {
            match cmd {
                UserCommand::Arm => module.set_armed(),
                UserCommand::Disarm => module.set_disarmed(),
                UserCommand::Trigger => module.trigger(),
                UserCommand::Status => {
                    println!("module {:?}", module.my_state());
                    print_game_state(&module.game_state(), module.is_demo_mode());
                }
                UserCommand::Quit => return,
            }
        }

        let last = module.service(link, clock.now_millis());
        if module.update_state() {
            print_game_state(&module.game_state(), module.is_demo_mode());
        }

        if last == Some(Command::Reset) {
            eprintln!("Reset by controller");
            for tag in tags.iter_mut() {
                tag.clear();
            }
            negotiate(module, link, clock, tags, init_timeout_ms);
        }

        clock.idle();
    }
    log::info!("Link closed, stopping");
}
