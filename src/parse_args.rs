use defuse_protocol::host::Verbosity;

const HELP: &str = "\
DefuseMe module - runs one game module against a controller

Talks the DefuseMe line protocol on a serial port, or on a socket when the
controller is simulated (see defuse-controller).

USAGE:
  defuse-me [OPTIONS]

OPTIONS:
  -h, --help               Prints help information
  --port <device>          Serial port, e.g. /dev/ttyUSB0
  --baud <rate>            Serial baud rate (default: 115200)
  --socket <path>          Unix socket path (default: /tmp/defuse-me.sock)
  --tcp <host:port>        Use TCP instead of Unix socket
  --name <name>            Module name sent in replies (default: module)
  --feature <name=data>    Advertise a feature tag (repeatable)
  --tag <name>             Wait for an integer value from the controller (repeatable)
  --serial-tag <name>      Wait for a serial number value (repeatable)
  --init-timeout <ms>      Give up waiting for values and start demo mode
  --demo-grace <ms>        Silence before demo mode starts, 0 disables (default: 10000)
  --explode-on-trigger     A trigger explodes the bomb instead of adding a strike
  --demo                   No link at all, run demo mode only
  -v, --verbose            Show connection and negotiation events
  -vv, --trace             Show every line in and out
  -vvv, --trace-uart       Show individual serial bytes (very verbose)
  --log <file>             Write log output to file instead of stderr

Commands on stdin: arm, disarm, trigger, status, quit
";

pub const DEFAULT_BAUD: u32 = 115_200;
pub const DEFAULT_NAME: &str = "module";
pub const DEFAULT_DEMO_GRACE_MS: u64 = 10_000;

#[derive(Debug)]
pub struct AppArgs {
    pub port: Option<String>,
    pub baud: u32,
    pub socket_path: Option<String>,
    pub tcp_addr: Option<String>,
    pub name: String,
    pub features: Vec<(String, String)>,
    pub int_tags: Vec<String>,
    pub serial_tags: Vec<String>,
    pub init_timeout_ms: Option<u64>,
    pub demo_grace_ms: Option<u64>,
    pub explode_on_trigger: bool,
    pub demo_only: bool,
    pub verbosity: Verbosity,
    pub log_file: Option<String>,
}

fn parse_feature(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, data)) => Ok((name.to_string(), data.to_string())),
        None => Err(format!("expected NAME=DATA, got '{}'", s)),
    }
}

pub fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    // Count -v flags for verbosity level
    let verbosity = if pargs.contains("--trace-uart") || pargs.contains("-vvv") {
        Verbosity::TraceUart
    } else if pargs.contains("--trace") || pargs.contains("-vv") {
        Verbosity::Trace
    } else if pargs.contains(["-v", "--verbose"]) {
        Verbosity::Verbose
    } else {
        Verbosity::Quiet
    };

    let demo_grace_ms = match pargs.opt_value_from_str::<_, u64>("--demo-grace")? {
        Some(0) => None,
        Some(ms) => Some(ms),
        None => Some(DEFAULT_DEMO_GRACE_MS),
    };

    let args = AppArgs {
        port: pargs.opt_value_from_str("--port")?,
        baud: pargs
            .opt_value_from_str("--baud")?
            .unwrap_or(DEFAULT_BAUD),
        socket_path: pargs.opt_value_from_str("--socket")?,
        tcp_addr: pargs.opt_value_from_str("--tcp")?,
        name: pargs
            .opt_value_from_str("--name")?
            .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        features: pargs.values_from_fn("--feature", parse_feature)?,
        int_tags: pargs.values_from_str("--tag")?,
        serial_tags: pargs.values_from_str("--serial-tag")?,
        init_timeout_ms: pargs.opt_value_from_str("--init-timeout")?,
        demo_grace_ms,
        explode_on_trigger: pargs.contains("--explode-on-trigger"),
        demo_only: pargs.contains("--demo"),
        verbosity,
        log_file: pargs.opt_value_from_str("--log")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature() {
        assert_eq!(
            parse_feature("LED=4"),
            Ok(("LED".to_string(), "4".to_string()))
        );
        assert_eq!(
            parse_feature("BTN="),
            Ok(("BTN".to_string(), String::new()))
        );
        assert!(parse_feature("LED").is_err());
    }
}
