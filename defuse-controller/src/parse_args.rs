use defuse_protocol::host::Verbosity;

const HELP: &str = "\
DefuseMe controller - development stand-in for the game controller

Listens for one module, enumerates it, sends settings and game status.

USAGE:
  defuse-controller [OPTIONS]

OPTIONS:
  -h, --help               Prints help information
  --socket <path>          Unix socket path (default: /tmp/defuse-me.sock)
  --tcp <host:port>        Listen on TCP instead of Unix socket
  --set <tag=value>        Value sent to the module after enumeration (repeatable)
  --round <ms>             Countdown of one game (default: 300000)
  --max-strikes <n>        Strikes before the bomb explodes (default: 3)
  --status-interval <ms>   Time between game status lines (default: 200)
  -v, --verbose            Show connection and protocol events
  -vv, --trace             Show every line in and out
  -vvv, --trace-uart       Show individual bytes (very verbose)
  --log <file>             Write log output to file instead of stderr

Commands on stdin: start, strike, reset, enumerate, quit
";

#[derive(Debug)]
pub struct AppArgs {
    pub socket_path: Option<String>,
    pub tcp_addr: Option<String>,
    pub settings: Vec<String>,
    pub round_ms: u32,
    pub max_strikes: u8,
    pub status_interval_ms: u64,
    pub verbosity: Verbosity,
    pub log_file: Option<String>,
}

/// `tag=value` becomes the wire fragment `tag:value`
fn parse_setting(s: &str) -> Result<String, String> {
    match s.split_once('=') {
        Some((tag, value)) if !tag.is_empty() && !tag.contains([' ', ':']) => {
            Ok(format!("{}:{}", tag, value))
        }
        _ => Err(format!("expected TAG=VALUE, got '{}'", s)),
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

    let args = AppArgs {
        socket_path: pargs.opt_value_from_str("--socket")?,
        tcp_addr: pargs.opt_value_from_str("--tcp")?,
        settings: pargs.values_from_fn("--set", parse_setting)?,
        round_ms: pargs.opt_value_from_str("--round")?.unwrap_or(300_000),
        max_strikes: pargs.opt_value_from_str("--max-strikes")?.unwrap_or(3),
        status_interval_ms: pargs
            .opt_value_from_str("--status-interval")?
            .unwrap_or(200),
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
    fn test_parse_setting() {
        assert_eq!(parse_setting("level=3"), Ok("level:3".to_string()));
        assert_eq!(
            parse_setting("sno=AB12CD34EF56GH7"),
            Ok("sno:AB12CD34EF56GH7".to_string())
        );
        assert!(parse_setting("level").is_err());
        assert!(parse_setting("=3").is_err());
        assert!(parse_setting("a b=3").is_err());
    }
}
