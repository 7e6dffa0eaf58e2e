//! teemaster-ctl — command-line interface for a TeeMaster master server.

mod cmd;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use cmd::http::DEFAULT_URL;

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Exit status of `probe` when the target did not answer.
const EXIT_UNREACHABLE: i32 = 2;

struct Options {
    url: String,
    timeout: Duration,
    token: Option<String>,
}

fn print_usage() {
    eprintln!("Usage: teemaster-ctl [--url <base>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  list                                  Federated server listing");
    eprintln!("  register <port> [--token <token>]     Register this host");
    eprintln!("  heartbeat <port>                      Renew this host's registration");
    eprintln!("  probe <ip:port> [--timeout <secs>]    Reachability check from this host");
    eprintln!();
    eprintln!("Default --url is {DEFAULT_URL}.");
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse().with_context(|| format!("invalid port {raw:?}"))
}

/// Pull `--flag value` options out of `args`; everything else is positional.
fn split_options(args: &[String]) -> Result<(Options, Vec<&str>)> {
    let mut options = Options {
        url: DEFAULT_URL.to_string(),
        timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        token: None,
    };
    let mut remaining = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--url" => {
                let url = iter.next().context("--url requires a value")?;
                options.url = url.trim_end_matches('/').to_string();
            }
            "--timeout" => {
                let secs: f64 = iter
                    .next()
                    .context("--timeout requires a value")?
                    .parse()
                    .context("--timeout must be a number of seconds")?;
                options.timeout = Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .context("--timeout must be positive")?;
            }
            "--token" => {
                options.token = Some(iter.next().context("--token requires a value")?.clone());
            }
            other => remaining.push(other),
        }
    }
    Ok((options, remaining))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (options, remaining) = split_options(&args)?;
    let base = options.url.as_str();

    match remaining.as_slice() {
        ["list"] | [] => cmd::servers::cmd_list(base).await,
        ["register", port] => {
            cmd::servers::cmd_register(base, parse_port(port)?, options.token.as_deref()).await
        }
        ["heartbeat", port] => cmd::servers::cmd_heartbeat(base, parse_port(port)?).await,
        ["probe", target] => {
            let target: SocketAddr = target
                .parse()
                .with_context(|| format!("invalid target {target:?}, expected ip:port"))?;
            if !cmd::probe::cmd_probe(target, options.timeout).await {
                std::process::exit(EXIT_UNREACHABLE);
            }
            Ok(())
        }
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
