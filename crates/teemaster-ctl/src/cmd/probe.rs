//! Run the reachability check from this host.

use std::net::SocketAddr;
use std::time::Duration;

use teemaster_services::ReachabilityChecker;

/// Probe `target`; `true` if it answered.
pub async fn cmd_probe(target: SocketAddr, timeout: Duration) -> bool {
    let checker = ReachabilityChecker::new(timeout);
    let reachable = checker.check(target).await;
    if reachable {
        println!("{target} is reachable");
    } else {
        println!(
            "{target} did not answer within {}s",
            checker.socket_timeout().as_secs_f64()
        );
    }
    reachable
}
