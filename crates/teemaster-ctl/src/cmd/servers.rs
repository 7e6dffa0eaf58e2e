//! Listing, registration and heartbeat commands.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

use teemaster_core::ListedServer;

use super::http::{get_json, post_json_body};

#[derive(Deserialize)]
struct RegisterResponse {
    token: String,
    expire: u64,
}

#[derive(Deserialize)]
struct HeartbeatResponse {
    expire: u64,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

pub async fn cmd_list(base: &str) -> Result<()> {
    let servers: Vec<ListedServer> = get_json(&format!("{base}/")).await?;

    if servers.is_empty() {
        println!("No servers registered.");
        return Ok(());
    }

    println!("{:<18} {:<40} {:>5}", "IPV4", "IPV6", "PORT");
    for s in &servers {
        let v4 = s.address4.map(|a| a.to_string()).unwrap_or_else(|| "-".into());
        let v6 = s.address6.map(|a| a.to_string()).unwrap_or_else(|| "-".into());
        println!("{:<18} {:<40} {:>5}", v4, v6, s.port);
    }
    println!("\n{} server(s)", servers.len());
    Ok(())
}

/// Register this host's address. With `token`, bind this address family to
/// an existing registration instead.
pub async fn cmd_register(base: &str, port: u16, token: Option<&str>) -> Result<()> {
    let resp: RegisterResponse =
        post_json_body(&format!("{base}/"), &RegisterRequest { port, token }).await?;
    println!("token  : {}", resp.token);
    println!("expire : {}", resp.expire);
    Ok(())
}

pub async fn cmd_heartbeat(base: &str, port: u16) -> Result<()> {
    let resp: HeartbeatResponse =
        post_json_body(&format!("{base}/heartbeat"), &json!({ "port": port })).await?;
    println!("expire : {}", resp.expire);
    Ok(())
}
