use crate::*;
use serde_json::json;

fn gated() -> MasterOptions {
    MasterOptions {
        gate: Some(Duration::from_millis(300)),
        ..MasterOptions::default()
    }
}

#[tokio::test]
async fn gate_admits_answering_server() -> Result<()> {
    let (port, game) = spawn_game_server(true).await?;
    let master = spawn_master(&MemoryCache::new(), gated()).await?;

    let resp = post_json(&format!("{}/", master.base), &json!({ "port": port })).await?;
    assert_eq!(resp.status(), 201);

    game.abort();
    Ok(())
}

#[tokio::test]
async fn gate_refuses_silent_server() -> Result<()> {
    let (port, game) = spawn_game_server(false).await?;
    let master = spawn_master(&MemoryCache::new(), gated()).await?;

    let resp = post_json(&format!("{}/", master.base), &json!({ "port": port })).await?;
    assert_eq!(resp.status(), 403);
    assert!(master.registry.is_empty().await);

    game.abort();
    Ok(())
}

#[tokio::test]
async fn checker_distinguishes_servers() -> Result<()> {
    let (open, a) = spawn_game_server(true).await?;
    let (closed, b) = spawn_game_server(false).await?;
    let checker = ReachabilityChecker::new(Duration::from_millis(300));

    assert!(checker.check(([127, 0, 0, 1], open).into()).await);
    assert!(!checker.check(([127, 0, 0, 1], closed).into()).await);

    a.abort();
    b.abort();
    Ok(())
}
