use crate::*;
use serde_json::json;
use teemaster_core::Token;

#[tokio::test]
async fn register_returns_token_and_expiry() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;

    let resp = post_json(&format!("{}/", master.base), &json!({ "port": 8303 })).await?;
    assert_eq!(resp.status(), 201);
    let body = json(resp).await?;
    assert_eq!(body["token"].as_str().map(str::len), Some(32));
    assert!(body["expire"].as_u64().is_some(), "missing expire: {body}");

    assert_eq!(master.registry.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn legacy_port_field_is_accepted() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    let resp = post_json(&format!("{}/", master.base), &json!({ "Port": 8303 })).await?;
    assert_eq!(resp.status(), 201);
    Ok(())
}

#[tokio::test]
async fn malformed_requests_are_rejected() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    let url = format!("{}/", master.base);

    let resp = post_raw(&url, "application/json", "}invalid json}{}{{").await?;
    assert_eq!(resp.status(), 400);
    assert!(json(resp).await?["error"].is_string());

    let resp = post_raw(&url, "text/plain", "hello world!").await?;
    assert_eq!(resp.status(), 415);

    let resp = post_json(&url, &json!({ "port": 0 })).await?;
    assert_eq!(resp.status(), 400);

    let resp = post_json(&url, &json!({ "port": 8303, "players": 4 })).await?;
    assert_eq!(resp.status(), 400);

    let resp = post_raw(&url, "application/json; charset=utf-8", r#"{"port": 8303}"#).await?;
    assert_eq!(resp.status(), 201);

    Ok(())
}

#[tokio::test]
async fn same_address_cannot_register_twice() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    register(&master.base, 8303).await?;

    let resp = post_json(&format!("{}/", master.base), &json!({ "port": 8304 })).await?;
    assert_eq!(resp.status(), 409);
    assert_eq!(master.registry.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_registrations_from_one_address() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    let url = format!("{}/", master.base);
    let body = json!({ "port": 8303 });

    let (a, b) = tokio::join!(post_json(&url, &body), post_json(&url, &body));
    let mut statuses = [a?.status().as_u16(), b?.status().as_u16()];
    statuses.sort_unstable();

    assert_eq!(statuses, [201, 409]);
    assert_eq!(master.registry.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn rebind_with_unknown_token_is_not_found() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    let resp = post_json(
        &format!("{}/", master.base),
        &json!({ "port": 8303, "token": "00112233445566778899aabbccddeeff" }),
    )
    .await?;
    assert_eq!(resp.status(), 404);
    Ok(())
}

#[tokio::test]
async fn rebind_adds_second_family() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    let Some(base6) = master.base6.clone() else {
        eprintln!("SKIP: no IPv6 loopback");
        return Ok(());
    };

    let token = register(&master.base, 8303).await?;

    // Wrong port: refused, entry untouched.
    let resp = post_json(
        &format!("{base6}/"),
        &json!({ "port": 8304, "token": token }),
    )
    .await?;
    assert_eq!(resp.status(), 400);
    let entry = master
        .registry
        .lookup(&Token::from_client(token.clone()), std::time::Instant::now())
        .await
        .context("entry vanished")?;
    assert!(entry.address6.is_none());

    let resp = post_json(
        &format!("{base6}/"),
        &json!({ "port": 8303, "token": token }),
    )
    .await?;
    assert_eq!(resp.status(), 201);
    assert_eq!(json(resp).await?["token"], token.as_str());

    // The listing is served from the published snapshot, which catches up
    // with the rebind after the debounce window.
    let url = format!("{}/", master.base);
    let expected = json!([{ "address4": "127.0.0.1", "address6": "::1", "port": 8303 }]);
    eventually(|| {
        let url = url.clone();
        let expected = expected.clone();
        async move { anyhow::Ok(json(get(&url).await?).await? == expected) }
    })
    .await?;
    Ok(())
}
