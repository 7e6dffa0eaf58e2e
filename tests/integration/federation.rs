use crate::*;
use serde_json::json;

async fn listing_len(base: &str) -> Result<usize> {
    let listing = json(get(&format!("{base}/")).await?).await?;
    Ok(listing.as_array().context("listing is not an array")?.len())
}

#[tokio::test]
async fn empty_master_lists_nothing() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    let resp = get(&format!("{}/", master.base)).await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(json(resp).await?, json!([]));
    Ok(())
}

#[tokio::test]
async fn absent_peer_does_not_fail_listing() -> Result<()> {
    let options = MasterOptions {
        peers: vec!["ghost".to_string()],
        ..MasterOptions::default()
    };
    let master = spawn_master(&MemoryCache::new(), options).await?;
    register(&master.base, 8303).await?;

    let resp = get(&format!("{}/", master.base)).await?;
    assert_eq!(resp.status(), 200);
    let listing = json(resp).await?;
    assert_eq!(
        listing,
        json!([{ "address4": "127.0.0.1", "address6": null, "port": 8303 }])
    );
    Ok(())
}

#[tokio::test]
async fn peers_see_each_others_servers() -> Result<()> {
    let cache = MemoryCache::new();
    let eu = spawn_master(
        &cache,
        MasterOptions {
            identifier: "eu",
            peers: vec!["us".to_string()],
            ..MasterOptions::default()
        },
    )
    .await?;
    let us = spawn_master(
        &cache,
        MasterOptions {
            identifier: "us",
            peers: vec!["eu".to_string()],
            ..MasterOptions::default()
        },
    )
    .await?;

    register(&eu.base, 8303).await?;

    // The publish is debounced; wait for it to reach the other side.
    let us_base = us.base.clone();
    eventually(|| {
        let base = us_base.clone();
        async move { anyhow::Ok(listing_len(&base).await? == 1) }
    })
    .await?;
    assert_eq!(listing_len(&eu.base).await?, 1);

    // `us` has now seen the address in its peer view and refuses it.
    let resp = post_json(&format!("{}/", us.base), &json!({ "port": 8303 })).await?;
    assert_eq!(resp.status(), 409);
    assert!(us.registry.is_empty().await);
    Ok(())
}
