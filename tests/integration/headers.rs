use crate::*;
use serde_json::json;

fn assert_standard_headers(resp: &reqwest::Response) {
    let headers = resp.headers();
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["server"], teemaster_api::SERVER_NAME);
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
}

#[tokio::test]
async fn every_response_carries_standard_headers() -> Result<()> {
    let master = spawn_master(&MemoryCache::new(), MasterOptions::default()).await?;
    let root = format!("{}/", master.base);

    let resp = get(&root).await?;
    assert_eq!(resp.status(), 200);
    assert_standard_headers(&resp);

    let resp = post_json(&root, &json!({ "port": 8303 })).await?;
    assert_eq!(resp.status(), 201);
    assert_standard_headers(&resp);

    let resp = post_raw(&root, "text/plain", "nope").await?;
    assert_eq!(resp.status(), 415);
    assert_standard_headers(&resp);

    let resp = get(&format!("{}/nowhere", master.base)).await?;
    assert_eq!(resp.status(), 404);
    assert_standard_headers(&resp);

    Ok(())
}

#[test]
fn server_name_has_version() {
    assert!(teemaster_api::SERVER_NAME.starts_with("TeeMaster/"));
    assert!(teemaster_api::SERVER_NAME.len() > "TeeMaster/".len());
}
