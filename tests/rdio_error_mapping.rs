use chart_playlist_sync::api::rdio::RdioClient;
use chart_playlist_sync::api::PlaylistService;
use chart_playlist_sync::error::SyncError;
use chart_playlist_sync::models::AccessCredentials;
use mockito::{Matcher, Server};
use serde_json::json;
use std::env;

fn method_is(name: &str) -> Matcher {
    Matcher::UrlEncoded("method".into(), name.into())
}

#[test]
fn api_errors_map_to_their_classes() {
    let mut server = Server::new();
    env::set_var("RDIO_API_BASE", server.url());

    // 200 with a non-ok status is how the endpoint reports call failures
    let _m_create = server
        .mock("POST", "/")
        .match_body(method_is("createPlaylist"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"status": "error", "message": "Invalid signature"}).to_string(),
        )
        .create();

    let _m_add = server
        .mock("POST", "/")
        .match_body(method_is("addToPlaylist"))
        .with_status(500)
        .with_body("worker died")
        .create();

    let _m_remove = server
        .mock("POST", "/")
        .match_body(method_is("removeFromPlaylist"))
        .with_status(429)
        .with_header("retry-after", "7")
        .with_body("slow down")
        .create();

    let _m_list = server
        .mock("POST", "/")
        .match_body(method_is("getPlaylists"))
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html>maintenance</html>")
        .create();

    let client = RdioClient::new("RD_KEY".into(), "RD_SECRET".into());
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        // before set_access every call fails locally
        let err = client.owned_playlists().await.expect_err("no access");
        match &err {
            SyncError::Config(msg) => assert!(msg.contains("auth"), "msg: {}", msg),
            other => panic!("expected Config, got {}", other),
        }

        client
            .set_access(AccessCredentials {
                token: "tok".into(),
                token_secret: "sec".into(),
            })
            .await;

        let err = client
            .create_playlist("Charts", "")
            .await
            .expect_err("status error");
        match &err {
            SyncError::Protocol(msg) => {
                assert!(msg.contains("Invalid signature"), "msg: {}", msg)
            }
            other => panic!("expected Protocol, got {}", other),
        }
        assert!(!err.is_transient());

        let tracks = vec!["t1".to_string()];
        let err = client
            .add_tracks("pl-1", &tracks)
            .await
            .expect_err("server error");
        assert!(matches!(err, SyncError::Http(_)));
        assert!(err.is_transient());

        let err = client
            .remove_tracks("pl-1", 0, 1, &tracks)
            .await
            .expect_err("throttled");
        match err {
            SyncError::RateLimit { retry_after } => assert_eq!(retry_after, 7),
            other => panic!("expected RateLimit, got {}", other),
        }

        let err = client.owned_playlists().await.expect_err("garbage body");
        match err {
            SyncError::Protocol(msg) => {
                assert!(msg.contains("unparseable response"), "msg: {}", msg)
            }
            other => panic!("expected Protocol, got {}", other),
        }
    });
}
