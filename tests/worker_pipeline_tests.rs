use chart_playlist_sync::api::mock::{
    MockCatalog, MockChart, MockCredentials, MockPlaylist, PlaylistCall,
};
use chart_playlist_sync::cancel::CancelToken;
use chart_playlist_sync::config::ConfigStore;
use chart_playlist_sync::models::AccessCredentials;
use chart_playlist_sync::worker::{run_sync_once, Services};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

const FRESH_CONFIG: &str = r#"{
    "serviceKeys": {
        "echonestApiKey": "EN_KEY",
        "rdioConsumerKey": "RD_KEY",
        "rdioConsumerSecret": "RD_SECRET"
    },
    "playlistName": "iTunes Charts",
    "ticketPollIntervalMs": 2,
    "maxRetriesOnError": 0
}"#;

struct Harness {
    _td: tempfile::TempDir,
    store: ConfigStore,
    chart: Arc<MockChart>,
    catalog: Arc<MockCatalog>,
    playlist: Arc<MockPlaylist>,
    credentials: Arc<MockCredentials>,
}

impl Harness {
    fn new(config_json: &str, chart_rows: &[(&str, &str)]) -> Self {
        let td = tempdir().unwrap();
        let path = td.path().join("config.json");
        fs::write(&path, config_json).unwrap();
        Self {
            _td: td,
            store: ConfigStore::new(path),
            chart: Arc::new(MockChart::new(chart_rows)),
            catalog: Arc::new(MockCatalog::new()),
            playlist: Arc::new(MockPlaylist::new()),
            credentials: Arc::new(MockCredentials::new()),
        }
    }

    fn services(&self) -> Services {
        Services {
            chart: self.chart.clone(),
            catalog: self.catalog.clone(),
            playlist: self.playlist.clone(),
            credentials: self.credentials.clone(),
        }
    }

    async fn run(&self) -> chart_playlist_sync::error::Result<()> {
        run_sync_once(&self.store, &self.services(), &CancelToken::new()).await
    }
}

#[tokio::test]
async fn first_run_bootstraps_and_mirrors_the_chart() {
    let h = Harness::new(FRESH_CONFIG, &[("A", "X"), ("B", "Y"), ("A", "X")]);
    h.catalog.resolve_track("A", "X", "rdio-DE:track:t1");
    h.catalog.resolve_track("B", "Y", "rdio-DE:track:t2");

    h.run().await.expect("first run");

    // duplicate chart row collapsed, order preserved
    assert_eq!(
        h.playlist.tracks_of("pl-1"),
        Some(vec!["t1".to_string(), "t2".to_string()])
    );
    assert_eq!(h.credentials.obtain_calls(), 1);
    assert_eq!(h.catalog.create_calls(), vec!["chart-playlist-sync".to_string()]);
    assert_eq!(
        h.playlist.access(),
        Some(AccessCredentials {
            token: "mock-token".into(),
            token_secret: "mock-secret".into(),
        })
    );

    // resolved ids were written back to the config file
    let cfg = h.store.load().expect("reload");
    assert_eq!(cfg.catalog_id.as_deref(), Some("CAMOCK"));
    assert_eq!(cfg.playlist_key.as_deref(), Some("pl-1"));
    assert!(cfg.access.is_some());
}

#[tokio::test]
async fn second_run_reuses_resolved_ids_and_replaces_in_place() {
    let h = Harness::new(FRESH_CONFIG, &[("A", "X"), ("B", "Y")]);
    h.catalog.resolve_track("A", "X", "rdio-DE:track:t1");
    h.catalog.resolve_track("B", "Y", "rdio-DE:track:t2");

    h.run().await.expect("first run");
    let after_first = fs::read_to_string(h.store.path()).unwrap();
    h.run().await.expect("second run");

    // credentials and remote objects are resolved once, then reused
    assert_eq!(h.credentials.obtain_calls(), 1);
    assert_eq!(h.catalog.create_calls().len(), 1);
    assert_eq!(
        h.playlist
            .calls()
            .iter()
            .filter(|c| matches!(c, PlaylistCall::Create { .. }))
            .count(),
        1
    );
    // the unchanged config is not rewritten
    assert_eq!(fs::read_to_string(h.store.path()).unwrap(), after_first);

    // second run went through a full remove-then-add cycle
    assert!(h.playlist.calls().contains(&PlaylistCall::Remove {
        key: "pl-1".into(),
        index: 0,
        count: 2,
    }));
    assert_eq!(
        h.playlist.tracks_of("pl-1"),
        Some(vec!["t1".to_string(), "t2".to_string()])
    );
}

#[tokio::test]
async fn fully_resolved_config_skips_the_auth_flow() {
    let resolved = r#"{
        "serviceKeys": {
            "echonestApiKey": "EN_KEY",
            "rdioConsumerKey": "RD_KEY",
            "rdioConsumerSecret": "RD_SECRET"
        },
        "playlistName": "iTunes Charts",
        "catalogId": "CAMOCK",
        "playlistKey": "pl-9",
        "access": {"token": "saved-token", "tokenSecret": "saved-secret"},
        "ticketPollIntervalMs": 2,
        "maxRetriesOnError": 0
    }"#;
    let h = Harness::new(resolved, &[("A", "X")]);
    h.catalog.resolve_track("A", "X", "rdio-DE:track:t1");
    // pl-9 must already exist remotely; the run does not create playlists
    let playlist = MockPlaylist::new().with_playlist("pl-9", "iTunes Charts", &[]);
    let h = Harness {
        playlist: Arc::new(playlist),
        ..h
    };
    let before = fs::read_to_string(h.store.path()).unwrap();

    h.run().await.expect("run");

    assert_eq!(h.credentials.obtain_calls(), 0);
    assert!(h.catalog.create_calls().is_empty());
    assert_eq!(
        h.playlist.access(),
        Some(AccessCredentials {
            token: "saved-token".into(),
            token_secret: "saved-secret".into(),
        })
    );
    assert_eq!(h.playlist.tracks_of("pl-9"), Some(vec!["t1".to_string()]));
    assert_eq!(fs::read_to_string(h.store.path()).unwrap(), before);
}

#[tokio::test]
async fn chart_rows_without_candidates_shrink_the_playlist() {
    let h = Harness::new(FRESH_CONFIG, &[("A", "X"), ("B", "Y"), ("C", "Z")]);
    h.catalog.resolve_track("A", "X", "rdio-DE:track:t1");
    h.catalog.resolve_track("C", "Z", "rdio-DE:track:t3");

    h.run().await.expect("run");

    assert_eq!(
        h.playlist.tracks_of("pl-1"),
        Some(vec!["t1".to_string(), "t3".to_string()])
    );
}

#[tokio::test]
async fn missing_config_file_fails_before_any_remote_call() {
    let td = tempdir().unwrap();
    let store = ConfigStore::new(td.path().join("absent.json"));
    let h = Harness::new(FRESH_CONFIG, &[]);

    let result = run_sync_once(&store, &h.services(), &CancelToken::new()).await;
    assert!(result.is_err());
    assert_eq!(h.credentials.obtain_calls(), 0);
    assert_eq!(h.catalog.read_call_count(), 0);
}
