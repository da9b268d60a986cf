use super::{CatalogService, ChartSource, CredentialProvider, PlaylistService};
use crate::error::{Result, SyncError};
use crate::models::{
    AccessCredentials, BulkOp, CatalogItem, CatalogPage, ChartEntry, PlaylistSummary, Ticket,
    TicketStatus, TrackRef,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tracing::info;

/// In-memory catalog used in tests. Bulk updates materialize items with
/// fresh song ids; reads page over stored items; every ticket serves a
/// scripted status sequence, defaulting to complete on the first poll.
/// The index keyvalue is stored as a string, the way the remote echoes
/// it back.
pub struct MockCatalog {
    state: Mutex<CatalogState>,
    /// (song, artist) -> foreign ids served as candidate tracks.
    track_index: Mutex<HashMap<(String, String), Vec<String>>>,
}

#[derive(Default)]
struct CatalogState {
    items: Vec<CatalogItem>,
    next_song_id: u64,
    next_ticket: u64,
    scripts: VecDeque<Vec<TicketStatus>>,
    serving: HashMap<String, (Vec<TicketStatus>, usize)>,
    read_calls: u32,
    bulk_calls: Vec<Vec<BulkOp>>,
    status_calls: HashMap<String, u32>,
    create_calls: Vec<String>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
            track_index: Mutex::new(HashMap::new()),
        }
    }

    /// Serve `foreign_id` as a candidate track for the given song. Repeated
    /// calls for the same song append further candidates.
    pub fn resolve_track(&self, song: &str, artist: &str, foreign_id: &str) {
        let mut index = self.track_index.lock().unwrap();
        index
            .entry((song.to_string(), artist.to_string()))
            .or_default()
            .push(foreign_id.to_string());
    }

    /// Status sequence served for the next submitted bulk update. The last
    /// entry repeats when polled past the end.
    pub fn push_ticket_script(&self, script: Vec<TicketStatus>) {
        let script = if script.is_empty() {
            vec![TicketStatus::Complete]
        } else {
            script
        };
        self.state.lock().unwrap().scripts.push_back(script);
    }

    /// Pre-populate the catalog, e.g. with leftovers from an earlier run.
    pub fn seed_items(&self, items: Vec<CatalogItem>) {
        self.state.lock().unwrap().items.extend(items);
    }

    /// Rearrange stored items; reads afterwards return this order. Lets
    /// tests present items in other than insertion order.
    pub fn reorder_items(&self, order: &[usize]) {
        let mut state = self.state.lock().unwrap();
        let old = std::mem::take(&mut state.items);
        state.items = order.iter().filter_map(|&i| old.get(i).cloned()).collect();
    }

    pub fn items_snapshot(&self) -> Vec<CatalogItem> {
        self.state.lock().unwrap().items.clone()
    }

    pub fn read_call_count(&self) -> u32 {
        self.state.lock().unwrap().read_calls
    }

    pub fn bulk_calls(&self) -> Vec<Vec<BulkOp>> {
        self.state.lock().unwrap().bulk_calls.clone()
    }

    pub fn status_call_count(&self, ticket: &Ticket) -> u32 {
        *self
            .state
            .lock()
            .unwrap()
            .status_calls
            .get(&ticket.0)
            .unwrap_or(&0)
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().create_calls.clone()
    }

    fn tracks_for(&self, song: &str, artist: &str) -> Vec<TrackRef> {
        let index = self.track_index.lock().unwrap();
        index
            .get(&(song.to_string(), artist.to_string()))
            .map(|ids| {
                ids.iter()
                    .map(|f| TrackRef {
                        foreign_id: f.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogService for MockCatalog {
    async fn create_catalog(&self, name: &str) -> Result<String> {
        info!("MockCatalog: create_catalog {}", name);
        self.state
            .lock()
            .unwrap()
            .create_calls
            .push(name.to_string());
        Ok("CAMOCK".to_string())
    }

    async fn read_page(
        &self,
        _catalog_id: &str,
        start: usize,
        results: usize,
        extended: bool,
    ) -> Result<CatalogPage> {
        let mut state = self.state.lock().unwrap();
        state.read_calls += 1;
        let total = state.items.len();
        let items = state
            .items
            .iter()
            .skip(start)
            .take(results)
            .cloned()
            .map(|mut item| {
                if !extended {
                    item.tracks = Vec::new();
                    item.item_keyvalues = None;
                }
                item
            })
            .collect();
        Ok(CatalogPage { total, items })
    }

    async fn bulk_update(&self, _catalog_id: &str, ops: &[BulkOp]) -> Result<Ticket> {
        info!("MockCatalog: bulk_update with {} op(s)", ops.len());
        let tracks: Vec<Vec<TrackRef>> = ops
            .iter()
            .map(|op| match op {
                BulkOp::Update {
                    song_name,
                    artist_name,
                    ..
                } => self.tracks_for(song_name, artist_name),
                BulkOp::Delete { .. } => Vec::new(),
            })
            .collect();

        let mut state = self.state.lock().unwrap();
        state.bulk_calls.push(ops.to_vec());
        for (op, tracks) in ops.iter().zip(tracks) {
            match op {
                BulkOp::Delete { song_id } => {
                    state
                        .items
                        .retain(|item| item.song_id.as_deref() != Some(song_id));
                }
                BulkOp::Update {
                    song_name,
                    artist_name,
                    item_keyvalues,
                } => {
                    let song_id = format!("SO{:06}", state.next_song_id);
                    state.next_song_id += 1;
                    let mut kv = serde_json::Map::new();
                    kv.insert(
                        "index".into(),
                        serde_json::Value::String(item_keyvalues.index.to_string()),
                    );
                    state.items.push(CatalogItem {
                        song_id: Some(song_id),
                        song_name: song_name.clone(),
                        artist_name: artist_name.clone(),
                        item_keyvalues: Some(kv),
                        tracks,
                    });
                }
            }
        }
        let id = format!("ticket-{}", state.next_ticket);
        state.next_ticket += 1;
        let script = state
            .scripts
            .pop_front()
            .unwrap_or_else(|| vec![TicketStatus::Complete]);
        state.serving.insert(id.clone(), (script, 0));
        Ok(Ticket(id))
    }

    async fn ticket_status(&self, ticket: &Ticket) -> Result<TicketStatus> {
        let mut state = self.state.lock().unwrap();
        *state.status_calls.entry(ticket.0.clone()).or_insert(0) += 1;
        let (script, pos) = state
            .serving
            .get_mut(&ticket.0)
            .ok_or_else(|| SyncError::Protocol(format!("unknown ticket {}", ticket)))?;
        let status = script[(*pos).min(script.len() - 1)].clone();
        *pos += 1;
        Ok(status)
    }
}

/// Calls a [`MockPlaylist`] has served, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistCall {
    Create { name: String },
    List,
    Remove { key: String, index: usize, count: usize },
    Add { key: String, tracks: Vec<String> },
}

/// In-memory playlist account. Holds playlists with their track keys and
/// records every call for assertions.
pub struct MockPlaylist {
    state: Mutex<PlaylistState>,
}

#[derive(Default)]
struct PlaylistState {
    playlists: Vec<PlaylistSummary>,
    calls: Vec<PlaylistCall>,
    next_key: u64,
    fail_remove: bool,
    access: Option<AccessCredentials>,
}

impl MockPlaylist {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlaylistState {
                next_key: 1,
                ..Default::default()
            }),
        }
    }

    pub fn with_playlist(self, key: &str, name: &str, tracks: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.playlists.push(PlaylistSummary {
                key: key.to_string(),
                name: name.to_string(),
                track_keys: tracks.iter().map(|t| t.to_string()).collect(),
            });
        }
        self
    }

    /// Make the next remove call fail with a protocol error.
    pub fn fail_remove(&self) {
        self.state.lock().unwrap().fail_remove = true;
    }

    pub fn calls(&self) -> Vec<PlaylistCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn tracks_of(&self, key: &str) -> Option<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.track_keys.clone())
    }

    pub fn access(&self) -> Option<AccessCredentials> {
        self.state.lock().unwrap().access.clone()
    }
}

impl Default for MockPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaylistService for MockPlaylist {
    async fn set_access(&self, access: AccessCredentials) {
        self.state.lock().unwrap().access = Some(access);
    }

    async fn create_playlist(&self, name: &str, _description: &str) -> Result<String> {
        info!("MockPlaylist: create_playlist {}", name);
        let mut state = self.state.lock().unwrap();
        state.calls.push(PlaylistCall::Create {
            name: name.to_string(),
        });
        let key = format!("pl-{}", state.next_key);
        state.next_key += 1;
        state.playlists.push(PlaylistSummary {
            key: key.clone(),
            name: name.to_string(),
            track_keys: Vec::new(),
        });
        Ok(key)
    }

    async fn owned_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(PlaylistCall::List);
        Ok(state.playlists.clone())
    }

    async fn remove_tracks(
        &self,
        playlist_key: &str,
        index: usize,
        count: usize,
        _tracks: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(PlaylistCall::Remove {
            key: playlist_key.to_string(),
            index,
            count,
        });
        if state.fail_remove {
            return Err(SyncError::Protocol("removeFromPlaylist failed".into()));
        }
        if let Some(playlist) = state.playlists.iter_mut().find(|p| p.key == playlist_key) {
            let end = (index + count).min(playlist.track_keys.len());
            if index < end {
                playlist.track_keys.drain(index..end);
            }
        }
        Ok(())
    }

    async fn add_tracks(&self, playlist_key: &str, tracks: &[String]) -> Result<()> {
        info!(
            "MockPlaylist: add_tracks {} -> {} track(s)",
            playlist_key,
            tracks.len()
        );
        let mut state = self.state.lock().unwrap();
        state.calls.push(PlaylistCall::Add {
            key: playlist_key.to_string(),
            tracks: tracks.to_vec(),
        });
        if let Some(playlist) = state.playlists.iter_mut().find(|p| p.key == playlist_key) {
            playlist.track_keys.extend(tracks.iter().cloned());
        }
        Ok(())
    }
}

/// Chart source returning a fixed entry list.
pub struct MockChart {
    entries: Vec<ChartEntry>,
}

impl MockChart {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(song, artist)| ChartEntry::new(*song, *artist))
                .collect(),
        }
    }
}

#[async_trait]
impl ChartSource for MockChart {
    async fn fetch_entries(&self) -> Result<Vec<ChartEntry>> {
        Ok(self.entries.clone())
    }
}

/// Credential provider handing out a fixed token pair, counting how often
/// it was asked.
pub struct MockCredentials {
    obtain_calls: AtomicU32,
}

impl MockCredentials {
    pub fn new() -> Self {
        Self {
            obtain_calls: AtomicU32::new(0),
        }
    }

    pub fn obtain_calls(&self) -> u32 {
        self.obtain_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockCredentials {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for MockCredentials {
    async fn obtain_access_credentials(&self) -> Result<AccessCredentials> {
        self.obtain_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessCredentials {
            token: "mock-token".into(),
            token_secret: "mock-secret".into(),
        })
    }
}
