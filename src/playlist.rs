use crate::api::PlaylistService;
use crate::error::{Result, SyncError};
use log::info;

/// Replace the playlist's contents with `tracks`, in order.
///
/// The remote offers no replace call, so this is one remove of everything
/// currently in the playlist followed by one ordered add. The remove's
/// round trip finishes before the add goes out; a failed remove leaves the
/// old contents in place rather than appending to them.
pub async fn replace_playlist(
    playlist: &dyn PlaylistService,
    playlist_key: &str,
    tracks: &[String],
) -> Result<()> {
    let owned = playlist.owned_playlists().await?;
    let current = owned
        .into_iter()
        .find(|p| p.key == playlist_key)
        .ok_or_else(|| SyncError::PlaylistNotFound {
            key: playlist_key.to_string(),
        })?;

    if !current.track_keys.is_empty() {
        info!(
            "removing {} track(s) from playlist {}",
            current.track_keys.len(),
            playlist_key
        );
        playlist
            .remove_tracks(playlist_key, 0, current.track_keys.len(), &current.track_keys)
            .await?;
    }

    if tracks.is_empty() {
        info!("no resolved tracks; playlist {} left empty", playlist_key);
        return Ok(());
    }

    info!("adding {} track(s) to playlist {}", tracks.len(), playlist_key);
    playlist.add_tracks(playlist_key, tracks).await?;
    Ok(())
}
