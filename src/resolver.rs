//! Turns a playlist URL into the list of items the user can pick from.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::activity::Event;
use crate::error::{PlatformError, ResolveError};
use crate::model::{Playlist, PlaylistReference};
use crate::platform::PlatformClient;

/// Validates `input`, lists the playlist and fetches metadata for every entry.
///
/// Entries whose metadata cannot be fetched are skipped (one `ItemSkipped`
/// event each); the rest keep the platform's order.
pub async fn resolve(
    client: &dyn PlatformClient,
    input: &str,
    events: &UnboundedSender<Event>,
) -> Result<Playlist, ResolveError> {
    let reference = PlaylistReference::parse(input)?;
    info!(%reference, list = reference.list_id(), "resolving playlist");

    let listing = client
        .resolve_playlist(&reference)
        .await
        .map_err(ResolveError::Listing)?;
    let _ = events.send(Event::PlaylistFound {
        title: listing.title.clone(),
        entries: listing.entries.len(),
    });

    let mut items = Vec::with_capacity(listing.entries.len());
    for url in listing.entries {
        match client.fetch_item_metadata(&url).await {
            Ok(item) => items.push(item),
            Err(err) => {
                let reason = match err {
                    PlatformError::ItemUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                warn!(%url, %reason, "skipping playlist entry");
                let _ = events.send(Event::ItemSkipped { url, reason });
            }
        }
    }

    info!(items = items.len(), "playlist resolved");
    Ok(Playlist {
        title: listing.title,
        items,
    })
}
