use crate::models::chunk::Chunk;
use crate::models::state::StreamState;
use crate::storage::clip_stream::ClipStreamEvent;

/// Event delegate for stream session notifications.
///
/// All methods are called on whichever thread feeds the session.
/// Implementations should marshal to their own thread if needed.
pub trait StreamDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: StreamState);

    /// Called with every JSON-bearing chunk decoded from the transport.
    fn on_chunk(&self, chunk: &Chunk);

    /// Called with each text record split out of the audio stream.
    fn on_text(&self, text: &str);

    /// Called when the decoded clip becomes ready, grows or completes.
    fn on_clip_event(&self, event: ClipStreamEvent);
}
