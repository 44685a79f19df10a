use crate::audio::{MediaEngine, PlaybackController};
use crate::mpris::MprisHandle;

/// Push the controller's current track and state to the MPRIS thread.
/// The handle only signals the bus when something actually changed.
pub fn update_mpris<E: MediaEngine>(mpris: &MprisHandle, controller: &PlaybackController<E>) {
    let track = controller.current_track();
    let index = track.and(controller.queue().cursor());
    mpris.set_track_metadata(index, track);
    mpris.set_playback(controller.state());
}
