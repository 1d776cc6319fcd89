thread_local! {
    static IS_AUDIO_THREAD: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

pub(crate) fn is_audio_thread() -> bool {
    IS_AUDIO_THREAD.with(|x| x.get())
}

/// Mark the calling thread as the one rendering audio.
///
/// From then on, logging from this thread goes through the realtime ring and dropping replaced engines is handed to a
/// background thread.  [crate::Renderer::render] calls this on every block; it is a thread-local store.
#[inline(always)]
pub(crate) fn mark_audio_thread() {
    IS_AUDIO_THREAD.with(|x| x.set(true));
}
