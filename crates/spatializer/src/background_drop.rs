//! Dropping on a background thread.
//!
//! Replacing the reverb's convolution engine on the render thread would otherwise free megabytes of spectra there.
//! Values wrapped in [BackgroundDrop] are instead pushed onto a static queue when dropped on a thread marked with
//! [crate::is_audio_thread::mark_audio_thread], and a worker frees them.  Other threads drop inline, which keeps the
//! queue free of pressure from threads which don't need it.
//!
//! If the queue is full the value is dropped inline as a last resort.
use std::any::Any;
use std::time::Duration;

use thingbuf::StaticThingBuf;

use crate::is_audio_thread::is_audio_thread;
use crate::option_recycler::OptionRecycler;

/// Values which may be pending a drop at once.
const BACKLOG: usize = 256;

/// Times the worker yields after finding no work, before it starts sleeping.
const YIELDS: usize = 5;

/// Sleep between polls once idle.  Windows timers rarely do better than 15ms anyway.
const SLEEP: Duration = Duration::from_millis(20);

#[derive(derivative::Derivative)]
#[derivative(Debug)]
struct DropElement(#[derivative(Debug = "ignore")] Box<dyn Any + Send>);

// SAFETY: the queue only moves elements in and out under exclusive slot access; the boxed value is never shared by
// reference between threads, so `Send` on the contents is sufficient.
unsafe impl Sync for DropElement {}

static WORK_QUEUE: StaticThingBuf<Option<DropElement>, BACKLOG, OptionRecycler> =
    StaticThingBuf::<Option<DropElement>, BACKLOG, OptionRecycler>::with_recycle(OptionRecycler);

/// A box which, when dropped on the render thread, is freed elsewhere.
#[derive(Debug)]
pub(crate) struct BackgroundDrop<T: Send + 'static> {
    inner: Option<Box<T>>,
}

impl<T: Send + 'static> BackgroundDrop<T> {
    pub(crate) fn new(value: Box<T>) -> Self {
        BackgroundDrop { inner: Some(value) }
    }
}

impl<T: Send + 'static> std::ops::Deref for BackgroundDrop<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner
            .as_deref()
            .expect("Only emptied while dropping")
    }
}

impl<T: Send + 'static> std::ops::DerefMut for BackgroundDrop<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner
            .as_deref_mut()
            .expect("Only emptied while dropping")
    }
}

impl<T: Send + 'static> Drop for BackgroundDrop<T> {
    fn drop(&mut self) {
        if !is_audio_thread() {
            return;
        }

        if let Some(inner) = self.inner.take() {
            enqueue_or_drop(DropElement(inner));
        }
    }
}

fn enqueue_or_drop(element: DropElement) {
    // On failure the element comes back inside the error and is dropped right here.
    std::mem::drop(WORK_QUEUE.push(Some(element)));
}

/// Start the worker, if it isn't running already.
pub(crate) fn ensure_background_drop_thread_started() {
    use std::sync::Once;

    static THREAD_STARTED: Once = Once::new();
    THREAD_STARTED.call_once(|| {
        if let Err(e) = std::thread::Builder::new()
            .name("spatializer-drop".into())
            .spawn(background_drop_worker)
        {
            // Without the worker, values just queue until the queue is full, and then drop inline.
            log::error!("Unable to start the background drop thread: {e}");
        }
    });
}

fn background_drop_worker() {
    let mut idle = 0;
    loop {
        if let Some(element) = WORK_QUEUE.pop() {
            std::mem::drop(element);
            idle = 0;
            continue;
        }

        idle += 1;
        if idle < YIELDS {
            std::thread::yield_now();
        } else {
            std::thread::sleep(SLEEP);
        }
    }
}
