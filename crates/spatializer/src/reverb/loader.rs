//! The background thread which turns impulse response sources into ready-to-run engines.
//!
//! Each reverb owns one loader thread.  Requests arrive over a channel, each tagged with a generation drawn from a
//! shared counter at request time.  The thread coalesces whatever is queued (the newest generation wins, using the
//! newest queued source which decodes), resamples, builds a [ConvolutionEngine], and publishes it through a mailbox,
//! unless by then a newer generation has been requested.
//!
//! A request without a source rebuilds from the most recently decoded impulse, which is how a change of sample rate or
//! block size gets a matching engine.
//!
//! A request whose source fails to decode still makes every older engine stale.  So unless the render side is already
//! running the last engine built from the current impulse, a failure rebuilds that impulse under the failed request's
//! generation, and whatever was playing before keeps playing.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF64;
use audio_synchronization::MailboxSender;
use crossbeam::channel as chan;

use super::{decode, resample, ConvolutionEngine, ImpulseSource, LoadError, LoadedImpulse};

/// An engine and the request it answers.
#[derive(Debug)]
pub(crate) struct StagedEngine {
    pub(crate) generation: u64,
    pub(crate) engine: ConvolutionEngine,
}

/// State shared between the render side, the controls, and the loader thread.
#[derive(Debug, Default)]
pub(crate) struct LoaderShared {
    pub(crate) latest_generation: AtomicU64,
    /// Generation of the engine the render side is running, 0 if none.  Written only by the render side.
    pub(crate) installed_generation: AtomicU64,
    /// 0 until configured.
    pub(crate) sample_rate: AtomicF64,
    pub(crate) block_size: AtomicUsize,
}

impl LoaderShared {
    fn format(&self) -> Option<(u32, usize)> {
        let sr = self.sample_rate.load(Ordering::Acquire);
        let block = self.block_size.load(Ordering::Acquire);
        (sr > 0.0 && block > 0).then_some((sr.round() as u32, block))
    }
}

#[derive(Debug)]
struct LoadRequest {
    generation: u64,
    source: Option<ImpulseSource>,
}

/// Cheap to clone.  Every clone talks to the same thread.
#[derive(Debug, Clone)]
pub(crate) struct LoaderHandle {
    sender: chan::Sender<LoadRequest>,
    shared: Arc<LoaderShared>,
}

impl LoaderHandle {
    /// Start a loader thread publishing into `mailbox`.
    ///
    /// The thread exits once every handle is gone.
    pub(crate) fn spawn(mailbox: MailboxSender<StagedEngine>) -> std::io::Result<LoaderHandle> {
        let (sender, receiver) = chan::unbounded();
        let shared = Arc::new(LoaderShared::default());

        {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name("spatializer-ir-loader".into())
                .spawn(move || loader_thread(receiver, shared, mailbox))?;
        }

        Ok(LoaderHandle { sender, shared })
    }

    pub(crate) fn shared(&self) -> &LoaderShared {
        &self.shared
    }

    /// Queue a request, returning its generation.
    pub(crate) fn request(&self, source: Option<ImpulseSource>) -> u64 {
        let generation = self.shared.latest_generation.fetch_add(1, Ordering::AcqRel) + 1;
        if self
            .sender
            .send(LoadRequest { generation, source })
            .is_err()
        {
            log::error!("Impulse response loader thread is gone; request {generation} is lost");
        }
        generation
    }

    /// Record a new render format, then ask for a rebuild of the current impulse.
    pub(crate) fn reconfigure(&self, sample_rate: f64, block_size: usize) -> u64 {
        self.shared.sample_rate.store(sample_rate, Ordering::Release);
        self.shared.block_size.store(block_size, Ordering::Release);
        self.request(None)
    }
}

/// Drain the queue behind `first`, returning the newest generation and every source among them, oldest first.
fn coalesce(first: LoadRequest, receiver: &chan::Receiver<LoadRequest>) -> (u64, Vec<ImpulseSource>) {
    let mut generation = first.generation;
    let mut sources = first.source.into_iter().collect::<Vec<_>>();
    for next in receiver.try_iter() {
        generation = generation.max(next.generation);
        sources.extend(next.source);
    }
    (generation, sources)
}

fn build_engine(impulse: &LoadedImpulse, sample_rate: u32, block_size: usize) -> Result<ConvolutionEngine, LoadError> {
    let channels = impulse
        .channels
        .iter()
        .map(|c| resample(c, impulse.sample_rate, sample_rate))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ConvolutionEngine::new(&channels, block_size))
}

fn loader_thread(
    receiver: chan::Receiver<LoadRequest>,
    shared: Arc<LoaderShared>,
    mailbox: MailboxSender<StagedEngine>,
) {
    let mut cached: Option<LoadedImpulse> = None;
    // Generation of the last engine sent which was built from `cached` at the current format.
    let mut sent: Option<u64> = None;

    while let Ok(first) = receiver.recv() {
        let (generation, sources) = coalesce(first, &receiver);

        let mut failed = false;
        for source in sources.iter().rev() {
            log::info!("Loading impulse response {source:?} for request {generation}");
            match decode(source) {
                Ok(loaded) => {
                    cached = Some(loaded);
                    sent = None;
                    failed = false;
                    break;
                }
                Err(e) => {
                    log::error!("Unable to load impulse response {source:?}: {e}");
                    failed = true;
                }
            }
        }

        if failed {
            if sent == Some(shared.installed_generation.load(Ordering::Acquire)) {
                continue;
            }
            if cached.is_some() {
                log::info!("Rebuilding the previous impulse response for request {generation}");
            }
        }

        let Some(impulse) = cached.as_ref() else {
            log::debug!("Request {generation} has no impulse response to build from");
            continue;
        };

        let Some((sample_rate, block_size)) = shared.format() else {
            log::debug!("Not configured yet; keeping the impulse response for later");
            continue;
        };

        let engine = match build_engine(impulse, sample_rate, block_size) {
            Ok(e) => e,
            Err(e) => {
                log::error!("Unable to prepare impulse response for {sample_rate} Hz: {e}");
                continue;
            }
        };

        if shared.latest_generation.load(Ordering::Acquire) > generation {
            log::debug!("Request {generation} was superseded before it finished");
            continue;
        }

        log::info!(
            "Impulse response ready for request {generation}: {} channels, {} frames at {sample_rate} Hz",
            engine.impulse_channels(),
            engine.impulse_len()
        );

        // An engine the render side never picked up comes back here and is freed on this thread.
        if let Some(displaced) = mailbox.send(Box::new(StagedEngine { generation, engine })) {
            log::debug!("Discarding unclaimed engine for request {}", displaced.generation);
        }
        sent = Some(generation);
    }

    log::debug!("Impulse response loader thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, Instant};

    use audio_synchronization::{mailbox, MailboxReceiver};

    use crate::reverb::decode::tests::wav_bytes;

    fn wait_for(receiver: &MailboxReceiver<StagedEngine>) -> Box<StagedEngine> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(staged) = receiver.recv() {
                return staged;
            }
            assert!(Instant::now() < deadline, "Loader never published");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_coalesce() {
        let (sender, receiver) = chan::unbounded();
        let source = |n: u8| Some(ImpulseSource::Memory(vec![n].into()));
        sender
            .send(LoadRequest {
                generation: 2,
                source: source(2),
            })
            .unwrap();
        sender
            .send(LoadRequest {
                generation: 3,
                source: None,
            })
            .unwrap();

        let (generation, sources) = coalesce(
            LoadRequest {
                generation: 1,
                source: source(1),
            },
            &receiver,
        );
        assert_eq!(generation, 3);
        assert_eq!(
            sources,
            vec![
                ImpulseSource::Memory(vec![1].into()),
                ImpulseSource::Memory(vec![2].into())
            ]
        );
    }

    #[test]
    fn test_load_then_configure() {
        let (tx, rx) = mailbox();
        let handle = LoaderHandle::spawn(tx).unwrap();

        let first = handle.request(Some(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 10]]))));
        assert_eq!(first, 1);

        // Nothing can be built before the format is known.
        std::thread::sleep(Duration::from_millis(50));
        assert!(rx.recv().is_none());

        let second = handle.reconfigure(48000.0, 128);
        let staged = loop {
            let staged = wait_for(&rx);
            if staged.generation == second {
                break staged;
            }
        };
        assert_eq!(staged.engine.impulse_len(), 10);
    }

    #[test]
    fn test_resamples_to_render_rate() {
        let (tx, rx) = mailbox();
        let handle = LoaderHandle::spawn(tx).unwrap();
        handle.reconfigure(48000.0, 64);
        handle.request(Some(ImpulseSource::Memory(wav_bytes(24000, &[vec![0.5; 100]]))));

        let staged = loop {
            let staged = wait_for(&rx);
            if staged.generation == 2 {
                break staged;
            }
        };
        assert_eq!(staged.engine.impulse_len(), 200);
    }

    /// A failure right behind a rebuild must still leave the render side something to install.
    #[test]
    fn test_failure_after_reconfigure_rebuilds_previous() {
        let (tx, rx) = mailbox();
        let handle = LoaderHandle::spawn(tx).unwrap();
        handle.reconfigure(48000.0, 64);
        handle.request(Some(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 10]]))));
        let first = wait_for(&rx);
        handle
            .shared()
            .installed_generation
            .store(first.generation, Ordering::Release);

        // A format change drops the running engine.
        handle.shared().installed_generation.store(0, Ordering::Release);
        handle.reconfigure(24000.0, 64);
        let failed = handle.request(Some(ImpulseSource::Memory(vec![0u8; 64].into())));

        let staged = loop {
            let staged = wait_for(&rx);
            if staged.generation == failed {
                break staged;
            }
        };
        assert_eq!(staged.engine.impulse_len(), 5);
    }

    /// A good source immediately followed by a bad one ends with the good one, whether or not the two are coalesced.
    #[test]
    fn test_bad_source_behind_good_one() {
        let (tx, rx) = mailbox();
        let handle = LoaderHandle::spawn(tx).unwrap();
        handle.reconfigure(48000.0, 64);
        handle.request(Some(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 6]]))));
        let last = handle.request(Some(ImpulseSource::Memory(vec![0u8; 64].into())));

        let staged = loop {
            let staged = wait_for(&rx);
            if staged.generation == last {
                break staged;
            }
        };
        assert_eq!(staged.engine.impulse_len(), 6);
    }

    /// If the render side already runs the current impulse, a failure sends nothing.
    #[test]
    fn test_failure_while_installed_sends_nothing() {
        let (tx, rx) = mailbox();
        let handle = LoaderHandle::spawn(tx).unwrap();
        handle.reconfigure(48000.0, 64);
        handle.request(Some(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 10]]))));
        let first = wait_for(&rx);
        handle
            .shared()
            .installed_generation
            .store(first.generation, Ordering::Release);

        handle.request(Some(ImpulseSource::Memory(vec![0u8; 64].into())));
        std::thread::sleep(Duration::from_millis(100));
        assert!(rx.recv().is_none());
    }

    #[test]
    fn test_bad_source_publishes_nothing() {
        let (tx, rx) = mailbox();
        let handle = LoaderHandle::spawn(tx).unwrap();
        handle.reconfigure(48000.0, 64);
        handle.request(Some(ImpulseSource::Memory(vec![0u8; 64].into())));
        std::thread::sleep(Duration::from_millis(100));
        assert!(rx.recv().is_none());
    }
}
