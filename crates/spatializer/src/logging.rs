//! Logging that is safe to call while rendering.
//!
//! The render thread may not allocate, lock, or do I/O, and a `log` backend may do all three.  The `rt_*` macros here
//! therefore behave like the `log` macros off the render thread, and on it format into a fixed-size inline string and
//! push that onto a bounded ring.  A background thread, started the first time the ring is touched, drains the ring
//! into `log`.
//!
//! Delivery is best-effort: messages longer than [LOG_LENGTH_LIMIT] are truncated, and if the ring is full the message
//! is counted and dropped.  Both are reported when the next message gets through, as is any delivery delay beyond
//! [WARN_LATENCY].  Timestamps assigned by the `log` backend are those of delivery, not of the event.
use std::fmt::Arguments as FmtArgs;
use std::thread::{park, JoinHandle};
use std::time::{Duration, Instant};

use arrayvec::ArrayString;
use thingbuf::{recycling::Recycle, ThingBuf};

/// Bytes of formatted text kept per message.
const LOG_LENGTH_LIMIT: usize = 512;

/// Messages the ring holds.  Together with the limit above this reserves about 2 MB.
const LOG_QUEUE_LENGTH: usize = 4096;

/// Report delivery delays longer than this.
const WARN_LATENCY: Duration = Duration::from_millis(250);

type InlineLogMessage = ArrayString<LOG_LENGTH_LIMIT>;

#[derive(Debug)]
#[allow(clippy::large_enum_variant)] // Effectively a Cow; the large side is the point.
enum LogMessage {
    Static(&'static str),
    Inline(InlineLogMessage),
}

struct LogRecord {
    /// Messages this thread failed to enqueue since its last successful push.
    skipped_messages: u64,
    level: log::Level,
    module: &'static str,
    message: LogMessage,
    truncated: bool,
    enqueued_at: Instant,
}

/// Writes into an inline message until it is full, then silently discards the rest and records the truncation.
struct TruncatingWriter<'a> {
    message: &'a mut InlineLogMessage,
    truncated: &'a mut bool,
}

impl std::fmt::Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if *self.truncated {
            return Ok(());
        }

        // Capacity is in bytes.
        if s.len() <= self.message.remaining_capacity() {
            self.message.push_str(s);
            return Ok(());
        }

        *self.truncated = true;
        // Char by char, so that we never split a code point.
        for c in s.chars() {
            if self.message.try_push(c).is_err() {
                break;
            }
        }

        Ok(())
    }
}

fn build_record(level: log::Level, args: FmtArgs<'_>, module: &'static str) -> LogRecord {
    use std::fmt::Write;

    let mut truncated = false;
    let message = match args.as_str() {
        Some(s) => LogMessage::Static(s),
        None => {
            let mut message = InlineLogMessage::new();
            let mut writer = TruncatingWriter {
                message: &mut message,
                truncated: &mut truncated,
            };
            write!(writer, "{}", args).expect("TruncatingWriter never fails");
            LogMessage::Inline(message)
        }
    };

    LogRecord {
        skipped_messages: 0,
        level,
        module,
        message,
        truncated,
        enqueued_at: Instant::now(),
    }
}

struct LogRecordRecycler;

impl Recycle<LogRecord> for LogRecordRecycler {
    fn new_element(&self) -> LogRecord {
        LogRecord {
            skipped_messages: 0,
            level: log::Level::Trace,
            module: module_path!(),
            message: LogMessage::Static(""),
            truncated: false,
            enqueued_at: Instant::now(),
        }
    }

    fn recycle(&self, _element: &mut LogRecord) {
        // Every field is overwritten by the next push.
    }
}

struct LogCtx {
    thread: JoinHandle<()>,
    queue: ThingBuf<LogRecord, LogRecordRecycler>,
}

lazy_static::lazy_static! {
    static ref GLOBAL_CTX: LogCtx = LogCtx {
        // The spawned thread touches GLOBAL_CTX too, but only once this initializer has finished.
        thread: std::thread::Builder::new()
            .name("spatializer-log".into())
            .spawn(background_thread_mainloop)
            .expect("Unable to spawn the logging thread"),
        queue: ThingBuf::with_recycle(LOG_QUEUE_LENGTH, LogRecordRecycler),
    };
}

/// Entrypoint for the macros, on the render thread.
pub(crate) fn dispatch_message(level: log::Level, args: FmtArgs<'_>, module: &'static str) {
    use std::cell::Cell;

    thread_local! {
        static SKIPPED_MESSAGES: Cell<u64> = const { Cell::new(0) };
    }

    let mut record = build_record(level, args, module);
    record.skipped_messages = SKIPPED_MESSAGES.get();

    match GLOBAL_CTX.queue.push(record) {
        Ok(()) => {
            SKIPPED_MESSAGES.set(0);
            GLOBAL_CTX.thread.thread().unpark();
        }
        Err(_) => SKIPPED_MESSAGES.set(SKIPPED_MESSAGES.get() + 1),
    }
}

fn log_one(record: LogRecord) {
    if record.skipped_messages != 0 {
        log::warn!(
            "Realtime logging fell behind; {} messages were dropped",
            record.skipped_messages
        );
    }

    let text = match &record.message {
        LogMessage::Static(s) => s,
        LogMessage::Inline(i) => i.as_str(),
    };

    let latency = record.enqueued_at.elapsed();
    let mut notes: smallvec::SmallVec<[u8; 64]> = smallvec::SmallVec::new();
    if latency > WARN_LATENCY {
        use std::io::Write;
        write!(notes, ", delayed by {:.3}s", latency.as_secs_f64())
            .expect("Writing to a SmallVec never fails");
    }
    if record.truncated {
        notes.extend_from_slice(b", truncated");
    }
    let notes = std::str::from_utf8(&notes).unwrap_or_default();

    log::log!(target: record.module, record.level, "{text} (from render thread{notes})");
}

fn background_thread_mainloop() {
    loop {
        while let Some(record) = GLOBAL_CTX.queue.pop() {
            log_one(record);
        }
        // A message arriving between the drain and the park leaves the unpark token set, so nothing is lost.
        park();
    }
}

/// Like `log::log!`, but safe on the render thread.  The target is always the calling module.
#[allow(clippy::crate_in_macro_def)] // Private to this crate.
macro_rules! rt_log {
    ($level: expr, $fmt: expr $(, $args: expr)* $(,)?) => {
        let macro_level = $level;
        if macro_level <= log::max_level() {
            if crate::is_audio_thread::is_audio_thread() {
                crate::logging::dispatch_message(macro_level, format_args!($fmt, $($args),*), module_path!());
            } else {
                log::log!(macro_level, $fmt, $($args),*);
            }
        }
    }
}

macro_rules! rt_error {
    ($($args: tt)+) => {
        rt_log!(log::Level::Error, $($args)*);
    }
}

macro_rules! rt_warn {
    ($($args: tt)+) => {
        rt_log!(log::Level::Warn, $($args)*);
    }
}

macro_rules! rt_info {
    ($($args: tt)+) => {
        rt_log!(log::Level::Info, $($args)*);
    }
}

macro_rules! rt_debug {
    ($($args: tt)+) => {
        rt_log!(log::Level::Debug, $($args)*);
    }
}

macro_rules! rt_trace {
    ($($args: tt)+) => {
        rt_log!(log::Level::Trace, $($args)*);
    }
}

/// Start the logging thread now, from a thread that is allowed to spawn one.
pub(crate) fn ensure_log_ctx() {
    std::hint::black_box(GLOBAL_CTX.queue.capacity());
}
