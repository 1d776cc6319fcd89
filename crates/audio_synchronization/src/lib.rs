//! Primitives for synchronization in audio contexts.
//!
//! This crate provides mechanisms whereby an audio thread can receive work from other threads without ever entering
//! the kernel, blocking for an unbounded amount of time, or freeing memory.  The last point is easy to miss: a value
//! handed to the audio thread must also be handed back, or dropped elsewhere, when it is replaced.  Crossbeam's
//! channels, for example, deallocate on the receiving side even when using operations which ostensibly don't block.
//!
//! - [mailbox] is a single-slot handoff where a newer value replaces an unconsumed older one.
//! - [double_buffer] holds two copies of a value and an atomic index naming the one readers should see.

pub mod double_buffer;
pub mod mailbox;
mod sync;

pub use double_buffer::DoubleBuffer;
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
