//! A single-slot, overwrite-on-send mailbox.
//!
//! The slot is one `AtomicPtr`.  Sending swaps a freshly boxed value in; receiving swaps null in.  If the receiver has
//! not picked up the previous value by the time a new one is sent, the sender gets the old value back from
//! [MailboxSender::send] and drops it on its own thread.  The receiving side therefore never frees anything it did not
//! take, which is what lets it live on an audio thread.
//!
//! This is the shape needed for "the newest result wins": a background worker publishes complete replacement state, and
//! the audio thread picks up whatever is newest at the start of its next block.
use std::marker::PhantomData;
use std::ptr::null_mut;

use crate::sync::{Arc, AtomicPtr, Ordering};

struct Slot<T> {
    value: AtomicPtr<T>,
    _owns: PhantomData<Box<T>>,
}

// Values only ever move through the slot, so sharing the slot needs `T: Send` only.
unsafe impl<T: Send> Sync for Slot<T> {}

/// The sending half of a mailbox.
///
/// Not `Clone`: there is one producer.
pub struct MailboxSender<T> {
    slot: Arc<Slot<T>>,
}

/// The receiving half of a mailbox.
///
/// Not `Clone`: there is one consumer.
pub struct MailboxReceiver<T> {
    slot: Arc<Slot<T>>,
}

/// Build a mailbox, returning the sending and receiving halves.
pub fn mailbox<T: Send>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let slot = Arc::new(Slot {
        value: AtomicPtr::new(null_mut()),
        _owns: PhantomData,
    });

    (
        MailboxSender { slot: slot.clone() },
        MailboxReceiver { slot },
    )
}

impl<T> std::fmt::Debug for MailboxSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxSender").finish_non_exhaustive()
    }
}

impl<T> std::fmt::Debug for MailboxReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxReceiver").finish_non_exhaustive()
    }
}

impl<T> Slot<T> {
    fn swap(&self, new: *mut T) -> Option<Box<T>> {
        let old = self.value.swap(new, Ordering::AcqRel);
        if old.is_null() {
            None
        } else {
            // Safety: every non-null pointer in the slot came from `Box::into_raw`, and the swap gave us exclusive
            // ownership of it.
            Some(unsafe { Box::from_raw(old) })
        }
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        std::mem::drop(self.swap(null_mut()));
    }
}

impl<T: Send> MailboxSender<T> {
    /// Put a value into the mailbox.
    ///
    /// If a value was already waiting and has not been received, it is displaced and returned.  Dropping the return
    /// value on the sending thread is how deallocation stays off the receiver.
    #[must_use = "dropping the displaced value here keeps its deallocation on the sending thread"]
    pub fn send(&self, value: Box<T>) -> Option<Box<T>> {
        self.slot.swap(Box::into_raw(value))
    }
}

impl<T: Send> MailboxReceiver<T> {
    /// Take the waiting value, if any.  Never blocks and never frees.
    pub fn recv(&self) -> Option<Box<T>> {
        self.slot.swap(null_mut())
    }
}


#[cfg(test)]
mod threaded_tests {
    use super::*;

    use crate::sync::{spawn, wrap_test};

    #[test]
    fn test_threaded_handoff() {
        wrap_test(|| {
            let (tx, rx) = mailbox::<u32>();

            let producer = spawn(move || {
                for i in 1..=2 {
                    std::mem::drop(tx.send(Box::new(i)));
                }
            });

            let early = rx.recv().map(|x| *x);
            producer.join().unwrap();
            let late = rx.recv().map(|x| *x);

            match (early, late) {
                (None, Some(2)) | (Some(1), Some(2)) | (Some(2), None) => {}
                x => panic!("Unexpected observation {x:?}"),
            }
        });
    }
}
