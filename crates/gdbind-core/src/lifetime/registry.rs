//! Slot storage shared by both lifetime kinds.

use gdbind_sys::{DestructorFn, TypePtr, VariantType};

use crate::value::{Descriptor, RawWords};

/// One native-owned value waiting to be released.
pub struct Attachment {
    pub(crate) words: RawWords,
    pub(crate) ty: VariantType,
    pub(crate) release: DestructorFn,
}

impl Attachment {
    pub(crate) fn new<D: Descriptor>(raw: D, release: DestructorFn) -> Self {
        Self {
            words: raw.to_words(),
            ty: D::VARIANT_TYPE,
            release,
        }
    }

    /// Hands the storage back to the engine. Consumes the attachment so it
    /// cannot run twice.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn run(mut self) {
        // SAFETY: `words` holds a live descriptor of `ty` and `release` is the
        // destructor the engine provided for it.
        unsafe { (self.release)(TypePtr(self.words.as_mut_ptr().cast())) }
    }
}

/// Position of an attachment in its arena.
///
/// Freed positions are reused; the generation tells a stale slot from the
/// attachment that took its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    index: u32,
    generation: u32,
}

struct Entry {
    attachment: Option<Attachment>,
    generation: u32,
    /// Attach order, for most-recent-first release.
    seq: u64,
}

/// Slot table with a free list.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<Entry>,
    free: Vec<u32>,
    next_seq: u64,
    live: usize,
    released: bool,
}

impl Registry {
    pub(crate) fn attach(&mut self, attachment: Attachment) -> Option<Slot> {
        if self.released {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.attachment = Some(attachment);
            entry.seq = seq;
            return Some(Slot {
                index,
                generation: entry.generation,
            });
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            attachment: Some(attachment),
            generation: 0,
            seq,
        });
        Some(Slot { index, generation: 0 })
    }

    pub(crate) fn detach(&mut self, slot: Slot) -> Option<Attachment> {
        let entry = self.entries.get_mut(slot.index as usize)?;
        if entry.generation != slot.generation {
            return None;
        }
        let taken = entry.attachment.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot.index);
        self.live -= 1;
        Some(taken)
    }

    pub(crate) fn is_attached(&self, slot: Slot) -> bool {
        self.entries
            .get(slot.index as usize)
            .is_some_and(|entry| entry.generation == slot.generation && entry.attachment.is_some())
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Slots allocated so far, occupied or free.
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released
    }

    /// Marks the registry released and returns what still needs freeing, most
    /// recent first. Returns `None` when it was already released.
    pub(crate) fn drain(&mut self) -> Option<Vec<Attachment>> {
        if self.released {
            return None;
        }
        self.released = true;
        self.live = 0;
        self.free.clear();
        let mut pending: Vec<(u64, Attachment)> = self
            .entries
            .drain(..)
            .filter_map(|entry| entry.attachment.map(|attachment| (entry.seq, attachment)))
            .collect();
        pending.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        Some(pending.into_iter().map(|(_, attachment)| attachment).collect())
    }
}
