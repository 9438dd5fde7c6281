use std::fmt;

use gdbind_sys::VariantType;

use super::private::Storage;
use super::{Arena, LifetimeId, Slot, StaticLifetime};
use crate::error::{BindingError, BindingResult, fatal};
use crate::value::{Descriptor, Encode, Marshal};

/// Who is responsible for releasing a handle's value.
#[derive(Clone, Copy)]
pub enum Ownership<'l> {
    /// Attached to `arena`, which releases it.
    Owned { arena: &'l dyn Arena, slot: Slot },
    /// A view of a value someone else owns. Never released through here.
    Borrowed,
    /// Untracked. Whoever holds the handle decides its fate.
    Unowned,
}

impl Ownership<'_> {
    pub fn lifetime(&self) -> Option<LifetimeId> {
        match self {
            Ownership::Owned { arena, .. } => Some(arena.id()),
            _ => None,
        }
    }

    fn is_live(&self) -> bool {
        match self {
            Ownership::Owned { arena, slot } => arena.is_attached(*slot),
            _ => true,
        }
    }
}

impl fmt::Debug for Ownership<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Owned { arena, slot } => f
                .debug_struct("Owned")
                .field("lifetime", &arena.id())
                .field("slot", slot)
                .finish(),
            Ownership::Borrowed => f.write_str("Borrowed"),
            Ownership::Unowned => f.write_str("Unowned"),
        }
    }
}

/// Host-side handle to a reference-typed value.
///
/// A handle is not `Clone`: an owned handle is the one host-side claim on its
/// slot, and giving the value away consumes it.
pub struct Handle<'l, D: Descriptor> {
    raw: D,
    ownership: Ownership<'l>,
}

impl<'l, D: Descriptor> Handle<'l, D> {
    pub(crate) fn owned(raw: D, arena: &'l dyn Arena, slot: Slot) -> Self {
        Self {
            raw,
            ownership: Ownership::Owned { arena, slot },
        }
    }

    /// View of a value the engine or another scope owns.
    pub fn borrowed(raw: D) -> Self {
        Self {
            raw,
            ownership: Ownership::Borrowed,
        }
    }

    pub fn unowned(raw: D) -> Self {
        Self {
            raw,
            ownership: Ownership::Unowned,
        }
    }

    pub fn ownership(&self) -> &Ownership<'l> {
        &self.ownership
    }

    pub fn lifetime(&self) -> Option<LifetimeId> {
        self.ownership.lifetime()
    }

    /// Whether the value can still be read.
    pub fn is_live(&self) -> bool {
        self.ownership.is_live()
    }

    /// The descriptor, checked against its arena when ownership checks are
    /// enabled. Reading a released value is fatal.
    #[inline]
    pub fn raw(&self) -> D {
        if let Ownership::Owned { arena, slot } = self.ownership {
            if arena.checks_ownership() && !arena.is_attached(slot) {
                fatal(BindingError::UseAfterRelease { lifetime: arena.id() });
            }
        }
        self.raw
    }

    /// The descriptor, always checked.
    pub fn try_raw(&self) -> BindingResult<D> {
        match self.ownership {
            Ownership::Owned { arena, .. } if !self.ownership.is_live() => {
                Err(BindingError::UseAfterRelease { lifetime: arena.id() })
            }
            _ => Ok(self.raw),
        }
    }

    /// Lends the value to a call. The host keeps ownership.
    #[inline]
    pub fn as_arg(&self) -> D {
        self.raw()
    }

    /// Gives the value to a callee that takes ownership. The arena will no
    /// longer release it.
    pub fn transfer_out(self) -> BindingResult<D> {
        match self.ownership {
            Ownership::Owned { arena, slot } => match arena.detach_entry(slot) {
                Some(_) => Ok(self.raw),
                None => Err(BindingError::UseAfterRelease { lifetime: arena.id() }),
            },
            Ownership::Borrowed => Err(BindingError::NotOwned),
            Ownership::Unowned => Ok(self.raw),
        }
    }

    /// Moves ownership into the process-wide arena so the value survives
    /// the scope it came from.
    pub fn promote<'s>(self, target: &'s StaticLifetime) -> BindingResult<Handle<'s, D>> {
        match self.ownership {
            Ownership::Owned { arena, slot } => {
                if arena.id() == target.id() {
                    return Ok(Handle::owned(self.raw, target, slot));
                }
                let attachment = arena
                    .detach_entry(slot)
                    .ok_or(BindingError::UseAfterRelease { lifetime: arena.id() })?;
                let slot = target.attach_entry(attachment);
                Ok(Handle::owned(self.raw, target, slot))
            }
            _ => Err(BindingError::NotOwned),
        }
    }

    pub(crate) fn free_in(self, owner: &dyn Arena) {
        match self.ownership {
            Ownership::Owned { arena, slot } => {
                if arena.id() != owner.id() {
                    fatal(BindingError::ForeignLifetime {
                        expected: owner.id(),
                        actual: arena.id(),
                    });
                }
                match arena.detach_entry(slot) {
                    Some(attachment) => attachment.run(),
                    None => fatal(BindingError::UseAfterRelease { lifetime: arena.id() }),
                }
            }
            _ => fatal(BindingError::NotOwned),
        }
    }
}

impl<D: Descriptor> fmt::Debug for Handle<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &D::VARIANT_TYPE)
            .field("raw", &self.raw.to_words())
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl<D: Descriptor> Encode for Handle<'_, D> {
    fn variant_type(&self) -> VariantType {
        D::VARIANT_TYPE
    }

    fn encoded_size(&self) -> usize {
        D::SIZE
    }

    fn encode_into(&self, out: &mut [u8]) {
        self.as_arg().encode(out)
    }
}
