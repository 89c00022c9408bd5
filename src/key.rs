/// Identifies a particular slot in the registry's slot vector. Slots are
/// append-only, so an index handed out once stays valid for the life of
/// the registry.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) struct SlotIndex(u32);

impl SlotIndex {
    pub(crate) fn from(v: usize) -> Self {
        assert!(v < (u32::MAX as usize));
        Self(v as u32)
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}
