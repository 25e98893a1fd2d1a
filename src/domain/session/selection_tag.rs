use crate::domain::utils::id::TransactionId;

/// Identifies the selection an asynchronous result was computed for.
///
/// The generation moves forward whenever a governing selector changes
/// (transaction, weekday, lessons per session). A result carrying an older
/// tag describes a selection that no longer exists and must be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTag {
    pub transaction: Option<TransactionId>,
    pub generation: u64,
}

/// A value together with the selection it was computed under.
#[derive(Debug, Clone)]
pub struct Tagged<T> {
    pub tag: SelectionTag,
    pub value: T,
}

impl<T> Tagged<T> {
    pub fn new(tag: SelectionTag, value: T) -> Self {
        Tagged { tag, value }
    }

    pub fn is_current(&self, current: &SelectionTag) -> bool {
        &self.tag == current
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
