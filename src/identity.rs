use crate::error::{Error, Result};
use crate::id::NodeId;
use crate::CURSOR_RESET;

/// Round-robin cursor over the local identities. Each outgoing query is attributed to the next
/// identity in turn.
#[derive(Clone, Debug)]
pub struct IdentityRotator {
    ids: Vec<NodeId>,
    cursor: usize,
}

impl IdentityRotator {
    pub fn new(ids: Vec<NodeId>) -> Result<Self> {
        if ids.is_empty() {
            return Err(Error::EmptyNodeIds);
        }
        Ok(IdentityRotator { ids, cursor: 0 })
    }

    /// Returns the next identity and its slot in the identity list.
    pub fn next(&mut self) -> (NodeId, usize) {
        let slot = self.cursor % self.ids.len();
        self.cursor += 1;
        if self.cursor > CURSOR_RESET {
            self.cursor = 0;
        }
        (self.ids[slot], slot)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::IdentityRotator;
    use crate::id::NodeId;
    use crate::CURSOR_RESET;

    #[test]
    fn test_empty_is_rejected() {
        assert!(IdentityRotator::new(Vec::new()).is_err());
    }

    #[test]
    fn test_round_robin() {
        let ids: Vec<NodeId> = (0..3).map(|_| NodeId::rand()).collect();
        let mut rotator = IdentityRotator::new(ids.clone()).unwrap();
        for i in 0..10 {
            assert_eq!(rotator.next(), (ids[i % 3], i % 3));
        }
    }

    #[test]
    fn test_cursor_resets_before_overflow() {
        let ids: Vec<NodeId> = (0..3).map(|_| NodeId::rand()).collect();
        let mut rotator = IdentityRotator::new(ids).unwrap();
        rotator.cursor = CURSOR_RESET;
        let (_, slot) = rotator.next();
        assert_eq!(slot, CURSOR_RESET % 3);
        assert_eq!(rotator.cursor, 0);
        assert_eq!(rotator.next().1, 0);
    }
}
