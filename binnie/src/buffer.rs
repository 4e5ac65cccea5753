use std::collections::VecDeque;

use ahash::AHashMap;
use log::trace;

use crate::binner::{Bin, BinnedRead};
use crate::errors::BinnieError;
use crate::record::ReadId;

/// Index of a slot in the buffer arena.
pub type Handle = usize;

struct ChainEnds {
    head: Handle,
    tail: Handle,
}

/// Append-only FIFO of binned reads with mate chains per template identity.
///
/// Reads live in an arena of slots and are linked to their buffered mates by
/// handle. One chain exists per template; appending a read whose bin
/// disagrees with its chain rewrites the whole chain to remap, so that every
/// emitted read of a template leaves through the same sink. Emission order
/// is plain insertion order; since chain links are themselves inserted in
/// order, the FIFO head is always the head of its chain.
pub struct TemplateBuffer {
    slots: Vec<Option<BinnedRead>>,
    free: Vec<Handle>,
    order: VecDeque<Handle>,
    chains: AHashMap<ReadId, ChainEnds>,
}

impl TemplateBuffer {
    pub fn new() -> TemplateBuffer {
        TemplateBuffer {
            slots: Vec::new(),
            free: Vec::new(),
            order: VecDeque::new(),
            chains: AHashMap::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &ReadId) -> bool {
        self.chains.contains_key(id)
    }

    pub fn peek_front(&self) -> Option<&BinnedRead> {
        self.order.front().and_then(|&h| self.slots[h].as_ref())
    }

    /// Appends a read, linking it to its buffered mates. Returns true when
    /// the append demoted the whole chain to remap.
    pub fn enqueue(&mut self, mut read: BinnedRead) -> Result<bool, BinnieError> {
        read.prev_mate = None;
        read.next_mate = None;
        let id = read.id.clone();

        let ends = self.chains.get(&id).map(|e| (e.head, e.tail));
        let mut rewritten = false;
        let handle;

        match ends {
            None => {
                handle = self.alloc(read)?;
                self.chains.insert(
                    id,
                    ChainEnds {
                        head: handle,
                        tail: handle,
                    },
                );
            }
            Some((head, tail)) => {
                // first walk: bump the observed counts of the buffered mates
                // and collect the chain's definite expectation and any bin
                // disagreement with the new link
                let mut chain_expected: i32 = -1;
                let mut chain_len: i32 = 0;
                let mut disagree = false;
                let mut cur = Some(head);
                while let Some(h) = cur {
                    let link = self.link_mut(h)?;
                    link.observed_mates += 1;
                    if chain_expected < 0 && link.expected_mates >= 0 {
                        chain_expected = link.expected_mates;
                    }
                    if link.bin != read.bin {
                        disagree = true;
                    }
                    chain_len += 1;
                    cur = link.next_mate;
                }

                if chain_expected == 0 {
                    return Err(BinnieError::UnexpectedMates(id));
                }
                if chain_expected >= 0
                    && read.expected_mates >= 0
                    && chain_expected != read.expected_mates
                {
                    log::warn!(
                        "conflicting segment counts for template {} ({} vs {})",
                        id,
                        chain_expected,
                        read.expected_mates
                    );
                }

                // propagate a definite expectation to the links lacking one
                let settled = if chain_expected >= 0 {
                    chain_expected
                } else {
                    read.expected_mates
                };
                if settled >= 0 {
                    if read.expected_mates < 0 {
                        read.expected_mates = settled;
                    }
                    if chain_expected < 0 {
                        let mut cur = Some(head);
                        while let Some(h) = cur {
                            let link = self.link_mut(h)?;
                            if link.expected_mates < 0 {
                                link.expected_mates = settled;
                            }
                            cur = link.next_mate;
                        }
                    }
                }

                read.observed_mates = chain_len;
                read.prev_mate = Some(tail);
                handle = self.alloc(read)?;
                self.link_mut(tail)?.next_mate = Some(handle);
                match self.chains.get_mut(&id) {
                    Some(ends) => ends.tail = handle,
                    None => {
                        return Err(BinnieError::BufferRemove(
                            "chain registry entry vanished during append",
                        ))
                    }
                }

                if disagree {
                    trace!("mate disagreement on {}, demoting the chain to remap", id);
                    rewritten = true;
                    let mut cur = Some(head);
                    while let Some(h) = cur {
                        let link = self.link_mut(h)?;
                        link.bin = Bin::Remap;
                        cur = link.next_mate;
                    }
                    self.check_chain_agreement(head, &id)?;
                }
            }
        }

        self.order.push_back(handle);
        Ok(rewritten)
    }

    /// Removes and returns the oldest buffered read, unlinking it from its
    /// chain. The head of the FIFO must be the head of its chain.
    pub fn pop_front(&mut self) -> Result<Option<BinnedRead>, BinnieError> {
        let h = match self.order.pop_front() {
            None => return Ok(None),
            Some(h) => h,
        };
        let read = self.slots[h]
            .take()
            .ok_or(BinnieError::NullWhereForbidden(
                "fifo head handle points at an empty slot",
            ))?;
        self.free.push(h);

        let ends = self
            .chains
            .get_mut(&read.id)
            .ok_or(BinnieError::BufferRemove("no chain registered for emitted read"))?;
        if ends.head != h {
            return Err(BinnieError::BufferRemove(
                "emitted read is not the head of its mate chain",
            ));
        }
        match read.next_mate {
            None => {
                if ends.tail != h {
                    return Err(BinnieError::BufferRemove(
                        "chain tail out of step with its last link",
                    ));
                }
                self.chains.remove(&read.id);
            }
            Some(next) => {
                ends.head = next;
                self.link_mut(next)?.prev_mate = None;
            }
        }
        Ok(Some(read))
    }

    fn alloc(&mut self, read: BinnedRead) -> Result<Handle, BinnieError> {
        match self.free.pop() {
            Some(h) => {
                if self.slots[h].is_some() {
                    return Err(BinnieError::NotNullWhereRequired(
                        "free-list slot still occupied",
                    ));
                }
                self.slots[h] = Some(read);
                Ok(h)
            }
            None => {
                self.slots.push(Some(read));
                Ok(self.slots.len() - 1)
            }
        }
    }

    fn link_mut(&mut self, h: Handle) -> Result<&mut BinnedRead, BinnieError> {
        self.slots[h].as_mut().ok_or(BinnieError::NullWhereForbidden(
            "chain link handle points at an empty slot",
        ))
    }

    fn check_chain_agreement(&mut self, head: Handle, id: &ReadId) -> Result<(), BinnieError> {
        let mut cur = Some(head);
        while let Some(h) = cur {
            let link = self.link_mut(h)?;
            if link.bin != Bin::Remap {
                return Err(BinnieError::InvalidBin(id.clone()));
            }
            cur = link.next_mate;
        }
        Ok(())
    }
}
