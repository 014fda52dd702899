//! Fixed-capacity lease table.
//!
//! One slot per pool address, indexed by pool offset. A slot is either
//! [`Empty`](LeaseSlot::Empty) or held by a client MAC with a coarsened
//! expiry deadline. There is no background timer: expiry is evaluated
//! lazily, when an allocation scan needs a slot, so stale entries linger
//! harmlessly until then.
//!
//! Timekeeping is a u32 monotonic millisecond clock supplied by the
//! caller. The clock may wrap (~49.7 days); all comparisons use wrapping
//! signed subtraction, which is correct as long as lease windows are far
//! shorter than the wrap period.

/// How many low-order bits of the millisecond deadline are dropped when a
/// lease expiry is stored.
///
/// The deadline is kept as a 16-bit value, `deadline_ms >> 16`, trading
/// expiry resolution (one unit ≈ 65.5 s) for a two-byte footprint per
/// slot. Reconstruction fills the dropped bits with ones, so a lease is
/// never reclaimed before its real deadline.
pub const EXPIRY_SHIFT_BITS: u32 = 16;

/// A six-byte client hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// One lease table slot.
///
/// `Empty` is an explicit variant rather than an all-zero MAC sentinel:
/// the protocol does not forbid a client whose hardware address happens
/// to be all zeros, and such a client must be able to hold a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseSlot {
    /// Never used, or reclaimed after expiry.
    Empty,
    /// Held by a client until the coarsened deadline passes.
    Held {
        mac: MacAddr,
        /// `deadline_ms >> EXPIRY_SHIFT_BITS`, see [`EXPIRY_SHIFT_BITS`].
        expiry: u16,
    },
}

/// Returned by [`LeaseTable::find_or_allocate`] when every slot is held
/// and unexpired. The engine answers exhaustion with silence, never with
/// a wire reply; the client backs off and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted;

/// In-memory lease table, one slot per pool offset.
#[derive(Debug)]
pub struct LeaseTable {
    slots: Vec<LeaseSlot>,
}

impl LeaseTable {
    /// Creates a table with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![LeaseSlot::Empty; capacity],
        }
    }

    /// Number of slots (equals the pool size).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Finds the slot for a client, allocating one if needed.
    ///
    /// Priority order over a full scan:
    ///
    /// 1. a slot already held by `mac` — returned without mutation, even
    ///    if a free slot appears earlier in the table, so repeated
    ///    DISCOVERs from one client keep naming the same offset;
    /// 2. the first `Empty` slot;
    /// 3. the first expired slot, reclaimed to `Empty` as part of the
    ///    allocation. Never-used slots are preferred over recycling
    ///    expired ones to reduce address-reuse collisions with clients
    ///    still holding stale leases.
    ///
    /// Nothing is committed here; the chosen slot only becomes bound to
    /// `mac` via [`commit`](Self::commit).
    pub fn find_or_allocate(
        &mut self,
        mac: MacAddr,
        now_ms: u32,
    ) -> Result<usize, PoolExhausted> {
        let mut free_candidate = None;
        let mut expired_candidate = None;

        for (offset, slot) in self.slots.iter().enumerate() {
            match *slot {
                LeaseSlot::Held { mac: holder, expiry } => {
                    if holder == mac {
                        return Ok(offset);
                    }
                    if expired_candidate.is_none() && is_expired(expiry, now_ms) {
                        expired_candidate = Some(offset);
                    }
                }
                LeaseSlot::Empty => {
                    if free_candidate.is_none() {
                        free_candidate = Some(offset);
                    }
                }
            }
        }

        if let Some(offset) = free_candidate {
            return Ok(offset);
        }
        if let Some(offset) = expired_candidate {
            self.slots[offset] = LeaseSlot::Empty;
            return Ok(offset);
        }
        Err(PoolExhausted)
    }

    /// Whether `mac` may take the slot at `offset`.
    ///
    /// True when the slot is empty, already held by `mac`, or held
    /// expired. False when another client holds it unexpired — the
    /// address is in use and the request must be dropped.
    pub fn can_claim(&self, offset: usize, mac: MacAddr, now_ms: u32) -> bool {
        match self.slots[offset] {
            LeaseSlot::Empty => true,
            LeaseSlot::Held { mac: holder, expiry } => {
                holder == mac || is_expired(expiry, now_ms)
            }
        }
    }

    /// Binds the slot at `offset` to `mac` with a fresh deadline of
    /// `now_ms + lease_seconds * 1000`, coarsened per
    /// [`EXPIRY_SHIFT_BITS`]. Re-committing an existing binding refreshes
    /// its expiry (lease renewal).
    pub fn commit(&mut self, offset: usize, mac: MacAddr, lease_seconds: u32, now_ms: u32) {
        let deadline_ms = now_ms.wrapping_add(lease_seconds.saturating_mul(1000));
        self.slots[offset] = LeaseSlot::Held {
            mac,
            expiry: (deadline_ms >> EXPIRY_SHIFT_BITS) as u16,
        };
    }

    /// The MAC currently bound at `offset`, if any. Expiry is not
    /// consulted; a stale holder is still reported until its slot is
    /// reclaimed.
    pub fn holder(&self, offset: usize) -> Option<MacAddr> {
        match self.slots.get(offset) {
            Some(LeaseSlot::Held { mac, .. }) => Some(*mac),
            _ => None,
        }
    }

    /// The reconstructed expiry deadline for the slot at `offset`, in
    /// clock milliseconds. Diagnostic; resolution is limited by the
    /// stored coarsening.
    pub fn expires_at_ms(&self, offset: usize) -> Option<u32> {
        match self.slots.get(offset) {
            Some(LeaseSlot::Held { expiry, .. }) => Some(reconstruct(*expiry)),
            _ => None,
        }
    }
}

/// Fills the coarsened-away low bits with ones, biasing reconstruction
/// late so leases never expire early.
fn reconstruct(expiry: u16) -> u32 {
    ((expiry as u32) << EXPIRY_SHIFT_BITS) | ((1 << EXPIRY_SHIFT_BITS) - 1)
}

/// Wraparound-safe deadline check: expired when the signed difference
/// between the reconstructed deadline and `now_ms` is negative.
fn is_expired(expiry: u16, now_ms: u32) -> bool {
    (reconstruct(expiry).wrapping_sub(now_ms) as i32) < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC_A: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
    const MAC_B: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02]);
    const MAC_C: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x03]);

    const LEASE_SECONDS: u32 = 86400;

    /// Past the coarsened deadline of a lease committed at `committed_ms`.
    fn after_expiry(committed_ms: u32) -> u32 {
        committed_ms + LEASE_SECONDS * 1000 + (2 << EXPIRY_SHIFT_BITS)
    }

    #[test]
    fn test_allocates_slots_in_order() {
        let mut table = LeaseTable::new(8);
        let a = table.find_or_allocate(MAC_A, 0).unwrap();
        table.commit(a, MAC_A, LEASE_SECONDS, 0);
        let b = table.find_or_allocate(MAC_B, 0).unwrap();
        table.commit(b, MAC_B, LEASE_SECONDS, 0);

        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn test_repeated_allocation_is_stable_without_commit() {
        let mut table = LeaseTable::new(8);
        let first = table.find_or_allocate(MAC_A, 0).unwrap();
        let second = table.find_or_allocate(MAC_A, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mac_match_wins_over_earlier_free_slot() {
        let mut table = LeaseTable::new(8);
        // Fill slots 0 and 1, then free slot 0; MAC_B's binding at slot 1
        // must still win over the empty slot 0.
        table.commit(0, MAC_A, LEASE_SECONDS, 0);
        table.commit(1, MAC_B, LEASE_SECONDS, 0);
        table.slots[0] = LeaseSlot::Empty;

        assert_eq!(table.find_or_allocate(MAC_B, 0), Ok(1));
    }

    #[test]
    fn test_free_slot_preferred_over_expired_slot() {
        let mut table = LeaseTable::new(2);
        table.commit(0, MAC_A, LEASE_SECONDS, 0);
        let now = after_expiry(0);

        // Slot 0 is expired, slot 1 was never used; the fresh slot wins.
        assert_eq!(table.find_or_allocate(MAC_B, now), Ok(1));
        // Slot 0 was not reclaimed since it was not chosen.
        assert_eq!(table.holder(0), Some(MAC_A));
    }

    #[test]
    fn test_expired_slot_reclaimed_when_chosen() {
        let mut table = LeaseTable::new(2);
        table.commit(0, MAC_A, LEASE_SECONDS, 0);
        table.commit(1, MAC_B, LEASE_SECONDS, 0);
        let now = after_expiry(0);

        assert_eq!(table.find_or_allocate(MAC_C, now), Ok(0));
        assert_eq!(table.holder(0), None);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut table = LeaseTable::new(2);
        table.commit(0, MAC_A, LEASE_SECONDS, 0);
        table.commit(1, MAC_B, LEASE_SECONDS, 0);

        assert_eq!(table.find_or_allocate(MAC_C, 0), Err(PoolExhausted));
    }

    #[test]
    fn test_can_claim_semantics() {
        let mut table = LeaseTable::new(2);
        table.commit(0, MAC_A, LEASE_SECONDS, 0);

        assert!(table.can_claim(0, MAC_A, 0), "holder renews");
        assert!(!table.can_claim(0, MAC_B, 0), "foreign unexpired lease");
        assert!(table.can_claim(1, MAC_B, 0), "empty slot");
        assert!(
            table.can_claim(0, MAC_B, after_expiry(0)),
            "foreign expired lease is reclaimable"
        );
    }

    #[test]
    fn test_commit_refreshes_expiry() {
        let mut table = LeaseTable::new(1);
        table.commit(0, MAC_A, LEASE_SECONDS, 0);
        let first = table.expires_at_ms(0).unwrap();

        let later = 10 * 60 * 1000;
        table.commit(0, MAC_A, LEASE_SECONDS, later);
        let second = table.expires_at_ms(0).unwrap();

        assert!(second > first);
        assert!(table.can_claim(0, MAC_A, later));
    }

    #[test]
    fn test_expiry_never_early_despite_coarsening() {
        let mut table = LeaseTable::new(1);
        table.commit(0, MAC_A, LEASE_SECONDS, 0);

        // Just before the real deadline the lease must still be held.
        let just_before = LEASE_SECONDS * 1000 - 1;
        assert!(!table.can_claim(0, MAC_B, just_before));
    }

    #[test]
    fn test_expiry_survives_clock_wraparound() {
        let mut table = LeaseTable::new(1);
        let near_wrap = u32::MAX - 1000;
        table.commit(0, MAC_A, LEASE_SECONDS, near_wrap);

        // Shortly after the clock wraps the lease is still unexpired.
        assert!(!table.can_claim(0, MAC_B, 5000));
        // Well past the (wrapped) deadline it is reclaimable.
        assert!(table.can_claim(0, MAC_B, after_expiry(0)));
    }

    #[test]
    fn test_all_zero_mac_is_a_real_client() {
        let zero = MacAddr([0; 6]);
        let mut table = LeaseTable::new(2);

        let offset = table.find_or_allocate(zero, 0).unwrap();
        table.commit(offset, zero, LEASE_SECONDS, 0);

        assert_eq!(table.holder(offset), Some(zero));
        assert!(!table.can_claim(offset, MAC_A, 0));
        // And the zero-MAC client renews like any other.
        assert_eq!(table.find_or_allocate(zero, 0), Ok(offset));
    }

    #[test]
    fn test_mac_display() {
        assert_eq!(MAC_A.to_string(), "aa:bb:cc:dd:ee:01");
        assert_eq!(MacAddr([0; 6]).to_string(), "00:00:00:00:00:00");
    }
}
