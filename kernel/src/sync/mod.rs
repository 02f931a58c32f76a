// =============================================================================
// CoreLink - Synchronization Primitives
// =============================================================================
//
// There is no OS underneath us, so there is no std::sync either.  The one
// primitive here is a binary spinlock that any core can take.
//
// Lock ordering: a core holds at most one lock at a time.  Mailbox locks
// are never nested inside each other or inside the console lock, and the
// ring buffer takes no lock at all.  Keep it that way: two cores sending
// to each other while each held its own mailbox lock would deadlock.
// =============================================================================

pub mod spinlock;
