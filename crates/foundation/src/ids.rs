/// Identifies one progressive loading session.
///
/// Ids are handed out by a [`SessionIdAllocator`] and strictly increase, so a
/// larger id always belongs to a later session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(n: u64) -> Self {
        SessionId(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Monotonic session id source. Owned by whoever creates sessions.
#[derive(Debug)]
pub struct SessionIdAllocator {
    next: u64,
}

impl SessionIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> SessionId {
        let id = SessionId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

impl Default for SessionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
