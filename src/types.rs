use std::time::Instant;

/// CAN ID type
pub type CanId = u32;

/// Generic frame data type
pub type FrameData = Vec<u8>;

/// Timestamp in milliseconds.
///
/// Deliberately 32 bits wide: the counter wraps after ~49.7 days and all
/// deadline comparisons must go through [`time_after`].
pub type Timestamp = u32;

/// Generic frame structure used across layers
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: CanId,
    pub data: FrameData,
    pub timestamp: Timestamp,
    pub is_extended: bool,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            id: 0,
            data: Vec::new(),
            timestamp: 0,
            is_extended: false,
        }
    }
}

/// Configuration trait that must be implemented by all protocol configurations
pub trait Config: Send + Sync {
    fn validate(&self) -> crate::error::Result<()>;
}

/// Monotonic millisecond clock consumed by the server.
///
/// The counter may wrap; the server only ever compares instants with
/// [`time_after`], so a wrapping source is fine.
pub trait Clock {
    fn now_ms(&self) -> Timestamp;
}

/// Wrap-safe "is `a` strictly later than `b`" on the 32-bit millisecond
/// counter.
pub fn time_after(a: Timestamp, b: Timestamp) -> bool {
    a.wrapping_sub(b) as i32 > 0
}

/// Clock backed by [`std::time::Instant`], counting from construction.
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Manually advanced clock for tests and hosts that tick time themselves.
///
/// Clones share the same underlying counter, so a test can keep a handle
/// while the server owns another.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: std::rc::Rc<std::cell::Cell<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    pub fn advance(&self, ms: Timestamp) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.get()
    }
}
