//! Newtype wrappers around raw kernel identifiers.
//!
//! Wrapping `u32`/`i32` PIDs and TIDs in distinct types prevents accidental
//! mixing (e.g. passing a TID where a PID is expected) and gives every log
//! line and error message a consistent `Display` form.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(v: u32) -> Self {
        Pid(v)
    }
}

impl From<Pid> for u32 {
    fn from(v: Pid) -> Self {
        v.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

impl From<u32> for Tid {
    fn from(v: u32) -> Self {
        Tid(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub u32);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UID:{}", self.0)
    }
}

impl From<u32> for Uid {
    fn from(v: u32) -> Self {
        Uid(v)
    }
}

/// A batch-scheduler job identifier, e.g. `"1234"` or a pseudo-job id
/// `"pseudo:proc_7"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(v: String) -> Self {
        JobId(v)
    }
}

impl From<&str> for JobId {
    fn from(v: &str) -> Self {
        JobId(v.to_string())
    }
}
