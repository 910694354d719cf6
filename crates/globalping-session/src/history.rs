use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use globalping_api::ProbeDetails;

use crate::LocatorError;

pub const SESSION_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Probes used by one measurement that produced results.
pub struct SessionRecord {
    pub id: String,
    pub probes: Vec<ProbeDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 1-based position into [`SessionHistory`].
pub enum HistoryRef {
    /// `@N`, `first` is `FromOldest(1)`.
    FromOldest(usize),
    /// `@-N`, `last` and `previous` are `FromNewest(1)`.
    FromNewest(usize),
}

impl HistoryRef {
    /// Whether `token` uses the symbolic history syntax, valid or not.
    pub fn is_symbolic(token: &str) -> bool {
        let token = token.trim();
        token.starts_with('@')
            || ["first", "last", "previous"]
                .iter()
                .any(|keyword| token.eq_ignore_ascii_case(keyword))
    }
}

/// Parsing has no history at hand, so errors report `available: 0` until
/// the resolver fills in the session size.
impl FromStr for HistoryRef {
    type Err = LocatorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim();
        let invalid = || LocatorError::NoSuchSessionReference {
            reference: token.to_string(),
            available: 0,
        };
        if token.eq_ignore_ascii_case("first") {
            return Ok(Self::FromOldest(1));
        }
        if token.eq_ignore_ascii_case("last") || token.eq_ignore_ascii_case("previous") {
            return Ok(Self::FromNewest(1));
        }
        let index = token.strip_prefix('@').ok_or_else(invalid)?;
        let (from_newest, digits) = match index.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, index),
        };
        let position = digits.parse::<usize>().map_err(|_| invalid())?;
        if position == 0 {
            return Err(invalid());
        }
        Ok(if from_newest {
            Self::FromNewest(position)
        } else {
            Self::FromOldest(position)
        })
    }
}

impl fmt::Display for HistoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromOldest(position) => write!(f, "@{position}"),
            Self::FromNewest(position) => write!(f, "@-{position}"),
        }
    }
}

/// Ring buffer of the most recent [`SessionRecord`]s.
///
/// Not synchronized: one measurement flow owns it at a time. Callers sharing
/// a history across tasks wrap it in a lock.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    records: VecDeque<SessionRecord>,
    capacity: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::with_capacity(SESSION_HISTORY_CAPACITY)
    }
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `record`, evicting the oldest one when full.
    pub fn append(&mut self, record: SessionRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn get(&self, reference: HistoryRef) -> Option<&SessionRecord> {
        let len = self.records.len();
        let index = match reference {
            HistoryRef::FromOldest(position) => position.checked_sub(1)?,
            HistoryRef::FromNewest(position) => len.checked_sub(position)?,
        };
        self.records.get(index)
    }

    pub fn resolve(&self, reference: HistoryRef) -> Result<&[ProbeDetails], LocatorError> {
        self.get(reference)
            .map(|record| record.probes.as_slice())
            .ok_or_else(|| LocatorError::NoSuchSessionReference {
                reference: reference.to_string(),
                available: self.records.len(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
