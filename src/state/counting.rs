use thiserror::Error;

/// Parse a counting message: a non-empty run of ASCII digits, surrounding whitespace ignored.
///
/// Signs, separators, and values overflowing `u64` are not counting messages.
pub fn parse_count(content: &str) -> Option<u64> {
    let trimmed = content.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Why a proposed number was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CountRejection {
    /// The message is not a pure non-negative integer literal.
    #[error("message is not a counting number")]
    NotNumeric,
    /// The number does not follow the last accepted one.
    #[error("expected {expected}, got {got}")]
    OutOfSequence {
        /// Number that would have been accepted.
        expected: u64,
        /// Number that was proposed.
        got: u64,
    },
}

/// Accepted change of the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountTransition {
    /// Previous value of the counter.
    pub from: u64,
    /// New value of the counter.
    pub to: u64,
}

/// The counting game's single state cell.
///
/// `last_accepted == 0` means "no accepted message yet"; the only ways to leave
/// that state are [`CountingGame::reconcile`] or an accepted `1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountingGame {
    last_accepted: u64,
    /// Number of transitions applied since startup.
    version: u64,
}

impl CountingGame {
    /// Seed the in-memory cell from the persisted cache.
    pub fn new(last_accepted: u64) -> Self {
        Self {
            last_accepted,
            version: 0,
        }
    }

    /// Last accepted number, `0` when none.
    pub fn last_accepted(&self) -> u64 {
        self.last_accepted
    }

    /// Transitions applied since startup.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The only number that can be accepted next.
    pub fn expected_next(&self) -> u64 {
        self.last_accepted.saturating_add(1)
    }

    /// Decide and apply a proposed number in one step.
    pub fn propose(&mut self, number: u64) -> Result<CountTransition, CountRejection> {
        let expected = self.expected_next();
        if number != expected || number == self.last_accepted {
            return Err(CountRejection::OutOfSequence {
                expected,
                got: number,
            });
        }

        let transition = CountTransition {
            from: self.last_accepted,
            to: number,
        };
        self.last_accepted = number;
        self.version += 1;
        Ok(transition)
    }

    /// Parse then propose raw message content.
    pub fn propose_content(&mut self, content: &str) -> Result<CountTransition, CountRejection> {
        let number = parse_count(content).ok_or(CountRejection::NotNumeric)?;
        self.propose(number)
    }

    /// Overwrite the cell with the value derived from channel history.
    pub fn reconcile(&mut self, observed: u64) -> CountTransition {
        let transition = CountTransition {
            from: self.last_accepted,
            to: observed,
        };
        self.last_accepted = observed;
        self.version += 1;
        transition
    }
}
