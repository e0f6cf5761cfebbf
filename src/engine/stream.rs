use crate::config::GroupOrder;
use crate::engine::grouper::Grouper;
use crate::engine::transaction::Transaction;
use crate::error::PipelineError;
use crate::line::RawLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finished,
    Closed,
}

/// Lazy, single-pass sequence of transactions built from an ordered line
/// source.
///
/// At most one group and one look-ahead transaction are held at a time.
/// The stream ends after the first error; transactions already returned
/// stay valid. Once closed, `has_next` and `next_transaction` fail with
/// [`PipelineError::ClosedResource`]; as an `Iterator` it yields that error
/// once and then `None`.
pub struct TransactionStream<I> {
    groups: Option<Grouper<I>>,
    peeked: Option<Transaction>,
    state: State,
    yielded: u64,
    closed_reported: bool,
}

impl<I> TransactionStream<I>
where
    I: Iterator<Item = Result<RawLine, PipelineError>>,
{
    pub fn new(lines: I) -> Self {
        Self::with_order(lines, GroupOrder::Unchecked)
    }

    pub fn with_order(lines: I, order: GroupOrder) -> Self {
        Self {
            groups: Some(Grouper::with_order(lines, order)),
            peeked: None,
            state: State::Open,
            yielded: 0,
            closed_reported: false,
        }
    }

    pub fn has_next(&mut self) -> Result<bool, PipelineError> {
        if self.state == State::Closed {
            return Err(PipelineError::ClosedResource);
        }
        if self.peeked.is_some() {
            return Ok(true);
        }

        self.peeked = self.pull()?;
        Ok(self.peeked.is_some())
    }

    pub fn next_transaction(&mut self) -> Result<Option<Transaction>, PipelineError> {
        if self.state == State::Closed {
            return Err(PipelineError::ClosedResource);
        }

        let tx = match self.peeked.take() {
            Some(tx) => Some(tx),
            None => self.pull()?,
        };
        if tx.is_some() {
            self.yielded += 1;
        }
        Ok(tx)
    }

    /// Releases the source and any look-ahead. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.groups = None;
        self.peeked = None;
        self.state = State::Closed;
        log::debug!("Transaction stream closed after {} transactions", self.yielded);
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    fn pull(&mut self) -> Result<Option<Transaction>, PipelineError> {
        if self.state != State::Open {
            return Ok(None);
        }
        let Some(groups) = self.groups.as_mut() else {
            return Ok(None);
        };

        match groups.next() {
            Some(Ok(group)) => match Transaction::try_from(group) {
                Ok(tx) => Ok(Some(tx)),
                Err(e) => {
                    self.finish();
                    Err(e)
                }
            },
            Some(Err(e)) => {
                self.finish();
                Err(e)
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    fn finish(&mut self) {
        self.groups = None;
        self.state = State::Finished;
    }
}

impl<I> Iterator for TransactionStream<I>
where
    I: Iterator<Item = Result<RawLine, PipelineError>>,
{
    type Item = Result<Transaction, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Closed {
            if self.closed_reported {
                return None;
            }
            self.closed_reported = true;
            return Some(Err(PipelineError::ClosedResource));
        }
        self.next_transaction().transpose()
    }
}
