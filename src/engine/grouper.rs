use crate::config::GroupOrder;
use crate::error::PipelineError;
use crate::line::RawLine;

/// A maximal run of lines sharing one transaction id, in arrival order.
///
/// Only the grouper creates groups, and always from a first line, so a
/// group is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    id: i64,
    lines: Vec<RawLine>,
}

impl LineGroup {
    pub fn new(first: RawLine) -> Self {
        Self {
            id: first.transaction_id,
            lines: vec![first],
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn first(&self) -> &RawLine {
        &self.lines[0]
    }

    pub fn lines(&self) -> &[RawLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<RawLine> {
        self.lines
    }

    fn push(&mut self, line: RawLine) {
        self.lines.push(line);
    }
}

/// Splits an ordered stream of lines into [`LineGroup`]s at every change of
/// transaction id.
///
/// Holds at most one open group. The input must already keep each
/// transaction's lines contiguous; with [`GroupOrder::Unchecked`] a
/// transaction that reappears later is emitted as a second, separate group.
/// A checked order turns that into [`PipelineError::OutOfOrder`].
///
/// The first error from upstream, or an order violation, discards the open
/// group, is yielded once, and ends the grouper.
pub struct Grouper<I> {
    lines: I,
    open: Option<LineGroup>,
    order: GroupOrder,
    done: bool,
}

impl<I> Grouper<I>
where
    I: Iterator<Item = Result<RawLine, PipelineError>>,
{
    pub fn new(lines: I) -> Self {
        Self::with_order(lines, GroupOrder::Unchecked)
    }

    pub fn with_order(lines: I, order: GroupOrder) -> Self {
        Self {
            lines,
            open: None,
            order,
            done: false,
        }
    }

    fn fail(&mut self, err: PipelineError) -> Option<Result<LineGroup, PipelineError>> {
        if let Some(group) = self.open.take() {
            log::debug!(
                "Discarding open transaction {} ({} lines)",
                group.id(),
                group.lines().len()
            );
        }
        self.done = true;
        Some(Err(err))
    }
}

impl<I> Iterator for Grouper<I>
where
    I: Iterator<Item = Result<RawLine, PipelineError>>,
{
    type Item = Result<LineGroup, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.done = true;
                    return self.open.take().map(Ok);
                }
            };

            match self.open.as_mut() {
                None => self.open = Some(LineGroup::new(line)),
                Some(group) if group.id() == line.transaction_id => group.push(line),
                Some(group) => {
                    let previous = group.id();
                    let next = line.transaction_id;
                    if !self.order.allows(previous, next) {
                        return self.fail(PipelineError::OutOfOrder { previous, next });
                    }

                    let closed = self.open.replace(LineGroup::new(line));
                    return closed.map(Ok);
                }
            }
        }
    }
}
