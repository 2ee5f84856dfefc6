//! Transactional undo log.
//!
//! Operations record inverse-capable records into the open transaction. A transaction is a
//! single user-visible undo step; nested `begin`/`commit` pairs join the outermost transaction.

use std::{collections::VecDeque, fmt};

use log::debug;

/// Default number of undo steps kept.
pub const DEFAULT_UNDO_DEPTH: usize = 100;

/// One reversible mutation of a context `C`.
pub trait UndoRecord<C> {
    /// Human-readable description, shown in the undo history.
    fn description(&self) -> &str;

    /// Reverts the mutation.
    fn undo(&mut self, ctx: &mut C);

    /// Re-applies the mutation after it was undone.
    fn redo(&mut self, ctx: &mut C);
}

/// A group of records undone and redone together.
pub struct Transaction<C> {
    description: String,
    records: Vec<Box<dyn UndoRecord<C>>>,
}

impl<C> Transaction<C> {
    fn new(description: String) -> Self {
        Transaction {
            description,
            records: Vec::new(),
        }
    }

    /// Description given to `begin`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Descriptions of the records in recording order.
    pub fn record_descriptions(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.description())
    }

    /// Reverts every record, last first.
    pub fn undo(&mut self, ctx: &mut C) {
        for record in self.records.iter_mut().rev() {
            record.undo(ctx);
        }
    }

    /// Re-applies every record, first first.
    pub fn redo(&mut self, ctx: &mut C) {
        for record in self.records.iter_mut() {
            record.redo(ctx);
        }
    }
}

impl<C> fmt::Debug for Transaction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("description", &self.description)
            .field("records", &self.records.len())
            .finish()
    }
}

/// Undo and redo stacks plus the transaction being recorded.
pub struct UndoLog<C> {
    undo: VecDeque<Transaction<C>>,
    redo: Vec<Transaction<C>>,
    open: Option<Transaction<C>>,
    depth: usize,
    cancelled: bool,
    suspended: usize,
    limit: usize,
}

impl<C> Default for UndoLog<C> {
    fn default() -> Self {
        UndoLog::with_limit(DEFAULT_UNDO_DEPTH)
    }
}

impl<C> UndoLog<C> {
    /// An empty log with the default depth.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty log keeping at most `limit` undo steps.
    pub fn with_limit(limit: usize) -> Self {
        UndoLog {
            undo: VecDeque::new(),
            redo: Vec::new(),
            open: None,
            depth: 0,
            cancelled: false,
            suspended: 0,
            limit: limit.max(1),
        }
    }

    /// Opens a transaction, or joins the open one.
    pub fn begin<D: Into<String>>(&mut self, description: D) {
        if self.depth == 0 {
            self.open = Some(Transaction::new(description.into()));
            self.cancelled = false;
        }
        self.depth += 1;
    }

    /// Closes the innermost `begin`. Closing the outermost pushes the transaction as one undo
    /// step, unless it is empty or was cancelled.
    pub fn commit(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth > 0 {
            return;
        }
        match self.open.take() {
            Some(tx) if !self.cancelled && !tx.is_empty() => {
                debug!("Recorded undo step '{}' ({} records)", tx.description, tx.len());
                self.push_undo(tx);
                self.redo.clear();
            }
            _ => {}
        }
    }

    /// Closes the innermost `begin` and discards the whole transaction when the outermost closes.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.commit();
    }

    /// `true` if a transaction is open and recording is not suspended.
    pub fn is_recording(&self) -> bool {
        self.open.is_some() && self.suspended == 0
    }

    /// Adds a record to the open transaction. Returns `false`, dropping the record, when not
    /// recording.
    pub fn record<R>(&mut self, record: R) -> bool
    where
        R: UndoRecord<C> + 'static,
    {
        if !self.is_recording() {
            return false;
        }
        match self.open.as_mut() {
            Some(tx) => {
                tx.records.push(Box::new(record));
                true
            }
            None => false,
        }
    }

    /// Stops recording until the matching `resume`. Calls nest.
    pub fn suspend(&mut self) {
        self.suspended += 1;
    }

    /// Ends one `suspend`.
    pub fn resume(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }

    /// `true` while suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended > 0
    }

    /// Pops the latest undo step.
    pub fn take_undo(&mut self) -> Option<Transaction<C>> {
        self.undo.pop_back()
    }

    /// Pops the latest redo step.
    pub fn take_redo(&mut self) -> Option<Transaction<C>> {
        self.redo.pop()
    }

    /// Pushes an undone step onto the redo stack.
    pub fn push_redo(&mut self, tx: Transaction<C>) {
        self.redo.push(tx);
    }

    /// Pushes a step onto the undo stack without touching the redo stack.
    pub fn push_undo(&mut self, tx: Transaction<C>) {
        self.undo.push_back(tx);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Undo steps, oldest first.
    pub fn undo_steps(&self) -> impl Iterator<Item = &Transaction<C>> + '_ {
        self.undo.iter()
    }

    /// Number of undo steps.
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of redo steps.
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}

impl<C> fmt::Debug for UndoLog<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoLog")
            .field("undo", &self.undo)
            .field("redo", &self.redo)
            .field("open", &self.open)
            .field("depth", &self.depth)
            .field("suspended", &self.suspended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Push(i32);

    impl UndoRecord<Vec<i32>> for Push {
        fn description(&self) -> &str {
            "Push"
        }

        fn undo(&mut self, ctx: &mut Vec<i32>) {
            ctx.retain(|v| *v != self.0);
        }

        fn redo(&mut self, ctx: &mut Vec<i32>) {
            ctx.push(self.0);
        }
    }

    fn undo(log: &mut UndoLog<Vec<i32>>, ctx: &mut Vec<i32>) {
        if let Some(mut tx) = log.take_undo() {
            tx.undo(ctx);
            log.push_redo(tx);
        }
    }

    #[test]
    fn nested_transactions_join() {
        let mut log = UndoLog::new();
        let mut values = Vec::new();
        log.begin("outer");
        log.begin("inner");
        values.push(1);
        assert!(log.record(Push(1)));
        log.commit();
        values.push(2);
        assert!(log.record(Push(2)));
        log.commit();

        assert_eq!(log.undo_len(), 1);
        undo(&mut log, &mut values);
        assert!(values.is_empty());
        assert_eq!(log.redo_len(), 1);
    }

    #[test]
    fn not_recording_outside_transaction_or_when_suspended() {
        let mut log: UndoLog<Vec<i32>> = UndoLog::new();
        assert!(!log.record(Push(1)));

        log.begin("tx");
        log.suspend();
        assert!(!log.is_recording());
        assert!(!log.record(Push(1)));
        log.resume();
        assert!(log.record(Push(2)));
        log.commit();

        let tx = log.take_undo().unwrap();
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn cancel_and_empty_transactions_leave_no_step() {
        let mut log = UndoLog::new();
        log.begin("empty");
        log.commit();
        log.begin("cancelled");
        log.record(Push(1));
        log.cancel();
        assert_eq!(log.undo_len(), 0);
    }

    #[test]
    fn depth_is_bounded() {
        let mut log = UndoLog::with_limit(2);
        for v in 0..5 {
            log.begin("step");
            log.record(Push(v));
            log.commit();
        }
        assert_eq!(log.undo_len(), 2);
    }
}
