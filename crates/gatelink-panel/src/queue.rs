// ABOUTME: FIFO of queries submitted while the panel is closed
// ABOUTME: Drained in order once the panel opens

use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct QueryQueue {
    queries: VecDeque<String>,
}

impl QueryQueue {
    pub fn push(&mut self, query: impl Into<String>) {
        self.queries.push_back(query.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.queries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }
}
