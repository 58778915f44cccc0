use feedwatch_filter::Outcome;
use std::collections::VecDeque;

/// Most recent display lines, oldest first
///
/// The filter never caps how many lines it emits; the view keeps only the
/// newest `max_lines` of them.
#[derive(Debug, Clone)]
pub struct LogView {
    lines: VecDeque<String>,
    max_lines: usize,
    total_pushed: u64,
}

impl LogView {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines,
            total_pushed: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        self.total_pushed += 1;
        if self.max_lines == 0 {
            return;
        }
        if self.lines.len() == self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Append every line of an outcome in order; returns how many were added
    pub fn push_outcome(&mut self, outcome: Outcome) -> usize {
        let lines = outcome.lines();
        let added = lines.len();
        for line in lines {
            self.push(line);
        }
        added
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Lines ever pushed, including those already evicted
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for LogView {
    fn default() -> Self {
        Self::new(100)
    }
}
