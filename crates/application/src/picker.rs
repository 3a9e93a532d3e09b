//! Random unread-book picker with a timed cycling reveal.

use std::time::{Duration, Instant};

use rand::Rng;
use twinshelf_core::{Book, Genre, TableTarget};

/// Unread books from the selected shelf(s), optionally narrowed to `genre`.
///
/// For [`TableTarget::Both`] the pool holds the first shelf's candidates whose
/// title also appears among the second shelf's candidates.
pub fn candidate_pool(
    first: &[Book],
    second: &[Book],
    table: TableTarget,
    genre: Option<&Genre>,
) -> Vec<Book> {
    let eligible = |book: &&Book| book.is_unread() && genre.is_none_or(|g| *g == book.genre);
    match table {
        TableTarget::First => first.iter().filter(eligible).cloned().collect(),
        TableTarget::Second => second.iter().filter(eligible).cloned().collect(),
        TableTarget::Both => {
            let second_titles: Vec<&str> = second
                .iter()
                .filter(eligible)
                .map(|book| book.title.as_str())
                .collect();
            first
                .iter()
                .filter(eligible)
                .filter(|book| second_titles.contains(&book.title.as_str()))
                .cloned()
                .collect()
        }
    }
}

/// A running reveal. Owned by the [`Picker`]; dropping it revokes the cycle.
#[derive(Debug, Clone)]
pub struct CycleHandle {
    pool: Vec<Book>,
    shown: usize,
    chosen: usize,
    next_step: Instant,
    deadline: Instant,
    step: Duration,
}

impl CycleHandle {
    pub fn current(&self) -> &Book {
        &self.pool[self.shown]
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

#[derive(Debug, Clone, Default)]
pub enum PickPhase {
    #[default]
    Idle,
    NoEligible,
    Cycling(CycleHandle),
    Settled(Book),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickStart {
    NoEligible,
    Cycling { pool: usize },
    Busy,
}

#[derive(Debug, Clone)]
pub struct Picker {
    pub open: bool,
    table: TableTarget,
    genre: Option<Genre>,
    phase: PickPhase,
}

impl Default for Picker {
    fn default() -> Self {
        Self {
            open: false,
            table: TableTarget::First,
            genre: None,
            phase: PickPhase::Idle,
        }
    }
}

impl Picker {
    pub fn table(&self) -> TableTarget {
        self.table
    }

    pub fn genre(&self) -> Option<&Genre> {
        self.genre.as_ref()
    }

    pub fn phase(&self) -> &PickPhase {
        &self.phase
    }

    pub fn is_cycling(&self) -> bool {
        matches!(self.phase, PickPhase::Cycling(_))
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Closes the picker and revokes any running cycle.
    pub fn close(&mut self) {
        self.open = false;
        self.cancel();
    }

    pub fn cancel(&mut self) {
        if self.is_cycling() {
            tracing::debug!("random pick cancelled");
            self.phase = PickPhase::Idle;
        }
    }

    pub fn cycle_table(&mut self, forward: bool) -> bool {
        if self.is_cycling() {
            return false;
        }
        self.table = self.table.cycle(forward);
        true
    }

    pub fn cycle_genre(&mut self, forward: bool) -> bool {
        if self.is_cycling() {
            return false;
        }
        self.genre = Genre::cycle_option(self.genre.as_ref(), forward);
        true
    }

    /// Starts a pick over `pool`. The final choice is drawn up front and
    /// revealed once the cycle deadline passes.
    pub fn start<R: Rng>(
        &mut self,
        pool: Vec<Book>,
        now: Instant,
        step: Duration,
        duration: Duration,
        rng: &mut R,
    ) -> PickStart {
        if self.is_cycling() {
            return PickStart::Busy;
        }
        if pool.is_empty() {
            self.phase = PickPhase::NoEligible;
            return PickStart::NoEligible;
        }

        let len = pool.len();
        let chosen = rng.gen_range(0..len);
        tracing::debug!(pool = len, "random pick started");
        self.phase = PickPhase::Cycling(CycleHandle {
            pool,
            shown: 0,
            chosen,
            next_step: now + step,
            deadline: now + duration,
            step,
        });
        PickStart::Cycling { pool: len }
    }

    /// Advances the cycle to `now`. Returns `true` when the display changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let PickPhase::Cycling(handle) = &mut self.phase else {
            return false;
        };

        if now >= handle.deadline {
            let book = handle.pool[handle.chosen].clone();
            tracing::info!(title = %book.title, "random pick settled");
            self.phase = PickPhase::Settled(book);
            return true;
        }

        let mut changed = false;
        while now >= handle.next_step {
            handle.shown = (handle.shown + 1) % handle.pool.len();
            handle.next_step += handle.step;
            changed = true;
        }
        changed
    }
}
