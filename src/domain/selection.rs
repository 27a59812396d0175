//! The analysis subject: at most one industry or company at a time.

use std::sync::RwLock;

use tracing::debug;

use crate::util::lock;

const SOURCE: &str = "domain::selection";

/// The subject currently being analyzed.
///
/// Mutually exclusive by construction: an industry selection can never carry
/// a company value. Empty names normalize to `Selection::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Selection {
    #[default]
    None,
    Industry(String),
    Company(String),
}

impl Selection {
    /// Select an industry; an empty or blank name resets to `None`.
    pub fn industry(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Self::None
        } else {
            Self::Industry(name)
        }
    }

    /// Select a company; an empty or blank name resets to `None`.
    pub fn company(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Self::None
        } else {
            Self::Company(name)
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The (industry, company) pair the analytics API expects in payloads.
    pub fn selector(&self) -> (Option<String>, Option<String>) {
        match self {
            Self::None => (None, None),
            Self::Industry(name) => (Some(name.clone()), None),
            Self::Company(name) => (None, Some(name.clone())),
        }
    }

    /// Human-readable label for headers and logs.
    pub fn label(&self) -> String {
        match self {
            Self::None => "nothing selected".to_string(),
            Self::Industry(name) => format!("industry {name}"),
            Self::Company(name) => format!("company {name}"),
        }
    }
}

type Observer = Box<dyn Fn(&Selection) + Send + Sync>;

/// Holds the current [`Selection`] and notifies observers on change.
///
/// `select` is idempotent: re-selecting the structurally equal subject does
/// not notify again. Observers run synchronously before `select` returns.
pub struct SelectionState {
    current: RwLock<Selection>,
    observers: RwLock<Vec<Observer>>,
}

impl SelectionState {
    /// Create a state with nothing selected.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Selection::None),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn get(&self) -> Selection {
        lock::read(&self.current, SOURCE, "get").clone()
    }

    /// Set the selection. Returns true when the selection actually changed
    /// (and observers were notified).
    pub fn select(&self, next: Selection) -> bool {
        {
            let mut current = lock::write(&self.current, SOURCE, "select");
            if *current == next {
                return false;
            }
            debug!(from = %current.label(), to = %next.label(), "Selection changed");
            *current = next.clone();
        }
        // Observers run outside the state lock so they may read it back.
        for observer in lock::read(&self.observers, SOURCE, "select.notify").iter() {
            observer(&next);
        }
        true
    }

    /// Reset to nothing selected.
    pub fn clear(&self) -> bool {
        self.select(Selection::None)
    }

    /// Register an observer invoked synchronously on every change.
    pub fn observe(&self, observer: impl Fn(&Selection) + Send + Sync + 'static) {
        lock::write(&self.observers, SOURCE, "observe").push(Box::new(observer));
    }
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}
