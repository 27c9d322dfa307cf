//! Remote Resource State
//!
//! Every view loads something from the tutoring service and shows either a
//! loading indicator, the data, or an error. [`Resource`] is that state, and
//! [`Tracked`] adds a generation counter so that a result arriving after the
//! view moved on (a different file was selected, the view was reset) is
//! dropped instead of overwriting newer state.

use crate::error::ClientError;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Resource::Idle
    }
}

impl<T> Resource<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Resource::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Resource::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Converts a request outcome into the settled state, using `fallback`
    /// as the displayed message for errors without a server-provided one.
    pub fn from_result(result: Result<T, ClientError>, fallback: &str) -> Self {
        match result {
            Ok(value) => Resource::Ready(value),
            Err(e) => Resource::Failed(e.user_message(fallback)),
        }
    }
}

/// Proof that a request was issued for a particular generation of a [`Tracked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a ticket must be passed back to `settle`"]
pub struct Ticket(u64);

/// A [`Resource`] that only accepts results for the request issued last.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    state: Resource<T>,
    generation: u64,
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tracked<T> {
    pub fn new() -> Self {
        Self {
            state: Resource::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> &Resource<T> {
        &self.state
    }

    pub fn ready(&self) -> Option<&T> {
        self.state.ready()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// Marks the resource as loading and invalidates every earlier ticket.
    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.state = Resource::Loading;
        Ticket(self.generation)
    }

    /// Applies a result. Returns `false` and leaves the state untouched when
    /// the ticket is stale.
    pub fn settle(
        &mut self,
        ticket: Ticket,
        result: Result<T, ClientError>,
        fallback: &str,
    ) -> bool {
        if ticket.0 != self.generation {
            debug!(
                ticket = ticket.0,
                current = self.generation,
                "Discarding stale response"
            );
            return false;
        }
        self.state = Resource::from_result(result, fallback);
        true
    }

    /// Drops the current value and any request still in flight.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = Resource::Idle;
    }
}
