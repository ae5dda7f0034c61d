//! Contact roster with presence.
//!
//! Holds the users returned by the backend listing, in listing order, and
//! folds presence events into their status fields. Presence never creates
//! or removes a user; unknown ids in an event are ignored.

use causerie_shared::types::{Presence, User, UserId};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Roster {
    users: Vec<User>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster with a fresh backend listing.
    pub fn replace(&mut self, users: Vec<User>) {
        debug!(count = users.len(), "Roster replaced");
        self.users = users;
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn get(&self, user_id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == user_id)
    }

    /// Fold a `user:online` / `user:offline` event into the matching user.
    pub fn set_presence(&mut self, user_id: &UserId, status: Presence) {
        if let Some(user) = self.users.iter_mut().find(|u| &u.id == user_id) {
            user.status = status;
            debug!(user = %user_id, status = ?status, "Presence updated");
        }
    }

    /// Apply a `users:online` snapshot: listed users become online, every
    /// other user offline.
    pub fn apply_online_snapshot(&mut self, online: &[UserId]) {
        for user in &mut self.users {
            user.status = if online.contains(&user.id) {
                Presence::Online
            } else {
                Presence::Offline
            };
        }
    }

    /// Case-insensitive name/email filter for the sidebar search.
    pub fn search(&self, query: &str) -> Vec<&User> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.users.iter().collect();
        }
        self.users
            .iter()
            .filter(|u| {
                u.name.to_lowercase().contains(&query) || u.email.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.users
            .iter()
            .filter(|u| u.status == Presence::Online)
            .count()
    }
}
