//! Authoritative, user-mutable slide collection.
//!
//! Every mutation, whether a direct user edit or the completion of a
//! generation task, follows the same shape: lock, read the *current* full
//! collection, apply a pure transform, write the result back, unlock. The lock
//! is never held across an `.await`, so a transform is atomic with respect to
//! every other store operation.
//!
//! Async tasks capture a [`SlideStore`] handle (an accessor to the current
//! state), never a copy of the slides. A task that finishes late therefore
//! re-resolves its target by [`SlideId`] against whatever the store holds at
//! that moment.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::error::NotFound;
use crate::slide::{ProjectSettings, SlideId, SlideRecord};

/// Full project state guarded by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectState {
    pub slides: Vec<SlideRecord>,
    pub settings: ProjectSettings,
}

/// Cheaply clonable handle to the shared project state.
#[derive(Debug, Clone, Default)]
pub struct SlideStore {
    state: Arc<Mutex<ProjectState>>,
}

impl SlideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ProjectState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn get(&self, id: &SlideId) -> Result<SlideRecord, NotFound> {
        self.state
            .lock()
            .slides
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or(NotFound(*id))
    }

    pub fn contains(&self, id: &SlideId) -> bool {
        self.state.lock().slides.iter().any(|s| &s.id == id)
    }

    /// Snapshot of the ordered slide collection.
    pub fn slides(&self) -> Vec<SlideRecord> {
        self.state.lock().slides.clone()
    }

    /// Slide ids in display order.
    pub fn ids(&self) -> Vec<SlideId> {
        self.state.lock().slides.iter().map(|s| s.id).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self, id: &SlideId) -> Option<usize> {
        self.state.lock().slides.iter().position(|s| &s.id == id)
    }

    pub fn settings(&self) -> ProjectSettings {
        self.state.lock().settings.clone()
    }

    pub fn state(&self) -> ProjectState {
        self.state.lock().clone()
    }

    /// Read the current collection, transform it, write it back.
    ///
    /// `transform` must be pure and must not block; it runs under the store lock.
    pub fn update<F>(&self, transform: F)
    where
        F: FnOnce(&[SlideRecord]) -> Vec<SlideRecord>,
    {
        let mut state = self.state.lock();
        let next = transform(&state.slides);
        state.slides = next;
    }

    /// Replace the slide identified by `id` with `updater(current)`.
    ///
    /// The updater sees the slide as it is *now*, not as it was when the
    /// caller captured `id`. The id itself is immutable: whatever the updater
    /// returns is written back under the original id.
    pub fn replace<F>(&self, id: &SlideId, updater: F) -> Result<SlideRecord, NotFound>
    where
        F: FnOnce(&SlideRecord) -> SlideRecord,
    {
        let mut state = self.state.lock();
        let Some(index) = state.slides.iter().position(|s| &s.id == id) else {
            debug!(slide_id = %id, "[STORE] replace target not found");
            return Err(NotFound(*id));
        };
        let mut updated = updater(&state.slides[index]);
        updated.id = *id;
        let next: Vec<SlideRecord> = state
            .slides
            .iter()
            .enumerate()
            .map(|(i, s)| if i == index { updated.clone() } else { s.clone() })
            .collect();
        state.slides = next;
        Ok(updated)
    }

    /// Append a slide. Returns the id it was stored under, which is a fresh
    /// one if `slide.id` is already taken.
    pub fn push(&self, slide: SlideRecord) -> SlideId {
        self.insert(usize::MAX, slide)
    }

    /// Insert at `index`, clamped to the end of the deck. Ids stay unique: a
    /// slide whose id is already present gets a fresh one.
    pub fn insert(&self, index: usize, mut slide: SlideRecord) -> SlideId {
        let mut state = self.state.lock();
        if state.slides.iter().any(|s| s.id == slide.id) {
            let fresh = SlideId::new();
            debug!(slide_id = %slide.id, new_id = %fresh, "[STORE] id already present, assigning a fresh one");
            slide.id = fresh;
        }
        let id = slide.id;
        let mut next = state.slides.clone();
        next.insert(index.min(next.len()), slide);
        state.slides = next;
        id
    }

    pub fn remove(&self, id: &SlideId) -> Option<SlideRecord> {
        let mut removed = None;
        self.update(|slides| {
            slides
                .iter()
                .filter(|s| {
                    if &s.id == id {
                        removed = Some((*s).clone());
                        false
                    } else {
                        true
                    }
                })
                .cloned()
                .collect()
        });
        removed
    }

    /// Move a slide to `index` (clamped). Returns `NotFound` if it is gone.
    pub fn move_to(&self, id: &SlideId, index: usize) -> Result<(), NotFound> {
        let mut found = false;
        self.update(|slides| {
            let mut next = slides.to_vec();
            if let Some(from) = next.iter().position(|s| &s.id == id) {
                found = true;
                let slide = next.remove(from);
                next.insert(index.min(next.len()), slide);
            }
            next
        });
        if found {
            Ok(())
        } else {
            Err(NotFound(*id))
        }
    }

    pub fn update_settings<F>(&self, updater: F)
    where
        F: FnOnce(&ProjectSettings) -> ProjectSettings,
    {
        let mut state = self.state.lock();
        let next = updater(&state.settings);
        state.settings = next;
    }

    /// Replace slides and settings in one step.
    pub fn restore(&self, next: ProjectState) {
        let mut state = self.state.lock();
        debug!(slides = next.slides.len(), "[STORE] restoring project state");
        *state = next;
    }
}
