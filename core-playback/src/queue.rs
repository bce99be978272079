//! # Play Queue
//!
//! Ordered tracks plus a pointer to the active one. The index is `None` only
//! while the queue is empty; otherwise it always points into the queue.
//!
//! Shuffling keeps a snapshot of the original order so it can be restored,
//! with the current track found again by id.

use core_library::models::Track;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{PlaybackError, Result};
use crate::state::RepeatMode;

/// What "next" means for the current queue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Play the current track again from the start.
    Restart,
    /// Move to this index.
    Move(usize),
    /// End of queue with repeat off.
    Stop,
}

/// What "previous" means once the restart threshold has been ruled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    Restart,
    Move(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayQueue {
    tracks: Vec<Track>,
    index: Option<usize>,
    /// Order before shuffling; `Some` while shuffle is on.
    original: Option<Vec<Track>>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&Track> {
        self.index.and_then(|i| self.tracks.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn is_shuffled(&self) -> bool {
        self.original.is_some()
    }

    /// Replace the queue for playing `track` out of `context`.
    ///
    /// If the track is part of the context the queue becomes the context at
    /// the track's position; otherwise the track is put in front of it.
    /// Shuffle state is dropped. Returns the new index.
    pub fn play_from_context(&mut self, track: Track, context: Vec<Track>) -> usize {
        self.original = None;

        match context.iter().position(|t| t.id == track.id) {
            Some(position) => {
                self.tracks = context;
                self.index = Some(position);
                position
            }
            None => {
                let mut tracks = Vec::with_capacity(context.len() + 1);
                tracks.push(track);
                tracks.extend(context);
                self.tracks = tracks;
                self.index = Some(0);
                0
            }
        }
    }

    /// Point at `index`.
    pub fn set_index(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        self.index = Some(index);
        Ok(())
    }

    pub fn next(&self, repeat: RepeatMode) -> Advance {
        let Some(index) = self.index else {
            return Advance::Stop;
        };

        if repeat == RepeatMode::One {
            return Advance::Restart;
        }

        if index + 1 < self.tracks.len() {
            Advance::Move(index + 1)
        } else if repeat == RepeatMode::All {
            Advance::Move(0)
        } else {
            Advance::Stop
        }
    }

    pub fn previous(&self, repeat: RepeatMode) -> Retreat {
        match self.index {
            Some(index) if index > 0 => Retreat::Move(index - 1),
            Some(_) if repeat == RepeatMode::All && self.tracks.len() > 1 => {
                Retreat::Move(self.tracks.len() - 1)
            }
            _ => Retreat::Restart,
        }
    }

    /// Move the track at `from` to `to`, keeping the index on the same track.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            return Ok(());
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(current) = self.index {
            self.index = Some(if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            });
        }
        Ok(())
    }

    /// Append a track. Returns its position.
    pub fn push(&mut self, track: Track) -> usize {
        if let Some(original) = &mut self.original {
            original.push(track.clone());
        }
        self.tracks.push(track);
        if self.index.is_none() {
            self.index = Some(0);
        }
        self.tracks.len() - 1
    }

    /// Insert right after the current track. Returns its position.
    pub fn insert_next(&mut self, track: Track) -> usize {
        let position = self.index.map_or(0, |i| i + 1);

        if let Some(original) = &mut self.original {
            let after_current = self
                .index
                .and_then(|i| self.tracks.get(i))
                .and_then(|current| original.iter().position(|t| t.id == current.id))
                .map_or(original.len(), |p| p + 1);
            original.insert(after_current, track.clone());
        }

        self.tracks.insert(position, track);
        if self.index.is_none() {
            self.index = Some(0);
        }
        position
    }

    /// Remove the track at `index`. The current track cannot be removed.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        self.check(index)?;
        let current = self.index;
        if current == Some(index) {
            return Err(PlaybackError::CannotRemoveCurrent);
        }

        let removed = self.tracks.remove(index);
        if let Some(current) = current {
            if index < current {
                self.index = Some(current - 1);
            }
        }

        if let Some(original) = &mut self.original {
            if let Some(position) = original.iter().position(|t| t.id == removed.id) {
                original.remove(position);
            }
        }
        Ok(removed)
    }

    /// Empty the queue. Shuffle stays on if it was on.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.index = None;
        if let Some(original) = &mut self.original {
            original.clear();
        }
    }

    /// Shuffle with the current track moved to the front.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.original = Some(self.tracks.clone());

        let Some(index) = self.index else {
            return;
        };

        let current = self.tracks.remove(index);
        self.tracks.shuffle(rng);
        self.tracks.insert(0, current);
        self.index = Some(0);
    }

    /// Restore the order from before [`shuffle`](Self::shuffle).
    pub fn unshuffle(&mut self) {
        let Some(original) = self.original.take() else {
            return;
        };

        let current_id = self.current().map(|t| t.id);
        self.tracks = original;
        self.index = match current_id {
            Some(id) => self.tracks.iter().position(|t| t.id == id).or(Some(0)),
            None => None,
        };
        if self.tracks.is_empty() {
            self.index = None;
        }
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.tracks.len() {
            Ok(())
        } else {
            Err(PlaybackError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            })
        }
    }
}
