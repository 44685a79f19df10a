//! Playback queue: an ordered list of tracks plus an optional cursor.
//!
//! Invariant: `cursor`, when set, is a valid index into `entries`. An empty
//! queue always has an unset cursor.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::audio::LoopMode;
use crate::error::{Error, Result};
use crate::library::Track;

#[derive(Debug, Clone, Default)]
pub struct Queue {
    entries: Vec<Track>,
    cursor: Option<usize>,
    loop_mode: LoopMode,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loop_mode(loop_mode: LoopMode) -> Self {
        Self {
            loop_mode,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[Track] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.entries.get(index)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Track> {
        self.cursor.and_then(|i| self.entries.get(i))
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    /// Append `track` to the end. Returns its index.
    pub fn enqueue(&mut self, track: Track) -> usize {
        self.entries.push(track);
        self.entries.len() - 1
    }

    pub fn enqueue_all(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.entries.extend(tracks);
    }

    /// Remove the entry at `index`.
    ///
    /// Removing the current entry unsets the cursor; removing an entry before
    /// it shifts the cursor down so it keeps pointing at the same track.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        self.check(index)?;
        let removed = self.entries.remove(index);
        self.cursor = match self.cursor {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        Ok(removed)
    }

    /// Move the entry at `from` so that it ends up at `to`.
    ///
    /// The cursor keeps pointing at the same track.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            return Ok(());
        }

        let moved = self.entries.remove(from);
        self.entries.insert(to, moved);

        self.cursor = self.cursor.map(|c| {
            if c == from {
                to
            } else if from < c && c <= to {
                c - 1
            } else if to <= c && c < from {
                c + 1
            } else {
                c
            }
        });
        Ok(())
    }

    pub fn set_cursor(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        self.cursor = Some(index);
        Ok(())
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Replace every entry with `lookup(path)`, dropping entries it returns
    /// `None` for. The cursor follows its track, or is unset when that track
    /// was dropped. Returns how many entries were dropped and whether the
    /// current one was among them.
    pub fn refresh<F>(&mut self, mut lookup: F) -> (usize, bool)
    where
        F: FnMut(&Track) -> Option<Track>,
    {
        let before = self.entries.len();
        let mut cursor = None;
        let mut current_dropped = false;
        let mut kept = Vec::with_capacity(before);

        for (i, entry) in self.entries.drain(..).enumerate() {
            match lookup(&entry) {
                Some(fresh) => {
                    if self.cursor == Some(i) {
                        cursor = Some(kept.len());
                    }
                    kept.push(fresh);
                }
                None if self.cursor == Some(i) => current_dropped = true,
                None => {}
            }
        }

        self.entries = kept;
        self.cursor = cursor;
        (before - self.entries.len(), current_dropped)
    }

    /// Move the cursor after the current track finished on its own.
    ///
    /// `NoLoop` unsets the cursor past the last entry, `LoopAll` wraps to the
    /// start and `LoopOne` stays put. Returns the new cursor.
    pub fn advance(&mut self) -> Option<usize> {
        let len = self.entries.len();
        self.cursor = match (self.cursor, self.loop_mode) {
            (None, _) => None,
            (Some(c), LoopMode::LoopOne) => Some(c),
            (Some(c), _) if c + 1 < len => Some(c + 1),
            (Some(_), LoopMode::LoopAll) if len > 0 => Some(0),
            (Some(_), _) => None,
        };
        self.cursor
    }

    /// Manual skip forward. Wraps only in `LoopAll`; at the end otherwise the
    /// cursor is left alone and `None` is returned.
    pub fn next(&mut self) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let target = match self.cursor {
            None => Some(0),
            Some(c) if c + 1 < self.entries.len() => Some(c + 1),
            Some(_) if self.loop_mode == LoopMode::LoopAll => Some(0),
            Some(_) => None,
        };
        if target.is_some() {
            self.cursor = target;
        }
        target
    }

    /// Manual skip backward, mirroring `next`.
    pub fn previous(&mut self) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        let target = match self.cursor {
            None => Some(last),
            Some(0) if self.loop_mode == LoopMode::LoopAll => Some(last),
            Some(0) => None,
            Some(c) => Some(c - 1),
        };
        if target.is_some() {
            self.cursor = target;
        }
        target
    }

    /// Shuffle the entries. The current track, if any, moves to the front.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let current = self.cursor.map(|c| self.entries.remove(c));
        self.entries.shuffle(rng);
        if let Some(track) = current {
            self.entries.insert(0, track);
            self.cursor = Some(0);
        }
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                index,
                len: self.entries.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests;
