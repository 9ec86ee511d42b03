//! Sound library: the droid's vocabulary of response clips
//!
//! Clips live in one directory per category:
//!
//! ```text
//! sounds/
//!   happy/        whistle.wav, chirp.mp3, ...
//!   curious/
//!   concerned/
//!   scared/
//!   acknowledge/
//! ```
//!
//! Every category must contain at least one clip; a library that cannot
//! answer every category is rejected at load time.

mod decode;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::emotion::EmotionCategory;
use crate::{Error, Result};

const CATEGORY_COUNT: usize = EmotionCategory::ALL.len();

/// One decoded response clip
#[derive(Debug, Clone, PartialEq)]
pub struct SoundClip {
    id: String,
    category: EmotionCategory,
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SoundClip {
    /// Wrap decoded mono samples
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        category: EmotionCategory,
        samples: impl Into<Arc<[f32]>>,
        sample_rate: u32,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Identifier, `<category>/<file name>` for clips loaded from disk
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn category(&self) -> EmotionCategory {
        self.category
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clip length
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

impl fmt::Display for SoundClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Read-only map from category to a non-empty set of clips
pub struct SoundLibrary {
    clips: [Vec<SoundClip>; CATEGORY_COUNT],
    avoid_repeat: bool,
    last_pick: Mutex<[Option<usize>; CATEGORY_COUNT]>,
}

impl SoundLibrary {
    /// Load `<dir>/<category>/*.{wav,mp3}` for every category
    ///
    /// # Errors
    ///
    /// Returns error if a category directory is missing or empty, or any
    /// clip fails to decode
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::SoundLibrary(format!(
                "sounds directory not found: {}",
                dir.display()
            )));
        }

        let mut clips = Vec::new();
        for category in EmotionCategory::ALL {
            let category_dir = dir.join(category.as_str());
            if !category_dir.is_dir() {
                return Err(Error::SoundLibrary(format!(
                    "missing category directory: {}",
                    category_dir.display()
                )));
            }

            let mut paths: Vec<_> = std::fs::read_dir(&category_dir)?
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && is_clip(path))
                .collect();
            paths.sort();

            for path in paths {
                let decoded = decode::decode_file(&path)?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                clips.push(SoundClip::new(
                    format!("{category}/{name}"),
                    category,
                    decoded.samples,
                    decoded.sample_rate,
                ));
            }
        }

        let library = Self::from_clips(clips)?;
        tracing::info!(
            dir = %dir.display(),
            clips = library.len(),
            "sound library loaded"
        );
        Ok(library)
    }

    /// Build a library from already decoded clips
    ///
    /// # Errors
    ///
    /// Returns error if any category ends up without a clip
    pub fn from_clips(clips: impl IntoIterator<Item = SoundClip>) -> Result<Self> {
        let mut by_category: [Vec<SoundClip>; CATEGORY_COUNT] = Default::default();
        for clip in clips {
            by_category[clip.category.index()].push(clip);
        }

        let missing: Vec<&str> = EmotionCategory::ALL
            .iter()
            .filter(|c| by_category[c.index()].is_empty())
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(Error::SoundLibrary(format!(
                "no clips for categor{}: {}",
                if missing.len() == 1 { "y" } else { "ies" },
                missing.join(", ")
            )));
        }

        Ok(Self {
            clips: by_category,
            avoid_repeat: false,
            last_pick: Mutex::new([None; CATEGORY_COUNT]),
        })
    }

    /// Never pick the same clip twice in a row for a category
    #[must_use]
    pub const fn with_avoid_repeat(mut self, avoid_repeat: bool) -> Self {
        self.avoid_repeat = avoid_repeat;
        self
    }

    /// Pick a clip for the category, uniformly at random
    #[must_use]
    pub fn pick(&self, category: EmotionCategory) -> &SoundClip {
        let set = &self.clips[category.index()];
        let mut rng = rand::thread_rng();

        if !self.avoid_repeat || set.len() < 2 {
            return &set[rng.gen_range(0..set.len())];
        }

        let Ok(mut last) = self.last_pick.lock() else {
            return &set[rng.gen_range(0..set.len())];
        };
        let slot = &mut last[category.index()];

        // Draw from the other n-1 clips by skipping over the previous one
        let index = match *slot {
            Some(previous) => {
                let index = rng.gen_range(0..set.len() - 1);
                if index >= previous { index + 1 } else { index }
            }
            None => rng.gen_range(0..set.len()),
        };
        *slot = Some(index);

        &set[index]
    }

    /// All clips for a category, in load order
    #[must_use]
    pub fn clips(&self, category: EmotionCategory) -> &[SoundClip] {
        &self.clips[category.index()]
    }

    /// Every clip grouped by category
    pub fn iter(&self) -> impl Iterator<Item = (EmotionCategory, &[SoundClip])> {
        EmotionCategory::ALL
            .into_iter()
            .map(|c| (c, self.clips(c)))
    }

    /// Total number of clips
    #[must_use]
    pub fn len(&self) -> usize {
        self.clips.iter().map(Vec::len).sum()
    }

    /// Always false for a loaded library
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_clip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("mp3"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, category: EmotionCategory) -> SoundClip {
        SoundClip::new(id, category, vec![0.1; 160], 16000)
    }

    fn full_library() -> Vec<SoundClip> {
        EmotionCategory::ALL
            .iter()
            .map(|c| clip(&format!("{c}/one.wav"), *c))
            .collect()
    }

    #[test]
    fn test_missing_category_is_rejected() {
        let clips = full_library()
            .into_iter()
            .filter(|c| c.category() != EmotionCategory::Scared);

        let err = SoundLibrary::from_clips(clips).err().unwrap();
        assert!(err.to_string().contains("scared"));
    }

    #[test]
    fn test_single_clip_always_picked() {
        let library = SoundLibrary::from_clips(full_library())
            .unwrap()
            .with_avoid_repeat(true);

        for _ in 0..10 {
            assert_eq!(library.pick(EmotionCategory::Happy).id(), "happy/one.wav");
        }
    }

    #[test]
    fn test_clip_duration() {
        let clip = SoundClip::new("x", EmotionCategory::Happy, vec![0.0; 8000], 16000);
        assert_eq!(clip.duration(), std::time::Duration::from_millis(500));
    }
}
