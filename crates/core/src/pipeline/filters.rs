//! Pure acceptance checks. No I/O happens here.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};

use crate::config::FilterConfig;
use crate::discovery::{UploadSummary, VideoDuration};

use super::{ChannelCandidate, RejectReason, VideoSampleSummary};

const HANGUL: &[RangeInclusive<char>] = &[
    '\u{1100}'..='\u{11FF}',
    '\u{3130}'..='\u{318F}',
    '\u{AC00}'..='\u{D7AF}',
];
const JAPANESE: &[RangeInclusive<char>] = &[
    '\u{3040}'..='\u{309F}',
    '\u{30A0}'..='\u{30FF}',
    '\u{4E00}'..='\u{9FFF}',
];
const CJK: &[RangeInclusive<char>] = &['\u{4E00}'..='\u{9FFF}', '\u{3400}'..='\u{4DBF}'];
const CYRILLIC: &[RangeInclusive<char>] = &['\u{0400}'..='\u{04FF}'];
const ARABIC: &[RangeInclusive<char>] = &['\u{0600}'..='\u{06FF}'];
const HEBREW: &[RangeInclusive<char>] = &['\u{0590}'..='\u{05FF}'];
const GREEK: &[RangeInclusive<char>] = &['\u{0370}'..='\u{03FF}'];
const THAI: &[RangeInclusive<char>] = &['\u{0E00}'..='\u{0E7F}'];
const DEVANAGARI: &[RangeInclusive<char>] = &['\u{0900}'..='\u{097F}'];

const SHORTS_TAG: &str = "#shorts";

fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Unicode ranges of the script a language is written in, for script-based
/// languages only.
pub fn script_ranges(language: &str) -> Option<&'static [RangeInclusive<char>]> {
    match primary_subtag(language).as_str() {
        "ko" => Some(HANGUL),
        "ja" => Some(JAPANESE),
        "zh" => Some(CJK),
        "ru" | "uk" | "bg" | "sr" => Some(CYRILLIC),
        "ar" | "fa" | "ur" => Some(ARABIC),
        "he" => Some(HEBREW),
        "el" => Some(GREEK),
        "th" => Some(THAI),
        "hi" | "mr" | "ne" => Some(DEVANAGARI),
        _ => None,
    }
}

fn contains_script(text: &str, ranges: &[RangeInclusive<char>]) -> bool {
    text.chars().any(|c| ranges.iter().any(|r| r.contains(&c)))
}

/// Whether an upload is marked as short-form.
pub fn is_short_form(upload: &UploadSummary) -> bool {
    upload.title.to_lowercase().contains(SHORTS_TAG)
        || upload.description.to_lowercase().contains(SHORTS_TAG)
}

/// Derive the sample summary from recent uploads and their durations.
pub fn summarize_sample(uploads: &[UploadSummary], durations: &[VideoDuration]) -> VideoSampleSummary {
    if uploads.is_empty() {
        return VideoSampleSummary::default();
    }

    let seconds: HashMap<&str, u64> = durations
        .iter()
        .map(|d| (d.id.as_str(), d.duration_seconds))
        .collect();

    let shorts = uploads.iter().filter(|u| is_short_form(u)).count();
    let dates: Vec<DateTime<Utc>> = uploads.iter().filter_map(|u| u.published_at).collect();
    let known: Vec<u64> = uploads
        .iter()
        .filter_map(|u| seconds.get(u.video_id.as_str()).copied())
        .collect();

    let average_duration_minutes = if known.is_empty() {
        0.0
    } else {
        known.iter().sum::<u64>() as f64 / known.len() as f64 / 60.0
    };
    let longest_duration_minutes = known.iter().copied().max().unwrap_or(0) as f64 / 60.0;

    VideoSampleSummary {
        sampled_count: uploads.len(),
        shorts_ratio: shorts as f64 / uploads.len() as f64,
        latest_published_at: dates.iter().max().copied(),
        oldest_published_at: dates.iter().min().copied(),
        average_duration_minutes,
        longest_duration_minutes,
    }
}

/// Acceptance criteria built from the `[filters]` section.
#[derive(Debug, Clone)]
pub struct ChannelFilters {
    config: FilterConfig,
}

impl ChannelFilters {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn analyze_recent_uploads(&self) -> bool {
        self.config.analyze_recent_uploads
    }

    pub fn sample_size(&self) -> u32 {
        self.config.sample_size
    }

    pub fn target_language(&self) -> Option<&str> {
        self.config.target_language.as_deref()
    }

    /// Declared language matches the target, or the text is written in the
    /// target's script. No target accepts everything.
    pub fn check_language(&self, candidate: &ChannelCandidate) -> Result<(), RejectReason> {
        let Some(target) = self.target_language() else {
            return Ok(());
        };
        let target_primary = primary_subtag(target);

        if let Some(hint) = &candidate.language_hint {
            if primary_subtag(hint) == target_primary {
                return Ok(());
            }
        }

        if let Some(ranges) = script_ranges(target) {
            if contains_script(&candidate.title, ranges)
                || contains_script(&candidate.description, ranges)
            {
                return Ok(());
            }
        }

        Err(RejectReason::Language)
    }

    pub fn check_subscribers(&self, candidate: &ChannelCandidate) -> Result<(), RejectReason> {
        let count = candidate.subscriber_count;
        let above_min = self.config.min_subscribers.map_or(true, |min| count >= min);
        let below_max = self.config.max_subscribers.map_or(true, |max| count <= max);
        if above_min && below_max {
            Ok(())
        } else {
            Err(RejectReason::Subscribers { count })
        }
    }

    /// Shorts ratio, recency and duration checks over an analyzed sample.
    pub fn check_activity(
        &self,
        summary: &VideoSampleSummary,
        now: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        if summary.shorts_ratio >= self.config.shorts_ratio_threshold {
            return Err(RejectReason::TooManyShorts {
                ratio: summary.shorts_ratio,
            });
        }

        if self.config.max_age_days > 0 {
            let cutoff = now - chrono::Duration::days(i64::from(self.config.max_age_days));
            match summary.latest_published_at {
                Some(latest) if latest >= cutoff => {}
                _ => return Err(RejectReason::Inactive),
            }
        }

        if self.config.min_duration_minutes > 0
            && summary.longest_duration_minutes < f64::from(self.config.min_duration_minutes)
        {
            return Err(RejectReason::TooShort);
        }

        Ok(())
    }
}
