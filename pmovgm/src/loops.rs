//! Loop points recovered from Vorbis comment tags.
//!
//! Games never agreed on a tag, so each known convention is matched by its
//! literal prefix against the whole `key=value` string. Tags are scanned in
//! order and a later match overwrites an earlier one.

use tracing::debug;

use crate::util::{parse_leading_int, scan_int_pair};

/// Loop data accumulated from the container header and comment tags.
///
/// `start` is only meaningful while `flag` is set; `length` and `end` are
/// `Some` once a tag provided them. Values are 32-bit as stored by the games'
/// tools; out-of-range tag values wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopInfo {
    pub flag: bool,
    pub start: i32,
    pub length: Option<i32>,
    pub end: Option<i32>,
}

/// A resolved loop region in samples, `end` never past the stream end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: i64,
    pub end: i64,
}

impl LoopRegion {
    pub fn length(&self) -> i64 {
        self.end - self.start
    }
}

/// What a recognized tag sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopTag {
    /// Value after the last `=`.
    Start,
    /// Value after the last `=`.
    Length,
    /// Value right after the prefix.
    StartAfterPrefix,
    /// Value right after the prefix.
    EndAfterPrefix,
    /// End sample given while a start is already known; stored as a length.
    EndAsLength,
    /// `start,end` after the last `=`.
    PairAfterEquals,
    /// `start,end` after the last `(`.
    PairAfterParen,
}

const LOOP_TAGS: &[(&str, LoopTag)] = &[
    ("loop_start=", LoopTag::Start),                 // Phantasy Star Online 4
    ("LOOP_START=", LoopTag::Start),                 // Phantasy Star Online 4
    ("COMMENT=LOOPPOINT=", LoopTag::Start),
    ("LOOPSTART=", LoopTag::Start),
    ("um3.stream.looppoint.start=", LoopTag::Start),
    ("LOOP_BEGIN=", LoopTag::Start),                 // Hatsune Miku: Project Diva F
    ("LoopStart=", LoopTag::Start),                  // Devil May Cry 4
    ("LOOPLENGTH=", LoopTag::Length),                // pairs with LOOPSTART
    ("title=-lps", LoopTag::StartAfterPrefix),       // Memories Off #5
    ("album=-lpe", LoopTag::EndAfterPrefix),         // pairs with title=-lps
    ("LoopEnd=", LoopTag::EndAsLength),              // pairs with LoopStart
    ("LOOP_END=", LoopTag::EndAsLength),             // pairs with LOOP_BEGIN
    ("lp=", LoopTag::PairAfterEquals),
    ("LOOPDEFS=", LoopTag::PairAfterEquals),         // Fairy Fencer F: Advent Dark Force
    ("COMMENT=loop(", LoopTag::PairAfterParen),      // Zero Time Dilemma
];

impl LoopInfo {
    pub fn with_start(start: i32, flag: bool) -> Self {
        Self {
            flag,
            start,
            ..Self::default()
        }
    }

    /// Applies one comment tag; unknown tags are ignored.
    pub fn apply_tag(&mut self, comment: &str) -> bool {
        let Some((prefix, tag)) = LOOP_TAGS
            .iter()
            .find(|(prefix, _)| comment.starts_with(prefix))
        else {
            return false;
        };

        let after_equals = || value_after(comment, '=');
        match tag {
            LoopTag::Start => {
                self.start = parse_leading_int(after_equals());
                self.flag = self.start >= 0;
            }
            LoopTag::Length => {
                self.length = Some(parse_leading_int(after_equals()));
            }
            LoopTag::StartAfterPrefix => {
                self.start = parse_leading_int(&comment[prefix.len()..]);
                self.flag = self.start >= 0;
            }
            LoopTag::EndAfterPrefix => {
                self.end = Some(parse_leading_int(&comment[prefix.len()..]));
                self.flag = true;
            }
            LoopTag::EndAsLength => {
                if self.flag {
                    self.length = Some(parse_leading_int(after_equals()).wrapping_sub(self.start));
                }
            }
            LoopTag::PairAfterEquals | LoopTag::PairAfterParen => {
                let delimiter = if *tag == LoopTag::PairAfterParen { '(' } else { '=' };
                let (start, end) = scan_int_pair(value_after(comment, delimiter));
                if let Some(start) = start {
                    self.start = start;
                }
                if let Some(end) = end {
                    self.end = Some(end);
                }
                self.flag = true;
                // an end that failed to scan still counts as found, keeping the previous value
                self.end.get_or_insert(0);
            }
        }
        true
    }

    /// Computes the loop region for a stream of `total_samples`.
    ///
    /// A found length wins over a found end; with neither the loop runs to the
    /// end of the stream. The end is clamped to `total_samples`.
    pub fn resolve(&self, total_samples: u64) -> Option<LoopRegion> {
        if !self.flag {
            return None;
        }
        let total = i64::try_from(total_samples).unwrap_or(i64::MAX);
        let start = i64::from(self.start);
        let end = match (self.length, self.end) {
            (Some(length), _) => start + i64::from(length),
            (None, Some(end)) => i64::from(end),
            (None, None) => total,
        };
        Some(LoopRegion {
            start,
            end: end.min(total),
        })
    }
}

fn value_after(comment: &str, delimiter: char) -> &str {
    comment
        .rfind(delimiter)
        .map(|idx| &comment[idx + delimiter.len_utf8()..])
        .unwrap_or("")
}

/// Scans `comments` in order on top of `seed`, the loop data the container
/// header already provided.
pub fn extract_loop_info<I, T>(comments: I, seed: LoopInfo) -> LoopInfo
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut info = seed;
    for comment in comments {
        let comment = comment.as_ref();
        if info.apply_tag(comment) {
            debug!(comment, "loop tag");
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(tags: &[&str]) -> LoopInfo {
        extract_loop_info(tags.iter().copied(), LoopInfo::default())
    }

    #[test]
    fn last_match_wins() {
        let info = extract(&["LOOPSTART=1000", "LoopStart=2000"]);
        assert!(info.flag);
        assert_eq!(info.start, 2000);
    }

    #[test]
    fn loop_start_and_end_pair() {
        let info = extract(&["LoopStart=1000", "LoopEnd=5000"]);
        let region = info.resolve(100_000).unwrap();
        assert_eq!(region.start, 1000);
        assert_eq!(region.end, 5000);
        assert_eq!(region.length(), 4000);
    }

    #[test]
    fn lp_pair() {
        let info = extract(&["lp=100,9000"]);
        assert!(info.flag);
        assert_eq!(info.start, 100);
        assert_eq!(info.end, Some(9000));
        assert_eq!(
            info.resolve(10_000),
            Some(LoopRegion {
                start: 100,
                end: 9000
            })
        );
    }

    #[test]
    fn loopdefs_and_comment_loop_pairs() {
        let info = extract(&["LOOPDEFS=10,20"]);
        assert_eq!((info.start, info.end), (10, Some(20)));

        let info = extract(&["COMMENT=loop(300,4000)"]);
        assert_eq!((info.start, info.end), (300, Some(4000)));
    }

    #[test]
    fn end_is_clamped_to_total_samples() {
        let info = extract(&["LOOP_START=0", "album=-lpe999999"]);
        assert_eq!(info.resolve(5000).unwrap().end, 5000);
    }

    #[test]
    fn start_without_end_loops_to_stream_end() {
        let info = extract(&["loop_start=441"]);
        assert_eq!(
            info.resolve(88_200),
            Some(LoopRegion {
                start: 441,
                end: 88_200
            })
        );
    }

    #[test]
    fn start_plus_length() {
        let info = extract(&["LOOPSTART=1000", "LOOPLENGTH=2500"]);
        assert_eq!(info.resolve(10_000).unwrap().end, 3500);
    }

    #[test]
    fn length_before_start_is_kept() {
        // length stored against an unset start, used once a start shows up
        let info = extract(&["LOOPLENGTH=2500"]);
        assert!(!info.flag);
        assert_eq!(info.length, Some(2500));
        assert_eq!(info.resolve(10_000), None);

        let info = extract(&["LOOPLENGTH=2500", "LOOPSTART=1000"]);
        assert_eq!(info.resolve(10_000).unwrap().end, 3500);
    }

    #[test]
    fn loop_end_without_start_is_ignored() {
        let info = extract(&["LoopEnd=5000", "LoopStart=1000"]);
        assert_eq!(info.length, None);
        assert_eq!(info.resolve(8000).unwrap().end, 8000);
    }

    #[test]
    fn length_takes_precedence_over_end() {
        let info = extract(&["title=-lps100", "album=-lpe900", "LOOPLENGTH=50"]);
        assert_eq!(info.resolve(1000).unwrap().end, 150);
    }

    #[test]
    fn negative_start_clears_flag() {
        let info = extract(&["LOOPSTART=-1"]);
        assert!(!info.flag);
        assert_eq!(info.resolve(1000), None);
    }

    #[test]
    fn oversized_tag_values_wrap_to_32_bits() {
        let info = extract(&["LOOPSTART=4294968296"]);
        assert!(info.flag);
        assert_eq!(info.start, 1000);

        let info = extract(&["LOOPSTART=3000000000"]);
        assert!(!info.flag);
    }

    #[test]
    fn looppoint_uses_last_equals() {
        let info = extract(&["COMMENT=LOOPPOINT=12345"]);
        assert_eq!(info.start, 12345);
        let info = extract(&["um3.stream.looppoint.start=77"]);
        assert_eq!(info.start, 77);
    }

    #[test]
    fn prefixes_are_case_sensitive() {
        let info = extract(&["loopstart=1000", "Title=-lps5", "LP=1,2"]);
        assert_eq!(info, LoopInfo::default());
    }

    #[test]
    fn seed_from_header_is_refined_by_tags() {
        let seed = LoopInfo::with_start(44_100, true);
        let info = extract_loop_info(["ARTIST=someone", "LOOPLENGTH=1000"], seed);
        assert_eq!(info.resolve(100_000).unwrap().end, 45_100);
    }
}
