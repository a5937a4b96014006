/*!
 * Tests for file-level overlap repair
 */

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;

use subclip::encoding::SubtitleEncoding;
use subclip::errors::SubtitleError;
use subclip::normalizer::{normalize, normalize_file};
use subclip::subtitle_formats::SubtitleFormat;
use subclip::subtitle_processor::{SubtitleEntry, SubtitleTrack};

use crate::common;

/// Test normalize_file clamps overlaps and writes a renderer-ready ASS file
#[test]
fn test_normalize_file_withOverlappingSrt_shouldWriteClampedAss() -> Result<()> {
    common::init_logger();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "overlap.srt")?;
    let output = temp_dir.path().join("normalized.ass");

    let report = normalize_file(&input, SubtitleEncoding::Utf8, &output)?;

    assert_eq!(report.clamped, 1);
    assert_eq!(report.degenerate, 0);

    let written = fs::read_to_string(&output)?;
    assert!(written.contains("[Script Info]"));
    assert!(written.contains("Dialogue: 0,0:00:01.00,0:00:03.99,Default,,0,0,0,,This is a test subtitle."));
    assert!(written.contains("Dialogue: 0,0:00:04.00,0:00:09.00,Default,,0,0,0,,It overlaps the first one."));

    let reloaded = SubtitleTrack::load(&output, SubtitleEncoding::Utf8)?;
    assert_eq!(reloaded.overlap_count(), 0);
    Ok(())
}

/// Test the input file itself is left untouched
#[test]
fn test_normalize_file_withSeparateOutput_shouldNotModifyInput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "keep.srt")?;
    let output = temp_dir.path().join("keep.ass");

    normalize_file(&input, SubtitleEncoding::Utf8, &output)?;

    assert_eq!(fs::read_to_string(&input)?, common::OVERLAPPING_SRT);
    Ok(())
}

/// Test UTF-16 input is decoded before repair
#[test]
fn test_normalize_file_withUtf16Input_shouldDecode() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("wide.srt");
    let mut bytes = vec![0xFF, 0xFE];
    for unit in common::OVERLAPPING_SRT.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(&input, bytes)?;
    let output = temp_dir.path().join("wide.ass");

    let report = normalize_file(&input, SubtitleEncoding::Utf16, &output)?;

    assert_eq!(report.clamped, 1);
    Ok(())
}

/// Test a corrupt file is a load error and nothing is written
#[test]
fn test_normalize_file_withCorruptInput_shouldReturnLoadError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "corrupt.srt", "\u{0}\u{1}garbage")?;
    let output = temp_dir.path().join("corrupt.ass");

    let result = normalize_file(&input, SubtitleEncoding::Utf8, &output);

    assert!(matches!(result, Err(SubtitleError::Load { .. })));
    assert!(!output.exists());
    Ok(())
}

/// Unsorted track of `count` random cues; a narrow spread makes overlaps and equal starts common
fn random_track(rng: &mut StdRng, count: usize, spread_ms: u64) -> SubtitleTrack {
    let mut track = SubtitleTrack::new(PathBuf::from("random.srt"), SubtitleEncoding::Utf8, SubtitleFormat::Srt);
    track.entries = (0..count)
        .map(|i| {
            let start = rng.random_range(0..spread_ms);
            let length = rng.random_range(0..6_000);
            SubtitleEntry::new(i + 1, start, start + length, format!("cue {}", i))
        })
        .collect();
    track
}

/// Test repair on many random tracks: no cue outlives its successor's start, and repair is idempotent
#[test]
fn test_normalize_withRandomTracks_shouldNeverOverlapAndBeIdempotent() {
    let mut rng = StdRng::seed_from_u64(0x5eed_c11b);

    for case in 0..500 {
        let count = rng.random_range(0..60);
        let spread_ms = if case % 3 == 0 { 2_000 } else { 120_000 };
        let track = random_track(&mut rng, count, spread_ms);

        let (once, report) = normalize(&track);
        let (twice, second_report) = normalize(&once);

        assert_eq!(once.entries.len(), track.entries.len(), "case {}", case);
        for pair in once.entries.windows(2) {
            assert!(pair[0].start_time_ms <= pair[1].start_time_ms, "case {}: not in start order", case);
            assert!(
                pair[0].end_time_ms <= pair[1].start_time_ms,
                "case {}: cue ending at {} overlaps cue starting at {}",
                case,
                pair[0].end_time_ms,
                pair[1].start_time_ms
            );
        }
        assert_eq!(once.overlap_count(), 0, "case {}", case);
        assert_eq!(twice, once, "case {}: second pass changed the track", case);
        assert_eq!(second_report.clamped, 0, "case {}", case);
        assert!(report.degenerate <= track.entries.len());
    }
}
