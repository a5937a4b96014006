/*!
 * Tests for app configuration functionality
 */

use anyhow::Result;
use std::fs;
use std::time::Duration;

use subclip::app_config::{Config, LogLevel, ToolConfig};
use subclip::encoding::SubtitleEncoding;

use crate::common;

/// Test the default configuration values
#[test]
fn test_default_config_shouldHaveExpectedValues() {
    let config = Config::default();

    assert_eq!(config.tools.ytdlp.program, "yt-dlp");
    assert_eq!(config.tools.ffmpeg.program, "ffmpeg");
    assert_eq!(config.tools.ffsubsync.timeout(), Duration::from_secs(900));
    assert_eq!(config.render.video_bitrate, "5000k");
    assert_eq!(config.render.audio_bitrate, "192k");
    assert_eq!(config.subtitles.default_language.as_deref(), Some("en"));
    assert_eq!(config.subtitles.default_encoding, SubtitleEncoding::Utf8);
    assert!(config.subtitles.align);
    assert!(config.work_dir.is_none());
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test the default configuration is valid
#[test]
fn test_validate_withDefaultConfig_shouldSucceed() {
    assert!(Config::default().validate().is_ok());
}

/// Test validation rejects bad values
#[test]
fn test_validate_withInvalidValues_shouldFail() {
    let mut config = Config::default();
    config.subtitles.default_language = Some("xyz".to_string());
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.render.video_bitrate = "fast".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.render.download_format = "  ".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.tools.ffmpeg = ToolConfig::new("", 60);
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.tools.ffprobe.timeout_secs = 0;
    assert!(config.validate().is_err());
}

/// Test validation accepts the bitrate forms ffmpeg understands
#[test]
fn test_validate_withBitrateVariants_shouldSucceed() {
    for bitrate in ["5000k", "1.5M", "192000", "128K"] {
        let mut config = Config::default();
        config.render.audio_bitrate = bitrate.to_string();
        assert!(config.validate().is_ok(), "'{}' should be accepted", bitrate);
    }
}

/// Test auto-fetch can be disabled by a null language
#[test]
fn test_validate_withNoDefaultLanguage_shouldSucceed() {
    let mut config = Config::default();
    config.subtitles.default_language = None;
    assert!(config.validate().is_ok());
}

/// Test a missing config file is created with defaults
#[test]
fn test_load_or_create_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("subclip.json");

    let config = Config::load_or_create(&path)?;

    assert_eq!(config, Config::default());
    assert!(path.exists());

    let reloaded = Config::load_or_create(&path)?;
    assert_eq!(reloaded, config);
    Ok(())
}

/// Test a partial config falls back to defaults for omitted sections
#[test]
fn test_load_or_create_withPartialFile_shouldFillDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "partial.json",
        r#"{
            "subtitles": { "default_language": "fr", "default_encoding": "latin-1" },
            "tools": { "ffmpeg": { "program": "/opt/ffmpeg/bin/ffmpeg", "timeout_secs": 10 } },
            "log_level": "debug"
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.subtitles.default_language.as_deref(), Some("fr"));
    assert_eq!(config.subtitles.default_encoding, SubtitleEncoding::Latin1);
    assert!(config.subtitles.align);
    assert_eq!(config.tools.ffmpeg.program, "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(config.tools.ytdlp.program, "yt-dlp");
    assert_eq!(config.render.video_bitrate, "5000k");
    assert_eq!(config.log_level, LogLevel::Debug);
    Ok(())
}

/// Test an unknown encoding label is rejected while parsing
#[test]
fn test_load_or_create_withUnknownEncoding_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "bad.json",
        r#"{ "subtitles": { "default_encoding": "klingon" } }"#,
    )?;

    assert!(Config::load_or_create(&path).is_err());
    // The broken file is never overwritten
    assert!(fs::read_to_string(&path)?.contains("klingon"));
    Ok(())
}
