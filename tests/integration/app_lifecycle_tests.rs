/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use std::fs;
use tokio_test;

use subclip::app_config::Config;
use subclip::app_controller::{BurnOptions, ClipOptions, Controller};
use subclip::clip_assembler::{FailureReason, RunStatus, SubtitleOutcome};
use subclip::encoding::SubtitleEncoding;

use crate::common;
use crate::common::fake_tools::{
    AlignBehavior, FakeAligner, FakeFetcher, FakeRenderer, FakeTools, FetchBehavior, SubtitleSource,
};

/// Test the controller initialization with default config
#[test]
fn test_controller_initialization_withDefaultConfig_shouldKeepConfig() {
    let controller = Controller::with_config(Config::default());

    assert_eq!(controller.config(), &Config::default());
}

/// Test a config file on disk drives the controller
#[test]
fn test_controller_withLoadedConfig_shouldUseItsDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config_path = common::create_test_file(
        temp_dir.path(),
        "subclip.json",
        r#"{ "subtitles": { "default_language": "de", "align": false } }"#,
    )?;

    let config = Config::load_or_create(&config_path)?;
    config.validate()?;
    let tools = FakeTools::happy();
    let controller = Controller::with_toolbox(config, tools.toolbox()).without_progress();

    let request = controller
        .clip_request(ClipOptions {
            locator: "https://example.com/v".to_string(),
            start: "0".to_string(),
            end: "5".to_string(),
            fps: 25,
            ..ClipOptions::default()
        })
        .map_err(anyhow::Error::from)?;

    assert_eq!(request.subtitle_language.as_deref(), Some("de"));
    assert!(!request.align);
    Ok(())
}

/// Test a full clip run through the controller
#[test]
fn test_clip_withAutoSubtitles_shouldProduceSubtitledOutput() -> Result<()> {
    common::init_logger();
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("clips").join("intro.mp4");
    let tools = FakeTools::new(
        FakeFetcher::new(
            FetchBehavior::Succeed,
            SubtitleSource::Track(common::OVERLAPPING_SRT.to_string()),
        ),
        FakeAligner::new(AlignBehavior::Shift(0)),
        FakeRenderer::default(),
    );
    let controller = Controller::with_toolbox(Config::default(), tools.toolbox()).without_progress();

    let result = tokio_test::block_on(async {
        controller
            .clip(ClipOptions {
                locator: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                start: "00:00:00".to_string(),
                end: "00:00:20".to_string(),
                fps: 30,
                output: Some(output.clone()),
                ..ClipOptions::default()
            })
            .await
    });

    let outcome = result.map_err(anyhow::Error::from)?;
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.subtitles, SubtitleOutcome::Aligned);
    assert_eq!(outcome.output, output);
    assert!(output.exists());

    assert_eq!(*tools.fetcher.subtitle_requests.lock().unwrap(), vec!["en".to_string()]);
    let call = tools.renderer.last_call().unwrap();
    assert_eq!(call.settings.frame_rate, Some(30));
    assert_eq!(call.settings.audio_bitrate.as_deref(), Some("192k"));
    assert_eq!(common::dir_entries(output.parent().unwrap()), vec!["intro.mp4".to_string()]);
    Ok(())
}

/// Test rejected input never reaches the tools
#[test]
fn test_clip_withInvalidTime_shouldFailBeforeFetching() -> Result<()> {
    let tools = FakeTools::happy();
    let controller = Controller::with_toolbox(Config::default(), tools.toolbox()).without_progress();

    let result = tokio_test::block_on(async {
        controller
            .clip(ClipOptions {
                locator: "https://example.com/v".to_string(),
                start: "1:2".to_string(),
                end: "10".to_string(),
                fps: 30,
                ..ClipOptions::default()
            })
            .await
    });

    let failure = result.unwrap_err();
    assert_eq!(failure.reason, FailureReason::InvalidTimeSpec);
    assert!(tools.fetcher.fetched_ranges.lock().unwrap().is_empty());
    assert!(tools.renderer.last_call().is_none());
    Ok(())
}

/// Test a local source file is clipped through the local fetcher
#[test]
fn test_clip_withLocalSource_shouldKeepSourceFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let source = common::create_test_file(temp_dir.path(), "lecture.mp4", "full lecture")?;
    let output = temp_dir.path().join("excerpt.mp4");
    let tools = FakeTools::happy();
    let mut config = Config::default();
    config.subtitles.default_language = None;
    let controller = Controller::with_toolbox(config, tools.toolbox()).without_progress();

    let outcome = tokio_test::block_on(async {
        controller
            .clip(ClipOptions {
                locator: source.to_string_lossy().to_string(),
                start: "10".to_string(),
                end: "20".to_string(),
                fps: 24,
                output: Some(output.clone()),
                ..ClipOptions::default()
            })
            .await
    })
    .map_err(anyhow::Error::from)?;

    assert_eq!(outcome.subtitles, SubtitleOutcome::None);
    assert_eq!(fs::read_to_string(&source)?, "full lecture");
    assert_eq!(
        common::dir_entries(temp_dir.path()),
        vec!["excerpt.mp4".to_string(), "lecture.mp4".to_string()]
    );
    Ok(())
}

/// Test the burn command end to end
#[test]
fn test_burn_withLatin1Subtitles_shouldRenderBesideVideo() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_file(temp_dir.path(), "talk.mp4", "video")?;
    let subs = temp_dir.path().join("talk.srt");
    fs::write(&subs, b"1\n00:00:01,000 --> 00:00:02,000\nCaf\xE9\n")?;
    let tools = FakeTools::happy();
    let controller = Controller::with_toolbox(Config::default(), tools.toolbox()).without_progress();

    let outcome = tokio_test::block_on(async {
        controller
            .burn(BurnOptions {
                video: video.clone(),
                subtitles: subs.clone(),
                encoding: Some(SubtitleEncoding::Latin1),
                ..BurnOptions::default()
            })
            .await
    })
    .map_err(anyhow::Error::from)?;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.subtitles, SubtitleOutcome::Unaligned);
    assert_eq!(outcome.output, temp_dir.path().join("talk_subtitled.mp4"));
    assert_eq!(*tools.aligner.calls.lock().unwrap(), 0);

    let overlay = tools.renderer.last_call().unwrap().subtitles.unwrap();
    assert!(overlay.contains("Café"));
    assert!(video.exists());
    assert!(subs.exists());
    Ok(())
}
