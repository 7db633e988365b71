/*!
 * Tests for the SRT cue codec
 */

use subai::errors::SubtitleError;
use subai::subtitle_processor::{Cue, parse, serialize};

use crate::common;

#[test]
fn test_parse_withGeneratedTrack_shouldKeepEveryCue() {
    let cues = parse(&common::sample_track(45)).unwrap();
    assert_eq!(cues.len(), 45);
    assert_eq!(cues[0].text, "Line 1");
    assert_eq!(cues[44].text, "Line 45");
    assert_eq!(cues[44].start_ms, 90_000);
    assert_eq!(cues[44].end_ms, 91_500);
}

#[test]
fn test_parse_withoutAnyCue_shouldFailAsMalformed() {
    for raw in ["", "   \n\n", "<html>not a track</html>", "1\nno timing here\n"] {
        assert!(
            matches!(parse(raw), Err(SubtitleError::MalformedTrack(_))),
            "expected malformed track for {:?}",
            raw
        );
    }
}

#[test]
fn test_parse_withBrokenBlock_shouldSkipItAndKeepTheRest() {
    let raw = "1\n00:00:01,000 --> 00:00:02,000\nFirst\n\n\
               2\n00:00:xx,000 --> 00:00:03,000\nBroken timing\n\n\
               3\n00:00:05,000 --> 00:00:04,000\nInverted\n\n\
               4\n00:00:06,000 --> 00:00:07,000\nLast\n";
    let cues = parse(raw).unwrap();
    let texts: Vec<&str> = cues.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["First", "Last"]);
}

#[test]
fn test_parse_withMissingSequenceNumbers_shouldStillReadCues() {
    let raw = "00:00:01,000 --> 00:00:02,000\nNo number\n\n00:00:03,000 --> 00:00:04,000\nStill none\n";
    let cues = parse(raw).unwrap();
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[1].text, "Still none");
}

#[test]
fn test_serialize_withGappedIndices_shouldRenumberFromOne() {
    let cues = vec![
        Cue::new(7, 1000, 2000, "Seven"),
        Cue::new(12, 3000, 4000, "Twelve\nsecond line"),
    ];
    let text = serialize(&cues);
    assert_eq!(
        text,
        "1\n00:00:01,000 --> 00:00:02,000\nSeven\n\n2\n00:00:03,000 --> 00:00:04,000\nTwelve\nsecond line\n"
    );
}

#[test]
fn test_parse_withEmptyCueBeforeNextBlock_shouldSkipOnlyTheEmptyCue() {
    let raw = "1\n00:00:01,000 --> 00:00:02,000\n\n\
               2\n00:00:03,000 --> 00:00:04,000\nHello\n\n\
               3\n00:00:05,000 --> 00:00:06,000\nBye\n";
    let cues = parse(raw).unwrap();
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].index, 2);
    assert_eq!(cues[0].start_ms, 3000);
    assert_eq!(cues[0].end_ms, 4000);
    assert_eq!(cues[0].text, "Hello");
    assert_eq!(cues[1].start_ms, 5000);
    assert_eq!(cues[1].text, "Bye");
}

#[test]
fn test_serialize_withEmptySlice_shouldBeEmpty() {
    assert_eq!(serialize(&[]), "");
}

#[test]
fn test_serialize_thenParse_withFormattingTags_shouldKeepTextAndTiming() {
    let original = vec![
        Cue::new(1, 0, 999, "<i>Whispering</i>"),
        Cue::new(2, 3_600_000, 3_601_250, "{\\an8}On top"),
    ];
    let parsed = parse(&serialize(&original)).unwrap();
    assert_eq!(parsed, original);
}

#[test]
fn test_format_timestamp_withHours_shouldPadEachField() {
    assert_eq!(Cue::format_timestamp(3_723_004), "01:02:03,004");
    assert_eq!(Cue::parse_timestamp("01:02:03,004").unwrap(), 3_723_004);
    assert!(Cue::parse_timestamp("00:61:00,000").is_err());
}
