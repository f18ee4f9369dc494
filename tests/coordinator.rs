//! Playback coordinator integration tests

use std::sync::Arc;

use recital::voice::UtteranceEvent;
use recital::{Document, Error, PlaybackState, SectionStatus, SynthesisError, ToggleAction};
use tokio::sync::Notify;

mod common;

use common::{
    Behavior, MockSink, MockSpeaker, ScriptedSynthesizer, SinkMode, TEST_TIMEOUT, coordinator,
};

const DEBATE: &str = "Opening remarks from the chair.\n\n\
    ## Affirmative Constructive\n\
    We support the resolution.\n\n\
    ## Negative Constructive\n\
    We oppose the resolution.\n\n\
    ## Rebuttals\n\
    Both sides summarize.";

#[tokio::test]
async fn test_load_segments_document() {
    let coord = coordinator(
        ScriptedSynthesizer::new(Behavior::Succeed),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    );

    assert_eq!(coord.load(&Document::new("Round 1", DEBATE)), 4);

    let headers: Vec<String> = coord.sections().into_iter().map(|s| s.header).collect();
    assert_eq!(
        headers,
        [
            "Introduction",
            "Affirmative Constructive",
            "Negative Constructive",
            "Rebuttals"
        ]
    );
}

#[tokio::test]
async fn test_play_by_header_toggles_matching_section() {
    let sink = MockSink::new(SinkMode::Manual);
    let coord = coordinator(
        ScriptedSynthesizer::new(Behavior::Succeed),
        MockSpeaker::working(),
        Arc::clone(&sink),
    );
    coord.load(&Document::new("Round 1", DEBATE));
    let section = coord.section_by_header("negative").unwrap();

    assert_eq!(coord.play_by_header("NEGATIVE").unwrap(), ToggleAction::Started);
    let clip = sink.next_clip().await;
    assert!(
        tokio::time::timeout(TEST_TIMEOUT, async {
            while coord.status(section.id) != (SectionStatus { is_playing: true, ..SectionStatus::default() }) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .is_ok()
    );

    assert_eq!(coord.play_by_header("Negative Constructive").unwrap(), ToggleAction::Paused);
    assert!(coord.status(section.id).is_paused);
    assert_eq!(coord.play_by_header("negative constructive speech").unwrap(), ToggleAction::Resumed);
    assert!(coord.status(section.id).is_playing);

    clip.driver.emit(UtteranceEvent::Ended);
    let status = tokio::time::timeout(TEST_TIMEOUT, coord.wait_until_idle(section.id))
        .await
        .unwrap();
    assert_eq!(status.state, PlaybackState::Idle);
    assert_eq!(coord.live_handles(), 0);
}

#[tokio::test]
async fn test_unknown_header_is_not_found() {
    let coord = coordinator(
        ScriptedSynthesizer::new(Behavior::Succeed),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    );
    coord.load(&Document::new("Round 1", DEBATE));

    assert!(matches!(coord.play_by_header("cross-examination"), Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_ambiguous_header_picks_first_in_document_order() {
    let coord = coordinator(
        ScriptedSynthesizer::new(Behavior::Succeed),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    );
    coord.load(&Document::new("Round 1", DEBATE));

    let section = coord.section_by_header("constructive").unwrap();
    assert_eq!(section.header, "Affirmative Constructive");
}

#[tokio::test]
async fn test_unplayed_section_reports_idle() {
    let coord = coordinator(
        ScriptedSynthesizer::new(Behavior::Succeed),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    );
    coord.load(&Document::new("Round 1", DEBATE));
    let id = coord.sections()[1].id;

    assert_eq!(coord.status(id), SectionStatus::default());
    assert!(coord.player_status(id).is_none());
    assert!(!coord.pause(id));
    assert!(!coord.resume(id));
    assert!(!coord.stop(id));
}

#[tokio::test]
async fn test_stop_all_stops_every_active_player() {
    let gate = Arc::new(Notify::new());
    let synth = ScriptedSynthesizer::new(Behavior::Block(Arc::clone(&gate)));
    let coord = coordinator(
        Arc::clone(&synth),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    );
    coord.load(&Document::new("Round 1", DEBATE));
    let sections = coord.sections();

    assert!(coord.play(sections[1].id).unwrap());
    assert!(coord.play(sections[2].id).unwrap());
    synth.wait_for_calls(2).await;
    assert!(coord.status(sections[1].id).is_loading);
    assert!(coord.status(sections[2].id).is_loading);

    assert_eq!(coord.stop_all(), 2);
    assert_eq!(coord.status(sections[1].id), SectionStatus::default());
    assert_eq!(coord.status(sections[2].id), SectionStatus::default());
    assert_eq!(coord.live_handles(), 0);

    // Nothing left to stop
    assert_eq!(coord.stop_all(), 0);
    gate.notify_waiters();
}

#[tokio::test]
async fn test_load_replaces_document_and_stops_playback() {
    let gate = Arc::new(Notify::new());
    let synth = ScriptedSynthesizer::new(Behavior::Block(gate));
    let coord = coordinator(
        Arc::clone(&synth),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    );
    coord.load(&Document::new("Round 1", DEBATE));
    let old = coord.sections()[1].id;
    coord.play(old).unwrap();
    synth.wait_for_calls(1).await;

    assert_eq!(coord.load(&Document::new("Notes", "## Only\nOne section.")), 1);

    assert_eq!(coord.status(old), SectionStatus::default());
    assert!(matches!(coord.play(old), Err(Error::NotFound(_))));
    assert_eq!(coord.sections()[0].header, "Only");
}

#[tokio::test]
async fn test_play_all_in_order_reads_sections_sequentially() {
    let synth = ScriptedSynthesizer::new(Behavior::Succeed);
    let coord = coordinator(
        Arc::clone(&synth),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    );
    coord.load(&Document::new("Round 1", DEBATE));

    let failures = tokio::time::timeout(TEST_TIMEOUT, coord.play_all_in_order())
        .await
        .unwrap();
    assert!(failures.is_empty());

    let calls = synth.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[0].starts_with("Opening remarks"));
    assert!(calls[1].starts_with("Affirmative Constructive"));
    assert!(calls[2].starts_with("Negative Constructive"));
    assert!(calls[3].starts_with("Rebuttals"));
}

#[tokio::test]
async fn test_failed_section_does_not_affect_others() {
    let synth = ScriptedSynthesizer::failing_on("oppose");
    let coord = coordinator(
        Arc::clone(&synth),
        MockSpeaker::missing(),
        MockSink::new(SinkMode::Auto),
    );
    coord.load(&Document::new("Round 1", DEBATE));

    let failures = tokio::time::timeout(TEST_TIMEOUT, coord.play_all_in_order())
        .await
        .unwrap();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.header, "Negative Constructive");
    assert!(matches!(failures[0].1, SynthesisError::FallbackUnavailable(_)));
    assert_eq!(synth.calls().len(), 4);
    assert_eq!(coord.live_handles(), 0);
}

#[tokio::test]
async fn test_stop_all_interrupts_sequential_reading() {
    let gate = Arc::new(Notify::new());
    let synth = ScriptedSynthesizer::new(Behavior::Block(gate));
    let coord = Arc::new(coordinator(
        Arc::clone(&synth),
        MockSpeaker::working(),
        MockSink::new(SinkMode::Auto),
    ));
    coord.load(&Document::new("Round 1", DEBATE));

    let reader = {
        let coord = Arc::clone(&coord);
        tokio::spawn(async move { coord.play_all_in_order().await })
    };
    synth.wait_for_calls(1).await;

    coord.stop_all();
    let failures = tokio::time::timeout(TEST_TIMEOUT, reader)
        .await
        .unwrap()
        .unwrap();

    assert!(failures.is_empty());
    assert_eq!(synth.calls().len(), 1);
}
