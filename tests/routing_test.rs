mod common;

use common::TestHarness;
use reelstitch::delivery::{route, Channel};
use reelstitch::error::MergeError;
use reelstitch::history::HistoryStore;
use reelstitch::ids::RequesterId;
use reelstitch::transport::ScanDirection;
use reelstitch::trigger::MergeTrigger;

const GIB: u64 = 1024 * 1024 * 1024;
const REQUESTER: RequesterId = RequesterId(7);

#[test]
fn routing_honours_both_ceilings() {
    // At or under the direct ceiling goes direct; the boundary is inclusive.
    assert_eq!(route(1, 2 * GIB, 4 * GIB).unwrap().channel, Channel::Direct);
    assert_eq!(
        route(2 * GIB, 2 * GIB, 4 * GIB).unwrap().channel,
        Channel::Direct
    );

    // Between the ceilings goes through the relay.
    assert_eq!(
        route(2 * GIB + 1, 2 * GIB, 4 * GIB).unwrap().channel,
        Channel::Relay
    );
    assert_eq!(
        route(4 * GIB, 2 * GIB, 4 * GIB).unwrap().channel,
        Channel::Relay
    );
}

#[test]
fn oversize_output_is_rejected_with_relay_ceiling() {
    let size = 4 * GIB + 512 * 1024 * 1024;
    match route(size, 2 * GIB, 4 * GIB).unwrap_err() {
        MergeError::OversizeOutput {
            size: reported,
            ceiling,
        } => {
            assert_eq!(reported, size);
            assert_eq!(ceiling, 4 * GIB);
        }
        other => panic!("expected OversizeOutput, got {other:?}"),
    }
}

#[test]
fn route_boundary_sweep_never_misroutes() {
    for size in [0, 1, GIB, 2 * GIB - 1, 2 * GIB, 2 * GIB + 1, 4 * GIB - 1, 4 * GIB] {
        let decision = route(size, 2 * GIB, 4 * GIB).unwrap();
        if size <= 2 * GIB {
            assert_eq!(decision.channel, Channel::Direct, "size {size}");
        } else {
            assert_eq!(decision.channel, Channel::Relay, "size {size}");
        }
    }
    assert!(route(4 * GIB + 1, 2 * GIB, 4 * GIB).is_err());
}

#[tokio::test]
async fn oversize_merge_fails_validation_before_upload() {
    // Tiny ceilings so the 12-byte merge overflows the validator.
    let h = TestHarness::with_config(|c| {
        c.delivery.direct_ceiling_bytes = 4;
        c.delivery.relay_ceiling_bytes = 8;
        c.delivery.max_output_bytes = None;
    });

    let a = h.transport.add_segment("big-1", 1, b"123456");
    let b = h.transport.add_segment("big-2", 2, b"789012");
    h.transport.set_scan_results(vec![a.clone(), b]);

    let trigger = MergeTrigger::new(2, "toolarge", ScanDirection::Forward).unwrap();
    let err = h
        .pipeline
        .run_scan(REQUESTER, &trigger, a)
        .await
        .unwrap_err();

    match err {
        MergeError::OversizeOutput { size, ceiling } => {
            assert_eq!(size, 12);
            assert_eq!(ceiling, 8);
        }
        other => panic!("expected OversizeOutput, got {other:?}"),
    }

    // Nothing was uploaded or recorded, and the oversize artifact did not
    // outlive cleanup.
    assert!(h.transport.uploads.lock().is_empty());
    assert!(h.history.recent(REQUESTER, 10).await.unwrap().is_empty());
    assert_eq!(h.residual_entries(), 0);
}

#[tokio::test]
async fn explicit_output_cap_overrides_relay_ceiling() {
    let h = TestHarness::with_config(|c| {
        c.delivery.direct_ceiling_bytes = 4;
        c.delivery.relay_ceiling_bytes = 64;
        c.delivery.max_output_bytes = Some(6);
    });

    let a = h.transport.add_segment("cap-1", 1, b"1234");
    let b = h.transport.add_segment("cap-2", 2, b"5678");
    h.transport.set_scan_results(vec![a.clone(), b]);

    let trigger = MergeTrigger::new(2, "capped", ScanDirection::Forward).unwrap();
    let err = h
        .pipeline
        .run_scan(REQUESTER, &trigger, a)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MergeError::OversizeOutput { size: 8, ceiling: 6 }
    ));
}

#[tokio::test]
async fn relay_channel_is_used_between_ceilings() {
    let h = TestHarness::with_config(|c| {
        c.delivery.direct_ceiling_bytes = 4;
        c.delivery.relay_ceiling_bytes = 64;
        c.delivery.max_output_bytes = None;
    });

    let a = h.transport.add_segment("r-1", 1, b"12345");
    let b = h.transport.add_segment("r-2", 2, b"67890");
    h.transport.set_scan_results(vec![a.clone(), b]);

    let trigger = MergeTrigger::new(2, "relayed", ScanDirection::Forward).unwrap();
    let receipt = h
        .pipeline
        .run_scan(REQUESTER, &trigger, a)
        .await
        .unwrap();

    assert_eq!(receipt.channel, Channel::Relay);
    assert_eq!(h.transport.uploads.lock()[0].channel, Channel::Relay);
}

#[tokio::test]
async fn caption_falls_back_to_output_name() {
    let h = TestHarness::new();

    let a = h.transport.add_segment("cap-a", 1, b"x");
    h.transport.set_scan_results(vec![a.clone()]);

    let trigger = MergeTrigger::new(1, "fallback_title", ScanDirection::Forward).unwrap();
    h.pipeline.run_scan(REQUESTER, &trigger, a).await.unwrap();

    // Default settings carry no display title and the config has no default,
    // so the caption falls through to the output name.
    assert_eq!(h.transport.uploads.lock()[0].caption, "fallback_title.mp4");
}
