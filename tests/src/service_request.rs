//! Service request and paging integration tests
//!
//! Tests idle mode: UE-triggered reconnection, network-triggered paging and
//! the paging retry limit.

use std::time::Duration;

use integration_tests::fake_radio::gnb_tunnel;
use integration_tests::{init_test_logging, mm_message, FakeUe, TestAmf, TEST_IMSI};
use nextgamf_amf::amf::NetworkEvent;
use nextgamf_amf::ngap::SessionSetupItem;
use nextgamf_amf::{AmfMessage, CmState, RanDownlink, RanUplink, SessionState};
use nextgamf_common::Guti;
use nextgamf_nas::ies::{IePduSessionStatus, MmCause, ServiceType};
use nextgamf_nas::messages::MmMessage;

/// Registered UE with session 1 confirmed, released to CM-IDLE.
async fn idle_ue_with_session(amf: &mut TestAmf) -> FakeUe {
    let mut ue = FakeUe::new(TEST_IMSI, 1);
    ue.register(&mut amf.radio).await.expect("Registration failed");
    amf.wait_for_context(&ue.supi, |ue| ue.is_registered())
        .await
        .expect("UE never registered");
    ue.establish_session(&mut amf.radio, 1, Some("internet"))
        .await
        .expect("Establishment failed");
    amf.wait_for_context(&ue.supi, |ue| {
        ue.sessions.get(&1).is_some_and(|session| session.state == SessionState::Confirmed)
    })
    .await
    .expect("Session never confirmed");
    ue.go_idle(&mut amf.radio).await.expect("Release failed");
    amf.wait_for_context(&ue.supi, |ue| ue.cm_state == CmState::Idle)
        .await
        .expect("UE never went idle");
    ue
}

async fn downlink_data(amf: &TestAmf, ue: &FakeUe, pdu_session_id: u8) {
    amf.app
        .task_base()
        .amf_tx
        .send(AmfMessage::Network(NetworkEvent::DownlinkDataNotification {
            supi: ue.supi.clone(),
            pdu_session_id,
        }))
        .await
        .expect("AMF task is gone");
}

/// Confirms every session the context setup request carries.
async fn confirm_context_setup(amf: &TestAmf, downlink: &RanDownlink) {
    let RanDownlink::InitialContextSetupRequest { ids, pdu_sessions, .. } = downlink else {
        panic!("expected initial context setup, got {}", downlink.name());
    };
    amf.radio
        .send(RanUplink::InitialContextSetupResponse {
            ids: *ids,
            pdu_sessions: pdu_sessions
                .iter()
                .map(|session| SessionSetupItem {
                    pdu_session_id: session.pdu_session_id,
                    gnb_tunnel: gnb_tunnel(session.pdu_session_id),
                })
                .collect(),
        })
        .await
        .expect("Failed to send context setup response");
}

/// Test an idle UE reconnecting with uplink data pending
#[tokio::test]
async fn test_idle_ue_service_request() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = idle_ue_with_session(&mut amf).await;

    ue.reconnect(5);
    let request = ue.service_request(ServiceType::Data, &[1]).expect("No GUTI");
    let s_tmsi = ue.s_tmsi();
    ue.initial(&amf.radio, request, s_tmsi).await.expect("Failed to send request");

    let (downlink, message) = ue.recv_mm(&mut amf.radio).await.expect("No answer to service request");
    let MmMessage::ServiceAccept(accept) = message else {
        panic!("expected service accept, got {}", message.name());
    };
    assert_eq!(accept.pdu_session_status, Some(IePduSessionStatus::from_ids([1])));
    let RanDownlink::InitialContextSetupRequest { pdu_sessions, .. } = &downlink else {
        panic!("expected initial context setup, got {}", downlink.name());
    };
    assert_eq!(pdu_sessions.len(), 1);
    confirm_context_setup(&amf, &downlink).await;

    let context = amf
        .wait_for_context(&ue.supi, |ue| {
            ue.cm_state == CmState::Connected && ue.sessions[&1].gnb_tunnel.is_some()
        })
        .await
        .expect("User plane never resumed");
    assert_eq!(context.ran_ue_ngap_id, Some(5));
    assert!(context.is_registered());

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test paging for downlink data and the UE answering it
#[tokio::test]
async fn test_paging_answered_by_service_request() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = idle_ue_with_session(&mut amf).await;

    downlink_data(&amf, &ue, 1).await;
    let paging = amf
        .radio
        .recv_until(|message| matches!(message, RanDownlink::Paging { .. }))
        .await
        .expect("UE never paged");
    let RanDownlink::Paging { s_tmsi, tai_list } = paging else {
        unreachable!();
    };
    assert_eq!(Some(s_tmsi), ue.s_tmsi());
    assert_eq!(tai_list, vec![amf.radio.tai()]);

    ue.reconnect(6);
    let request = ue
        .service_request(ServiceType::MobileTerminatedServices, &[])
        .expect("No GUTI");
    ue.initial(&amf.radio, request, Some(s_tmsi))
        .await
        .expect("Failed to send request");
    let (downlink, message) = ue.recv_mm(&mut amf.radio).await.expect("No answer to service request");
    assert!(matches!(message, MmMessage::ServiceAccept(_)));
    // The session with waiting downlink data comes back without being asked for
    let RanDownlink::InitialContextSetupRequest { pdu_sessions, .. } = &downlink else {
        panic!("expected initial context setup, got {}", downlink.name());
    };
    assert_eq!(pdu_sessions.len(), 1);
    assert_eq!(pdu_sessions[0].pdu_session_id, 1);
    confirm_context_setup(&amf, &downlink).await;

    amf.wait_for_context(&ue.supi, |ue| !ue.sessions[&1].pending_downlink_data)
        .await
        .expect("Downlink data flag never cleared");
    let window = Duration::from_secs(amf.app.task_base().config.timers.t3513_secs + 1);
    assert!(amf.radio.is_quiet(window).await, "paging continued after the answer");

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that paging stops after the retry limit
#[tokio::test]
async fn test_paging_gives_up() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let ue = idle_ue_with_session(&mut amf).await;
    let retries = amf.app.task_base().config.timers.max_paging_retries;

    downlink_data(&amf, &ue, 1).await;
    for _ in 0..=retries {
        let paging = amf.radio.recv().await.expect("Missing paging attempt");
        assert!(matches!(paging, RanDownlink::Paging { .. }));
    }
    amf.wait_for_context(&ue.supi, |ue| !ue.sessions[&1].pending_downlink_data)
        .await
        .expect("Downlink data flag never cleared");
    assert!(amf.radio.is_quiet(Duration::from_millis(1500)).await);

    let context = amf.context(&ue.supi).await.expect("Context missing");
    assert_eq!(context.cm_state, CmState::Idle);
    assert!(context.is_registered());

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that a service request with a 5G-S-TMSI nobody holds is rejected
#[tokio::test]
async fn test_unknown_s_tmsi_rejected() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let guami = amf.app.task_base().config.guami;
    let mut ue = FakeUe::new(TEST_IMSI, 3);
    ue.guti = Some(Guti::new(guami, 0xDEAD));

    let request = ue.service_request(ServiceType::Signalling, &[]).expect("No GUTI");
    let s_tmsi = ue.s_tmsi();
    ue.initial(&amf.radio, request, s_tmsi).await.expect("Failed to send request");

    let reject = ue.recv(&mut amf.radio).await.expect("No answer to service request");
    assert!(matches!(
        mm_message(&reject),
        Some(MmMessage::ServiceReject(ref reject)) if reject.cause == MmCause::UeIdentityCannotBeDerived
    ));
    let release = ue.recv(&mut amf.radio).await.expect("No release command");
    assert!(matches!(release, RanDownlink::UeContextReleaseCommand { .. }));
    assert!(amf.app.contexts().await.is_empty());

    amf.shutdown().await.expect("Failed to stop AMF");
}
