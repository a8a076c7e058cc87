//! PDU Session integration tests
//!
//! Tests PDU session establishment and release between the fake UE, the AMF
//! and the mock session management.

use integration_tests::fake_radio::gnb_tunnel;
use integration_tests::mock_services::{ue_address, upf_tunnel};
use integration_tests::{
    init_test_logging, sm_message, wait_for_condition, FakeUe, TestAmf, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT,
    TEST_IMSI,
};
use nextgamf_amf::amf::NetworkEvent;
use nextgamf_amf::services::ServiceError;
use nextgamf_amf::{AmfMessage, RanDownlink, SessionState};
use nextgamf_nas::ies::SmCause;
use nextgamf_nas::messages::{PduSessionReleaseComplete, PduSessionReleaseRequest, SmMessage};

async fn registered_ue(amf: &mut TestAmf) -> FakeUe {
    let mut ue = FakeUe::new(TEST_IMSI, 1);
    ue.register(&mut amf.radio).await.expect("Registration failed");
    amf.wait_for_context(&ue.supi, |ue| ue.is_registered())
        .await
        .expect("UE never registered");
    ue
}

/// Test PDU session establishment up to the confirmed user plane
#[tokio::test]
async fn test_pdu_session_establishment() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = registered_ue(&mut amf).await;

    let answer = ue
        .establish_session(&mut amf.radio, 1, Some("internet"))
        .await
        .expect("Establishment failed");
    assert_eq!(answer.pdu_session_id, 1);
    let SmMessage::PduSessionEstablishmentAccept(accept) = answer.message else {
        panic!("expected establishment accept, got {}", answer.message.name());
    };
    assert_eq!(accept.pdu_address.and_then(|address| address.ipv4()), Some(ue_address(1)));

    let context = amf
        .wait_for_context(&ue.supi, |ue| {
            ue.sessions.get(&1).is_some_and(|session| session.state == SessionState::Confirmed)
        })
        .await
        .expect("Session never confirmed");
    let session = &context.sessions[&1];
    assert_eq!(session.dnn, "internet");
    assert_eq!(session.upf_tunnel, Some(upf_tunnel(1)));
    assert_eq!(session.gnb_tunnel, Some(gnb_tunnel(1)));

    assert_eq!(
        amf.mocks.created_sessions().await,
        vec![(ue.supi.clone(), 1, "internet".to_string())]
    );
    let mocks = amf.mocks.clone();
    wait_for_condition(
        || async { !mocks.updated_sessions().await.is_empty() },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("Session management never saw the gNB tunnel");
    assert_eq!(mocks.updated_sessions().await[0].2, gnb_tunnel(1));

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that an unknown DNN is rejected without a session being created
#[tokio::test]
async fn test_unknown_dnn_rejected() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = registered_ue(&mut amf).await;

    let answer = ue
        .establish_session(&mut amf.radio, 1, Some("nowhere"))
        .await
        .expect("No answer to establishment");
    let SmMessage::PduSessionEstablishmentReject(reject) = answer.message else {
        panic!("expected establishment reject, got {}", answer.message.name());
    };
    assert_eq!(reject.cause, SmCause::MissingOrUnknownDnn);

    let context = amf.context(&ue.supi).await.expect("Context missing");
    assert!(context.sessions.is_empty());
    assert!(amf.mocks.created_sessions().await.is_empty());

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that a failed allocation rejects the establishment and frees the address
#[tokio::test]
async fn test_session_creation_failure() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    amf.mocks
        .fail_session_creation(ServiceError::Unavailable("SMF down".into()))
        .await;
    let mut ue = registered_ue(&mut amf).await;

    let answer = ue
        .establish_session(&mut amf.radio, 2, Some("internet"))
        .await
        .expect("No answer to establishment");
    let SmMessage::PduSessionEstablishmentReject(reject) = answer.message else {
        panic!("expected establishment reject, got {}", answer.message.name());
    };
    assert_eq!(reject.cause, SmCause::NetworkFailure);
    assert_eq!(amf.mocks.released_addresses().await, vec![(ue.supi.clone(), 2)]);
    assert!(amf.context(&ue.supi).await.expect("Context missing").sessions.is_empty());

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test UE-requested release of an established session
#[tokio::test]
async fn test_ue_requested_release() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = registered_ue(&mut amf).await;
    ue.establish_session(&mut amf.radio, 1, Some("internet"))
        .await
        .expect("Establishment failed");
    amf.wait_for_context(&ue.supi, |ue| {
        ue.sessions.get(&1).is_some_and(|session| session.state == SessionState::Confirmed)
    })
    .await
    .expect("Session never confirmed");

    ue.uplink_sm(&amf.radio, 1, PduSessionReleaseRequest::default(), None)
        .await
        .expect("Failed to send release request");
    let (downlink, command) = ue.recv_sm(&mut amf.radio).await.expect("No release command");
    assert!(matches!(
        downlink,
        RanDownlink::PduSessionResourceReleaseCommand { pdu_session_id: 1, .. }
    ));
    let SmMessage::PduSessionReleaseCommand(command) = command.message else {
        panic!("expected release command, got {}", command.message.name());
    };
    assert_eq!(command.cause, SmCause::RegularDeactivation);

    ue.uplink_sm(&amf.radio, 1, PduSessionReleaseComplete::default(), None)
        .await
        .expect("Failed to send release complete");
    amf.wait_for_context(&ue.supi, |ue| ue.sessions.is_empty())
        .await
        .expect("Session outlived its release");

    let mocks = amf.mocks.clone();
    let supi = ue.supi.clone();
    wait_for_condition(
        || async { mocks.live_sessions(&supi).await.is_empty() },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("Session management still holds the session");

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test a release required by session management
#[tokio::test]
async fn test_network_requested_release() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = registered_ue(&mut amf).await;
    ue.establish_session(&mut amf.radio, 1, Some("internet"))
        .await
        .expect("Establishment failed");
    amf.wait_for_context(&ue.supi, |ue| {
        ue.sessions.get(&1).is_some_and(|session| session.state == SessionState::Confirmed)
    })
    .await
    .expect("Session never confirmed");

    amf.app
        .task_base()
        .amf_tx
        .send(AmfMessage::Network(NetworkEvent::SessionReleaseRequired {
            supi: ue.supi.clone(),
            pdu_session_id: 1,
            cause: SmCause::InsufficientResources,
        }))
        .await
        .expect("AMF task is gone");

    let downlink = ue
        .recv(&mut amf.radio)
        .await
        .expect("No release command");
    let command = sm_message(&downlink).expect("Release command without 5GSM payload");
    assert!(matches!(
        command.message,
        SmMessage::PduSessionReleaseCommand(ref command) if command.cause == SmCause::InsufficientResources
    ));

    ue.uplink_sm(&amf.radio, 1, PduSessionReleaseComplete::default(), None)
        .await
        .expect("Failed to send release complete");
    amf.wait_for_context(&ue.supi, |ue| ue.sessions.is_empty())
        .await
        .expect("Session outlived its release");

    amf.shutdown().await.expect("Failed to stop AMF");
}
