//! Registration integration tests
//!
//! Drives registration, re-registration and deregistration through the NGAP
//! task with a fake radio node in front of the AMF.

use std::time::Duration;

use integration_tests::{
    init_test_logging, wait_for_condition, FakeUe, TestAmf, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT, TEST_IMSI,
    TEST_IMSI_2, UNKNOWN_IMSI,
};
use nextgamf_amf::context::ReleaseCause;
use nextgamf_amf::persistence::ue_key;
use nextgamf_amf::{CmState, MmState, RanDownlink, RanUplink, UeContext};
use nextgamf_nas::ies::{MmCause, RegistrationType};
use nextgamf_nas::messages::{MmMessage, RegistrationComplete};

/// Test basic registration by SUCI
#[tokio::test]
async fn test_initial_registration() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = FakeUe::new(TEST_IMSI, 1);

    let accept = ue.register(&mut amf.radio).await.expect("Registration failed");
    assert!(ue.guti.is_some());
    assert!(ue.is_secured());
    assert!(accept.tai_list.is_some());

    let context = amf
        .wait_for_context(&ue.supi, |ue| ue.mm_state == MmState::Registered)
        .await
        .expect("UE never registered");
    assert_eq!(context.guti, ue.guti);
    assert_eq!(context.cm_state, CmState::Connected);
    assert_eq!(context.pei.as_deref(), Some(integration_tests::test_fixtures::TEST_IMEISV));

    let calls = amf.mocks.auth_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].serving_network_name, "5G:mnc001.mcc001.3gppnetwork.org");
    assert!(calls[0].resync.is_none());

    // The registered context was snapshotted
    amf.app.flush().await;
    let record = amf.state.get(&ue_key(&ue.supi)).await.expect("No snapshot written");
    let stored: UeContext = serde_json::from_slice(&record).expect("Unreadable snapshot");
    assert_eq!(stored.mm_state, MmState::Registered);
    assert_eq!(stored.guti, ue.guti);

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test two subscribers registering side by side
#[tokio::test]
async fn test_two_ues_register() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut first = FakeUe::new(TEST_IMSI, 1);
    let mut second = FakeUe::new(TEST_IMSI_2, 2);

    first.register(&mut amf.radio).await.expect("First registration failed");
    second.register(&mut amf.radio).await.expect("Second registration failed");

    assert_ne!(first.guti, second.guti);
    assert_ne!(first.amf_ue_ngap_id, second.amf_ue_ngap_id);
    amf.wait_for_context(&second.supi, |ue| ue.is_registered())
        .await
        .expect("Second UE never registered");
    assert_eq!(amf.app.contexts().await.len(), 2);

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that a subscriber unknown to the subscriber database is turned away
#[tokio::test]
async fn test_unknown_subscriber_rejected() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = FakeUe::new(UNKNOWN_IMSI, 1);
    let request = ue.registration_request();
    ue.initial(&amf.radio, request, None).await.expect("Failed to send request");

    let (_, message) = ue.recv_mm(&mut amf.radio).await.expect("No answer to registration");
    let MmMessage::RegistrationReject(reject) = message else {
        panic!("expected registration reject, got {}", message.name());
    };
    assert_eq!(reject.cause, MmCause::FiveGsServicesNotAllowed);

    let release = ue.recv(&mut amf.radio).await.expect("No release command");
    assert!(matches!(
        release,
        RanDownlink::UeContextReleaseCommand {
            cause: ReleaseCause::RegistrationFailure,
            ..
        }
    ));
    assert!(amf.app.contexts().await.is_empty());

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that a busy subscriber database is retried transparently
#[tokio::test]
async fn test_busy_vector_service_retried() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    amf.mocks.set_busy(2).await;
    let mut ue = FakeUe::new(TEST_IMSI, 1);

    ue.register(&mut amf.radio).await.expect("Registration failed");
    assert_eq!(amf.mocks.auth_calls().await.len(), 3);

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that a subscriber database busy past the retry limit means congestion
#[tokio::test]
async fn test_busy_vector_service_exhausted() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    amf.mocks.set_busy(10).await;
    let max_busy_retries = amf.app.task_base().config.services.max_busy_retries;
    let mut ue = FakeUe::new(TEST_IMSI, 1);
    let request = ue.registration_request();
    ue.initial(&amf.radio, request, None).await.expect("Failed to send request");

    let (_, message) = ue.recv_mm(&mut amf.radio).await.expect("No answer to registration");
    assert!(matches!(
        message,
        MmMessage::RegistrationReject(ref reject) if reject.cause == MmCause::Congestion
    ));
    assert_eq!(amf.mocks.auth_calls().await.len(), max_busy_retries as usize + 1);

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test a periodic update from an idle UE that still holds its key set
#[tokio::test]
async fn test_periodic_update_skips_authentication() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = FakeUe::new(TEST_IMSI, 1);
    ue.register(&mut amf.radio).await.expect("Registration failed");
    amf.wait_for_context(&ue.supi, |ue| ue.is_registered())
        .await
        .expect("UE never registered");
    ue.go_idle(&mut amf.radio).await.expect("Release failed");
    amf.wait_for_context(&ue.supi, |ue| ue.cm_state == CmState::Idle)
        .await
        .expect("UE never went idle");

    let old_guti = ue.guti;
    ue.reconnect(2);
    let request = ue
        .guti_registration(RegistrationType::PeriodicRegistrationUpdating)
        .expect("No GUTI");
    ue.initial(&amf.radio, request, None).await.expect("Failed to send request");

    let (_, message) = ue.recv_mm(&mut amf.radio).await.expect("No answer to update");
    let MmMessage::RegistrationAccept(accept) = message else {
        panic!("expected registration accept, got {}", message.name());
    };
    ue.accept_registration(&accept);
    assert_ne!(ue.guti, old_guti);
    ue.uplink(&amf.radio, RegistrationComplete)
        .await
        .expect("Failed to send complete");

    let guti = ue.guti;
    let context = amf
        .wait_for_context(&ue.supi, |ue| ue.guti == guti && ue.cm_state == CmState::Connected)
        .await
        .expect("Update never took effect");
    assert_eq!(context.ran_ue_ngap_id, Some(2));
    assert_eq!(amf.mocks.auth_calls().await.len(), 1);
    assert_eq!(amf.app.contexts().await.len(), 1);

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that an unanswered challenge is retransmitted, then the UE released
#[tokio::test]
async fn test_authentication_request_retransmitted() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let retransmissions = amf.app.task_base().config.timers.max_retransmissions;
    let mut ue = FakeUe::new(TEST_IMSI, 1);
    let request = ue.registration_request();
    ue.initial(&amf.radio, request, None).await.expect("Failed to send request");

    let (_, first) = ue.recv_mm(&mut amf.radio).await.expect("No challenge");
    assert!(matches!(first, MmMessage::AuthenticationRequest(_)));
    for _ in 0..retransmissions {
        let (_, again) = ue.recv_mm(&mut amf.radio).await.expect("No retransmission");
        assert_eq!(again, first);
    }

    let release = ue.recv(&mut amf.radio).await.expect("No release command");
    assert!(matches!(release, RanDownlink::UeContextReleaseCommand { .. }));
    wait_for_condition(
        || async { amf.app.contexts().await.is_empty() },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("Context outlived the abandoned challenge");

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test UE-originated deregistration
#[tokio::test]
async fn test_deregistration() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = FakeUe::new(TEST_IMSI, 1);
    ue.register(&mut amf.radio).await.expect("Registration failed");
    amf.wait_for_context(&ue.supi, |ue| ue.is_registered())
        .await
        .expect("UE never registered");

    let request = ue.deregistration_request(false).expect("No GUTI");
    ue.uplink(&amf.radio, request).await.expect("Failed to send request");
    let (_, message) = ue.recv_mm(&mut amf.radio).await.expect("No deregistration accept");
    assert!(matches!(message, MmMessage::DeregistrationAcceptUeOriginating(_)));

    let release = ue.recv(&mut amf.radio).await.expect("No release command");
    let RanDownlink::UeContextReleaseCommand { ids, cause } = release else {
        panic!("expected release command, got {}", release.name());
    };
    assert_eq!(cause, ReleaseCause::Deregistration);
    amf.radio
        .send(RanUplink::UeContextReleaseComplete { ids })
        .await
        .expect("Failed to send release complete");

    let supi = ue.supi.clone();
    wait_for_condition(
        || async { amf.context(&supi).await.is_none() },
        DEFAULT_TEST_TIMEOUT,
        DEFAULT_POLL_INTERVAL,
    )
    .await
    .expect("Context outlived deregistration");

    amf.app.flush().await;
    assert!(amf.state.get(&ue_key(&supi)).await.is_err());
    assert!(amf.radio.is_quiet(Duration::from_millis(200)).await);

    amf.shutdown().await.expect("Failed to stop AMF");
}
