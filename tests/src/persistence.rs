//! Persistence integration tests
//!
//! Restarts the AMF on the same state store and checks that registered
//! subscribers carry on where they left off.

use std::sync::Arc;

use integration_tests::{
    init_test_logging, mm_message, test_amf_config, FakeUe, MockServices, TestAmf, TEST_IMSI, TEST_IMSI_2,
};
use nextgamf_amf::persistence::ue_key;
use nextgamf_amf::{CmState, FileStore, MmState, RanDownlink, RanUplink, SessionState, StartOptions, StateStore};
use nextgamf_common::PersistenceBackend;
use nextgamf_nas::ies::{MmCause, ServiceType};
use nextgamf_nas::messages::MmMessage;

async fn register_and_idle(amf: &mut TestAmf, imsi: &str, ran_ue_ngap_id: u32) -> FakeUe {
    let mut ue = FakeUe::new(imsi, ran_ue_ngap_id);
    ue.register(&mut amf.radio).await.expect("Registration failed");
    amf.wait_for_context(&ue.supi, |ue| ue.is_registered())
        .await
        .expect("UE never registered");
    ue.go_idle(&mut amf.radio).await.expect("Release failed");
    amf.wait_for_context(&ue.supi, |ue| ue.cm_state == CmState::Idle)
        .await
        .expect("UE never went idle");
    ue
}

/// Test that a restarted AMF serves a subscriber registered before the restart
#[tokio::test]
async fn test_restart_restores_registered_ue() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
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
    let before = amf.context(&ue.supi).await.expect("Context missing");

    let mut amf = amf.restart(StartOptions::default()).await.expect("Restart failed");
    assert_eq!(amf.app.restored(), 1);
    let restored = amf.context(&ue.supi).await.expect("Context not restored");
    assert_eq!(restored.mm_state, MmState::Registered);
    assert_eq!(restored.cm_state, CmState::Idle);
    assert_eq!(restored.guti, before.guti);
    assert_eq!(restored.security.ng_ksi, before.security.ng_ksi);
    assert!(restored.sessions.contains_key(&1));

    // The UE neither re-registers nor re-authenticates
    ue.reconnect(10);
    let request = ue.service_request(ServiceType::Data, &[1]).expect("No GUTI");
    let s_tmsi = ue.s_tmsi();
    ue.initial(&amf.radio, request, s_tmsi).await.expect("Failed to send request");
    let (downlink, message) = ue.recv_mm(&mut amf.radio).await.expect("No answer to service request");
    assert!(matches!(message, MmMessage::ServiceAccept(_)));
    let RanDownlink::InitialContextSetupRequest { pdu_sessions, .. } = &downlink else {
        panic!("expected initial context setup, got {}", downlink.name());
    };
    assert_eq!(pdu_sessions.len(), 1);
    assert_eq!(amf.mocks.auth_calls().await.len(), 1);

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that identities handed out after a restart never collide with restored ones
#[tokio::test]
async fn test_restart_keeps_identifier_generators() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let first = register_and_idle(&mut amf, TEST_IMSI, 1).await;
    let first_context = amf.context(&first.supi).await.expect("Context missing");

    let mut amf = amf.restart(StartOptions::default()).await.expect("Restart failed");
    let mut second = FakeUe::new(TEST_IMSI_2, 2);
    second.register(&mut amf.radio).await.expect("Registration failed");

    let first_guti = first.guti.expect("First UE has no GUTI");
    let second_guti = second.guti.expect("Second UE has no GUTI");
    assert_ne!(first_guti.tmsi, second_guti.tmsi);
    assert!(second.amf_ue_ngap_id.expect("No AMF UE NGAP id") > first_context.amf_ue_ngap_id);

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that starting without restore forgets every subscriber
#[tokio::test]
async fn test_restart_without_restore() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = register_and_idle(&mut amf, TEST_IMSI, 1).await;

    let mut amf = amf
        .restart(StartOptions { restore: false })
        .await
        .expect("Restart failed");
    assert_eq!(amf.app.restored(), 0);
    assert!(amf.app.contexts().await.is_empty());

    ue.reconnect(4);
    let request = ue.service_request(ServiceType::Signalling, &[]).expect("No GUTI");
    let s_tmsi = ue.s_tmsi();
    ue.initial(&amf.radio, request, s_tmsi).await.expect("Failed to send request");
    let reject = ue.recv(&mut amf.radio).await.expect("No answer to service request");
    assert!(matches!(
        mm_message(&reject),
        Some(MmMessage::ServiceReject(ref reject)) if reject.cause == MmCause::UeIdentityCannotBeDerived
    ));

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test that a deregistered subscriber does not come back after a restart
#[tokio::test]
async fn test_deregistration_removes_snapshot() {
    init_test_logging();

    let mut amf = TestAmf::start().await.expect("Failed to start AMF");
    let mut ue = FakeUe::new(TEST_IMSI, 1);
    ue.register(&mut amf.radio).await.expect("Registration failed");
    amf.wait_for_context(&ue.supi, |ue| ue.is_registered())
        .await
        .expect("UE never registered");
    amf.app.flush().await;
    assert!(amf.state.get(&ue_key(&ue.supi)).await.is_ok());

    let request = ue.deregistration_request(true).expect("No GUTI");
    ue.uplink(&amf.radio, request).await.expect("Failed to send request");
    let release = ue.recv(&mut amf.radio).await.expect("No release command");
    let RanDownlink::UeContextReleaseCommand { ids, .. } = release else {
        panic!("switch-off expected only a release command, got {}", release.name());
    };
    amf.radio
        .send(RanUplink::UeContextReleaseComplete { ids })
        .await
        .expect("Failed to send release complete");

    let amf = amf.restart(StartOptions::default()).await.expect("Restart failed");
    assert_eq!(amf.app.restored(), 0);
    assert!(amf.state.get(&ue_key(&ue.supi)).await.is_err());

    amf.shutdown().await.expect("Failed to stop AMF");
}

/// Test the file backend across two AMF instances
#[tokio::test]
async fn test_file_store_survives_restart() {
    init_test_logging();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = test_amf_config();
    config.persistence.backend = PersistenceBackend::File;
    config.persistence.directory = dir.path().to_path_buf();
    let mocks = MockServices::new();

    let state: Arc<dyn StateStore> = Arc::new(FileStore::open(dir.path()).expect("Failed to open store"));
    let mut amf = TestAmf::start_with(config.clone(), mocks.clone(), state, StartOptions::default())
        .await
        .expect("Failed to start AMF");
    let ue = register_and_idle(&mut amf, TEST_IMSI, 1).await;
    amf.app.flush().await;
    amf.shutdown().await.expect("Failed to stop AMF");

    // A fresh store handle on the same directory
    let state: Arc<dyn StateStore> = Arc::new(FileStore::open(dir.path()).expect("Failed to reopen store"));
    let amf = TestAmf::start_with(config, mocks, state, StartOptions::default())
        .await
        .expect("Failed to start AMF");
    assert_eq!(amf.app.restored(), 1);
    let restored = amf.context(&ue.supi).await.expect("Context not restored");
    assert_eq!(restored.guti, ue.guti);
    assert_eq!(restored.mm_state, MmState::Registered);

    amf.shutdown().await.expect("Failed to stop AMF");
}
