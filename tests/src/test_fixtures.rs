//! Test fixtures and configuration helpers
//!
//! Provides the AMF configuration and the subscriber data shared by the
//! scenarios.

use nextgamf_amf::services::AuthVector;
use nextgamf_common::{AmfConfig, Guami, Plmn, SnapshotTrigger, Supi, Tai};

/// Subscribers known to the mock subscriber database
pub const TEST_IMSI: &str = "001010000000001";
pub const TEST_IMSI_2: &str = "001010000000002";
/// Not provisioned anywhere
pub const UNKNOWN_IMSI: &str = "001010000009999";

/// IMEISV every fake UE reports
pub const TEST_IMEISV: &str = "3534900698733190";

pub fn test_plmn() -> Plmn {
    Plmn::new(1, 1, false)
}

pub fn test_supi(imsi: &str) -> Supi {
    Supi::from_imsi(imsi).expect("valid test IMSI")
}

/// Configuration for an AMF serving PLMN 001-01, TAC 1.
///
/// Timers are short so retransmission scenarios finish quickly.
pub fn test_amf_config() -> AmfConfig {
    let mut config = AmfConfig::new(Guami::new(test_plmn(), 1, 1, 0));
    config.tai_list = vec![Tai::new(test_plmn(), 1)];
    config.dnns = vec!["internet".to_string(), "ims".to_string()];
    config.timers.t3550_secs = 1;
    config.timers.t3560_secs = 1;
    config.timers.t3570_secs = 1;
    config.timers.t3591_secs = 1;
    config.timers.t3592_secs = 1;
    config.timers.t3513_secs = 1;
    config.timers.max_retransmissions = 2;
    config.timers.max_paging_retries = 2;
    config.services.busy_backoff_ms = 10;
    config.persistence.trigger = SnapshotTrigger::OnRegistered;
    config
}

/// Vector number `seed` of the mock subscriber database.
///
/// The fake UE derives its RES* from the RAND with [`expected_res_star`].
pub fn test_vector(seed: u8) -> AuthVector {
    AuthVector {
        rand: [seed; 16],
        autn: [seed ^ 0xA5; 16],
        xres_star: expected_res_star(&[seed; 16]),
        kseaf: [seed; 32],
    }
}

pub fn expected_res_star(rand: &[u8; 16]) -> Vec<u8> {
    rand.iter().map(|b| b ^ 0x5A).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        let config = test_amf_config();
        assert!(config.validate().is_ok());
        assert!(config.is_dnn_known("ims"));
    }

    #[test]
    fn test_vector_matches_ue_response() {
        let vector = test_vector(3);
        assert_eq!(vector.xres_star, expected_res_star(&vector.rand));
    }
}
