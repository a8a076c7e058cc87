//! AMF NAS Timer Management
//!
//! Network-side NAS timers (3GPP TS 24.501 §10.2). Every procedure that waits
//! for the UE arms one of these; the AMF task ticks the [`TimerManager`] and
//! feeds the expiries back into the core as events.
//!
//! # Timers
//!
//! - T3513: paging
//! - T3550: Registration Accept
//! - T3560: Authentication Request / Security Mode Command
//! - T3570: Identity Request
//! - T3591: PDU Session Modification Command (per session)
//! - T3592: PDU Session Release Command (per session)
//!
//! Each arm carries a [`TimerToken`]. The procedure record keeps the token of
//! its current arm, so an expiry that races a procedure's completion is
//! recognised as stale and dropped.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::context::AmfUeNgapId;

/// Timer code for T3513 (Paging)
pub const TIMER_T3513: u16 = 3513;
/// Timer code for T3550 (Registration Accept)
pub const TIMER_T3550: u16 = 3550;
/// Timer code for T3560 (Authentication Request, Security Mode Command)
pub const TIMER_T3560: u16 = 3560;
/// Timer code for T3570 (Identity Request)
pub const TIMER_T3570: u16 = 3570;
/// Timer code for T3591 (PDU Session Modification Command)
pub const TIMER_T3591: u16 = 3591;
/// Timer code for T3592 (PDU Session Release Command)
pub const TIMER_T3592: u16 = 3592;

/// Granularity of the AMF task's timer tick.
pub const TIMER_TICK: Duration = Duration::from_millis(100);

/// Network-side NAS timer identifier.
///
/// The session management timers are keyed by PDU session id so two sessions
/// of one UE can each have a command in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    T3513,
    T3550,
    T3560,
    T3570,
    T3591(u8),
    T3592(u8),
}

impl TimerId {
    pub fn code(&self) -> u16 {
        match self {
            TimerId::T3513 => TIMER_T3513,
            TimerId::T3550 => TIMER_T3550,
            TimerId::T3560 => TIMER_T3560,
            TimerId::T3570 => TIMER_T3570,
            TimerId::T3591(_) => TIMER_T3591,
            TimerId::T3592(_) => TIMER_T3592,
        }
    }

    pub fn pdu_session_id(&self) -> Option<u8> {
        match self {
            TimerId::T3591(psi) | TimerId::T3592(psi) => Some(*psi),
            _ => None,
        }
    }

    /// True for timers guarding 5GSM procedures.
    pub fn is_sm_timer(&self) -> bool {
        self.pdu_session_id().is_some()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pdu_session_id() {
            Some(psi) => write!(f, "T{}[psi={psi}]", self.code()),
            None => write!(f, "T{}", self.code()),
        }
    }
}

/// Identity of one arm of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A timer that ran out, as delivered to the AMF core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpiry {
    pub ue: AmfUeNgapId,
    pub timer: TimerId,
    pub token: TimerToken,
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    token: TimerToken,
    deadline: Instant,
}

/// Armed timers of every UE, keyed by UE and timer.
///
/// Arming a timer that is already running replaces it.
#[derive(Debug, Default)]
pub struct TimerManager {
    timers: HashMap<(AmfUeNgapId, TimerId), ArmedTimer>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, ue: AmfUeNgapId, timer: TimerId, token: TimerToken, duration: Duration, now: Instant) {
        self.timers.insert(
            (ue, timer),
            ArmedTimer {
                token,
                deadline: now + duration,
            },
        );
    }

    /// Returns true if the timer was running.
    pub fn stop(&mut self, ue: AmfUeNgapId, timer: TimerId) -> bool {
        self.timers.remove(&(ue, timer)).is_some()
    }

    /// Stops every timer of `ue`, returning how many were running.
    pub fn stop_all(&mut self, ue: AmfUeNgapId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|(owner, _), _| *owner != ue);
        before - self.timers.len()
    }

    pub fn is_running(&self, ue: AmfUeNgapId, timer: TimerId) -> bool {
        self.timers.contains_key(&(ue, timer))
    }

    pub fn token(&self, ue: AmfUeNgapId, timer: TimerId) -> Option<TimerToken> {
        self.timers.get(&(ue, timer)).map(|armed| armed.token)
    }

    pub fn remaining(&self, ue: AmfUeNgapId, timer: TimerId, now: Instant) -> Option<Duration> {
        self.timers
            .get(&(ue, timer))
            .map(|armed| armed.deadline.saturating_duration_since(now))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|armed| armed.deadline).min()
    }

    /// Removes and returns every timer whose deadline has passed, earliest first.
    pub fn perform_tick(&mut self, now: Instant) -> Vec<TimerExpiry> {
        let mut expired: Vec<(Instant, TimerExpiry)> = self
            .timers
            .iter()
            .filter(|(_, armed)| armed.deadline <= now)
            .map(|((ue, timer), armed)| {
                (
                    armed.deadline,
                    TimerExpiry {
                        ue: *ue,
                        timer: *timer,
                        token: armed.token,
                    },
                )
            })
            .collect();
        for (_, expiry) in &expired {
            self.timers.remove(&(expiry.ue, expiry.timer));
        }
        expired.sort_by_key(|(deadline, expiry)| (*deadline, expiry.token));
        expired.into_iter().map(|(_, expiry)| expiry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_id_display() {
        assert_eq!(TimerId::T3550.to_string(), "T3550");
        assert_eq!(TimerId::T3592(5).to_string(), "T3592[psi=5]");
        assert_eq!(TimerId::T3591(2).pdu_session_id(), Some(2));
        assert!(!TimerId::T3560.is_sm_timer());
    }

    #[test]
    fn test_perform_tick_expires_in_deadline_order() {
        let start = Instant::now();
        let mut timers = TimerManager::new();
        timers.start(1, TimerId::T3560, TimerToken(1), Duration::from_secs(6), start);
        timers.start(2, TimerId::T3550, TimerToken(2), Duration::from_secs(3), start);
        timers.start(2, TimerId::T3592(1), TimerToken(3), Duration::from_secs(16), start);

        assert!(timers.perform_tick(start + Duration::from_secs(1)).is_empty());

        let expired = timers.perform_tick(start + Duration::from_secs(7));
        assert_eq!(
            expired,
            vec![
                TimerExpiry { ue: 2, timer: TimerId::T3550, token: TimerToken(2) },
                TimerExpiry { ue: 1, timer: TimerId::T3560, token: TimerToken(1) },
            ]
        );
        assert_eq!(timers.len(), 1);
        assert!(timers.is_running(2, TimerId::T3592(1)));
    }

    #[test]
    fn test_restart_replaces_token() {
        let start = Instant::now();
        let mut timers = TimerManager::new();
        timers.start(1, TimerId::T3570, TimerToken(1), Duration::from_secs(6), start);
        timers.start(1, TimerId::T3570, TimerToken(2), Duration::from_secs(6), start + Duration::from_secs(5));

        assert!(timers.perform_tick(start + Duration::from_secs(7)).is_empty());
        assert_eq!(timers.token(1, TimerId::T3570), Some(TimerToken(2)));
        let expired = timers.perform_tick(start + Duration::from_secs(11));
        assert_eq!(expired[0].token, TimerToken(2));
    }

    #[test]
    fn test_stop_all_only_touches_one_ue() {
        let start = Instant::now();
        let mut timers = TimerManager::new();
        timers.start(1, TimerId::T3560, TimerToken(1), Duration::from_secs(6), start);
        timers.start(1, TimerId::T3591(1), TimerToken(2), Duration::from_secs(16), start);
        timers.start(2, TimerId::T3560, TimerToken(3), Duration::from_secs(6), start);

        assert_eq!(timers.stop_all(1), 2);
        assert!(!timers.stop(1, TimerId::T3560));
        assert!(timers.is_running(2, TimerId::T3560));
        assert_eq!(timers.next_deadline(), Some(start + Duration::from_secs(6)));
    }
}
